//! Command in, state out: one ranged setting through a full session.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{Call, FakeLink, MockDevice, RecordingTransport};
use mqtt_bridge_escvp::commands::{
    CommandDefinition, CommandTable, RangedSetting, ValueTranslator,
};
use mqtt_bridge_escvp::device::PowerState;
use mqtt_bridge_escvp::session::BridgeSession;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use vpbridge_framework::TopicBuilder;

#[tokio::test(start_paused = true)]
async fn test_command_then_poll_publishes_new_value() {
    let table = CommandTable::from_definitions(vec![CommandDefinition::Ranged(
        RangedSetting::new(
            "BRIGHTNESS",
            "Brightness",
            0..=100,
            0..=100,
            ValueTranslator::Integer,
        ),
    )])
    .unwrap();

    let device = Arc::new(MockDevice::powered(PowerState::On).with_value("BRIGHTNESS", 10));
    let transport = Arc::new(RecordingTransport::default());
    let (link, handle) = FakeLink::new(transport.clone());

    let session = BridgeSession::new(
        device.clone(),
        Arc::new(table),
        TopicBuilder::new("epson", "cinema"),
        Duration::from_secs(10),
    );
    let cancel = CancellationToken::new();
    let task = tokio::spawn({
        let cancel = cancel.clone();
        async move { session.run(link, cancel).await }
    });

    sleep(Duration::from_secs(1)).await;
    assert_eq!(transport.payloads("epson/state/BRIGHTNESS"), vec!["10"]);

    handle.send("epson/command/BRIGHTNESS", "42");
    sleep(Duration::from_secs(1)).await;
    assert_eq!(
        device.writes(),
        vec![Call::SendConfigValue("BRIGHTNESS".into(), "42".into())]
    );

    // Next poll tick.
    sleep(Duration::from_secs(10)).await;
    let states: Vec<_> = transport
        .published()
        .into_iter()
        .filter(|p| p.topic == "epson/state/BRIGHTNESS")
        .collect();
    assert_eq!(states.len(), 2);
    assert_eq!(states[1].payload, "42");
    assert!(states[1].retain);

    cancel.cancel();
    task.await.unwrap().unwrap();
}
