//! Home Assistant MQTT discovery payloads.
//!
//! One retained config message per entity:
//!
//! | Table entry     | Component |
//! |-----------------|-----------|
//! | power           | `switch`  |
//! | ranged setting  | `number`  |
//! | enum setting    | `select`  |
//! | named trigger   | `button`  |
//! | readout         | `sensor`  |

use serde_json::{Value, json};
use vpbridge_framework::TopicBuilder;

use crate::commands::{CommandTable, POWER_KEY};

/// A discovery config message.
#[derive(Debug, Clone, PartialEq)]
pub struct Announcement {
    pub topic: String,
    pub payload: Value,
}

/// Build every discovery message for the table.
pub fn announcements(table: &CommandTable, topics: &TopicBuilder) -> Vec<Announcement> {
    let device = topics.device();
    let mut messages = vec![Announcement {
        topic: topics.discovery_topic("switch", POWER_KEY),
        payload: json!({
            "name": format!("{} - Epson Projector Power", device),
            "unique_id": format!("{}_pwr", device),
            "command_topic": topics.command_topic(POWER_KEY),
            "state_topic": topics.power_state_topic(),
        }),
    }];

    for setting in table.ranged() {
        let mut payload = entity(topics, &setting.key, &setting.name);
        payload["command_topic"] = json!(topics.command_topic(&setting.key));
        payload["state_topic"] = json!(topics.state_topic(&setting.key));
        payload["min"] = json!(setting.human.start());
        payload["max"] = json!(setting.human.end());
        payload["step"] = json!(setting.translator.step());
        payload["unit_of_measurement"] = json!(setting.translator.unit());
        messages.push(Announcement {
            topic: topics.discovery_topic("number", &setting.key),
            payload,
        });
    }

    for setting in table.enums() {
        let mut payload = entity(topics, &setting.key, &setting.name);
        payload["command_topic"] = json!(topics.command_topic(&setting.key));
        payload["state_topic"] = json!(topics.option_state_topic(&setting.key));
        payload["options"] = json!(
            setting
                .options
                .iter()
                .map(|o| o.label.as_str())
                .collect::<Vec<_>>()
        );
        messages.push(Announcement {
            topic: topics.discovery_topic("select", &setting.key),
            payload,
        });
    }

    for trigger in table.triggers() {
        let Some(name) = &trigger.name else {
            continue;
        };
        let mut payload = entity(topics, &trigger.key, name);
        payload["command_topic"] = json!(topics.command_topic(&trigger.key));
        messages.push(Announcement {
            topic: topics.discovery_topic("button", &trigger.key),
            payload,
        });
    }

    for readout in table.readouts() {
        let mut payload = entity(topics, &readout.key, &readout.name);
        payload["state_topic"] = json!(topics.state_topic(&readout.key));
        messages.push(Announcement {
            topic: topics.discovery_topic("sensor", &readout.key),
            payload,
        });
    }

    messages
}

/// Fields shared by every entity that follows the power state.
fn entity(topics: &TopicBuilder, key: &str, name: &str) -> Value {
    let device = topics.device();
    json!({
        "name": format!("{} - {}", device, name),
        "unique_id": format!("{}_{}", device, key.to_lowercase()),
        "availability_topic": topics.power_state_topic(),
        "payload_available": "ON",
        "payload_not_available": "OFF",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn epson_announcements() -> Vec<Announcement> {
        announcements(&CommandTable::epson().unwrap(), &TopicBuilder::new("epson", "cinema"))
    }

    fn find<'a>(messages: &'a [Announcement], topic: &str) -> &'a Value {
        &messages
            .iter()
            .find(|m| m.topic == topic)
            .unwrap_or_else(|| panic!("missing {}", topic))
            .payload
    }

    #[test]
    fn test_entity_counts() {
        let messages = epson_announcements();
        let count = |component: &str| {
            messages
                .iter()
                .filter(|m| m.topic.starts_with(&format!("homeassistant/{}/", component)))
                .count()
        };

        assert_eq!(count("switch"), 1);
        assert_eq!(count("number"), 7);
        assert_eq!(count("select"), 4);
        assert_eq!(count("button"), 20);
        assert_eq!(count("sensor"), 1);
        assert_eq!(messages.len(), 33);
    }

    #[test]
    fn test_power_switch() {
        let messages = epson_announcements();
        let power = find(&messages, "homeassistant/switch/epson/cinema_power/config");

        assert_eq!(power["name"], "cinema - Epson Projector Power");
        assert_eq!(power["unique_id"], "cinema_pwr");
        assert_eq!(power["command_topic"], "epson/command/power");
        assert_eq!(power["state_topic"], "epson/state/cinema_power");
        assert!(power.get("availability_topic").is_none());
    }

    #[test]
    fn test_number_entities() {
        let messages = epson_announcements();

        let bright = find(&messages, "homeassistant/number/epson/cinema_bright/config");
        assert_eq!(bright["unique_id"], "cinema_bright");
        assert_eq!(bright["command_topic"], "epson/command/BRIGHT");
        assert_eq!(bright["state_topic"], "epson/state/BRIGHT");
        assert_eq!(bright["min"], -24);
        assert_eq!(bright["max"], 24);
        assert_eq!(bright["step"], 1);
        assert_eq!(bright["unit_of_measurement"], "");
        assert_eq!(bright["availability_topic"], "epson/state/cinema_power");
        assert_eq!(bright["payload_available"], "ON");
        assert_eq!(bright["payload_not_available"], "OFF");

        let level = find(&messages, "homeassistant/number/epson/cinema_lumlevel/config");
        assert_eq!(level["min"], 50);
        assert_eq!(level["max"], 100);
        assert_eq!(level["step"], 5);
        assert_eq!(level["unit_of_measurement"], "%");
    }

    #[test]
    fn test_select_entity() {
        let messages = epson_announcements();
        let cmode = find(&messages, "homeassistant/select/epson/cinema_cmode/config");

        assert_eq!(cmode["name"], "cinema - Color Mode");
        assert_eq!(cmode["state_topic"], "epson/state/cinema_CMODE");
        assert_eq!(cmode["options"][0], "Dynamic");
        assert_eq!(cmode["options"].as_array().unwrap().len(), 5);
    }

    #[test]
    fn test_buttons_and_sensor() {
        let messages = epson_announcements();

        let lens = find(&messages, "homeassistant/button/epson/cinema_lens_memory_3/config");
        assert_eq!(lens["name"], "cinema - Load Lens Memory #3");
        assert_eq!(lens["command_topic"], "epson/command/LENS_MEMORY_3");
        assert!(lens.get("state_topic").is_none());

        let lamp = find(&messages, "homeassistant/sensor/epson/cinema_lamp/config");
        assert_eq!(lamp["state_topic"], "epson/state/LAMP");
        assert!(lamp.get("command_topic").is_none());

        // Unnamed remote keys are not announced.
        assert!(!messages.iter().any(|m| m.topic.contains("cinema_menu")));
    }
}
