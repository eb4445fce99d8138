use std::time::Duration;

use rumqttc::{LastWill, MqttOptions};

use crate::config::MqttConfig;
use crate::error::{Error, Result};

/// Build rumqttc options from the broker configuration.
///
/// `default_client_id` is used when the configuration does not set one.
pub fn mqtt_options(
    config: &MqttConfig,
    default_client_id: &str,
    last_will: Option<LastWill>,
) -> Result<MqttOptions> {
    if config.host.is_empty() {
        return Err(Error::Config("MQTT host is not set".to_string()));
    }

    let client_id = config
        .client_id
        .clone()
        .unwrap_or_else(|| default_client_id.to_string());

    let mut options = MqttOptions::new(client_id, config.host.clone(), config.port);
    options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
    options.set_clean_session(true);

    if let Some(username) = &config.username {
        options.set_credentials(
            username.clone(),
            config.password.clone().unwrap_or_default(),
        );
    }

    if let Some(will) = last_will {
        options.set_last_will(will);
    }

    tracing::info!(
        host = %config.host,
        port = config.port,
        client_id = %options.client_id(),
        authenticated = config.username.is_some(),
        "Prepared MQTT connection options"
    );

    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rumqttc::QoS;

    #[test]
    fn test_default_client_id() {
        let config = MqttConfig {
            host: "broker.local".to_string(),
            ..Default::default()
        };

        let options = mqtt_options(&config, "vpbridge-cinema", None).unwrap();
        assert_eq!(options.client_id(), "vpbridge-cinema");
        assert_eq!(options.broker_address(), ("broker.local".to_string(), 1883));
        assert_eq!(options.keep_alive(), Duration::from_secs(30));
        assert!(options.credentials().is_none());
    }

    #[test]
    fn test_credentials_and_last_will() {
        let config = MqttConfig {
            host: "broker.local".to_string(),
            client_id: Some("custom".to_string()),
            username: Some("bridge".to_string()),
            password: Some("secret".to_string()),
            ..Default::default()
        };

        let will = LastWill::new("epson/status", "offline", QoS::AtLeastOnce, true);
        let options = mqtt_options(&config, "unused", Some(will)).unwrap();

        assert_eq!(options.client_id(), "custom");
        assert_eq!(
            options.credentials(),
            Some(("bridge".to_string(), "secret".to_string()))
        );
        let will = options.last_will().unwrap();
        assert_eq!(will.topic, "epson/status");
        assert!(will.retain);
    }

    #[test]
    fn test_missing_host() {
        assert!(mqtt_options(&MqttConfig::default(), "id", None).is_err());
    }
}
