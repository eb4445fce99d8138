//! Topic construction and MQTT topic-filter matching.
//!
//! All topics hang off a per-deployment base prefix:
//!
//! ```text
//! <base>/command/<key>            inbound commands
//! <base>/state/<key>              ranged settings and readouts
//! <base>/state/<device>_power     power state
//! <base>/state/<device>_<key>     enum settings
//! <base>/status                   bridge status
//! <discovery>/<component>/<base>/<device>_<key>/config
//! ```

/// Builder for the topics of one bridged device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicBuilder {
    base: String,
    device: String,
    discovery_prefix: String,
}

impl TopicBuilder {
    /// Create a builder for a base prefix and device name.
    pub fn new(base: impl Into<String>, device: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            device: device.into(),
            discovery_prefix: "homeassistant".to_string(),
        }
    }

    /// Use a custom discovery prefix instead of `homeassistant`.
    pub fn with_discovery_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.discovery_prefix = prefix.into();
        self
    }

    /// The base prefix.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// The device name used in state and discovery topics.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Subscription filter for every command topic.
    ///
    /// # Example
    /// ```
    /// use vpbridge_common::topic::TopicBuilder;
    ///
    /// let topics = TopicBuilder::new("epson", "cinema");
    /// assert_eq!(topics.command_filter(), "epson/command/#");
    /// ```
    pub fn command_filter(&self) -> String {
        format!("{}/command/#", self.base)
    }

    /// Topic a command for `key` arrives on.
    pub fn command_topic(&self, key: &str) -> String {
        format!("{}/command/{}", self.base, key)
    }

    /// State topic for ranged settings and readouts.
    pub fn state_topic(&self, key: &str) -> String {
        format!("{}/state/{}", self.base, key)
    }

    /// State topic for the power switch.
    ///
    /// # Example
    /// ```
    /// use vpbridge_common::topic::TopicBuilder;
    ///
    /// let topics = TopicBuilder::new("epson", "cinema");
    /// assert_eq!(topics.power_state_topic(), "epson/state/cinema_power");
    /// ```
    pub fn power_state_topic(&self) -> String {
        format!("{}/state/{}_power", self.base, self.device)
    }

    /// State topic for an enum setting.
    pub fn option_state_topic(&self, key: &str) -> String {
        format!("{}/state/{}_{}", self.base, self.device, key)
    }

    /// Bridge status topic.
    pub fn status_topic(&self) -> String {
        format!("{}/status", self.base)
    }

    /// Discovery config topic for an entity.
    ///
    /// # Example
    /// ```
    /// use vpbridge_common::topic::TopicBuilder;
    ///
    /// let topics = TopicBuilder::new("epson", "cinema");
    /// assert_eq!(
    ///     topics.discovery_topic("number", "BRIGHT"),
    ///     "homeassistant/number/epson/cinema_bright/config"
    /// );
    /// ```
    pub fn discovery_topic(&self, component: &str, key: &str) -> String {
        format!(
            "{}/{}/{}/{}_{}/config",
            self.discovery_prefix,
            component,
            self.base,
            self.device,
            key.to_lowercase()
        )
    }

    /// Extract the command key from a topic under the command prefix.
    ///
    /// Returns `None` for topics outside `<base>/command/` or with an empty key.
    pub fn parse_command_topic<'a>(&self, topic: &'a str) -> Option<&'a str> {
        topic
            .strip_prefix(self.base.as_str())
            .and_then(|rest| rest.strip_prefix("/command/"))
            .filter(|key| !key.is_empty())
    }
}

/// Check whether a topic matches an MQTT subscription filter.
///
/// Supports the single-level (`+`) and multi-level (`#`) wildcards.
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}
