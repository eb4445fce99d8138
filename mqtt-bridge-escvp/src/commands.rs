//! Command table: every addressable projector feature.
//!
//! The table is built once at startup, validated, and then shared
//! read-only. Keys are unique across all categories and the key
//! [`POWER_KEY`] is reserved for the power switch.

use std::collections::HashMap;
use std::ops::RangeInclusive;

use thiserror::Error;

/// Key of the power switch on the command topic.
pub const POWER_KEY: &str = "power";

/// Protocol command that switches the projector on.
pub const POWER_ON: &str = "PWR ON";

/// Protocol command that switches the projector off.
pub const POWER_OFF: &str = "PWR OFF";

/// Errors raised while building a command table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableError {
    #[error("Duplicate command key '{0}'")]
    DuplicateKey(String),
    #[error("Command key '{0}' is reserved")]
    ReservedKey(String),
    #[error("Command key cannot be empty")]
    EmptyKey,
    #[error("Setting '{0}' has an empty range")]
    EmptyRange(String),
    #[error("Setting '{0}' has no options")]
    NoOptions(String),
}

/// How raw device values are presented to the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueTranslator {
    /// Plain integer, step 1.
    Integer,
    /// Percentage, snapped to steps of 5.
    Percent,
}

impl ValueTranslator {
    /// Step used by the discovery entity.
    pub fn step(&self) -> i64 {
        match self {
            ValueTranslator::Integer => 1,
            ValueTranslator::Percent => 5,
        }
    }

    /// Unit of measurement used by the discovery entity.
    pub fn unit(&self) -> &'static str {
        match self {
            ValueTranslator::Integer => "",
            ValueTranslator::Percent => "%",
        }
    }
}

/// A numeric setting with a linear mapping between the human and raw ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangedSetting {
    pub key: String,
    pub name: String,
    pub human: RangeInclusive<i64>,
    pub raw: RangeInclusive<i64>,
    pub translator: ValueTranslator,
}

impl RangedSetting {
    pub fn new(
        key: impl Into<String>,
        name: impl Into<String>,
        human: RangeInclusive<i64>,
        raw: RangeInclusive<i64>,
        translator: ValueTranslator,
    ) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            human,
            raw,
            translator,
        }
    }

    /// Translate a raw device value to the human scale.
    ///
    /// # Example
    /// ```
    /// use mqtt_bridge_escvp::commands::{RangedSetting, ValueTranslator};
    ///
    /// let level = RangedSetting::new("LUMLEVEL", "Light Output", 50..=100, 0..=255, ValueTranslator::Percent);
    /// assert_eq!(level.to_human(0), 50);
    /// assert_eq!(level.to_human(128), 75);
    /// assert_eq!(level.to_human(255), 100);
    /// ```
    pub fn to_human(&self, raw: i64) -> i64 {
        let value = rescale(raw, &self.raw, &self.human);
        match self.translator {
            ValueTranslator::Integer => value,
            ValueTranslator::Percent => {
                let step = self.translator.step();
                let snapped = ((value as f64) / step as f64).round() as i64 * step;
                snapped.clamp(*self.human.start(), *self.human.end())
            }
        }
    }

    /// Translate a human value to the raw device scale, clamping to the range.
    pub fn to_raw(&self, human: i64) -> i64 {
        let human = human.clamp(*self.human.start(), *self.human.end());
        rescale(human, &self.human, &self.raw)
    }
}

fn rescale(value: i64, from: &RangeInclusive<i64>, to: &RangeInclusive<i64>) -> i64 {
    let from_span = (from.end() - from.start()) as f64;
    let to_span = (to.end() - to.start()) as f64;
    if from_span == 0.0 {
        return *to.start();
    }
    let scaled = *to.start() as f64 + (value - from.start()) as f64 * to_span / from_span;
    (scaled.round() as i64).clamp(*to.start(), *to.end())
}

/// A bare command sent without a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerCommand {
    pub key: String,
    pub command: String,
    /// Only named triggers are announced via discovery.
    pub name: Option<String>,
}

impl TriggerCommand {
    pub fn new(key: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            command: command.into(),
            name: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// One selectable value of an [`EnumSetting`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumOption {
    /// Value seen on the broker.
    pub label: String,
    /// Command that selects this option.
    pub command: String,
    /// Value reported by the device when this option is active.
    pub raw: String,
}

impl EnumOption {
    pub fn new(
        label: impl Into<String>,
        command: impl Into<String>,
        raw: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            command: command.into(),
            raw: raw.into(),
        }
    }
}

/// A setting restricted to a fixed, ordered set of options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumSetting {
    pub key: String,
    pub name: String,
    /// Command that queries the current raw value.
    pub query: String,
    pub options: Vec<EnumOption>,
}

impl EnumSetting {
    pub fn new(
        key: impl Into<String>,
        name: impl Into<String>,
        query: impl Into<String>,
        options: Vec<EnumOption>,
    ) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            query: query.into(),
            options,
        }
    }

    /// Option whose broker label equals `label`.
    pub fn option_by_label(&self, label: &str) -> Option<&EnumOption> {
        self.options.iter().find(|o| o.label == label)
    }

    /// Option whose device value equals `raw`.
    pub fn option_by_raw(&self, raw: &str) -> Option<&EnumOption> {
        self.options.iter().find(|o| o.raw == raw)
    }
}

/// A read-only integer value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Readout {
    pub key: String,
    pub name: String,
}

impl Readout {
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
        }
    }
}

/// A single table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandDefinition {
    Ranged(RangedSetting),
    Trigger(TriggerCommand),
    Enum(EnumSetting),
    Readout(Readout),
}

impl CommandDefinition {
    /// The broker-facing key.
    pub fn key(&self) -> &str {
        match self {
            CommandDefinition::Ranged(s) => &s.key,
            CommandDefinition::Trigger(t) => &t.key,
            CommandDefinition::Enum(e) => &e.key,
            CommandDefinition::Readout(r) => &r.key,
        }
    }
}

/// Result of resolving a command key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved<'a> {
    Definition(&'a CommandDefinition),
    Power,
    Unknown,
}

/// Validated, immutable command table.
#[derive(Debug, Clone)]
pub struct CommandTable {
    definitions: Vec<CommandDefinition>,
    index: HashMap<String, usize>,
}

impl CommandTable {
    /// Build a table, rejecting empty, duplicate and reserved keys.
    pub fn from_definitions(definitions: Vec<CommandDefinition>) -> Result<Self, TableError> {
        let mut index = HashMap::with_capacity(definitions.len());

        for (position, definition) in definitions.iter().enumerate() {
            let key = definition.key();
            if key.is_empty() {
                return Err(TableError::EmptyKey);
            }
            if key == POWER_KEY {
                return Err(TableError::ReservedKey(key.to_string()));
            }
            match definition {
                CommandDefinition::Ranged(s) if s.human.is_empty() || s.raw.is_empty() => {
                    return Err(TableError::EmptyRange(key.to_string()));
                }
                CommandDefinition::Enum(e) if e.options.is_empty() => {
                    return Err(TableError::NoOptions(key.to_string()));
                }
                _ => {}
            }
            if index.insert(key.to_string(), position).is_some() {
                return Err(TableError::DuplicateKey(key.to_string()));
            }
        }

        Ok(Self { definitions, index })
    }

    /// Look up a key.
    pub fn resolve(&self, key: &str) -> Resolved<'_> {
        if let Some(&position) = self.index.get(key) {
            return Resolved::Definition(&self.definitions[position]);
        }
        if key == POWER_KEY {
            Resolved::Power
        } else {
            Resolved::Unknown
        }
    }

    /// Definition for `key`, if any.
    pub fn get(&self, key: &str) -> Option<&CommandDefinition> {
        self.index.get(key).map(|&position| &self.definitions[position])
    }

    /// All definitions in table order.
    pub fn definitions(&self) -> impl Iterator<Item = &CommandDefinition> {
        self.definitions.iter()
    }

    pub fn ranged(&self) -> impl Iterator<Item = &RangedSetting> {
        self.definitions.iter().filter_map(|d| match d {
            CommandDefinition::Ranged(s) => Some(s),
            _ => None,
        })
    }

    pub fn triggers(&self) -> impl Iterator<Item = &TriggerCommand> {
        self.definitions.iter().filter_map(|d| match d {
            CommandDefinition::Trigger(t) => Some(t),
            _ => None,
        })
    }

    pub fn enums(&self) -> impl Iterator<Item = &EnumSetting> {
        self.definitions.iter().filter_map(|d| match d {
            CommandDefinition::Enum(e) => Some(e),
            _ => None,
        })
    }

    pub fn readouts(&self) -> impl Iterator<Item = &Readout> {
        self.definitions.iter().filter_map(|d| match d {
            CommandDefinition::Readout(r) => Some(r),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Built-in table for Epson home-cinema projectors.
    pub fn epson() -> Result<Self, TableError> {
        Self::from_definitions(epson_definitions())
    }
}

fn epson_definitions() -> Vec<CommandDefinition> {
    use CommandDefinition::{Enum, Ranged, Readout as ReadoutDef, Trigger};
    use ValueTranslator::{Integer, Percent};

    let mut definitions = vec![
        Ranged(RangedSetting::new("BRIGHT", "Brightness", -24..=24, 0..=255, Integer)),
        Ranged(RangedSetting::new("CONTRAST", "Contrast", -24..=24, 0..=255, Integer)),
        Ranged(RangedSetting::new("DENSITY", "Color Saturation", -32..=32, 0..=255, Integer)),
        Ranged(RangedSetting::new("TINT", "Tint", -32..=32, 0..=255, Integer)),
        Ranged(RangedSetting::new("SHARP", "Sharpness", -5..=5, 0..=255, Integer)),
        Ranged(RangedSetting::new("CTEMP", "Color Temperature", 0..=9, 0..=9, Integer)),
        Ranged(RangedSetting::new("LUMLEVEL", "Light Output", 50..=100, 0..=255, Percent)),
        ReadoutDef(Readout::new("LAMP", "Lamp Hours")),
        Enum(EnumSetting::new(
            "SOURCE",
            "Source",
            "SOURCE?",
            vec![
                EnumOption::new("HDMI1", "SOURCE 30", "30"),
                EnumOption::new("HDMI2", "SOURCE A0", "A0"),
                EnumOption::new("Computer", "SOURCE 10", "10"),
                EnumOption::new("Video", "SOURCE 41", "41"),
                EnumOption::new("LAN", "SOURCE 53", "53"),
            ],
        )),
        Enum(EnumSetting::new(
            "CMODE",
            "Color Mode",
            "CMODE?",
            vec![
                EnumOption::new("Dynamic", "CMODE 06", "06"),
                EnumOption::new("Natural", "CMODE 07", "07"),
                EnumOption::new("Bright Cinema", "CMODE 0C", "0C"),
                EnumOption::new("Cinema", "CMODE 15", "15"),
                EnumOption::new("Digital Cinema", "CMODE 22", "22"),
            ],
        )),
        Enum(EnumSetting::new(
            "ASPECT",
            "Aspect Ratio",
            "ASPECT?",
            vec![
                EnumOption::new("Normal", "ASPECT 00", "00"),
                EnumOption::new("Auto", "ASPECT 30", "30"),
                EnumOption::new("Full", "ASPECT 40", "40"),
                EnumOption::new("Zoom", "ASPECT 50", "50"),
                EnumOption::new("Wide", "ASPECT 70", "70"),
            ],
        )),
        Enum(EnumSetting::new(
            "LUMINANCE",
            "Power Consumption",
            "LUMINANCE?",
            vec![
                EnumOption::new("High", "LUMINANCE 00", "00"),
                EnumOption::new("Low", "LUMINANCE 01", "01"),
                EnumOption::new("Medium", "LUMINANCE 02", "02"),
            ],
        )),
    ];

    for i in 1..=10 {
        definitions.push(Trigger(
            TriggerCommand::new(format!("MEMORY_{}", i), format!("POPMEM 02 {:02X}", i))
                .named(format!("Load Image Memory #{}", i)),
        ));
        definitions.push(Trigger(
            TriggerCommand::new(format!("LENS_MEMORY_{}", i), format!("POPLP {:02X}", i))
                .named(format!("Load Lens Memory #{}", i)),
        ));
    }

    for (key, code) in [
        ("MENU", "03"),
        ("ESC", "05"),
        ("ENTER", "16"),
        ("UP", "35"),
        ("DOWN", "36"),
        ("LEFT", "37"),
        ("RIGHT", "38"),
    ] {
        definitions.push(Trigger(TriggerCommand::new(key, format!("KEY {}", code))));
    }

    definitions
}
