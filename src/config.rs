//! TOML configuration.
//!
//! Every field is optional; an empty file yields [`Config::default`].
//!
//! ```toml
//! press_point = 0.5
//! log_unknown_reports = true
//!
//! [deadzone]
//! min = 0.1
//! max = 0.95
//!
//! [slots]            # fixed geometry instead of deriving it per device
//! report_count = 3
//! report_size = 13
//!
//! [[matchers]]
//! interface = "HID"
//! vendor_ids = [0x256f]
//!
//! [[groups]]
//! name = "translation"
//! usage_min = 0x30
//! usage_max = 0x32
//! elements = [
//!     { name = "x" },
//!     { name = "z", invert = true },
//!     { name = "y", invert = true, scale_factor = 2.0 },
//! ]
//! ```
//!
//! `matchers` and `groups` replace the built-in sets when present.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::control::{AxisDeadzone, DecodeSettings, DEFAULT_PRESS_POINT};
use crate::layout::{default_groups, GroupDefinition, LayoutBuilder, SlotGeometry};
use crate::matcher::{default_matchers, DeviceMatcher, MatcherConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config: {0}")]
    Io(#[from] std::io::Error),
    #[error("parsing config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type DeadzoneSettings = AxisDeadzone;

fn default_press_point() -> f32 {
    DEFAULT_PRESS_POINT
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Fixed slot geometry. Derived per device when unset.
    pub slots: Option<SlotGeometry>,
    pub deadzone: DeadzoneSettings,
    #[serde(default = "default_press_point")]
    pub press_point: f32,
    /// Trace reports with undeclared ids.
    pub log_unknown_reports: bool,
    /// Device matchers; the 3Dconnexion defaults when empty.
    pub matchers: Vec<MatcherConfig>,
    /// Group definitions; translation/rotation when unset.
    pub groups: Option<Vec<GroupDefinition>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            slots: None,
            deadzone: DeadzoneSettings::default(),
            press_point: DEFAULT_PRESS_POINT,
            log_unknown_reports: false,
            matchers: Vec::new(),
            groups: None,
        }
    }
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let dz = &self.deadzone;
        if !(0.0..=1.0).contains(&dz.min) || !(0.0..=1.0).contains(&dz.max) || dz.min >= dz.max {
            return Err(ConfigError::Invalid(format!(
                "deadzone needs 0 <= min < max <= 1, got min {} max {}",
                dz.min, dz.max
            )));
        }
        if !(self.press_point > 0.0 && self.press_point <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "press_point {} outside (0, 1]",
                self.press_point
            )));
        }
        if let Some(slots) = self.slots {
            if slots.report_count == 0 || slots.report_count > 255 || slots.report_size < 2 {
                return Err(ConfigError::Invalid(format!(
                    "slots need 1..=255 reports of at least 2 bytes, got {} x {}",
                    slots.report_count, slots.report_size
                )));
            }
        }
        for g in self.groups.iter().flatten() {
            g.validate().map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }
        self.device_matchers()?;
        Ok(())
    }

    pub fn decode_settings(&self) -> DecodeSettings {
        DecodeSettings {
            deadzone: self.deadzone,
            press_point: self.press_point,
        }
    }

    pub fn device_matchers(&self) -> Result<Vec<DeviceMatcher>, ConfigError> {
        if self.matchers.is_empty() {
            return Ok(default_matchers());
        }
        self.matchers
            .iter()
            .map(|m| DeviceMatcher::from_config(m).map_err(|e| ConfigError::Invalid(e.to_string())))
            .collect()
    }

    pub fn group_definitions(&self) -> Vec<GroupDefinition> {
        self.groups.clone().unwrap_or_else(default_groups)
    }

    /// A layout builder honoring the configured groups and slots.
    pub fn layout_builder(&self, display_name: impl Into<String>) -> LayoutBuilder {
        LayoutBuilder::new(display_name)
            .with_groups(self.group_definitions())
            .with_geometry(self.slots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_is_default() {
        let c = Config::from_toml_str("").unwrap();
        assert_eq!(c, Config::default());
        assert_eq!(c.deadzone.min, 0.125);
        assert_eq!(c.deadzone.max, 0.925);
        assert_eq!(c.press_point, 0.5);
        assert_eq!(c.group_definitions().len(), 2);
        assert_eq!(c.device_matchers().unwrap().len(), 2);
    }

    #[test]
    fn full_config_parses() {
        let text = r#"
            press_point = 0.3
            log_unknown_reports = true

            [deadzone]
            min = 0.0
            max = 1.0

            [slots]
            report_count = 3
            report_size = 13

            [[matchers]]
            interface = "HID"
            manufacturer = "3Dconnexion.*"
            vendor_ids = [0x046d]

            [[groups]]
            name = "pan"
            usage_min = 0x30
            usage_max = 0x31
            elements = [ { name = "x" }, { name = "y", invert = true, scale_factor = 2.0 } ]
        "#;
        let c = Config::from_toml_str(text).unwrap();
        assert_eq!(c.slots, Some(SlotGeometry { report_count: 3, report_size: 13 }));
        assert!(c.log_unknown_reports);
        assert_eq!(c.decode_settings().press_point, 0.3);

        let groups = c.group_definitions();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].format, crate::classify::StateFormat::Vector3);
        assert!(groups[0].elements[1].parameters.invert);
        assert_eq!(groups[0].elements[1].parameters.scale_factor, Some(2.0));
        assert_eq!(c.device_matchers().unwrap().len(), 1);
    }

    #[test]
    fn inverted_deadzone_is_invalid() {
        let text = "[deadzone]\nmin = 0.9\nmax = 0.1\n";
        assert!(matches!(Config::from_toml_str(text), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn malformed_group_is_invalid() {
        let text = r#"
            [[groups]]
            name = "short"
            usage_min = 0x30
            usage_max = 0x32
            elements = [ { name = "x" } ]
        "#;
        assert!(matches!(Config::from_toml_str(text), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn bad_regex_is_invalid() {
        let text = "[[matchers]]\nmanufacturer = \"(\"\n";
        assert!(matches!(Config::from_toml_str(text), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn syntax_error_is_a_parse_error() {
        assert!(matches!(Config::from_toml_str("slots = ["), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn missing_file_is_io() {
        assert!(matches!(
            Config::load("/nonexistent/spacenav-hid.toml"),
            Err(ConfigError::Io(_))
        ));
    }
}
