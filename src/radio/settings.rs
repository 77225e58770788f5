//! Radio settings and device templates
//!
//! A device template is a text file of `key:value` lines. Keys are matched
//! by substring and the last matching line wins; lines with unknown keys are
//! ignored.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

use crate::classifier::RssiWindow;

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: &'static str, value: String },

    #[error("{0} must be a positive integer")]
    ZeroField(&'static str),

    #[error("RSSI window {0} accepts no signal (upper_rssi must be below lower_rssi)")]
    EmptyRssiWindow(RssiWindow),

    #[error("scan step must be a positive number of Hz")]
    InvalidStep,

    #[error("failed to read template {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Modulation schemes supported by the radio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modulation {
    AskOok,
    Fsk2,
}

impl FromStr for Modulation {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().trim_start_matches("MOD_") {
            "ASK_OOK" | "ASK" | "OOK" => Ok(Modulation::AskOok),
            "2FSK" | "FSK2" | "FSK" => Ok(Modulation::Fsk2),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Modulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modulation::AskOok => f.write_str("MOD_ASK_OOK"),
            Modulation::Fsk2 => f.write_str("MOD_2FSK"),
        }
    }
}

/// Settings applied to a radio before capture or transmission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadioSettings {
    /// Carrier frequency in Hz
    pub frequency: u64,

    /// Data rate in baud
    pub baud_rate: u32,

    /// Channel bandwidth in Hz
    pub channel_bandwidth: u32,

    /// Channel spacing in Hz
    pub channel_spacing: u32,

    /// FSK deviation in Hz
    pub deviation: u32,

    pub modulation: Modulation,

    /// Metrics must be above this value to be accepted
    pub upper_rssi: i32,

    /// Metrics must be below this value to be accepted
    pub lower_rssi: i32,
}

impl Default for RadioSettings {
    fn default() -> Self {
        Self {
            frequency: 315_000_000,
            baud_rate: 4800,
            channel_bandwidth: 60_000,
            channel_spacing: 24_000,
            deviation: 47_607,
            modulation: Modulation::AskOok,
            upper_rssi: -100,
            lower_rssi: -20,
        }
    }
}

/// Template keys, in the order they are written
const TEMPLATE_KEYS: [&str; 8] = [
    "frequency",
    "baud_rate",
    "channel_bandwidth",
    "modulation_type",
    "upper_rssi",
    "lower_rssi",
    "channel_spacing",
    "deviation",
];

impl RadioSettings {
    /// Check that every frequency-domain field is a positive integer
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frequency == 0 {
            return Err(ConfigError::ZeroField("frequency"));
        }
        if self.baud_rate == 0 {
            return Err(ConfigError::ZeroField("baud_rate"));
        }
        if self.channel_bandwidth == 0 {
            return Err(ConfigError::ZeroField("channel_bandwidth"));
        }
        if self.channel_spacing == 0 {
            return Err(ConfigError::ZeroField("channel_spacing"));
        }
        if self.deviation == 0 {
            return Err(ConfigError::ZeroField("deviation"));
        }
        Ok(())
    }

    /// The classification window, taken literally from the accept rule
    /// `upper_rssi < metric < lower_rssi`
    ///
    /// An empty window is reported, never swapped.
    pub fn rssi_window(&self) -> Result<RssiWindow, ConfigError> {
        let window = RssiWindow::new(self.upper_rssi, self.lower_rssi);
        if window.is_empty() {
            return Err(ConfigError::EmptyRssiWindow(window));
        }
        Ok(window)
    }

    /// Copy of these settings retuned by `offset` Hz
    pub fn offset_by(&self, offset: i64) -> Result<Self, ConfigError> {
        let frequency = self
            .frequency
            .checked_add_signed(offset)
            .filter(|&hz| hz > 0)
            .ok_or(ConfigError::ZeroField("frequency"))?;
        Ok(Self {
            frequency,
            ..self.clone()
        })
    }

    /// Overlay the `key:value` lines of a device template onto `self`
    pub fn parse_template(mut self, text: &str) -> Result<Self, ConfigError> {
        for line in text.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();

            // Longest key first so e.g. "channel_spacing" never lands on a shorter key
            let matched = TEMPLATE_KEYS
                .iter()
                .filter(|known| key.contains(**known))
                .max_by_key(|known| known.len());

            match matched {
                Some(&"frequency") => self.frequency = parse_field("frequency", value)?,
                Some(&"baud_rate") => self.baud_rate = parse_field("baud_rate", value)?,
                Some(&"channel_bandwidth") => {
                    self.channel_bandwidth = parse_field("channel_bandwidth", value)?
                }
                Some(&"modulation_type") => {
                    self.modulation =
                        value
                            .parse()
                            .map_err(|_| ConfigError::InvalidValue {
                                key: "modulation_type",
                                value: value.to_string(),
                            })?
                }
                Some(&"upper_rssi") => self.upper_rssi = parse_field("upper_rssi", value)?,
                Some(&"lower_rssi") => self.lower_rssi = parse_field("lower_rssi", value)?,
                Some(&"channel_spacing") => {
                    self.channel_spacing = parse_field("channel_spacing", value)?
                }
                Some(&"deviation") => self.deviation = parse_field("deviation", value)?,
                _ => {}
            }
        }

        self.validate()?;
        Ok(self)
    }

    /// Load a device template file on top of `self`
    pub fn load_template(self, path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        self.parse_template(&text)
    }

    /// Render these settings as device template lines
    pub fn to_template(&self) -> String {
        TEMPLATE_KEYS
            .iter()
            .map(|key| {
                let value = match *key {
                    "frequency" => self.frequency.to_string(),
                    "baud_rate" => self.baud_rate.to_string(),
                    "channel_bandwidth" => self.channel_bandwidth.to_string(),
                    "modulation_type" => self.modulation.to_string(),
                    "upper_rssi" => self.upper_rssi.to_string(),
                    "lower_rssi" => self.lower_rssi.to_string(),
                    "channel_spacing" => self.channel_spacing.to_string(),
                    _ => self.deviation.to_string(),
                };
                format!("{}:{}\n", key, value)
            })
            .collect()
    }
}

fn parse_field<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}
