//! Configuration loaded from environment variables

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::attack::ReplayTiming;
use crate::capture::RetryPolicy;
use crate::radio::{ConfigError, Modulation, RadioSettings};

/// What the bench should do this run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Capture interactively, offer replay and save
    Capture,
    /// Replay a saved capture file
    Replay,
    /// Send a saved capture file once
    Send,
    /// Two-radio rolling code attack
    Rolling,
    /// Jam until interrupted
    Jam,
    /// Scan the known frequency list
    ScanKnown,
    /// Scan upwards from the configured frequency
    ScanRange,
    /// Transmit a binary de Bruijn sequence
    DeBruijn,
    /// Print a de Bruijn sequence without touching a radio
    Sequence,
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "capture" => Ok(Mode::Capture),
            "replay" => Ok(Mode::Replay),
            "send" => Ok(Mode::Send),
            "rolling" => Ok(Mode::Rolling),
            "jam" => Ok(Mode::Jam),
            "scan-known" => Ok(Mode::ScanKnown),
            "scan-range" => Ok(Mode::ScanRange),
            "debruijn" => Ok(Mode::DeBruijn),
            "sequence" => Ok(Mode::Sequence),
            _ => Err(ConfigError::InvalidValue {
                key: "RFBENCH_MODE",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Capture => "capture",
            Mode::Replay => "replay",
            Mode::Send => "send",
            Mode::Rolling => "rolling",
            Mode::Jam => "jam",
            Mode::ScanKnown => "scan-known",
            Mode::ScanRange => "scan-range",
            Mode::DeBruijn => "debruijn",
            Mode::Sequence => "sequence",
        };
        f.write_str(name)
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Selected operation (RFBENCH_MODE, or the first command-line argument)
    pub mode: Mode,

    /// Radio helper executable
    pub radio_command: String,

    /// Device index of the sniffing / replaying radio
    pub sniffer_index: u32,

    /// Device index of the jamming radio
    pub jammer_index: u32,

    /// Carrier frequency in Hz
    pub frequency: u64,

    pub baud_rate: u32,
    pub channel_bandwidth: u32,
    pub channel_spacing: u32,
    pub deviation: u32,
    pub modulation: Modulation,
    pub upper_rssi: i32,
    pub lower_rssi: i32,

    /// Device template overlaid on the settings above
    pub template: Option<PathBuf>,

    /// Jammer offset from the target frequency in Hz
    pub jamming_variance: i64,

    /// Frequencies cycled by the known-list scan
    pub known_frequencies: Vec<u64>,

    /// Frequency step for range scans in Hz
    pub scan_step: u64,

    /// Receive window per scanned frequency
    pub scan_timeout_ms: u64,

    /// Filter scan hits through the RSSI window
    pub scan_windowed: bool,

    /// Receive window for interactive captures and the rolling code attack
    pub receive_timeout_ms: u64,

    /// Directory for capture files and scan logs
    pub captures_dir: PathBuf,

    /// Capture file used by replay and send
    pub replay_file: Option<PathBuf>,

    /// Pause before each replayed transmission in milliseconds
    pub replay_pause_ms: u64,

    /// Subsequence length for de Bruijn modes
    pub debruijn_order: usize,

    /// Alphabet for the sequence mode, one symbol per character
    pub debruijn_alphabet: String,

    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

/// Environment variable lookup, `None` when unset
type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Parse `key` if set, fall back to `default` only when it is unset
fn var_or<T: FromStr>(
    lookup: Lookup,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
        None => Ok(default),
    }
}

/// Parse a comma separated frequency list; empty entries are skipped
fn parse_frequency_list(key: &'static str, list: &str) -> Result<Vec<u64>, ConfigError> {
    list.split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(|f| {
            f.parse().map_err(|_| ConfigError::InvalidValue {
                key,
                value: f.to_string(),
            })
        })
        .collect()
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// `mode_arg` (the first command-line argument) takes precedence over
    /// RFBENCH_MODE. A variable that is set but does not parse is an error.
    pub fn from_env(mode_arg: Option<String>) -> Result<Self, ConfigError> {
        Self::from_lookup(mode_arg, &|key: &str| {
            std::env::var_os(key).map(|v| v.to_string_lossy().into_owned())
        })
    }

    fn from_lookup(mode_arg: Option<String>, lookup: Lookup) -> Result<Self, ConfigError> {
        let defaults = RadioSettings::default();

        let mode = match mode_arg.or_else(|| lookup("RFBENCH_MODE")) {
            Some(mode) => mode.parse()?,
            None => Mode::Capture,
        };

        let known_frequencies = match lookup("RFBENCH_KNOWN_FREQUENCIES") {
            Some(list) => parse_frequency_list("RFBENCH_KNOWN_FREQUENCIES", &list)?,
            None => vec![315_000_000, 433_000_000],
        };

        let config = Self {
            mode,

            radio_command: lookup("RFBENCH_RADIO_COMMAND")
                .unwrap_or_else(|| "rfcat-bridge".to_string()),

            sniffer_index: var_or(lookup, "RFBENCH_SNIFFER_INDEX", 0)?,
            jammer_index: var_or(lookup, "RFBENCH_JAMMER_INDEX", 1)?,

            frequency: var_or(lookup, "RFBENCH_FREQUENCY", defaults.frequency)?,
            baud_rate: var_or(lookup, "RFBENCH_BAUD_RATE", defaults.baud_rate)?,
            channel_bandwidth: var_or(
                lookup,
                "RFBENCH_CHANNEL_BANDWIDTH",
                defaults.channel_bandwidth,
            )?,
            channel_spacing: var_or(lookup, "RFBENCH_CHANNEL_SPACING", defaults.channel_spacing)?,
            deviation: var_or(lookup, "RFBENCH_DEVIATION", defaults.deviation)?,
            modulation: var_or(lookup, "RFBENCH_MODULATION", defaults.modulation)?,
            upper_rssi: var_or(lookup, "RFBENCH_UPPER_RSSI", defaults.upper_rssi)?,
            lower_rssi: var_or(lookup, "RFBENCH_LOWER_RSSI", defaults.lower_rssi)?,

            template: lookup("RFBENCH_TEMPLATE").map(PathBuf::from),

            jamming_variance: var_or(lookup, "RFBENCH_JAMMING_VARIANCE", 70_000)?,

            known_frequencies,

            scan_step: var_or(lookup, "RFBENCH_SCAN_STEP", 50_000)?,
            scan_timeout_ms: var_or(lookup, "RFBENCH_SCAN_TIMEOUT_MS", 3000)?,
            scan_windowed: var_or(lookup, "RFBENCH_SCAN_WINDOWED", false)?,

            receive_timeout_ms: var_or(lookup, "RFBENCH_RECEIVE_TIMEOUT_MS", 1000)?,

            captures_dir: lookup("RFBENCH_CAPTURES_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./captures")),

            replay_file: lookup("RFBENCH_REPLAY_FILE").map(PathBuf::from),
            replay_pause_ms: var_or(lookup, "RFBENCH_REPLAY_PAUSE_MS", 1000)?,

            debruijn_order: var_or(lookup, "RFBENCH_DEBRUIJN_ORDER", 8)?,
            debruijn_alphabet: lookup("RFBENCH_DEBRUIJN_ALPHABET")
                .unwrap_or_else(|| "01".to_string()),

            max_retries: var_or(lookup, "RFBENCH_MAX_RETRIES", 3)?,
            retry_backoff_ms: var_or(lookup, "RFBENCH_RETRY_BACKOFF_MS", 250)?,
        };

        // Unbounded receives would make cancellation unreachable
        if config.receive_timeout_ms == 0 {
            return Err(ConfigError::ZeroField("RFBENCH_RECEIVE_TIMEOUT_MS"));
        }
        if config.scan_timeout_ms == 0 {
            return Err(ConfigError::ZeroField("RFBENCH_SCAN_TIMEOUT_MS"));
        }
        Ok(config)
    }

    /// Radio settings from the environment, with the template applied last
    pub fn radio_settings(&self) -> Result<RadioSettings, ConfigError> {
        let settings = RadioSettings {
            frequency: self.frequency,
            baud_rate: self.baud_rate,
            channel_bandwidth: self.channel_bandwidth,
            channel_spacing: self.channel_spacing,
            deviation: self.deviation,
            modulation: self.modulation,
            upper_rssi: self.upper_rssi,
            lower_rssi: self.lower_rssi,
        };

        match &self.template {
            Some(path) => settings.load_template(path),
            None => {
                settings.validate()?;
                Ok(settings)
            }
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_millis(self.scan_timeout_ms)
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    pub fn replay_timing(&self) -> ReplayTiming {
        ReplayTiming {
            pause: Duration::from_millis(self.replay_pause_ms),
            receive_timeout: self.receive_timeout(),
            retry: self.retry_policy(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(mode: Option<&str>, vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(mode.map(str::to_string), &|key: &str| vars.get(key).cloned())
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("capture".parse::<Mode>().unwrap(), Mode::Capture);
        assert_eq!("Scan-Known".parse::<Mode>().unwrap(), Mode::ScanKnown);
        assert_eq!(" debruijn ".parse::<Mode>().unwrap(), Mode::DeBruijn);
        assert!(matches!(
            "fly".parse::<Mode>(),
            Err(ConfigError::InvalidValue { key: "RFBENCH_MODE", .. })
        ));

        for mode in [Mode::Rolling, Mode::Jam, Mode::ScanRange, Mode::Sequence, Mode::Send] {
            assert_eq!(mode.to_string().parse::<Mode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = load(None, &[]).unwrap();
        assert_eq!(config.mode, Mode::Capture);
        assert_eq!(config.frequency, 315_000_000);
        assert_eq!(config.lower_rssi, -20);
        assert_eq!(config.known_frequencies, vec![315_000_000, 433_000_000]);
        assert_eq!(config.receive_timeout(), Duration::from_millis(1000));
        assert_eq!(config.replay_timing().retry, RetryPolicy::default());
    }

    #[test]
    fn test_mode_argument_wins() {
        let config = load(Some("jam"), &[("RFBENCH_MODE", "scan-known")]).unwrap();
        assert_eq!(config.mode, Mode::Jam);
        assert_eq!(load(None, &[("RFBENCH_MODE", "rolling")]).unwrap().mode, Mode::Rolling);
        assert!(load(Some("nope"), &[]).is_err());
    }

    #[test]
    fn test_set_values_override_defaults() {
        let config = load(
            None,
            &[
                ("RFBENCH_FREQUENCY", " 433920000 "),
                ("RFBENCH_MODULATION", "MOD_2FSK"),
                ("RFBENCH_LOWER_RSSI", "-30"),
                ("RFBENCH_MAX_RETRIES", "5"),
                ("RFBENCH_RETRY_BACKOFF_MS", "10"),
            ],
        )
        .unwrap();
        assert_eq!(config.frequency, 433_920_000);
        assert_eq!(config.modulation, Modulation::Fsk2);
        assert_eq!(config.lower_rssi, -30);
        assert_eq!(
            config.retry_policy(),
            RetryPolicy {
                max_retries: 5,
                backoff: Duration::from_millis(10),
            }
        );
    }

    #[test]
    fn test_malformed_values_are_rejected() {
        for (key, value) in [
            ("RFBENCH_FREQUENCY", "433.92e6"),
            ("RFBENCH_LOWER_RSSI", "-2O"),
            ("RFBENCH_JAMMING_VARIANCE", "70k"),
            ("RFBENCH_MODULATION", "QPSK"),
            ("RFBENCH_SCAN_WINDOWED", "maybe"),
        ] {
            match load(None, &[(key, value)]) {
                Err(ConfigError::InvalidValue { key: k, value: v }) => {
                    assert_eq!(k, key);
                    assert_eq!(v, value);
                }
                other => panic!("{} accepted: {:?}", key, other.map(|c| c.frequency)),
            }
        }
    }

    #[test]
    fn test_zero_receive_timeout_is_rejected() {
        assert!(matches!(
            load(None, &[("RFBENCH_RECEIVE_TIMEOUT_MS", "0")]),
            Err(ConfigError::ZeroField("RFBENCH_RECEIVE_TIMEOUT_MS"))
        ));
    }

    #[test]
    fn test_parse_frequency_list() {
        assert_eq!(
            parse_frequency_list("K", "315000000, 433920000,,868000000").unwrap(),
            vec![315_000_000, 433_920_000, 868_000_000]
        );
        assert!(parse_frequency_list("K", "").unwrap().is_empty());
        assert!(matches!(
            parse_frequency_list("K", "315000000,junk"),
            Err(ConfigError::InvalidValue { key: "K", .. })
        ));
    }
}
