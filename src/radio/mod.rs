//! Radio device contract and helpers
//!
//! The bench never talks to a USB dongle directly. Everything it needs from
//! a sub-GHz transceiver is captured by the [`Radio`] trait; the shipped
//! implementation is [`ProcessRadio`], which drives a radio helper process.

mod process;
#[cfg(test)]
pub mod scripted;
mod settings;

use std::time::Duration;

use thiserror::Error;
use tracing::debug;

pub use process::ProcessRadio;
pub use settings::{ConfigError, Modulation, RadioSettings};

/// Radio error types
#[derive(Debug, Error)]
pub enum RadioError {
    /// Receive window elapsed without a frame
    #[error("timed out waiting for a frame")]
    Timeout,

    #[error("device error: {0}")]
    Device(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A frame as delivered by the radio
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub data: Vec<u8>,
    /// Raw status byte reported alongside the frame
    pub status: u8,
}

impl Frame {
    pub fn to_hex(&self) -> String {
        hex::encode(&self.data)
    }
}

/// Capabilities consumed from a sub-GHz transceiver
pub trait Radio {
    fn set_frequency(&mut self, hz: u64) -> Result<(), RadioError>;
    fn set_data_rate(&mut self, baud: u32) -> Result<(), RadioError>;
    fn set_modulation(&mut self, modulation: Modulation) -> Result<(), RadioError>;
    fn set_channel_bandwidth(&mut self, hz: u32) -> Result<(), RadioError>;
    fn set_channel_spacing(&mut self, hz: u32) -> Result<(), RadioError>;
    fn set_deviation(&mut self, hz: u32) -> Result<(), RadioError>;
    fn set_max_power(&mut self) -> Result<(), RadioError>;
    fn set_transmit_mode(&mut self) -> Result<(), RadioError>;
    fn set_receive_mode(&mut self) -> Result<(), RadioError>;
    fn set_idle_mode(&mut self) -> Result<(), RadioError>;

    /// Block until a frame arrives, or until `timeout` elapses
    /// (`RadioError::Timeout`). `None` waits indefinitely.
    fn receive_frame(&mut self, timeout: Option<Duration>) -> Result<Frame, RadioError>;

    fn transmit_frame(&mut self, data: &[u8]) -> Result<(), RadioError>;

    fn read_rssi_register(&mut self) -> Result<u8, RadioError>;
}

/// Signal-strength metric from a raw RSSI register byte (`0 - raw`)
pub fn rssi_metric(raw: u8) -> i32 {
    -i32::from(raw)
}

/// Apply every field of `settings` to `radio`
pub fn configure<R: Radio + ?Sized>(radio: &mut R, settings: &RadioSettings) -> Result<(), RadioError> {
    debug!(
        "Configuring radio: {} Hz, {} baud, {}, bw={} spc={} dev={}",
        settings.frequency,
        settings.baud_rate,
        settings.modulation,
        settings.channel_bandwidth,
        settings.channel_spacing,
        settings.deviation
    );
    radio.set_frequency(settings.frequency)?;
    radio.set_data_rate(settings.baud_rate)?;
    radio.set_modulation(settings.modulation)?;
    radio.set_channel_bandwidth(settings.channel_bandwidth)?;
    radio.set_channel_spacing(settings.channel_spacing)?;
    radio.set_deviation(settings.deviation)?;
    radio.set_max_power()?;
    Ok(())
}
