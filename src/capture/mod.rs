//! Capture sessions and capture files
//!
//! A [`CaptureSession`] drives one radio through receive + classify cycles
//! until it has accepted its target number of [`Capture`]s. Accepted
//! captures can be written to capture files through a [`CaptureStore`].

mod session;
mod store;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::codec::{self, CodecError};

pub use session::{CaptureError, CapturePolicy, CaptureSession, SessionOutcome};
pub use store::{CaptureStore, StoreError};

/// A received frame paired with its signal strength
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    payload: String,
    rssi: i32,
    frequency: u64,
}

impl Capture {
    pub fn new(payload: String, rssi: i32, frequency: u64) -> Self {
        Self {
            payload,
            rssi,
            frequency,
        }
    }

    /// Hex-encoded payload
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Signal-strength metric (inverted RSSI register)
    pub fn rssi(&self) -> i32 {
        self.rssi
    }

    /// Frequency the frame was received on, in Hz
    pub fn frequency(&self) -> u64 {
        self.frequency
    }

    /// Bytes to hand to the transmitter when replaying this capture
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        codec::payload_to_bytes(&self.payload)
    }
}

/// Cooperative cancellation flag shared between the operator and a session
///
/// Sessions only look at it between receives, never while one is pending.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Receive window used by interactive and attack sessions
///
/// Keeps cancellation responsive; timeouts are retried silently.
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_millis(1000);

/// How often a hardware error is retried before giving up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Consecutive failures tolerated; the next one is fatal
    pub max_retries: u32,
    /// Pause after each failure
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Duration::from_millis(250),
        }
    }
}
