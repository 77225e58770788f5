//! Capture session - repeated receive + classify cycles on one radio

use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::{CancelToken, Capture, RetryPolicy};
use crate::classifier::RssiWindow;
use crate::operator::{Operator, Review};
use crate::radio::{rssi_metric, Frame, Radio, RadioError};

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("radio failed {attempts} times in a row: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: RadioError,
    },

    #[error("expected {expected} captures, got {got}")]
    Incomplete { expected: usize, got: usize },
}

/// Which captures a session keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePolicy {
    /// Keep captures whose metric falls inside the window, silently drop the rest
    Windowed(RssiWindow),
    /// Surface every capture to the operator
    Interactive,
    /// Keep every non-empty capture
    PassThrough,
}

/// How a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Target count reached
    Complete(Vec<Capture>),
    /// Cancelled by the caller or the operator
    Cancelled,
    /// Listen budget spent without reaching the target
    Quiet,
}

pub struct CaptureSession {
    target_count: usize,
    policy: CapturePolicy,
    frequency: u64,
    receive_timeout: Option<Duration>,
    listen_limit: Option<usize>,
    retry: RetryPolicy,
    captures: Vec<Capture>,
}

impl CaptureSession {
    /// Session accepting `target_count` captures received on `frequency`
    pub fn new(target_count: usize, policy: CapturePolicy, frequency: u64) -> Self {
        Self {
            target_count: target_count.max(1),
            policy,
            frequency,
            receive_timeout: None,
            listen_limit: None,
            retry: RetryPolicy::default(),
            captures: Vec::with_capacity(target_count),
        }
    }

    /// Bound each receive; timeouts are retried silently
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = Some(timeout);
        self
    }

    /// Give up quietly after this many receives (frames or timeouts)
    pub fn with_listen_limit(mut self, receives: usize) -> Self {
        self.listen_limit = Some(receives);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Run until the target count is reached, the session is cancelled, or
    /// the radio keeps failing past the retry budget
    pub fn run<R: Radio + ?Sized>(
        mut self,
        radio: &mut R,
        operator: &mut dyn Operator,
        cancel: &CancelToken,
    ) -> Result<SessionOutcome, CaptureError> {
        debug!(
            "Capture session on {} Hz: target={} policy={:?}",
            self.frequency, self.target_count, self.policy
        );

        let mut failures = 0u32;
        let mut listens = 0usize;

        loop {
            if cancel.is_cancelled() {
                info!("Capture session cancelled with {} capture(s)", self.captures.len());
                return Ok(SessionOutcome::Cancelled);
            }
            if self.listen_limit.is_some_and(|limit| listens >= limit) {
                return Ok(SessionOutcome::Quiet);
            }

            // Hardware errors are retried without spending the listen budget
            let (frame, raw_rssi) = match self.listen(radio) {
                Ok(received) => {
                    listens += 1;
                    received
                }
                Err(RadioError::Timeout) => {
                    listens += 1;
                    debug!("Receive timed out on {} Hz", self.frequency);
                    continue;
                }
                Err(e) => {
                    failures += 1;
                    if failures > self.retry.max_retries {
                        return Err(CaptureError::RetriesExhausted {
                            attempts: failures,
                            source: e,
                        });
                    }
                    warn!(
                        "Radio error during capture ({}/{}): {}",
                        failures, self.retry.max_retries, e
                    );
                    thread::sleep(self.retry.backoff);
                    continue;
                }
            };
            failures = 0;

            if frame.data.is_empty() {
                continue;
            }
            debug!("Frame status byte {:#04x}", frame.status);

            let capture = Capture::new(frame.to_hex(), rssi_metric(raw_rssi), self.frequency);
            info!(
                "Capture on {} Hz: {} (signal strength {})",
                capture.frequency(),
                capture.payload(),
                capture.rssi()
            );

            let keep = match self.policy {
                CapturePolicy::Windowed(window) => {
                    let inside = window.contains(capture.rssi());
                    if !inside {
                        debug!("Signal strength {} outside {}, discarding", capture.rssi(), window);
                    }
                    inside
                }
                CapturePolicy::PassThrough => true,
                CapturePolicy::Interactive => match operator.review(&capture) {
                    Review::Accept => true,
                    Review::Reject => false,
                    Review::Cancel => {
                        info!("Operator cancelled the capture session");
                        return Ok(SessionOutcome::Cancelled);
                    }
                },
            };

            if keep {
                self.captures.push(capture);
                info!("Accepted capture {}/{}", self.captures.len(), self.target_count);
                if self.captures.len() >= self.target_count {
                    return Ok(SessionOutcome::Complete(self.captures));
                }
            }
        }
    }

    fn listen<R: Radio + ?Sized>(&self, radio: &mut R) -> Result<(Frame, u8), RadioError> {
        let frame = radio.receive_frame(self.receive_timeout)?;
        let raw_rssi = radio.read_rssi_register()?;
        Ok((frame, raw_rssi))
    }
}
