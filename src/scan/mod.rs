//! Frequency scanning
//!
//! Hops a radio across a list of known frequencies or up a range, listening
//! once per frequency with a bounded receive, and logs every hit to a
//! [`ScanLog`]. Cancellation is only observed when switching frequency.

mod log;

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::capture::{
    CancelToken, CaptureError, CapturePolicy, CaptureSession, RetryPolicy, SessionOutcome,
};
use crate::operator::Unattended;
use crate::radio::{ConfigError, Radio, RadioError};

pub use log::ScanLog;

/// Receive window per frequency
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_millis(3000);

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to tune to {frequency} Hz: {source}")]
    Tune {
        frequency: u64,
        #[source]
        source: RadioError,
    },

    #[error("capture failed: {0}")]
    Capture(#[from] CaptureError),

    #[error("failed to write scan log {path}: {source}")]
    Log {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Totals for a finished scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub frequencies_scanned: usize,
    pub hits: usize,
}

pub struct Scanner {
    policy: CapturePolicy,
    timeout: Duration,
    retry: RetryPolicy,
}

impl Scanner {
    /// Scanner keeping captures according to `policy`
    ///
    /// `CapturePolicy::Interactive` makes no sense unattended and behaves
    /// like pass-through.
    pub fn new(policy: CapturePolicy) -> Self {
        Self {
            policy,
            timeout: DEFAULT_SCAN_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Cycle through `frequencies` until cancelled
    pub fn scan_known<R: Radio + ?Sized>(
        &self,
        radio: &mut R,
        frequencies: &[u64],
        log: &mut ScanLog,
        cancel: &CancelToken,
    ) -> Result<ScanSummary, ScanError> {
        let mut summary = ScanSummary::default();
        if frequencies.is_empty() {
            warn!("No frequencies to scan");
            return Ok(summary);
        }

        loop {
            for &frequency in frequencies {
                if cancel.is_cancelled() {
                    info!(
                        "Scan cancelled: {} frequencies, {} hits",
                        summary.frequencies_scanned, summary.hits
                    );
                    return Ok(summary);
                }
                self.sniff(radio, frequency, log, cancel, &mut summary)?;
            }
        }
    }

    /// Step upwards from `start` by `step` Hz until cancelled
    pub fn scan_range<R: Radio + ?Sized>(
        &self,
        radio: &mut R,
        start: u64,
        step: u64,
        log: &mut ScanLog,
        cancel: &CancelToken,
    ) -> Result<ScanSummary, ScanError> {
        if step == 0 {
            return Err(ConfigError::InvalidStep.into());
        }

        let mut summary = ScanSummary::default();
        let mut frequency = start;
        loop {
            if cancel.is_cancelled() {
                info!(
                    "Scan cancelled: {} frequencies, {} hits",
                    summary.frequencies_scanned, summary.hits
                );
                return Ok(summary);
            }
            self.sniff(radio, frequency, log, cancel, &mut summary)?;

            frequency = match frequency.checked_add(step) {
                Some(next) => next,
                None => {
                    warn!("Frequency range exhausted at {} Hz", frequency);
                    return Ok(summary);
                }
            };
        }
    }

    /// Tune to `frequency` and listen once
    fn sniff<R: Radio + ?Sized>(
        &self,
        radio: &mut R,
        frequency: u64,
        log: &mut ScanLog,
        cancel: &CancelToken,
        summary: &mut ScanSummary,
    ) -> Result<(), ScanError> {
        radio
            .set_frequency(frequency)
            .map_err(|source| ScanError::Tune { frequency, source })?;
        info!("Currently scanning: {} Hz", frequency);
        summary.frequencies_scanned += 1;

        let policy = match self.policy {
            CapturePolicy::Interactive => CapturePolicy::PassThrough,
            other => other,
        };
        let outcome = CaptureSession::new(1, policy, frequency)
            .with_timeout(self.timeout)
            .with_listen_limit(1)
            .with_retry(self.retry)
            .run(radio, &mut Unattended, cancel)?;

        match outcome {
            SessionOutcome::Complete(captures) => {
                for capture in &captures {
                    info!("A signal was found on {} Hz: {}", frequency, capture.payload());
                    log.append(capture).map_err(|source| ScanError::Log {
                        path: log.path().display().to_string(),
                        source,
                    })?;
                    summary.hits += 1;
                }
            }
            SessionOutcome::Quiet | SessionOutcome::Cancelled => {
                debug!("Nothing on {} Hz", frequency);
            }
        }
        Ok(())
    }
}
