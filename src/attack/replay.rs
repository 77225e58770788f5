//! Replay of live and saved captures

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use super::{idle_with_retry, AttackError, Role};
use crate::capture::{
    CancelToken, Capture, CapturePolicy, CaptureSession, CaptureStore, RetryPolicy, SessionOutcome,
    DEFAULT_RECEIVE_TIMEOUT,
};
use crate::codec;
use crate::operator::Operator;
use crate::radio::{configure, Radio, RadioSettings};

/// Result of a live replay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveReplay {
    pub capture: Capture,
    pub replayed: bool,
    pub saved: Option<PathBuf>,
}

/// How often a saved capture file is sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayMode {
    Once,
    /// Loop over the file until cancelled
    Forever,
}

/// Pacing and failure handling for replays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayTiming {
    /// Pause before each transmission
    pub pause: Duration,
    /// Bound on each receive while capturing
    pub receive_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ReplayTiming {
    fn default() -> Self {
        Self {
            pause: Duration::from_secs(1),
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

/// Capture one frame interactively, then offer to replay and to save it
///
/// Returns `None` if the operator cancelled before accepting a capture.
pub fn live_replay<R: Radio + ?Sized>(
    radio: &mut R,
    settings: &RadioSettings,
    store: &CaptureStore,
    timing: &ReplayTiming,
    operator: &mut dyn Operator,
    cancel: &CancelToken,
) -> Result<Option<LiveReplay>, AttackError> {
    configure(radio, settings)
        .and_then(|_| radio.set_receive_mode())
        .map_err(|source| AttackError::RadioInit {
            role: Role::Sniffer,
            source,
        })?;

    let outcome = CaptureSession::new(1, CapturePolicy::Interactive, settings.frequency)
        .with_timeout(timing.receive_timeout)
        .with_retry(timing.retry)
        .run(radio, operator, cancel)?;
    let capture = match outcome {
        SessionOutcome::Complete(mut captures) => match captures.pop() {
            Some(capture) => capture,
            None => return Ok(None),
        },
        SessionOutcome::Cancelled | SessionOutcome::Quiet => return Ok(None),
    };

    let mut replayed = false;
    if operator.confirm("Replay this capture?") {
        let bytes = capture.to_bytes()?;
        info!("Waiting to send");
        thread::sleep(timing.pause);
        let sent = radio.transmit_frame(&bytes).map_err(AttackError::Transmit);
        idle_with_retry(radio, Role::Sniffer, &timing.retry)?;
        sent?;
        info!("Transmission complete");
        replayed = true;
    }

    let saved = if operator.confirm("Save this capture for later?") {
        Some(store.save_timestamped(capture.payload())?)
    } else {
        None
    };

    Ok(Some(LiveReplay {
        capture,
        replayed,
        saved,
    }))
}

/// Send every payload of a capture file, once or until cancelled
///
/// Returns the number of transmissions. The radio is idled afterwards,
/// including when a transmission fails.
pub fn replay_saved<R: Radio + ?Sized>(
    radio: &mut R,
    settings: &RadioSettings,
    path: &Path,
    mode: ReplayMode,
    timing: &ReplayTiming,
    cancel: &CancelToken,
) -> Result<usize, AttackError> {
    let payloads = CaptureStore::load(path)?;
    let frames = codec::payloads_to_bytes(&payloads)?;
    info!("Loaded {} payload(s) from {}", frames.len(), path.display());

    configure(radio, settings).map_err(|source| AttackError::RadioInit {
        role: Role::Sniffer,
        source,
    })?;

    let sent = send_frames(radio, &frames, mode, timing.pause, cancel);
    let idled = idle_with_retry(radio, Role::Sniffer, &timing.retry);
    let sent = sent?;
    idled?;

    info!("Sent {} transmission(s)", sent);
    Ok(sent)
}

fn send_frames<R: Radio + ?Sized>(
    radio: &mut R,
    frames: &[Vec<u8>],
    mode: ReplayMode,
    pause: Duration,
    cancel: &CancelToken,
) -> Result<usize, AttackError> {
    let mut sent = 0usize;
    loop {
        for frame in frames {
            if cancel.is_cancelled() {
                warn!("Replay cancelled after {} transmission(s)", sent);
                return Ok(sent);
            }
            thread::sleep(pause);
            radio.transmit_frame(frame).map_err(AttackError::Transmit)?;
            sent += 1;
        }
        if mode == ReplayMode::Once {
            return Ok(sent);
        }
    }
}
