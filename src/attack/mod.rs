//! Attacks built on top of capture sessions
//!
//! - [`RollingCodeAttack`]: jam + sniff with two radios, replay later
//! - [`live_replay`] / [`replay_saved`]: replay live or stored captures
//! - [`jam`]: continuous carrier until cancelled
//! - [`debruijn_attack`]: brute force fixed codes with a de Bruijn sequence

mod brute;
mod jam;
mod replay;
mod rolling;

use std::fmt;
use std::thread;

use thiserror::Error;
use tracing::{error, warn};

use crate::capture::{CaptureError, RetryPolicy, StoreError};
use crate::codec::CodecError;
use crate::debruijn::DeBruijnError;
use crate::radio::{ConfigError, Radio, RadioError};

pub use brute::debruijn_attack;
pub use jam::jam;
pub use replay::{live_replay, replay_saved, LiveReplay, ReplayMode, ReplayTiming};
pub use rolling::{RollState, RollingCodeAttack, RollingOutcome};

/// Role a radio handle plays in an attack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Jammer,
    Sniffer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Jammer => f.write_str("jammer"),
            Role::Sniffer => f.write_str("sniffer"),
        }
    }
}

/// Attack error types
#[derive(Debug, Error)]
pub enum AttackError {
    #[error("failed to initialise {role} radio: {source}")]
    RadioInit {
        role: Role,
        #[source]
        source: RadioError,
    },

    #[error("capture failed: {0}")]
    Capture(#[from] CaptureError),

    #[error("transmit failed: {0}")]
    Transmit(#[source] RadioError),

    #[error("{role} radio could not be returned to idle: {source}")]
    Idle {
        role: Role,
        #[source]
        source: RadioError,
    },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    DeBruijn(#[from] DeBruijnError),
}

/// Put `radio` in idle mode, retrying per `retry`
///
/// Used on every exit path that may leave a transmitter keyed.
fn idle_with_retry<R: Radio + ?Sized>(
    radio: &mut R,
    role: Role,
    retry: &RetryPolicy,
) -> Result<(), AttackError> {
    let mut attempt = 0u32;
    loop {
        match radio.set_idle_mode() {
            Ok(()) => return Ok(()),
            Err(e) if attempt < retry.max_retries => {
                attempt += 1;
                warn!("Failed to idle {} radio ({}/{}): {}", role, attempt, retry.max_retries, e);
                thread::sleep(retry.backoff);
            }
            Err(e) => {
                error!("{} radio is stuck, could not return it to idle: {}", role, e);
                return Err(AttackError::Idle { role, source: e });
            }
        }
    }
}
