//! Standalone jamming

use std::thread;
use std::time::Duration;

use tracing::info;

use super::{idle_with_retry, AttackError, Role};
use crate::capture::{CancelToken, RetryPolicy};
use crate::radio::{configure, Modulation, Radio, RadioSettings};

/// Transmit a carrier at `frequency + jamming_variance` until cancelled
///
/// The cancel token is polled every `poll`. The radio is idled on every
/// exit path, retrying per `retry`.
pub fn jam<R: Radio + ?Sized>(
    radio: &mut R,
    settings: &RadioSettings,
    jamming_variance: i64,
    poll: Duration,
    retry: &RetryPolicy,
    cancel: &CancelToken,
) -> Result<(), AttackError> {
    let jam_settings = RadioSettings {
        modulation: Modulation::AskOok,
        ..settings.offset_by(jamming_variance)?
    };

    let keyed = configure(radio, &jam_settings).and_then(|_| radio.set_transmit_mode());
    if let Err(source) = keyed {
        idle_with_retry(radio, Role::Jammer, retry)?;
        return Err(AttackError::RadioInit {
            role: Role::Jammer,
            source,
        });
    }

    info!("Starting jamming on {} Hz", jam_settings.frequency);
    while !cancel.is_cancelled() {
        thread::sleep(poll);
    }

    idle_with_retry(radio, Role::Jammer, retry)?;
    info!("Jamming stopped");
    Ok(())
}
