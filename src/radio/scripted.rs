//! Scripted radio for tests
//!
//! Replays a fixed script of receive outcomes and records every call into a
//! [`Journal`]. Radios that share a journal record into one ordered log, so
//! tests can assert ordering across the jammer and the sniffer.

use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};
use std::rc::Rc;
use std::time::Duration;

use super::{Frame, Modulation, Radio, RadioError};
use crate::capture::CancelToken;

/// One scripted receive outcome
#[derive(Debug, Clone)]
pub enum Step {
    Frame { data: Vec<u8>, rssi: u8 },
    Timeout,
    Error(&'static str),
}

impl Step {
    /// Frame whose RSSI register reads `rssi` (metric is `-rssi`)
    pub fn frame(hex: &str, rssi: u8) -> Self {
        Step::Frame {
            data: hex::decode(hex).unwrap(),
            rssi,
        }
    }
}

/// A recorded radio call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    SetFrequency(u64),
    SetDataRate(u32),
    SetModulation(Modulation),
    SetChannelBandwidth(u32),
    SetChannelSpacing(u32),
    SetDeviation(u32),
    SetMaxPower,
    SetTransmitMode,
    SetReceiveMode,
    SetIdleMode,
    Receive,
    Transmit(Vec<u8>),
    ReadRssi,
}

impl Call {
    pub fn name(&self) -> &'static str {
        match self {
            Call::SetFrequency(_) => "set_frequency",
            Call::SetDataRate(_) => "set_data_rate",
            Call::SetModulation(_) => "set_modulation",
            Call::SetChannelBandwidth(_) => "set_channel_bandwidth",
            Call::SetChannelSpacing(_) => "set_channel_spacing",
            Call::SetDeviation(_) => "set_deviation",
            Call::SetMaxPower => "set_max_power",
            Call::SetTransmitMode => "set_transmit_mode",
            Call::SetReceiveMode => "set_receive_mode",
            Call::SetIdleMode => "set_idle_mode",
            Call::Receive => "receive_frame",
            Call::Transmit(_) => "transmit_frame",
            Call::ReadRssi => "read_rssi_register",
        }
    }
}

/// Ordered log of calls across every radio sharing it
#[derive(Debug, Clone, Default)]
pub struct Journal {
    calls: Rc<RefCell<Vec<(&'static str, Call)>>>,
    timeouts: Rc<RefCell<Vec<(&'static str, Option<Duration>)>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, radio: &'static str, call: Call) {
        self.calls.borrow_mut().push((radio, call));
    }

    fn record_timeout(&self, radio: &'static str, timeout: Option<Duration>) {
        self.timeouts.borrow_mut().push((radio, timeout));
    }

    /// Timeout passed to every receive on `radio`, in order
    pub fn receive_timeouts(&self, radio: &str) -> Vec<Option<Duration>> {
        self.timeouts
            .borrow()
            .iter()
            .filter(|(name, _)| *name == radio)
            .map(|(_, timeout)| *timeout)
            .collect()
    }

    pub fn entries(&self) -> Vec<(&'static str, Call)> {
        self.calls.borrow().clone()
    }

    pub fn calls_for(&self, radio: &str) -> Vec<Call> {
        self.calls
            .borrow()
            .iter()
            .filter(|(name, _)| *name == radio)
            .map(|(_, call)| call.clone())
            .collect()
    }

    /// Index of the first entry matching `radio` and `predicate`
    pub fn first(&self, radio: &str, predicate: impl Fn(&Call) -> bool) -> Option<usize> {
        self.calls
            .borrow()
            .iter()
            .position(|(name, call)| *name == radio && predicate(call))
    }

    /// Index of the last entry matching `radio` and `predicate`
    pub fn last(&self, radio: &str, predicate: impl Fn(&Call) -> bool) -> Option<usize> {
        self.calls
            .borrow()
            .iter()
            .rposition(|(name, call)| *name == radio && predicate(call))
    }

    /// Number of frames handed out by `radio` up to (excluding) entry `index`
    pub fn receives_before(&self, radio: &str, index: usize) -> usize {
        self.calls.borrow()[..index]
            .iter()
            .filter(|(name, call)| *name == radio && *call == Call::Receive)
            .count()
    }
}

pub struct ScriptedRadio {
    name: &'static str,
    journal: Journal,
    script: VecDeque<Step>,
    last_rssi: u8,
    failing: HashSet<&'static str>,
    cancel_when_drained: Option<CancelToken>,
}

impl ScriptedRadio {
    pub fn new(name: &'static str, journal: &Journal) -> Self {
        Self {
            name,
            journal: journal.clone(),
            script: VecDeque::new(),
            last_rssi: 0,
            failing: HashSet::new(),
            cancel_when_drained: None,
        }
    }

    /// Radio with a journal of its own
    pub fn standalone(name: &'static str) -> (Self, Journal) {
        let journal = Journal::new();
        (Self::new(name, &journal), journal)
    }

    pub fn with_script(mut self, steps: impl IntoIterator<Item = Step>) -> Self {
        self.script.extend(steps);
        self
    }

    /// Make every call named `call` fail with a device error
    pub fn failing(mut self, call: &'static str) -> Self {
        self.failing.insert(call);
        self
    }

    /// Once the script runs dry, cancel `token` and report timeouts
    ///
    /// Without this a drained script reports a device error so a runaway
    /// loop ends up exhausting its retry budget.
    pub fn cancel_when_drained(mut self, token: &CancelToken) -> Self {
        self.cancel_when_drained = Some(token.clone());
        self
    }

    fn call(&mut self, call: Call) -> Result<(), RadioError> {
        let name = call.name();
        self.journal.record(self.name, call);
        if self.failing.contains(name) {
            return Err(RadioError::Device(format!("{} failed on {}", name, self.name)));
        }
        Ok(())
    }
}

impl Radio for ScriptedRadio {
    fn set_frequency(&mut self, hz: u64) -> Result<(), RadioError> {
        self.call(Call::SetFrequency(hz))
    }

    fn set_data_rate(&mut self, baud: u32) -> Result<(), RadioError> {
        self.call(Call::SetDataRate(baud))
    }

    fn set_modulation(&mut self, modulation: Modulation) -> Result<(), RadioError> {
        self.call(Call::SetModulation(modulation))
    }

    fn set_channel_bandwidth(&mut self, hz: u32) -> Result<(), RadioError> {
        self.call(Call::SetChannelBandwidth(hz))
    }

    fn set_channel_spacing(&mut self, hz: u32) -> Result<(), RadioError> {
        self.call(Call::SetChannelSpacing(hz))
    }

    fn set_deviation(&mut self, hz: u32) -> Result<(), RadioError> {
        self.call(Call::SetDeviation(hz))
    }

    fn set_max_power(&mut self) -> Result<(), RadioError> {
        self.call(Call::SetMaxPower)
    }

    fn set_transmit_mode(&mut self) -> Result<(), RadioError> {
        self.call(Call::SetTransmitMode)
    }

    fn set_receive_mode(&mut self) -> Result<(), RadioError> {
        self.call(Call::SetReceiveMode)
    }

    fn set_idle_mode(&mut self) -> Result<(), RadioError> {
        self.call(Call::SetIdleMode)
    }

    fn receive_frame(&mut self, timeout: Option<Duration>) -> Result<Frame, RadioError> {
        self.journal.record_timeout(self.name, timeout);
        self.call(Call::Receive)?;
        match self.script.pop_front() {
            Some(Step::Frame { data, rssi }) => {
                self.last_rssi = rssi;
                Ok(Frame { data, status: rssi })
            }
            Some(Step::Timeout) => Err(RadioError::Timeout),
            Some(Step::Error(msg)) => Err(RadioError::Device(msg.to_string())),
            None => match &self.cancel_when_drained {
                Some(token) => {
                    token.cancel();
                    Err(RadioError::Timeout)
                }
                None => Err(RadioError::Device("script exhausted".to_string())),
            },
        }
    }

    fn transmit_frame(&mut self, data: &[u8]) -> Result<(), RadioError> {
        self.call(Call::Transmit(data.to_vec()))
    }

    fn read_rssi_register(&mut self) -> Result<u8, RadioError> {
        self.call(Call::ReadRssi)?;
        Ok(self.last_rssi)
    }
}
