//! Door state machine as executed by the controller.
//!
//! The dashboard only renders the state this machine produces; the machine
//! lives here so the simulated controller and the tests share one definition
//! of the transition rules. `step` is pure with respect to time: the caller
//! supplies a monotonic `now`.
use crate::model::{DoorCommand, DoorConfig, DoorMode, SystemState};
use std::time::Duration;

/// A motion that does not reach its limit within this time ends anyway
pub const MOVE_TIMEOUT: Duration = Duration::from_secs(30);

/// Parameters taken from the configuration document
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DoorParams {
    pub mode: DoorMode,
    pub hold_open: Duration,
    pub grace_period: Duration,
    pub confidence_threshold: f64,
    pub move_timeout: Duration,
}

impl Default for DoorParams {
    fn default() -> Self {
        Self::from(&DoorConfig::default())
    }
}

impl From<&DoorConfig> for DoorParams {
    fn from(c: &DoorConfig) -> Self {
        Self {
            mode: c.door_mode,
            hold_open: secs(c.hold_open_time),
            grace_period: secs(c.grace_period),
            confidence_threshold: c.confidence_threshold,
            move_timeout: MOVE_TIMEOUT,
        }
    }
}

fn secs(v: f64) -> Duration {
    if v.is_finite() && v > 0.0 {
        Duration::from_secs_f64(v)
    } else {
        Duration::ZERO
    }
}

/// Sensor snapshot for one step; `true` means triggered
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DoorInputs {
    pub limit_open: bool,
    pub limit_close: bool,
    pub safety: bool,
    pub prox_outside: bool,
    pub prox_inside: bool,
    pub btn_open: bool,
    pub btn_close: bool,
    /// Confidence of the best dog detection inside the zone, if any
    pub detection: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: SystemState,
    pub to: SystemState,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct DoorMachine {
    state: SystemState,
    entered_at: Duration,
    open_since: Option<Duration>,
    detected_since: Option<Duration>,
    pending: Option<DoorCommand>,
    last_message: String,
}

impl Default for DoorMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl DoorMachine {
    pub fn new() -> Self {
        Self {
            state: SystemState::Idle,
            entered_at: Duration::ZERO,
            open_since: None,
            detected_since: None,
            pending: None,
            last_message: "System Initialized".to_string(),
        }
    }

    pub fn state(&self) -> SystemState {
        self.state
    }

    pub fn last_message(&self) -> &str {
        &self.last_message
    }

    /// Seconds since OPEN was entered; zero in any other state
    pub fn elapsed_open(&self, now: Duration) -> f64 {
        match (self.state, self.open_since) {
            (SystemState::Open, Some(since)) => now.saturating_sub(since).as_secs_f64(),
            _ => 0.0,
        }
    }

    /// Queue a manual command for the next step. Refused in LOCKED mode.
    pub fn command(&mut self, command: DoorCommand, mode: DoorMode) -> bool {
        if mode == DoorMode::Locked {
            self.last_message = format!("Command {} ignored: system locked", command);
            return false;
        }
        self.pending = Some(command);
        true
    }

    /// Advance the machine by at most one transition
    pub fn step(&mut self, inputs: &DoorInputs, params: &DoorParams, now: Duration) -> Option<Transition> {
        use SystemState::*;

        if params.mode == DoorMode::Locked {
            self.pending = None;
            match self.state {
                Locked => return None,
                Idle | Closed | Detecting => return self.go(Locked, now, "Door locked"),
                Open | Opening => return self.go(Closing, now, "Locked -> Closing"),
                Closing | Obstructed => {}
            }
        } else if self.state == Locked {
            return self.go(Closed, now, "Door unlocked");
        }

        let intent = self.intent(inputs, params);

        match self.state {
            Idle | Closed | Detecting => {
                if intent == Some(DoorCommand::Open) {
                    return self.go(Opening, now, "Starting OPENING...");
                }
                let qualifying = inputs
                    .detection
                    .is_some_and(|c| c >= params.confidence_threshold);
                if qualifying {
                    if self.state != Detecting {
                        let t = self.go(Detecting, now, "Dog detected");
                        self.detected_since = Some(now);
                        return t;
                    }
                    let since = self.detected_since.unwrap_or(now);
                    if params.mode == DoorMode::Auto
                        && now.saturating_sub(since) >= params.grace_period
                    {
                        return self.go(Opening, now, "AI Detected Dog -> Opening");
                    }
                    None
                } else if self.state == Detecting {
                    self.go(Closed, now, "Detection lost")
                } else {
                    None
                }
            }
            Opening => {
                if intent == Some(DoorCommand::Close) {
                    self.go(Closing, now, "Interrupt: Reversing to Close")
                } else if inputs.limit_open {
                    self.go(Open, now, "Limit Reached: OPEN")
                } else if self.timed_out(params, now) {
                    self.go(Open, now, "TIMEOUT! Motor stopped")
                } else {
                    None
                }
            }
            Open => {
                if intent == Some(DoorCommand::Close) {
                    return self.go(Closing, now, "Starting CLOSING...");
                }
                if params.mode != DoorMode::Auto {
                    return None;
                }
                let since = self.open_since.unwrap_or(self.entered_at);
                if now.saturating_sub(since) < params.hold_open {
                    return None;
                }
                if inputs.safety {
                    self.open_since = Some(now);
                    self.last_message = "Obstruction! Holding open...".to_string();
                    None
                } else {
                    self.go(Closing, now, "Timer Expired -> Closing")
                }
            }
            Closing => {
                if intent == Some(DoorCommand::Open) {
                    self.go(Opening, now, "Sensor Hit! Reopening...")
                } else if inputs.safety {
                    self.go(Obstructed, now, "SAFETY SENSOR HIT! Door obstructed")
                } else if inputs.limit_close {
                    self.go(Closed, now, "Limit Reached: CLOSED")
                } else if self.timed_out(params, now) {
                    self.go(Closed, now, "TIMEOUT! Motor stopped")
                } else {
                    None
                }
            }
            Obstructed => {
                if intent == Some(DoorCommand::Open) {
                    self.go(Opening, now, "Starting OPENING...")
                } else if !inputs.safety {
                    self.go(Closing, now, "Obstruction cleared -> Closing")
                } else {
                    None
                }
            }
            Locked => None,
        }
    }

    /// Merge the queued command with sensor and button requests
    fn intent(&mut self, inputs: &DoorInputs, params: &DoorParams) -> Option<DoorCommand> {
        let mut intent = self.pending.take();
        let opening_or_open = matches!(self.state, SystemState::Open | SystemState::Opening);
        if params.mode != DoorMode::Locked {
            if inputs.btn_open {
                intent = Some(DoorCommand::Open);
            }
            if inputs.btn_close {
                intent = Some(DoorCommand::Close);
            }
            if !opening_or_open {
                if inputs.prox_outside {
                    intent = Some(DoorCommand::Open);
                }
                if inputs.prox_inside && params.mode == DoorMode::Auto {
                    intent = Some(DoorCommand::Open);
                }
            }
        }
        intent
    }

    fn timed_out(&self, params: &DoorParams, now: Duration) -> bool {
        now.saturating_sub(self.entered_at) >= params.move_timeout
    }

    fn go(&mut self, to: SystemState, now: Duration, message: &str) -> Option<Transition> {
        let from = self.state;
        self.state = to;
        self.entered_at = now;
        self.last_message = message.to_string();
        self.open_since = (to == SystemState::Open).then_some(now);
        if to != SystemState::Detecting {
            self.detected_since = None;
        }
        Some(Transition {
            from,
            to,
            message: message.to_string(),
        })
    }
}
