//! Dashboard application state.
//!
//! `DashboardState` is a plain value; every mutation goes through
//! [`DashboardState::apply`], which consumes the old value and returns the next
//! one. [`StateStore`] shares the current value between the session tasks and
//! publishes every change on a watch channel for renderers.
use crate::model::{AnalysisResult, DoorConfig, SimulationState, StatusReport, SystemState};
use std::sync::Arc;
use tokio::sync::watch;

/// Everything the dashboard displays or needs to decide on an action
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardState {
    pub connected: bool,
    /// Last status poll failed; cleared by the next successful poll
    pub degraded: bool,
    pub config: DoorConfig,
    /// Local revision of `config`, bumped on every edit
    pub config_revision: u64,
    pub status: StatusReport,
    /// Sequence number of the newest applied poll response
    pub poll_seq: u64,
    pub last_log: String,
    pub simulation: SimulationState,
    pub analysis: Option<AnalysisResult>,
    /// Inline message replacing the video area in demo mode
    pub camera_message: Option<String>,
    pub video_error: bool,
    pub commanding: bool,
    pub analyzing: bool,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self {
            connected: false,
            degraded: false,
            config: DoorConfig::default(),
            config_revision: 0,
            status: StatusReport::default(),
            poll_seq: 0,
            last_log: "System initialized...".to_string(),
            simulation: SimulationState::default(),
            analysis: None,
            camera_message: None,
            video_error: false,
            commanding: false,
            analyzing: false,
        }
    }
}

/// State transitions
#[derive(Debug, Clone, PartialEq)]
pub enum StateEvent {
    Connected { config: DoorConfig },
    Disconnected,
    StatusPolled { seq: u64, report: StatusReport },
    PollFailed { seq: u64 },
    ConfigEdited(DoorConfig),
    SimulationChanged(SimulationState),
    Log(String),
    CommandStarted,
    CommandFinished,
    AnalysisStarted,
    AnalysisCompleted(AnalysisResult),
    AnalysisAborted,
    CameraUnavailable(String),
    CameraReady,
    VideoFailed,
}

impl DashboardState {
    pub fn system_state(&self) -> SystemState {
        self.status.state
    }

    pub fn is_locked(&self) -> bool {
        self.status.state == SystemState::Locked
    }

    pub fn apply(mut self, event: StateEvent) -> Self {
        match event {
            StateEvent::Connected { config } => {
                self.connected = true;
                self.degraded = false;
                self.video_error = false;
                self.config = config;
                self.simulation = SimulationState::default();
                self.camera_message = None;
                self.last_log = "[INFO] Connected to Raspberry Pi Backend".to_string();
            }
            StateEvent::Disconnected => {
                self.connected = false;
                self.degraded = false;
                self.video_error = false;
                self.commanding = false;
            }
            StateEvent::StatusPolled { seq, report } => {
                // late responses from an old connection or an older request are dropped
                if !self.connected || seq <= self.poll_seq {
                    return self;
                }
                self.poll_seq = seq;
                self.degraded = false;
                self.status.state = report.state;
                self.status.elapsed_time = report.elapsed_time;
                if let Some(msg) = report.last_message {
                    self.status.last_message = Some(msg.clone());
                    self.last_log = msg;
                }
            }
            StateEvent::PollFailed { seq } => {
                // a failure completes its request too; older successes stay stale
                if !self.connected || seq <= self.poll_seq {
                    return self;
                }
                self.poll_seq = seq;
                self.degraded = true;
            }
            StateEvent::ConfigEdited(config) => {
                self.config = config;
                self.config_revision += 1;
            }
            StateEvent::SimulationChanged(sim) => {
                self.simulation = sim;
            }
            StateEvent::Log(line) => {
                self.last_log = line;
            }
            StateEvent::CommandStarted => {
                self.commanding = true;
            }
            StateEvent::CommandFinished => {
                self.commanding = false;
            }
            StateEvent::AnalysisStarted => {
                self.analyzing = true;
            }
            StateEvent::AnalysisCompleted(result) => {
                self.analyzing = false;
                self.analysis = Some(result);
                self.last_log = "[AI] Analysis received".to_string();
            }
            StateEvent::AnalysisAborted => {
                self.analyzing = false;
            }
            StateEvent::CameraUnavailable(msg) => {
                self.camera_message = Some(msg);
            }
            StateEvent::CameraReady => {
                self.camera_message = None;
            }
            StateEvent::VideoFailed => {
                self.video_error = true;
            }
        }
        self
    }
}

/// Shared, observable holder of the current `DashboardState`
#[derive(Clone)]
pub struct StateStore {
    tx: Arc<watch::Sender<DashboardState>>,
}

impl StateStore {
    pub fn new(initial: DashboardState) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    /// Apply one transition; subscribers are notified only if something changed
    pub fn dispatch(&self, event: StateEvent) {
        self.tx.send_if_modified(|current| {
            let next = current.clone().apply(event);
            if next == *current {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    pub fn snapshot(&self) -> DashboardState {
        self.tx.borrow().clone()
    }

    /// Read one field without cloning the whole state
    pub fn read<R>(&self, f: impl FnOnce(&DashboardState) -> R) -> R {
        f(&self.tx.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardState> {
        self.tx.subscribe()
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new(DashboardState::default())
    }
}
