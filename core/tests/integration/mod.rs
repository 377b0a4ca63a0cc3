//! Integration Test Module
//!
//! End-to-end tests of `DashboardSession` against an in-process controller fake.
//!
//! - `session_flow`: connect/disconnect, polling, degraded banner, camera lease
//! - `edits_and_commands`: config pushes, command gating, simulation overlay
//! - `analysis`: frame sourcing and the vision fallback strings
#![allow(dead_code)]

use async_trait::async_trait;
use pawgate_core::model::{DoorCommand, DoorConfig, SimulationState, StatusReport, SystemState};
use pawgate_core::vision::{VisionModel, VisionRequest};
use pawgate_core::{DashboardSession, PawgateError, Result, StateStore};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::Duration;

pub use pawgate_core::BackendApi;

mod analysis;
mod edits_and_commands;
mod session_flow;

// =============================================================================
// Shared Mock Components
// =============================================================================

/// In-memory controller that records every request it receives
pub struct RecordingBackend {
    pub config: Mutex<DoorConfig>,
    pub status: Mutex<StatusReport>,
    pub snapshot: Mutex<Vec<u8>>,
    pub fail_status: AtomicBool,
    pub fail_fetch: AtomicBool,
    pub fail_push: AtomicBool,
    pub fail_command: AtomicBool,
    pub fail_snapshot: AtomicBool,
    pub command_delay: Mutex<Duration>,
    pub requests: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub pushed_configs: Mutex<Vec<DoorConfig>>,
    pub commands: Mutex<Vec<DoorCommand>>,
    pub sims: Mutex<Vec<SimulationState>>,
}

impl RecordingBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            config: Mutex::new(DoorConfig::default()),
            status: Mutex::new(StatusReport {
                state: SystemState::Closed,
                elapsed_time: 0.0,
                last_message: None,
            }),
            snapshot: Mutex::new(vec![0xFF, 0xD8, 0xFF, 0xD9]),
            fail_status: AtomicBool::new(false),
            fail_fetch: AtomicBool::new(false),
            fail_push: AtomicBool::new(false),
            fail_command: AtomicBool::new(false),
            fail_snapshot: AtomicBool::new(false),
            command_delay: Mutex::new(Duration::ZERO),
            requests: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            pushed_configs: Mutex::new(Vec::new()),
            commands: Mutex::new(Vec::new()),
            sims: Mutex::new(Vec::new()),
        })
    }

    pub fn set_status(&self, state: SystemState, elapsed: f64) {
        let mut s = self.status.lock().unwrap();
        s.state = state;
        s.elapsed_time = elapsed;
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }

    fn scripted_failure(flag: &AtomicBool, what: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            Err(PawgateError::Status {
                endpoint: what.to_string(),
                status: 500,
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl BackendApi for RecordingBackend {
    async fn status(&self) -> Result<StatusReport> {
        self.hit();
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        Self::scripted_failure(&self.fail_status, "/api/status")?;
        Ok(self.status.lock().unwrap().clone())
    }

    async fn fetch_config(&self) -> Result<DoorConfig> {
        self.hit();
        Self::scripted_failure(&self.fail_fetch, "/api/config")?;
        Ok(self.config.lock().unwrap().clone())
    }

    async fn push_config(&self, config: &DoorConfig) -> Result<()> {
        self.hit();
        Self::scripted_failure(&self.fail_push, "/api/config")?;
        self.pushed_configs.lock().unwrap().push(config.clone());
        *self.config.lock().unwrap() = config.clone();
        Ok(())
    }

    async fn send_command(&self, command: DoorCommand) -> Result<()> {
        self.hit();
        let delay = *self.command_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Self::scripted_failure(&self.fail_command, "/api/command")?;
        self.commands.lock().unwrap().push(command);
        Ok(())
    }

    async fn push_simulation(&self, sim: &SimulationState) -> Result<()> {
        self.hit();
        self.sims.lock().unwrap().push(sim.clone());
        Ok(())
    }

    async fn snapshot(&self) -> Result<Vec<u8>> {
        self.hit();
        Self::scripted_failure(&self.fail_snapshot, "/snapshot")?;
        Ok(self.snapshot.lock().unwrap().clone())
    }

    fn video_feed_url(&self) -> String {
        "http://fake/video_feed".to_string()
    }
}

/// Vision model returning a fixed description
pub struct CannedVision {
    pub reply: String,
    pub delay: Duration,
    pub seen: Mutex<Vec<VisionRequest>>,
}

impl CannedVision {
    pub fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            delay: Duration::ZERO,
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn slow(reply: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            delay,
            seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl VisionModel for CannedVision {
    async fn describe(&self, request: &VisionRequest) -> Result<String> {
        self.seen.lock().unwrap().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.reply.clone())
    }
}

pub const FAST_POLL: Duration = Duration::from_millis(20);

/// A disconnected session over the given fakes
pub fn session(backend: &Arc<RecordingBackend>, vision: &Arc<CannedVision>) -> DashboardSession {
    DashboardSession::new(backend.clone(), vision.clone(), StateStore::default())
        .with_poll_interval(FAST_POLL)
}

/// Let spawned pushes and the first poll land
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(60)).await;
}
