//! Dashboard session: owns the connection lifetime and wires the components
//! to one backend and one state store.
use crate::backend::BackendApi;
use crate::camera::{CameraLease, CaptureDevice, CAMERA_UNAVAILABLE};
use crate::command::{CommandDispatcher, CommandOutcome};
use crate::config_sync::ConfigSync;
use crate::model::{AnalysisResult, DoorCommand};
use crate::poller::{PollerHandle, StatusPoller, DEFAULT_POLL_INTERVAL};
use crate::simulation::SimulationClient;
use crate::state::{StateEvent, StateStore};
use crate::vision::{Frame, VisionClient, VisionModel};
use crate::PawgateError;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("could not connect to controller: {0}")]
    Connect(#[source] PawgateError),
}

pub struct DashboardSession {
    backend: Arc<dyn BackendApi>,
    store: StateStore,
    seq: Arc<AtomicU64>,
    poll_interval: Duration,
    poller: Option<PollerHandle>,
    config: ConfigSync,
    commands: CommandDispatcher,
    simulation: SimulationClient,
    vision: VisionClient,
    camera: Option<Arc<dyn CaptureDevice>>,
    lease: Option<CameraLease>,
    analyzing: AtomicBool,
}

impl DashboardSession {
    pub fn new(backend: Arc<dyn BackendApi>, vision: Arc<dyn VisionModel>, store: StateStore) -> Self {
        Self {
            config: ConfigSync::new(Arc::clone(&backend), store.clone()),
            commands: CommandDispatcher::new(Arc::clone(&backend), store.clone()),
            simulation: SimulationClient::new(Arc::clone(&backend), store.clone()),
            vision: VisionClient::new(vision),
            backend,
            store,
            seq: Arc::new(AtomicU64::new(0)),
            poll_interval: DEFAULT_POLL_INTERVAL,
            poller: None,
            camera: None,
            lease: None,
            analyzing: AtomicBool::new(false),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Attach a local capture device. It is held whenever the session is disconnected.
    pub fn with_camera(mut self, device: Arc<dyn CaptureDevice>) -> Self {
        self.camera = Some(device);
        if !self.is_connected() {
            self.acquire_camera();
        }
        self
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn config(&self) -> &ConfigSync {
        &self.config
    }

    pub fn simulation(&self) -> &SimulationClient {
        &self.simulation
    }

    pub fn is_connected(&self) -> bool {
        self.store.read(|s| s.connected)
    }

    pub fn is_polling(&self) -> bool {
        self.poller.as_ref().is_some_and(|p| p.is_running())
    }

    pub fn has_camera(&self) -> bool {
        self.lease.is_some()
    }

    pub fn video_feed_url(&self) -> String {
        self.backend.video_feed_url()
    }

    pub async fn connect(&mut self) -> Result<(), SessionError> {
        if self.is_connected() {
            return Ok(());
        }
        let config = match self.config.fetch_remote().await {
            Ok(c) => c,
            Err(e) => {
                error!(target = "session", error = %e, "Connection failed");
                self.store.dispatch(StateEvent::Log(
                    "[ERR] Could not connect to Pi. Is the Python script running?".to_string(),
                ));
                return Err(SessionError::Connect(e));
            }
        };

        // the controller owns the camera while connected
        self.lease = None;
        self.store.dispatch(StateEvent::Connected { config });
        self.poller = Some(
            StatusPoller::new(Arc::clone(&self.backend), self.store.clone(), self.poll_interval)
                .with_sequence(Arc::clone(&self.seq))
                .start(),
        );
        info!(target = "session", "Connected");
        Ok(())
    }

    pub fn disconnect(&mut self) {
        if let Some(p) = self.poller.take() {
            p.stop();
        }
        let was_connected = self.is_connected();
        self.store.dispatch(StateEvent::Disconnected);
        if was_connected {
            info!(target = "session", "Disconnected");
        }
        self.acquire_camera();
    }

    pub async fn open(&self) -> CommandOutcome {
        self.commands.dispatch(DoorCommand::Open).await
    }

    pub async fn close(&self) -> CommandOutcome {
        self.commands.dispatch(DoorCommand::Close).await
    }

    /// Grab a still frame and run it through the vision model. Returns `None`
    /// when another analysis is still in flight.
    pub async fn analyze(&self) -> Option<String> {
        if self
            .analyzing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!(target = "session", "Analysis already in progress");
            return None;
        }
        self.store.dispatch(StateEvent::AnalysisStarted);
        let _guard = AnalysisGuard {
            latch: &self.analyzing,
            store: &self.store,
        };

        let (connected, api_key) =
            self.store.read(|s| (s.connected, s.config.gemini_api_key.clone()));
        let frame = if connected {
            match self.backend.snapshot().await {
                Ok(bytes) => Some(Frame::Jpeg(bytes)),
                Err(e) => {
                    warn!(target = "session", error = %e, "Snapshot failed");
                    None
                }
            }
        } else if let Some(lease) = &self.lease {
            match lease.capture().await {
                Ok(bytes) => Some(Frame::Jpeg(bytes)),
                Err(e) => {
                    warn!(target = "session", error = %e, "Local capture failed");
                    None
                }
            }
        } else {
            None
        };

        let text = self.vision.analyze(frame, api_key).await;
        self.store
            .dispatch(StateEvent::AnalysisCompleted(AnalysisResult::now(text.clone())));
        Some(text)
    }

    /// The video viewer could not load the stream
    pub fn report_video_error(&self) {
        if self.is_connected() {
            self.store.dispatch(StateEvent::VideoFailed);
        }
    }

    fn acquire_camera(&mut self) {
        let Some(device) = &self.camera else {
            return;
        };
        if self.lease.is_some() {
            return;
        }
        match CameraLease::acquire(Arc::clone(device)) {
            Ok(lease) => {
                self.lease = Some(lease);
                self.store.dispatch(StateEvent::CameraReady);
            }
            Err(e) => {
                warn!(target = "session", error = %e, "Local camera unavailable");
                self.store
                    .dispatch(StateEvent::CameraUnavailable(CAMERA_UNAVAILABLE.to_string()));
            }
        }
    }
}

/// Clears the analysis latch, including when the caller gives up mid-request
struct AnalysisGuard<'a> {
    latch: &'a AtomicBool,
    store: &'a StateStore,
}

impl Drop for AnalysisGuard<'_> {
    fn drop(&mut self) {
        self.latch.store(false, Ordering::SeqCst);
        self.store.dispatch(StateEvent::AnalysisAborted);
    }
}

impl Drop for DashboardSession {
    fn drop(&mut self) {
        if let Some(p) = self.poller.take() {
            p.stop();
        }
    }
}
