// PawGate simulated controller
//
// Serves the controller HTTP surface the dashboard talks to:
// /api/status, /api/config, /api/command, /api/simulate, /snapshot, /video_feed

pub mod controller;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use controller::Controller;
use pawgate_core::model::{CommandRequest, DoorConfig, SimulationState};
use serde_json::json;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_stream::{wrappers::IntervalStream, StreamExt};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

pub use controller::travel_time;

#[derive(thiserror::Error, Debug)]
pub enum SimError {
    #[error("invalid address: {0}")]
    Address(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SimError>;

pub const CONTROL_PERIOD: Duration = Duration::from_millis(50);
const FRAME_PERIOD: Duration = Duration::from_millis(100);
const BOUNDARY: &str = "frame";

/// Server settings, read from the environment
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub addr: String,
    /// JPEG served by /snapshot and /video_feed
    pub camera_image: Option<PathBuf>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            addr: std::env::var("PAWGATE_SIM_ADDR").unwrap_or_else(|_| "127.0.0.1:5000".into()),
            camera_image: std::env::var("PAWGATE_CAMERA_IMAGE")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
        }
    }
}

#[derive(Clone)]
pub struct SimState {
    pub controller: Arc<RwLock<Controller>>,
    started: Instant,
    frame: Option<Bytes>,
}

impl SimState {
    fn now(&self) -> Duration {
        self.started.elapsed()
    }
}

pub struct SimServer {
    config: SimConfig,
    state: SimState,
}

impl SimServer {
    pub fn new(config: SimConfig) -> Self {
        let frame = config.camera_image.as_ref().and_then(|p| match std::fs::read(p) {
            Ok(bytes) => Some(Bytes::from(bytes)),
            Err(e) => {
                warn!(target = "sim", path = %p.display(), error = %e, "Camera image unreadable; snapshots disabled");
                None
            }
        });
        Self {
            config,
            state: SimState {
                controller: Arc::new(RwLock::new(Controller::new(DoorConfig::default()))),
                started: Instant::now(),
                frame,
            },
        }
    }

    pub fn controller(&self) -> Arc<RwLock<Controller>> {
        Arc::clone(&self.state.controller)
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/api/status", get(status_handler))
            .route("/api/config", get(get_config_handler).post(set_config_handler))
            .route("/api/command", post(command_handler))
            .route("/api/simulate", post(simulate_handler))
            .route("/snapshot", get(snapshot_handler))
            .route("/video_feed", get(video_feed_handler))
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
            .with_state(self.state.clone())
    }

    /// Bind, start the control loop and serve in the background
    pub async fn spawn(self) -> Result<(SocketAddr, JoinHandle<()>)> {
        let addr: SocketAddr = self
            .config
            .addr
            .parse()
            .map_err(|_| SimError::Address(self.config.addr.clone()))?;
        let listener = TcpListener::bind(addr).await?;
        let local = listener.local_addr()?;
        let app = self.router();
        let control = spawn_control_loop(self.state.clone());

        info!(target = "sim", url = %format!("http://{}", local), "Simulated controller ready");
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!(target = "sim", error = %e, "Server error");
            }
            control.abort();
        });
        Ok((local, handle))
    }

    /// Serve until the server task ends
    pub async fn serve(self) -> Result<()> {
        let (_, handle) = self.spawn().await?;
        let _ = handle.await;
        Ok(())
    }
}

fn spawn_control_loop(state: SimState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CONTROL_PERIOD);
        loop {
            ticker.tick().await;
            let now = state.now();
            state.controller.write().await.tick(now);
        }
    })
}

async fn status_handler(State(state): State<SimState>) -> impl IntoResponse {
    let report = state.controller.read().await.status(state.now());
    // the controller names the log line `last_log`
    Json(json!({
        "state": report.state,
        "elapsed_time": report.elapsed_time,
        "last_log": report.last_message,
    }))
}

async fn get_config_handler(State(state): State<SimState>) -> Json<DoorConfig> {
    Json(state.controller.read().await.config().clone())
}

async fn set_config_handler(
    State(state): State<SimState>,
    Json(config): Json<DoorConfig>,
) -> impl IntoResponse {
    if let Err(e) = config.validate() {
        warn!(target = "sim", error = %e, "Accepting config that violates an invariant");
    }
    state.controller.write().await.set_config(config);
    Json(json!({"status": "success"}))
}

async fn command_handler(
    State(state): State<SimState>,
    Json(req): Json<CommandRequest>,
) -> impl IntoResponse {
    if state.controller.write().await.command(req.command) {
        (StatusCode::OK, Json(json!({"status": "success"})))
    } else {
        (StatusCode::CONFLICT, Json(json!({"status": "locked"})))
    }
}

async fn simulate_handler(
    State(state): State<SimState>,
    Json(sim): Json<SimulationState>,
) -> impl IntoResponse {
    state.controller.write().await.set_simulation(sim);
    Json(json!({"status": "success"}))
}

async fn snapshot_handler(State(state): State<SimState>) -> Response {
    match state.frame {
        Some(frame) => ([(header::CONTENT_TYPE, "image/jpeg")], frame).into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "camera offline").into_response(),
    }
}

/// MJPEG stream repeating the configured frame
async fn video_feed_handler(State(state): State<SimState>) -> Response {
    let Some(frame) = state.frame else {
        return (StatusCode::SERVICE_UNAVAILABLE, "camera offline").into_response();
    };
    let stream = IntervalStream::new(tokio::time::interval(FRAME_PERIOD)).map(move |_| {
        let mut part = Vec::with_capacity(frame.len() + 64);
        part.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Type: image/jpeg\r\n\r\n").as_bytes(),
        );
        part.extend_from_slice(&frame);
        part.extend_from_slice(b"\r\n");
        Ok::<_, Infallible>(Bytes::from(part))
    });
    (
        [(
            header::CONTENT_TYPE,
            format!("multipart/x-mixed-replace; boundary={BOUNDARY}"),
        )],
        Body::from_stream(stream),
    )
        .into_response()
}
