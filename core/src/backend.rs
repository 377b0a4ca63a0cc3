//! HTTP access to the door controller behind the `BackendApi` seam.
use crate::model::{
    CommandRequest, DoorCommand, DoorConfig, SimulationState, StatusReport,
};
use crate::{PawgateError, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for HttpBackend loaded from environment variables
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: String, // e.g., http://raspberrypi.local:5000
    pub request_timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("PAWGATE_BACKEND_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "http://127.0.0.1:5000".to_string()),
            request_timeout_ms: std::env::var("PAWGATE_REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(5_000),
        }
    }
}

/// The controller's HTTP surface as seen by the dashboard
#[async_trait]
pub trait BackendApi: Send + Sync {
    /// `GET /api/status`
    async fn status(&self) -> Result<StatusReport>;

    /// `GET /api/config`
    async fn fetch_config(&self) -> Result<DoorConfig>;

    /// `POST /api/config` with the full document
    async fn push_config(&self, config: &DoorConfig) -> Result<()>;

    /// `POST /api/command`
    async fn send_command(&self, command: DoorCommand) -> Result<()>;

    /// `POST /api/simulate` with the full simulation document
    async fn push_simulation(&self, sim: &SimulationState) -> Result<()>;

    /// `GET /snapshot`, a single JPEG frame
    async fn snapshot(&self) -> Result<Vec<u8>>;

    /// URL of the MJPEG stream, rendered directly by a viewer
    fn video_feed_url(&self) -> String;
}

/// reqwest-backed client for the door controller
#[derive(Clone)]
pub struct HttpBackend {
    http: Client,
    cfg: BackendConfig,
}

impl HttpBackend {
    pub fn new(cfg: BackendConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()?;
        Ok(Self { http, cfg })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(BackendConfig::default())
    }

    pub fn base_url(&self) -> &str {
        self.cfg.base_url.trim_end_matches('/')
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        debug!(target = "backend", "GET {}", url);
        let resp = check(self.http.get(&url).send().await?, path)?;
        resp.json::<T>()
            .await
            .map_err(|e| PawgateError::Decode(format!("{path}: {e}")))
    }

    async fn post_json<B: serde::Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<()> {
        let url = self.url(path);
        debug!(target = "backend", "POST {}", url);
        check(self.http.post(&url).json(body).send().await?, path)?;
        Ok(())
    }
}

fn check(resp: Response, endpoint: &str) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else {
        warn!(target = "backend", %status, endpoint, "Backend returned error status");
        Err(PawgateError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
        })
    }
}

#[async_trait]
impl BackendApi for HttpBackend {
    async fn status(&self) -> Result<StatusReport> {
        self.get_json("/api/status").await
    }

    async fn fetch_config(&self) -> Result<DoorConfig> {
        self.get_json("/api/config").await
    }

    async fn push_config(&self, config: &DoorConfig) -> Result<()> {
        self.post_json("/api/config", config).await
    }

    async fn send_command(&self, command: DoorCommand) -> Result<()> {
        self.post_json("/api/command", &CommandRequest { command })
            .await
    }

    async fn push_simulation(&self, sim: &SimulationState) -> Result<()> {
        self.post_json("/api/simulate", sim).await
    }

    async fn snapshot(&self) -> Result<Vec<u8>> {
        let url = self.url("/snapshot");
        debug!(target = "backend", "GET {}", url);
        let resp = check(self.http.get(&url).send().await?, "/snapshot")?;
        Ok(resp.bytes().await?.to_vec())
    }

    fn video_feed_url(&self) -> String {
        self.url("/video_feed")
    }
}
