use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::backend::BackendConfig;
use crate::vision::VisionConfig;
use crate::{PawgateError, Result};

/// High-level configuration for a dashboard session
#[derive(Clone, Debug)]
pub struct PawgateSettings {
    pub backend: BackendConfig,
    pub vision: VisionConfig,
    pub poll_interval_ms: u64,
    /// Still JPEG used as the local camera in demo mode
    pub camera_image: Option<PathBuf>,
}

impl Default for PawgateSettings {
    fn default() -> Self {
        // Start from component defaults (which already consider env vars)
        Self {
            backend: BackendConfig::default(),
            vision: VisionConfig::default(),
            poll_interval_ms: std::env::var("PAWGATE_POLL_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(500),
            camera_image: std::env::var("PAWGATE_CAMERA_IMAGE")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
        }
    }
}

impl PawgateSettings {
    /// Load configuration from a TOML file (path via PAWGATE_CONFIG or ./pawgate.toml),
    /// overlaying values onto env-driven defaults. A missing or broken file
    /// falls back to the defaults.
    pub fn load() -> Self {
        let path = std::env::var("PAWGATE_CONFIG").unwrap_or_else(|_| "pawgate.toml".into());
        let p = Path::new(&path);
        if !p.exists() {
            tracing::info!(target = "settings", path = %path, "No TOML config found; using defaults/env");
            return Self::default();
        }
        match Self::load_from(p) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(target = "settings", error = %e, "Failed to load TOML; using defaults");
                Self::default()
            }
        }
    }

    /// Strict variant of [`load`](Self::load) for an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let t = toml::from_str::<PawgateToml>(&text)
            .map_err(|e| PawgateError::Settings(format!("{}: {e}", path.display())))?;
        Ok(t.overlay(Self::default()))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct PawgateToml {
    pub poll_interval_ms: Option<u64>,
    pub camera_image: Option<PathBuf>,
    pub backend: Option<BackendToml>,
    pub vision: Option<VisionToml>,
}

impl PawgateToml {
    fn overlay(self, mut base: PawgateSettings) -> PawgateSettings {
        if let Some(v) = self.poll_interval_ms.filter(|v| *v > 0) {
            base.poll_interval_ms = v;
        }
        if let Some(v) = self.camera_image {
            base.camera_image = Some(v);
        }
        if let Some(b) = self.backend {
            b.apply(&mut base.backend);
        }
        if let Some(v) = self.vision {
            v.apply(&mut base.vision);
        }
        base
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct BackendToml {
    pub base_url: Option<String>,
    pub request_timeout_ms: Option<u64>,
}
impl BackendToml {
    fn apply(self, b: &mut BackendConfig) {
        if let Some(x) = self.base_url {
            b.base_url = x;
        }
        if let Some(x) = self.request_timeout_ms {
            b.request_timeout_ms = x;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct VisionToml {
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub request_timeout_ms: Option<u64>,
}
impl VisionToml {
    fn apply(self, v: &mut VisionConfig) {
        if let Some(x) = self.endpoint {
            v.endpoint = x;
        }
        if let Some(x) = self.model {
            v.model = x;
        }
        if let Some(x) = self.api_key.filter(|k| !k.is_empty()) {
            v.api_key = Some(x);
        }
        if let Some(x) = self.request_timeout_ms {
            v.request_timeout_ms = x;
        }
    }
}
