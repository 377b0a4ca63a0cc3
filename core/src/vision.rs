//! Vision analysis of a still frame through a hosted multimodal model.
//!
//! The public entry point, [`VisionClient::analyze`], never fails: any
//! problem along the way is turned into a short sentence for the operator.
use crate::{PawgateError, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

pub const ANALYSIS_PROMPT: &str = "This is a security camera feed from a dog door. Analyze this image briefly. Is there a dog present? If so, describe its behavior (e.g., waiting, sleeping, barking, playing) and estimate if it wants to go out. Keep it under 50 words.";

pub const NO_ANALYSIS: &str = "No analysis could be generated.";
pub const ANALYSIS_FAILED: &str = "Error analyzing image. Please try again.";
pub const NO_IMAGE: &str = "No image available for analysis.";

/// Configuration for the hosted model, loaded from environment variables
#[derive(Debug, Clone)]
pub struct VisionConfig {
    pub endpoint: String, // e.g., https://generativelanguage.googleapis.com/v1beta
    pub model: String,
    pub api_key: Option<String>,
    pub request_timeout_ms: u64,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            endpoint: std::env::var("GEMINI_ENDPOINT")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta".to_string()),
            model: std::env::var("GEMINI_MODEL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "gemini-2.5-flash".to_string()),
            api_key: std::env::var("GEMINI_API_KEY")
                .or_else(|_| std::env::var("API_KEY"))
                .ok()
                .filter(|s| !s.is_empty()),
            request_timeout_ms: std::env::var("GEMINI_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30_000),
        }
    }
}

/// A still frame in whatever shape the source produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Raw JPEG bytes (snapshot endpoint, capture device)
    Jpeg(Vec<u8>),
    /// Base64 text, optionally with a `data:image/...;base64,` prefix
    Encoded(String),
}

impl Frame {
    /// Base64 payload without any data-URL prefix
    pub fn into_base64(self) -> Result<String> {
        match self {
            Frame::Jpeg(bytes) => {
                if bytes.is_empty() {
                    return Err(PawgateError::Vision("empty frame".to_string()));
                }
                Ok(STANDARD.encode(bytes))
            }
            Frame::Encoded(text) => {
                let payload = strip_data_url_prefix(text.trim());
                if payload.is_empty() {
                    return Err(PawgateError::Vision("empty frame".to_string()));
                }
                STANDARD
                    .decode(payload)
                    .map_err(|e| PawgateError::Vision(format!("frame is not valid base64: {e}")))?;
                Ok(payload.to_string())
            }
        }
    }
}

/// Drop a leading `data:image/<kind>;base64,`
pub fn strip_data_url_prefix(s: &str) -> &str {
    let Some(rest) = s.strip_prefix("data:image/") else {
        return s;
    };
    let kind_len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    if kind_len == 0 {
        return s;
    }
    rest[kind_len..].strip_prefix(";base64,").unwrap_or(s)
}

/// One analysis request to the model
#[derive(Debug, Clone)]
pub struct VisionRequest {
    pub image_base64: String,
    pub mime_type: String,
    pub instruction: String,
    /// Key from the controller configuration, used when none is configured locally
    pub api_key: Option<String>,
}

/// A hosted model that can describe an image
#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn describe(&self, request: &VisionRequest) -> Result<String>;
}

/// Gemini `generateContent` over REST
pub struct GeminiModel {
    http: Client,
    cfg: VisionConfig,
}

impl GeminiModel {
    pub fn new(cfg: VisionConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()
            .map_err(|e| PawgateError::Vision(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { http, cfg })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(VisionConfig::default())
    }
}

#[async_trait]
impl VisionModel for GeminiModel {
    async fn describe(&self, request: &VisionRequest) -> Result<String> {
        let key = self
            .cfg
            .api_key
            .clone()
            .or_else(|| request.api_key.clone().filter(|k| !k.is_empty()))
            .ok_or_else(|| PawgateError::Vision("no API key configured".to_string()))?;

        let url = format!(
            "{}/models/{}:generateContent",
            self.cfg.endpoint.trim_end_matches('/'),
            self.cfg.model
        );
        debug!(target = "vision", model = %self.cfg.model, "POST {}", url);

        let body = json!({
            "contents": [{
                "parts": [
                    { "inline_data": { "mime_type": request.mime_type, "data": request.image_base64 } },
                    { "text": request.instruction },
                ]
            }]
        });

        let resp = self
            .http
            .post(&url)
            .query(&[("key", key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| PawgateError::Vision(format!("generateContent HTTP error: {e}")))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            error!(target = "vision", %status, body = %text, "generateContent error");
            return Err(PawgateError::Vision(format!(
                "generateContent error: status={status}"
            )));
        }

        let val: Value = resp
            .json()
            .await
            .map_err(|e| PawgateError::Vision(format!("Failed to parse response JSON: {e}")))?;
        Ok(extract_text_from_candidates(&val).unwrap_or_default())
    }
}

/// Concatenate `candidates[0].content.parts[*].text`
pub fn extract_text_from_candidates(v: &Value) -> Option<String> {
    let parts = v
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();
    Some(text)
}

/// Turns frames into operator-facing descriptions
#[derive(Clone)]
pub struct VisionClient {
    model: Arc<dyn VisionModel>,
}

impl VisionClient {
    pub fn new(model: Arc<dyn VisionModel>) -> Self {
        Self { model }
    }

    /// Describe a frame. Never fails; problems become a fallback sentence.
    pub async fn analyze(&self, frame: Option<Frame>, api_key: Option<String>) -> String {
        let Some(frame) = frame else {
            warn!(target = "vision", "No frame to analyze");
            return NO_IMAGE.to_string();
        };
        let image_base64 = match frame.into_base64() {
            Ok(b64) => b64,
            Err(e) => {
                error!(target = "vision", error = %e, "Frame encoding failed");
                return ANALYSIS_FAILED.to_string();
            }
        };
        let request = VisionRequest {
            image_base64,
            mime_type: "image/jpeg".to_string(),
            instruction: ANALYSIS_PROMPT.to_string(),
            api_key,
        };
        match self.model.describe(&request).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => NO_ANALYSIS.to_string(),
            Err(e) => {
                error!(target = "vision", error = %e, "Vision analysis error");
                ANALYSIS_FAILED.to_string()
            }
        }
    }
}
