//! Local capture device used in demo mode (no controller connected).
//!
//! The device is held through a [`CameraLease`]; dropping the lease releases
//! it, so a lease stored in the session is released as soon as the session
//! connects or is torn down.
use crate::{PawgateError, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Message shown in place of the video area when the device cannot be opened
pub const CAMERA_UNAVAILABLE: &str = "Unable to access camera.";

/// A source of still JPEG frames
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    fn name(&self) -> String;

    /// Open the device for exclusive use
    fn acquire(&self) -> Result<()>;

    /// Give the device back; must be idempotent
    fn release(&self);

    /// Capture one frame as JPEG bytes
    async fn capture_jpeg(&self) -> Result<Vec<u8>>;
}

/// Scoped ownership of a capture device
pub struct CameraLease {
    device: Arc<dyn CaptureDevice>,
}

impl CameraLease {
    pub fn acquire(device: Arc<dyn CaptureDevice>) -> Result<Self> {
        device.acquire()?;
        info!(target = "camera", device = %device.name(), "Camera acquired");
        Ok(Self { device })
    }

    pub async fn capture(&self) -> Result<Vec<u8>> {
        self.device.capture_jpeg().await
    }
}

impl Drop for CameraLease {
    fn drop(&mut self) {
        self.device.release();
        info!(target = "camera", device = %self.device.name(), "Camera released");
    }
}

/// Serves a JPEG file from disk as the camera frame
pub struct StillImageCamera {
    path: PathBuf,
    open: AtomicBool,
}

impl StillImageCamera {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            open: AtomicBool::new(false),
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptureDevice for StillImageCamera {
    fn name(&self) -> String {
        format!("still:{}", self.path.display())
    }

    fn acquire(&self) -> Result<()> {
        if !self.path.is_file() {
            return Err(PawgateError::Camera(format!(
                "no image at {}",
                self.path.display()
            )));
        }
        if self.open.swap(true, Ordering::SeqCst) {
            return Err(PawgateError::Camera("device already in use".to_string()));
        }
        Ok(())
    }

    fn release(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    async fn capture_jpeg(&self) -> Result<Vec<u8>> {
        if !self.is_open() {
            return Err(PawgateError::Camera("device not acquired".to_string()));
        }
        let bytes = tokio::fs::read(&self.path).await?;
        debug!(target = "camera", bytes = bytes.len(), "Frame captured");
        Ok(bytes)
    }
}
