//! Local configuration mirror with optimistic, full-document pushes.
use crate::backend::BackendApi;
use crate::model::{DoorConfig, DoorMode, GpioPin, ZoneAxis};
use crate::state::{StateEvent, StateStore};
use crate::Result;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub struct ConfigSync {
    backend: Arc<dyn BackendApi>,
    store: StateStore,
}

impl ConfigSync {
    pub fn new(backend: Arc<dyn BackendApi>, store: StateStore) -> Self {
        Self { backend, store }
    }

    /// Fetch the authoritative configuration. The caller replaces the local copy.
    pub async fn fetch_remote(&self) -> Result<DoorConfig> {
        let config = self.backend.fetch_config().await?;
        if let Err(e) = config.validate() {
            // the controller is authoritative on connect; keep its document anyway
            warn!(target = "config_sync", error = %e, "Controller config violates a local invariant");
        }
        info!(target = "config_sync", mode = %config.door_mode, "Fetched controller configuration");
        Ok(config)
    }

    /// Apply an edit to the local copy and, when connected, push the whole
    /// document. An edit that breaks an invariant in a section it touches leaves
    /// the local copy untouched.
    ///
    /// Returns the handle of the push task, if one was issued. The push is
    /// fire-and-forget: a failure is logged and the local value is kept.
    pub fn edit<F>(&self, f: F) -> Result<Option<JoinHandle<()>>>
    where
        F: FnOnce(&mut DoorConfig),
    {
        let (before, connected) = self.store.read(|s| (s.config.clone(), s.connected));
        let mut config = before.clone();
        f(&mut config);
        config.validate_edit(&before)?;

        self.store.dispatch(StateEvent::ConfigEdited(config.clone()));
        if !connected {
            debug!(target = "config_sync", "Offline edit kept locally");
            return Ok(None);
        }

        let revision = self.store.read(|s| s.config_revision);
        let backend = Arc::clone(&self.backend);
        let store = self.store.clone();
        Ok(Some(tokio::spawn(async move {
            match backend.push_config(&config).await {
                Ok(()) => {
                    debug!(target = "config_sync", revision, "Config pushed");
                }
                Err(e) => {
                    error!(target = "config_sync", revision, error = %e, "Config save failed");
                    store.dispatch(StateEvent::Log(
                        "[ERR] Failed to save settings to Pi".to_string(),
                    ));
                }
            }
        })))
    }


    pub fn set_door_mode(&self, mode: DoorMode) -> Result<Option<JoinHandle<()>>> {
        self.edit(|c| c.door_mode = mode)
    }

    pub fn set_motor_speed(&self, speed: u8) -> Result<Option<JoinHandle<()>>> {
        self.edit(|c| c.motor_speed = speed)
    }

    pub fn set_hold_open_time(&self, secs: f64) -> Result<Option<JoinHandle<()>>> {
        self.edit(|c| c.hold_open_time = secs)
    }

    pub fn set_confidence_threshold(&self, value: f64) -> Result<Option<JoinHandle<()>>> {
        self.edit(|c| c.confidence_threshold = value)
    }

    pub fn set_grace_period(&self, secs: f64) -> Result<Option<JoinHandle<()>>> {
        self.edit(|c| c.grace_period = secs)
    }

    pub fn toggle_camera(&self) -> Result<Option<JoinHandle<()>>> {
        self.edit(|c| c.camera_enabled = !c.camera_enabled)
    }

    pub fn toggle_ai_fallback(&self) -> Result<Option<JoinHandle<()>>> {
        self.edit(|c| c.ai_fallback_enabled = !c.ai_fallback_enabled)
    }

    pub fn set_gemini_api_key(&self, key: impl Into<String>) -> Result<Option<JoinHandle<()>>> {
        let key = key.into();
        self.edit(move |c| c.gemini_api_key = Some(key))
    }

    pub fn toggle_notifications(&self) -> Result<Option<JoinHandle<()>>> {
        self.edit(|c| c.notifications.enabled = !c.notifications.enabled)
    }

    pub fn set_notification_api_key(
        &self,
        key: impl Into<String>,
    ) -> Result<Option<JoinHandle<()>>> {
        let key = key.into();
        self.edit(move |c| c.notifications.api_key = key)
    }

    pub fn set_gpio_pin(&self, pin: GpioPin, value: i32) -> Result<Option<JoinHandle<()>>> {
        self.edit(|c| c.gpio.set(pin, value))
    }

    /// Reassign several pins in one edit, so two pins can swap numbers
    pub fn set_gpio_pins(&self, pins: &[(GpioPin, i32)]) -> Result<Option<JoinHandle<()>>> {
        self.edit(|c| {
            for (pin, value) in pins {
                c.gpio.set(*pin, *value);
            }
        })
    }

    pub fn set_zone(&self, axis: ZoneAxis, value: f64) -> Result<Option<JoinHandle<()>>> {
        self.edit(|c| c.detection_zone.set(axis, value))
    }
}
