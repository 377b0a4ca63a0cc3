//! Manual open/close dispatch with a single-flight latch.
use crate::backend::BackendApi;
use crate::model::{DoorCommand, DoorMode};
use crate::state::{StateEvent, StateStore};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Why a command was refused before any request was issued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Disconnected,
    Locked,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Disconnected => f.write_str("not connected"),
            RejectReason::Locked => f.write_str("system locked"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Sent,
    Rejected(RejectReason),
    /// A previous command is still outstanding; this one was dropped
    Busy,
    Failed(String),
}

pub struct CommandDispatcher {
    backend: Arc<dyn BackendApi>,
    store: StateStore,
    pending: Arc<AtomicBool>,
}

/// Releases the latch even if the dispatching future is dropped mid-request
struct LatchGuard<'a> {
    pending: &'a AtomicBool,
    store: &'a StateStore,
}

impl Drop for LatchGuard<'_> {
    fn drop(&mut self) {
        self.pending.store(false, Ordering::SeqCst);
        self.store.dispatch(StateEvent::CommandFinished);
    }
}

impl CommandDispatcher {
    pub fn new(backend: Arc<dyn BackendApi>, store: StateStore) -> Self {
        Self {
            backend,
            store,
            pending: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Pre-flight check against the cached state
    pub fn check(&self) -> Result<(), RejectReason> {
        self.store.read(|s| {
            if !s.connected {
                Err(RejectReason::Disconnected)
            } else if s.is_locked() || s.config.door_mode == DoorMode::Locked {
                Err(RejectReason::Locked)
            } else {
                Ok(())
            }
        })
    }

    pub async fn dispatch(&self, command: DoorCommand) -> CommandOutcome {
        if let Err(reason) = self.check() {
            debug!(target = "command", %command, %reason, "Command rejected");
            return CommandOutcome::Rejected(reason);
        }
        if self
            .pending
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!(target = "command", %command, "Command dropped; another is outstanding");
            return CommandOutcome::Busy;
        }
        self.store.dispatch(StateEvent::CommandStarted);
        let _guard = LatchGuard {
            pending: &self.pending,
            store: &self.store,
        };

        match self.backend.send_command(command).await {
            Ok(()) => {
                info!(target = "command", %command, "Manual command sent");
                self.store.dispatch(StateEvent::Log(format!(
                    "[CMD] Manual {} Sent",
                    command.as_str().to_uppercase()
                )));
                CommandOutcome::Sent
            }
            Err(e) => {
                error!(target = "command", %command, error = %e, "Failed to send command");
                self.store
                    .dispatch(StateEvent::Log("[ERR] Failed to send command".to_string()));
                CommandOutcome::Failed(e.to_string())
            }
        }
    }
}
