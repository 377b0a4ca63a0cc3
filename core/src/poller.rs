//! Periodic status polling bound to the connection lifetime.
use crate::backend::BackendApi;
use crate::state::{StateEvent, StateStore};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Issues `GET /api/status` on a fixed period and feeds the results to the store
pub struct StatusPoller {
    backend: Arc<dyn BackendApi>,
    store: StateStore,
    interval: Duration,
    seq: Arc<AtomicU64>,
}

impl StatusPoller {
    pub fn new(backend: Arc<dyn BackendApi>, store: StateStore, interval: Duration) -> Self {
        Self {
            backend,
            store,
            interval,
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Share a sequence counter across pollers so a restarted poller never
    /// reuses numbers the store has already seen
    pub fn with_sequence(mut self, seq: Arc<AtomicU64>) -> Self {
        self.seq = seq;
        self
    }

    /// Start polling. The first request is issued immediately.
    pub fn start(self) -> PollerHandle {
        info!(target = "poller", interval_ms = self.interval.as_millis() as u64, "Status polling started");
        let handle = tokio::spawn(async move {
            run_poll_loop(self.backend, self.store, self.interval, self.seq).await;
        });
        PollerHandle {
            handle: Some(handle),
        }
    }
}

async fn run_poll_loop(
    backend: Arc<dyn BackendApi>,
    store: StateStore,
    period: Duration,
    seq: Arc<AtomicU64>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // requests are not serialized; a slow response must not hold back the next tick
    let mut inflight = JoinSet::new();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let n = seq.fetch_add(1, Ordering::SeqCst) + 1;
                inflight.spawn(poll_once(Arc::clone(&backend), store.clone(), n));
            }
            Some(_) = inflight.join_next(), if !inflight.is_empty() => {}
        }
    }
}

async fn poll_once(backend: Arc<dyn BackendApi>, store: StateStore, seq: u64) {
    match backend.status().await {
        Ok(report) => {
            debug!(target = "poller", seq, state = %report.state, "Status received");
            store.dispatch(StateEvent::StatusPolled { seq, report });
        }
        Err(e) => {
            warn!(target = "poller", seq, error = %e, "Polling error");
            store.dispatch(StateEvent::PollFailed { seq });
        }
    }
}

/// Running poller; polling stops when this is stopped or dropped
pub struct PollerHandle {
    handle: Option<JoinHandle<()>>,
}

impl PollerHandle {
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn stop(mut self) {
        self.abort();
    }

    fn abort(&mut self) {
        if let Some(h) = self.handle.take() {
            h.abort();
            info!(target = "poller", "Status polling stopped");
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.abort();
    }
}
