//! Hardware simulation overlay: toggles the controller's simulate-sensors
//! mode and individual sensor overrides.
use crate::backend::BackendApi;
use crate::model::{SensorOverride, SimulationState};
use crate::state::{StateEvent, StateStore};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub struct SimulationClient {
    backend: Arc<dyn BackendApi>,
    store: StateStore,
}

impl SimulationClient {
    pub fn new(backend: Arc<dyn BackendApi>, store: StateStore) -> Self {
        Self { backend, store }
    }

    pub fn current(&self) -> SimulationState {
        self.store.read(|s| s.simulation.clone())
    }

    /// Flip the global simulation flag. No-op when disconnected.
    pub fn toggle_enabled(&self) -> Option<JoinHandle<()>> {
        self.update(|sim| sim.enabled = !sim.enabled)
    }

    /// Set one sensor override. No-op when disconnected.
    pub fn set_override(&self, sensor: SensorOverride, value: bool) -> Option<JoinHandle<()>> {
        self.update(|sim| sim.overrides.set(sensor, value))
    }

    /// Flip one sensor override
    pub fn toggle_override(&self, sensor: SensorOverride) -> Option<JoinHandle<()>> {
        self.update(|sim| {
            let next = !sim.overrides.is_active(sensor);
            sim.overrides.set(sensor, next);
        })
    }

    /// Momentary trigger: assert then release, one push each
    pub fn pulse(&self, sensor: SensorOverride) -> Vec<JoinHandle<()>> {
        [true, false]
            .into_iter()
            .filter_map(|v| self.set_override(sensor, v))
            .collect()
    }

    fn update<F>(&self, f: F) -> Option<JoinHandle<()>>
    where
        F: FnOnce(&mut SimulationState),
    {
        let (mut sim, connected) = self.store.read(|s| (s.simulation.clone(), s.connected));
        if !connected {
            debug!(target = "simulation", "Ignoring simulation change while disconnected");
            return None;
        }
        f(&mut sim);
        self.store.dispatch(StateEvent::SimulationChanged(sim.clone()));

        // pushes are not ordered; the controller keeps whichever arrives last
        let backend = Arc::clone(&self.backend);
        Some(tokio::spawn(async move {
            if let Err(e) = backend.push_simulation(&sim).await {
                warn!(target = "simulation", error = %e, "Simulation push failed");
            }
        }))
    }
}
