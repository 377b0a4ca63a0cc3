// Simulated door controller
//
// Runs the shared door state machine over a virtual motor. Limit switches
// are derived from the motor position unless simulation mode overrides them.

use pawgate_core::door::{DoorInputs, DoorMachine, DoorParams, Transition};
use pawgate_core::model::{
    DoorCommand, DoorConfig, SensorOverride, SimulationState, StatusReport, SystemState,
};
use std::time::Duration;
use tracing::{debug, info};

/// Seconds for a full open or close stroke at the given motor speed (1..=5)
pub fn travel_time(motor_speed: u8) -> f64 {
    let speed = motor_speed.clamp(1, 5);
    f64::from(6 - speed)
}

pub struct Controller {
    config: DoorConfig,
    simulation: SimulationState,
    machine: DoorMachine,
    /// 0.0 fully closed, 1.0 fully open
    position: f64,
    last_tick: Option<Duration>,
}

impl Controller {
    pub fn new(config: DoorConfig) -> Self {
        Self {
            config,
            simulation: SimulationState::default(),
            machine: DoorMachine::new(),
            position: 0.0,
            last_tick: None,
        }
    }

    pub fn config(&self) -> &DoorConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: DoorConfig) {
        info!(target = "sim", mode = %config.door_mode, speed = config.motor_speed, "Config updated");
        self.config = config;
    }

    pub fn simulation(&self) -> &SimulationState {
        &self.simulation
    }

    pub fn set_simulation(&mut self, sim: SimulationState) {
        debug!(target = "sim", enabled = sim.enabled, "Simulation updated");
        self.simulation = sim;
    }

    pub fn state(&self) -> SystemState {
        self.machine.state()
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    /// Queue a manual command; refused while the door mode is LOCKED
    pub fn command(&mut self, command: DoorCommand) -> bool {
        let accepted = self.machine.command(command, self.config.door_mode);
        info!(target = "sim", %command, accepted, "Manual command");
        accepted
    }

    pub fn status(&self, now: Duration) -> StatusReport {
        StatusReport {
            state: self.machine.state(),
            elapsed_time: self.machine.elapsed_open(now),
            last_message: Some(self.machine.last_message().to_string()),
        }
    }

    /// Sensor snapshot: physical readings, replaced by overrides in simulation mode
    pub fn inputs(&self) -> DoorInputs {
        let physical = DoorInputs {
            limit_open: self.position >= 1.0,
            limit_close: self.position <= 0.0,
            ..Default::default()
        };
        if !self.simulation.enabled {
            return physical;
        }
        let o = &self.simulation.overrides;
        let pick = |sensor: SensorOverride, fallback: bool| o.get(sensor).unwrap_or(fallback);
        DoorInputs {
            limit_open: pick(SensorOverride::LimitOpen, physical.limit_open),
            limit_close: pick(SensorOverride::LimitClose, physical.limit_close),
            safety: pick(SensorOverride::Safety, false),
            prox_outside: pick(SensorOverride::ProxOutside, false),
            prox_inside: pick(SensorOverride::ProxInside, false),
            ..physical
        }
    }

    /// One control-loop iteration: move the motor, then step the machine
    pub fn tick(&mut self, now: Duration) -> Option<Transition> {
        let dt = self
            .last_tick
            .map(|t| now.saturating_sub(t).as_secs_f64())
            .unwrap_or(0.0);
        self.last_tick = Some(now);

        let rate = 1.0 / travel_time(self.config.motor_speed);
        match self.machine.state() {
            SystemState::Opening => self.position = (self.position + rate * dt).min(1.0),
            SystemState::Closing => self.position = (self.position - rate * dt).max(0.0),
            _ => {}
        }

        let params = DoorParams::from(&self.config);
        let inputs = self.inputs();
        let transition = self.machine.step(&inputs, &params, now);
        if let Some(t) = &transition {
            info!(target = "sim", from = %t.from, to = %t.to, "{}", t.message);
        }
        transition
    }
}
