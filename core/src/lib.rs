// PawGate Core Library
// Dashboard client for a motorized pet door controller

pub mod backend;
pub mod camera;
pub mod command;
pub mod config_sync;
pub mod display;
pub mod door;
pub mod model;
pub mod poller;
pub mod session;
pub mod settings;
pub mod simulation;
pub mod state;
pub mod vision;

// Export core types
pub use backend::{BackendApi, BackendConfig, HttpBackend};
pub use camera::{CameraLease, CaptureDevice, StillImageCamera};
pub use command::{CommandDispatcher, CommandOutcome};
pub use config_sync::ConfigSync;
pub use door::{DoorInputs, DoorMachine, DoorParams, Transition};
pub use model::{
    AnalysisResult, DetectionZone, DoorCommand, DoorConfig, DoorMode, GpioConfig, GpioPin,
    NotificationConfig, SensorOverride, SimulationState, StatusReport, SystemState, ZoneAxis,
};
pub use poller::{PollerHandle, StatusPoller};
pub use session::{DashboardSession, SessionError};
pub use settings::PawgateSettings;
pub use simulation::SimulationClient;
pub use state::{DashboardState, StateEvent, StateStore};
pub use vision::{VisionClient, VisionConfig, VisionModel};

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PawgateError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend returned status {status} for {endpoint}")]
    Status { endpoint: String, status: u16 },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Camera error: {0}")]
    Camera(String),

    #[error("Vision error: {0}")]
    Vision(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
pub type Result<T> = std::result::Result<T, PawgateError>;
