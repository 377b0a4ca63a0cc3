//! Wire-level data model shared by the dashboard and the door controller.
//!
//! Field names follow the controller's JSON documents (camelCase for the
//! configuration and simulation documents, snake_case for the status report).
use crate::{PawgateError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Operational state of the door, owned by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SystemState {
    #[default]
    Idle,
    Detecting,
    Opening,
    Open,
    Closing,
    Closed,
    Obstructed,
    Locked,
}

impl SystemState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemState::Idle => "IDLE",
            SystemState::Detecting => "DETECTING",
            SystemState::Opening => "OPENING",
            SystemState::Open => "OPEN",
            SystemState::Closing => "CLOSING",
            SystemState::Closed => "CLOSED",
            SystemState::Obstructed => "OBSTRUCTED",
            SystemState::Locked => "LOCKED",
        }
    }

    /// IDLE is a resting state and renders the same as CLOSED
    pub fn is_at_rest(&self) -> bool {
        matches!(self, SystemState::Idle | SystemState::Closed)
    }

    /// Motor is moving the door
    pub fn is_moving(&self) -> bool {
        matches!(self, SystemState::Opening | SystemState::Closing)
    }
}

impl fmt::Display for SystemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operator-selected behavior class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DoorMode {
    #[default]
    Auto,
    Manual,
    Locked,
}

impl fmt::Display for DoorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DoorMode::Auto => "AUTO",
            DoorMode::Manual => "MANUAL",
            DoorMode::Locked => "LOCKED",
        };
        f.write_str(s)
    }
}

impl FromStr for DoorMode {
    type Err = PawgateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(DoorMode::Auto),
            "manual" => Ok(DoorMode::Manual),
            "locked" | "lock" => Ok(DoorMode::Locked),
            other => Err(PawgateError::InvalidConfig(format!(
                "unknown door mode: {other}"
            ))),
        }
    }
}

/// Named GPIO lines wired to the controller (BCM numbering)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpioPin {
    Dir,
    Step,
    Enable,
    LimitOpen,
    LimitClose,
    Safety,
    BtnOpen,
    BtnClose,
    ProxOutside,
    ProxInside,
}

impl GpioPin {
    pub const ALL: [GpioPin; 10] = [
        GpioPin::Dir,
        GpioPin::Step,
        GpioPin::Enable,
        GpioPin::LimitOpen,
        GpioPin::LimitClose,
        GpioPin::Safety,
        GpioPin::BtnOpen,
        GpioPin::BtnClose,
        GpioPin::ProxOutside,
        GpioPin::ProxInside,
    ];

    /// Key used in the configuration document
    pub fn key(&self) -> &'static str {
        match self {
            GpioPin::Dir => "dir",
            GpioPin::Step => "step",
            GpioPin::Enable => "enable",
            GpioPin::LimitOpen => "limitOpen",
            GpioPin::LimitClose => "limitClose",
            GpioPin::Safety => "safety",
            GpioPin::BtnOpen => "btnOpen",
            GpioPin::BtnClose => "btnClose",
            GpioPin::ProxOutside => "proxOutside",
            GpioPin::ProxInside => "proxInside",
        }
    }
}

impl FromStr for GpioPin {
    type Err = PawgateError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = normalize_key(s);
        GpioPin::ALL
            .iter()
            .copied()
            .find(|p| normalize_key(p.key()) == wanted)
            .ok_or_else(|| PawgateError::InvalidConfig(format!("unknown GPIO pin: {s}")))
    }
}

/// Pin assignment for the ten controller lines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GpioConfig {
    pub dir: i32,
    pub step: i32,
    pub enable: i32,
    pub limit_open: i32,
    pub limit_close: i32,
    pub safety: i32,
    pub btn_open: i32,
    pub btn_close: i32,
    pub prox_outside: i32,
    pub prox_inside: i32,
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            dir: 20,
            step: 21,
            enable: 16,
            limit_open: 19,
            limit_close: 26,
            safety: 13,
            btn_open: 5,
            btn_close: 6,
            prox_outside: 23,
            prox_inside: 24,
        }
    }
}

impl GpioConfig {
    pub fn get(&self, pin: GpioPin) -> i32 {
        match pin {
            GpioPin::Dir => self.dir,
            GpioPin::Step => self.step,
            GpioPin::Enable => self.enable,
            GpioPin::LimitOpen => self.limit_open,
            GpioPin::LimitClose => self.limit_close,
            GpioPin::Safety => self.safety,
            GpioPin::BtnOpen => self.btn_open,
            GpioPin::BtnClose => self.btn_close,
            GpioPin::ProxOutside => self.prox_outside,
            GpioPin::ProxInside => self.prox_inside,
        }
    }

    pub fn set(&mut self, pin: GpioPin, value: i32) {
        let slot = match pin {
            GpioPin::Dir => &mut self.dir,
            GpioPin::Step => &mut self.step,
            GpioPin::Enable => &mut self.enable,
            GpioPin::LimitOpen => &mut self.limit_open,
            GpioPin::LimitClose => &mut self.limit_close,
            GpioPin::Safety => &mut self.safety,
            GpioPin::BtnOpen => &mut self.btn_open,
            GpioPin::BtnClose => &mut self.btn_close,
            GpioPin::ProxOutside => &mut self.prox_outside,
            GpioPin::ProxInside => &mut self.prox_inside,
        };
        *slot = value;
    }

    pub fn iter(&self) -> impl Iterator<Item = (GpioPin, i32)> + '_ {
        GpioPin::ALL.iter().map(move |p| (*p, self.get(*p)))
    }

    /// Pins must be distinct non-negative integers
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for (pin, n) in self.iter() {
            if n < 0 {
                return Err(PawgateError::InvalidConfig(format!(
                    "GPIO pin {} must be non-negative, got {n}",
                    pin.key()
                )));
            }
            if !seen.insert(n) {
                return Err(PawgateError::InvalidConfig(format!(
                    "GPIO pin {n} assigned twice (at {})",
                    pin.key()
                )));
            }
        }
        Ok(())
    }
}

/// One coordinate of the detection zone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneAxis {
    X,
    Y,
    W,
    H,
}

impl FromStr for ZoneAxis {
    type Err = PawgateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "x" => Ok(ZoneAxis::X),
            "y" => Ok(ZoneAxis::Y),
            "w" | "width" => Ok(ZoneAxis::W),
            "h" | "height" => Ok(ZoneAxis::H),
            other => Err(PawgateError::InvalidConfig(format!(
                "unknown zone axis: {other}"
            ))),
        }
    }
}

/// Normalized rectangle of the camera frame considered for detection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionZone {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Default for DetectionZone {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            w: 1.0,
            h: 1.0,
        }
    }
}

impl DetectionZone {
    pub fn set(&mut self, axis: ZoneAxis, value: f64) {
        match axis {
            ZoneAxis::X => self.x = value,
            ZoneAxis::Y => self.y = value,
            ZoneAxis::W => self.w = value,
            ZoneAxis::H => self.h = value,
        }
    }

    /// The rectangle must lie within [0,1]^2
    pub fn validate(&self) -> Result<()> {
        let parts = [self.x, self.y, self.w, self.h];
        if parts.iter().any(|v| !v.is_finite() || *v < 0.0 || *v > 1.0) {
            return Err(PawgateError::InvalidConfig(format!(
                "detection zone components must be within [0,1]: {self:?}"
            )));
        }
        // tolerance for accumulated float error
        if self.x + self.w > 1.0 + 1e-9 || self.y + self.h > 1.0 + 1e-9 {
            return Err(PawgateError::InvalidConfig(format!(
                "detection zone extends past the frame: {self:?}"
            )));
        }
        Ok(())
    }
}

/// Push notification settings forwarded to the controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationConfig {
    pub enabled: bool,
    pub provider: String,
    pub api_key: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: "pushbullet".to_string(),
            api_key: String::new(),
        }
    }
}

/// Full configuration document, the unit of synchronization with the controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DoorConfig {
    pub door_mode: DoorMode,
    /// 1 (slowest) to 5 (fastest)
    pub motor_speed: u8,
    /// Seconds the door stays open before auto-close
    pub hold_open_time: f64,
    pub camera_enabled: bool,
    pub gpio: GpioConfig,
    pub confidence_threshold: f64,
    /// Seconds a detection must persist before opening
    pub grace_period: f64,
    pub camera_index: u32,
    pub detection_zone: DetectionZone,
    pub ai_fallback_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gemini_api_key: Option<String>,
    pub notifications: NotificationConfig,
    // Legacy fields kept for older controllers
    pub time_threshold: f64,
    pub trigger_cooldown: f64,
}

impl Default for DoorConfig {
    fn default() -> Self {
        Self {
            door_mode: DoorMode::Auto,
            motor_speed: 3,
            hold_open_time: 10.0,
            camera_enabled: true,
            gpio: GpioConfig::default(),
            confidence_threshold: 0.5,
            grace_period: 1.5,
            camera_index: 0,
            detection_zone: DetectionZone::default(),
            ai_fallback_enabled: false,
            gemini_api_key: None,
            notifications: NotificationConfig::default(),
            time_threshold: 5.0,
            trigger_cooldown: 15.0,
        }
    }
}

impl DoorConfig {
    pub fn validate(&self) -> Result<()> {
        self.check(None)
    }

    /// Validate only the sections that differ from `previous`, so a violation
    /// already present in the controller's document does not block unrelated edits
    pub fn validate_edit(&self, previous: &DoorConfig) -> Result<()> {
        self.check(Some(previous))
    }

    fn check(&self, previous: Option<&DoorConfig>) -> Result<()> {
        let changed =
            |same: &dyn Fn(&DoorConfig) -> bool| previous.map_or(true, |p| !same(p));
        if changed(&|p| p.gpio == self.gpio) {
            self.gpio.validate()?;
        }
        if changed(&|p| p.detection_zone == self.detection_zone) {
            self.detection_zone.validate()?;
        }
        if changed(&|p| p.motor_speed == self.motor_speed) && !(1..=5).contains(&self.motor_speed)
        {
            return Err(PawgateError::InvalidConfig(format!(
                "motor speed must be 1-5, got {}",
                self.motor_speed
            )));
        }
        if changed(&|p| p.confidence_threshold == self.confidence_threshold)
            && !(0.0..=1.0).contains(&self.confidence_threshold)
        {
            return Err(PawgateError::InvalidConfig(format!(
                "confidence threshold must be within [0,1], got {}",
                self.confidence_threshold
            )));
        }
        if changed(&|p| p.hold_open_time == self.hold_open_time)
            && !non_negative(self.hold_open_time)
        {
            return Err(PawgateError::InvalidConfig(format!(
                "hold-open time must be non-negative, got {}",
                self.hold_open_time
            )));
        }
        if changed(&|p| p.grace_period == self.grace_period) && !non_negative(self.grace_period) {
            return Err(PawgateError::InvalidConfig(format!(
                "grace period must be non-negative, got {}",
                self.grace_period
            )));
        }
        Ok(())
    }
}

fn non_negative(v: f64) -> bool {
    v.is_finite() && v >= 0.0
}

/// Body of `GET /api/status`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StatusReport {
    pub state: SystemState,
    /// Seconds since OPEN was entered
    #[serde(default)]
    pub elapsed_time: f64,
    #[serde(
        default,
        alias = "last_log",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_message: Option<String>,
}

/// Sensors that can be overridden in simulation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorOverride {
    LimitOpen,
    LimitClose,
    Safety,
    ProxOutside,
    ProxInside,
}

impl SensorOverride {
    pub const ALL: [SensorOverride; 5] = [
        SensorOverride::LimitOpen,
        SensorOverride::LimitClose,
        SensorOverride::Safety,
        SensorOverride::ProxOutside,
        SensorOverride::ProxInside,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            SensorOverride::LimitOpen => "limitOpen",
            SensorOverride::LimitClose => "limitClose",
            SensorOverride::Safety => "safety",
            SensorOverride::ProxOutside => "proxOutside",
            SensorOverride::ProxInside => "proxInside",
        }
    }
}

impl FromStr for SensorOverride {
    type Err = PawgateError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = normalize_key(s);
        let alias = match wanted.as_str() {
            "open" => Some(SensorOverride::LimitOpen),
            "close" | "closed" => Some(SensorOverride::LimitClose),
            "outside" => Some(SensorOverride::ProxOutside),
            "inside" => Some(SensorOverride::ProxInside),
            _ => None,
        };
        alias
            .or_else(|| {
                SensorOverride::ALL
                    .iter()
                    .copied()
                    .find(|o| normalize_key(o.key()) == wanted)
            })
            .ok_or_else(|| PawgateError::InvalidConfig(format!("unknown sensor: {s}")))
    }
}

/// Sparse set of sensor overrides; untouched sensors are absent on the wire
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_open: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_close: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safety: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prox_outside: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prox_inside: Option<bool>,
}

impl SensorOverrides {
    pub fn get(&self, sensor: SensorOverride) -> Option<bool> {
        match sensor {
            SensorOverride::LimitOpen => self.limit_open,
            SensorOverride::LimitClose => self.limit_close,
            SensorOverride::Safety => self.safety,
            SensorOverride::ProxOutside => self.prox_outside,
            SensorOverride::ProxInside => self.prox_inside,
        }
    }

    pub fn set(&mut self, sensor: SensorOverride, value: bool) {
        let slot = match sensor {
            SensorOverride::LimitOpen => &mut self.limit_open,
            SensorOverride::LimitClose => &mut self.limit_close,
            SensorOverride::Safety => &mut self.safety,
            SensorOverride::ProxOutside => &mut self.prox_outside,
            SensorOverride::ProxInside => &mut self.prox_inside,
        };
        *slot = Some(value);
    }

    /// Override is present and asserted
    pub fn is_active(&self, sensor: SensorOverride) -> bool {
        self.get(sensor).unwrap_or(false)
    }
}

/// Body of `POST /api/simulate`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationState {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub overrides: SensorOverrides,
}

/// Manual door command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoorCommand {
    Open,
    Close,
}

impl DoorCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            DoorCommand::Open => "open",
            DoorCommand::Close => "close",
        }
    }
}

impl fmt::Display for DoorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of `POST /api/command`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub command: DoorCommand,
}

/// Latest vision-model description of a still frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl AnalysisResult {
    pub fn now(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

fn normalize_key(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
