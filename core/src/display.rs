// Status presentation helpers
//
// Pure functions from a state snapshot to the strings the dashboard renders.

use crate::model::SystemState;
use crate::state::DashboardState;

pub const DEGRADED_BANNER: &str = "Lost connection to Backend... Retrying...";
pub const LOCKED_BANNER: &str = "SYSTEM LOCKED - MANUAL CONTROLS DISABLED";
pub const VIDEO_OFFLINE: &str = "Camera Feed Offline";

/// Door status tile text
pub fn door_label(state: SystemState) -> &'static str {
    match state {
        SystemState::Opening => "OPENING...",
        SystemState::Closing => "CLOSING...",
        SystemState::Open => "OPEN",
        SystemState::Closed | SystemState::Idle => "CLOSED",
        SystemState::Locked => "LOCKED",
        SystemState::Obstructed => "OBSTRUCTION!",
        SystemState::Detecting => "DETECTING",
    }
}

/// Detection tile text
pub fn detection_label(state: SystemState) -> &'static str {
    if state == SystemState::Detecting {
        "DOG DETECTED"
    } else {
        "AREA CLEAR"
    }
}

/// Auto-close countdown or motor activity; empty otherwise
pub fn info_line(state: SystemState, elapsed: f64, hold_open_time: f64) -> String {
    match state {
        SystemState::Open => format!("Closing in: {:.1}s", hold_open_time - elapsed),
        s if s.is_moving() => "Motor Running...".to_string(),
        _ => String::new(),
    }
}

/// Indicators shown when the camera is disabled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorPanel {
    pub open_limit: bool,
    pub safety: bool,
    pub close_limit: bool,
}

pub fn sensor_panel(s: &DashboardState) -> SensorPanel {
    SensorPanel {
        open_limit: s.system_state() == SystemState::Open,
        safety: s.simulation.overrides.safety.unwrap_or(false),
        close_limit: s.system_state() == SystemState::Closed,
    }
}

/// Banners in display order
pub fn banners(s: &DashboardState) -> Vec<&'static str> {
    let mut out = Vec::new();
    if s.connected && s.degraded {
        out.push(DEGRADED_BANNER);
    }
    if s.is_locked() {
        out.push(LOCKED_BANNER);
    }
    out
}

/// Multi-line text rendering of the whole dashboard
pub fn render(s: &DashboardState) -> String {
    let mut lines = Vec::new();
    let state = s.system_state();
    lines.push(format!(
        "[{}] door: {:<13} detection: {}",
        if s.connected { "CONNECTED" } else { "OFFLINE" },
        door_label(state),
        detection_label(state)
    ));
    let info = info_line(state, s.status.elapsed_time, s.config.hold_open_time);
    if !info.is_empty() {
        lines.push(format!("  {info}"));
    }
    for b in banners(s) {
        lines.push(format!("  !! {b}"));
    }
    if !s.config.camera_enabled {
        let p = sensor_panel(s);
        lines.push(format!(
            "  sensors: OPEN LIMIT [{}]  SAFETY [{}]  CLOSE LIMIT [{}]",
            lamp(p.open_limit),
            lamp(p.safety),
            lamp(p.close_limit)
        ));
    } else if let Some(msg) = &s.camera_message {
        lines.push(format!("  camera: {msg}"));
    } else if s.connected && s.video_error {
        lines.push(format!("  camera: {VIDEO_OFFLINE}"));
    }
    if s.config.camera_enabled {
        if let Some(a) = &s.analysis {
            lines.push(format!(
                "  analysis ({}): {}",
                a.timestamp.format("%H:%M:%S"),
                a.text
            ));
        }
    }
    lines.push(format!(
        "  mode: {}  speed: {}  hold: {}s  sim: {}",
        s.config.door_mode,
        s.config.motor_speed,
        s.config.hold_open_time,
        if s.simulation.enabled { "ENABLED" } else { "DISABLED" }
    ));
    lines.push(format!("  log: {}", s.last_log));
    lines.join("\n")
}

fn lamp(on: bool) -> char {
    if on {
        '*'
    } else {
        ' '
    }
}
