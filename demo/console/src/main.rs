mod commands;
use commands::{ConsoleCommand, HELP};
use pawgate_core::display;
use pawgate_core::model::GpioPin;
use pawgate_core::vision::GeminiModel;
use pawgate_core::{
    DashboardSession, HttpBackend, PawgateSettings, StateStore, StillImageCamera,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    // Logs go to stderr so they don't interleave with the rendered panel
    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "warn,pawgate_core=info,pawgate_console=info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    // defaults + env + optional TOML overlay
    let settings = PawgateSettings::load();
    info!(
        target = "console",
        backend = %settings.backend.base_url,
        poll_ms = settings.poll_interval_ms,
        "Starting PawGate console"
    );

    let backend = Arc::new(HttpBackend::new(settings.backend.clone())?);
    let vision = Arc::new(GeminiModel::new(settings.vision.clone())?);
    let store = StateStore::default();
    let mut session = DashboardSession::new(backend, vision, store.clone())
        .with_poll_interval(settings.poll_interval());
    if let Some(path) = &settings.camera_image {
        session = session.with_camera(Arc::new(StillImageCamera::new(path)));
    }

    // Re-render on every published change while connected
    let mut rx = store.subscribe();
    let render_task = tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let snapshot = rx.borrow_and_update().clone();
            if snapshot.connected {
                println!("{}\n", display::render(&snapshot));
            }
        }
    });

    println!("PawGate console. Type 'connect' to reach the controller, 'help' for commands.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match commands::parse(&line) {
                    Ok(Some(ConsoleCommand::Quit)) => break,
                    Ok(Some(cmd)) => execute(cmd, &mut session).await,
                    Ok(None) => {}
                    Err(e) => println!("{e}"),
                }
            }
            _ = signal::ctrl_c() => {
                info!(target = "console", "Ctrl-C received; shutting down...");
                break;
            }
        }
    }

    session.disconnect();
    drop(session);
    render_task.abort();
    Ok(())
}

async fn execute(cmd: ConsoleCommand, session: &mut DashboardSession) {
    let edit = match cmd {
        ConsoleCommand::Connect => {
            if let Err(e) = session.connect().await {
                error!(target = "console", error = %e, "Connect failed");
            }
            println!("{}", session.store().read(|s| s.last_log.clone()));
            return;
        }
        ConsoleCommand::Disconnect => {
            session.disconnect();
            println!("Disconnected.");
            return;
        }
        ConsoleCommand::Status => {
            println!("{}", display::render(&session.store().snapshot()));
            return;
        }
        ConsoleCommand::Open => {
            println!("{:?}", session.open().await);
            return;
        }
        ConsoleCommand::Close => {
            println!("{:?}", session.close().await);
            return;
        }
        ConsoleCommand::Analyze => {
            match session.analyze().await {
                Some(text) => println!("AI: {text}"),
                None => println!("Analysis already in progress."),
            }
            return;
        }
        ConsoleCommand::Config => {
            print_config(session);
            return;
        }
        ConsoleCommand::Help => {
            println!("{HELP}");
            return;
        }
        ConsoleCommand::Quit => return,
        ConsoleCommand::SimToggle => {
            report_sim(session.simulation().toggle_enabled().is_some());
            return;
        }
        ConsoleCommand::SimSensor(sensor, on) => {
            report_sim(session.simulation().set_override(sensor, on).is_some());
            return;
        }
        ConsoleCommand::SimFlip(sensor) => {
            report_sim(session.simulation().toggle_override(sensor).is_some());
            return;
        }
        ConsoleCommand::Trigger(sensor) => {
            report_sim(!session.simulation().pulse(sensor).is_empty());
            return;
        }
        ConsoleCommand::Mode(mode) => session.config().set_door_mode(mode),
        ConsoleCommand::Speed(v) => session.config().set_motor_speed(v),
        ConsoleCommand::Hold(v) => session.config().set_hold_open_time(v),
        ConsoleCommand::Confidence(v) => session.config().set_confidence_threshold(v),
        ConsoleCommand::Grace(v) => session.config().set_grace_period(v),
        ConsoleCommand::Camera => session.config().toggle_camera(),
        ConsoleCommand::AiFallback => session.config().toggle_ai_fallback(),
        ConsoleCommand::GeminiKey(k) => session.config().set_gemini_api_key(k),
        ConsoleCommand::Notify => session.config().toggle_notifications(),
        ConsoleCommand::NotifyKey(k) => session.config().set_notification_api_key(k),
        ConsoleCommand::Pin(pin, n) => session.config().set_gpio_pin(pin, n),
        ConsoleCommand::Pins(pins) => session.config().set_gpio_pins(&pins),
        ConsoleCommand::Zone(axis, v) => session.config().set_zone(axis, v),
    };
    match edit {
        Ok(Some(_push)) => println!("Saved."),
        Ok(None) => println!("Saved locally (not connected)."),
        Err(e) => println!("Rejected: {e}"),
    }
}

fn report_sim(sent: bool) {
    if sent {
        println!("Simulation updated.");
    } else {
        println!("Not connected; simulation unchanged.");
    }
}

fn print_config(session: &DashboardSession) {
    let c = session.store().read(|s| s.config.clone());
    let sim = session.simulation().current();
    println!("mode: {}  speed: {}  hold: {}s", c.door_mode, c.motor_speed, c.hold_open_time);
    println!(
        "confidence: {}  grace: {}s  camera: {}  ai-fallback: {}",
        c.confidence_threshold, c.grace_period, c.camera_enabled, c.ai_fallback_enabled
    );
    println!(
        "zone: x={} y={} w={} h={}",
        c.detection_zone.x, c.detection_zone.y, c.detection_zone.w, c.detection_zone.h
    );
    println!(
        "notifications: {} ({})  gemini key: {}",
        if c.notifications.enabled { "on" } else { "off" },
        c.notifications.provider,
        if c.gemini_api_key.as_deref().is_some_and(|k| !k.is_empty()) {
            "set"
        } else {
            "unset"
        }
    );
    let pins: Vec<String> = GpioPin::ALL
        .iter()
        .map(|p| format!("{}={}", p.key(), c.gpio.get(*p)))
        .collect();
    println!("gpio: {}", pins.join(" "));
    println!(
        "simulation: {}  overrides: {:?}",
        if sim.enabled { "ENABLED" } else { "DISABLED" },
        sim.overrides
    );
}
