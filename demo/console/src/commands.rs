use pawgate_core::model::{DoorMode, GpioPin, SensorOverride, ZoneAxis};
use std::str::FromStr;

pub const HELP: &str = "\
commands:
  connect | disconnect | status | config
  open | close
  mode <auto|manual|locked>   speed <1-5>   hold <secs>
  confidence <0-1>            grace <secs>
  camera | ai-fallback | notify          (toggles)
  gemini-key <key>            notify-key <key>
  pin <name> <n>              pins <name>=<n> ...
  zone <x|y|w|h> <v>
  sim                         sim <sensor> [on|off]
  trigger <outside|inside>    analyze
  help | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Connect,
    Disconnect,
    Status,
    Open,
    Close,
    Mode(DoorMode),
    Speed(u8),
    Hold(f64),
    Confidence(f64),
    Grace(f64),
    Camera,
    AiFallback,
    GeminiKey(String),
    Notify,
    NotifyKey(String),
    Pin(GpioPin, i32),
    Pins(Vec<(GpioPin, i32)>),
    Zone(ZoneAxis, f64),
    SimToggle,
    SimSensor(SensorOverride, bool),
    SimFlip(SensorOverride),
    Trigger(SensorOverride),
    Analyze,
    Config,
    Help,
    Quit,
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ParseError {
    #[error("unknown command '{0}' (try 'help')")]
    Unknown(String),
    #[error("'{0}' needs an argument")]
    MissingArg(&'static str),
    #[error("bad value for '{cmd}': {value}")]
    BadArg { cmd: &'static str, value: String },
}

/// Parse one input line; blank lines yield `None`
pub fn parse(line: &str) -> Result<Option<ConsoleCommand>, ParseError> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();
    let cmd = match head.to_ascii_lowercase().as_str() {
        "connect" => ConsoleCommand::Connect,
        "disconnect" => ConsoleCommand::Disconnect,
        "status" => ConsoleCommand::Status,
        "open" => ConsoleCommand::Open,
        "close" => ConsoleCommand::Close,
        "mode" => ConsoleCommand::Mode(value("mode", &args, 0)?),
        "speed" => ConsoleCommand::Speed(value("speed", &args, 0)?),
        "hold" => ConsoleCommand::Hold(value("hold", &args, 0)?),
        "confidence" => ConsoleCommand::Confidence(value("confidence", &args, 0)?),
        "grace" => ConsoleCommand::Grace(value("grace", &args, 0)?),
        "camera" => ConsoleCommand::Camera,
        "ai-fallback" => ConsoleCommand::AiFallback,
        "gemini-key" => ConsoleCommand::GeminiKey(rest("gemini-key", &args)?),
        "notify" => ConsoleCommand::Notify,
        "notify-key" => ConsoleCommand::NotifyKey(rest("notify-key", &args)?),
        "pin" => ConsoleCommand::Pin(value("pin", &args, 0)?, value("pin", &args, 1)?),
        "pins" => ConsoleCommand::Pins(assignments("pins", &args)?),
        "zone" => ConsoleCommand::Zone(value("zone", &args, 0)?, value("zone", &args, 1)?),
        "sim" if args.is_empty() => ConsoleCommand::SimToggle,
        "sim" if args.len() == 1 => ConsoleCommand::SimFlip(value("sim", &args, 0)?),
        "sim" => ConsoleCommand::SimSensor(value("sim", &args, 0)?, on_off("sim", &args, 1)?),
        "trigger" => match arg("trigger", &args, 0)?.to_ascii_lowercase().as_str() {
            "outside" => ConsoleCommand::Trigger(SensorOverride::ProxOutside),
            "inside" => ConsoleCommand::Trigger(SensorOverride::ProxInside),
            other => {
                return Err(ParseError::BadArg {
                    cmd: "trigger",
                    value: other.to_string(),
                })
            }
        },
        "analyze" => ConsoleCommand::Analyze,
        "config" => ConsoleCommand::Config,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => return Err(ParseError::Unknown(other.to_string())),
    };
    Ok(Some(cmd))
}

fn arg<'a>(cmd: &'static str, args: &[&'a str], i: usize) -> Result<&'a str, ParseError> {
    args.get(i).copied().ok_or(ParseError::MissingArg(cmd))
}

fn value<T: FromStr>(cmd: &'static str, args: &[&str], i: usize) -> Result<T, ParseError> {
    let raw = arg(cmd, args, i)?;
    raw.parse().map_err(|_| ParseError::BadArg {
        cmd,
        value: raw.to_string(),
    })
}

fn on_off(cmd: &'static str, args: &[&str], i: usize) -> Result<bool, ParseError> {
    match arg(cmd, args, i)?.to_ascii_lowercase().as_str() {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        other => Err(ParseError::BadArg {
            cmd,
            value: other.to_string(),
        }),
    }
}

/// `name=n` pairs, at least one
fn assignments(cmd: &'static str, args: &[&str]) -> Result<Vec<(GpioPin, i32)>, ParseError> {
    if args.is_empty() {
        return Err(ParseError::MissingArg(cmd));
    }
    args.iter()
        .map(|pair| -> Result<(GpioPin, i32), ParseError> {
            let bad = || ParseError::BadArg {
                cmd,
                value: pair.to_string(),
            };
            let (name, n) = pair.split_once('=').ok_or_else(bad)?;
            let pin: GpioPin = name.parse().map_err(|_| bad())?;
            let n: i32 = n.parse().map_err(|_| bad())?;
            Ok((pin, n))
        })
        .collect()
}

fn rest(cmd: &'static str, args: &[&str]) -> Result<String, ParseError> {
    if args.is_empty() {
        return Err(ParseError::MissingArg(cmd));
    }
    Ok(args.join(" "))
}
