//! Config synchronization, command gating and the simulation overlay

use super::*;
use pawgate_core::command::RejectReason;
use pawgate_core::model::{DoorMode, GpioPin, SensorOverride, ZoneAxis};
use pawgate_core::CommandOutcome;
use serde_json::json;

async fn connected(backend: &Arc<RecordingBackend>) -> DashboardSession {
    let mut session = session(backend, &CannedVision::new("unused"));
    session.connect().await.unwrap();
    session
}

#[tokio::test]
async fn test_each_edit_pushes_full_document_once() {
    let backend = RecordingBackend::new();
    let session = connected(&backend).await;

    session.config().set_motor_speed(4).unwrap().unwrap().await.unwrap();
    session
        .config()
        .set_zone(ZoneAxis::W, 0.5)
        .unwrap()
        .unwrap()
        .await
        .unwrap();
    session.config().toggle_ai_fallback().unwrap().unwrap().await.unwrap();

    let pushed = backend.pushed_configs.lock().unwrap().clone();
    assert_eq!(pushed.len(), 3);
    assert_eq!(pushed[0].motor_speed, 4);
    assert_eq!(pushed[1].motor_speed, 4);
    assert_eq!(pushed[1].detection_zone.w, 0.5);
    assert!(pushed[2].ai_fallback_enabled);
    assert_eq!(pushed[2], session.store().read(|s| s.config.clone()));
    assert_eq!(session.store().read(|s| s.config_revision), 3);
}

#[tokio::test]
async fn test_invalid_edit_is_rejected_without_push() {
    let backend = RecordingBackend::new();
    let session = connected(&backend).await;

    assert!(session.config().set_motor_speed(9).is_err());
    // pin 21 is already used by the step pin
    assert!(session.config().set_gpio_pin(GpioPin::Dir, 21).is_err());
    assert!(session.config().set_zone(ZoneAxis::W, 0.5).unwrap().is_some());
    assert!(session.config().set_zone(ZoneAxis::X, 0.8).is_err());
    settle().await;

    let s = session.store().snapshot();
    assert_eq!(s.config.motor_speed, 3);
    assert_eq!(s.config.gpio.get(GpioPin::Dir), 20);
    assert_eq!(s.config.detection_zone.w, 0.5);
    assert_eq!(s.config.detection_zone.x, 0.0);
    assert_eq!(backend.pushed_configs.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_controller_violation_does_not_block_unrelated_edits() {
    let backend = RecordingBackend::new();
    {
        // safety shares the dir pin on the controller
        let mut remote = backend.config.lock().unwrap();
        let dir = remote.gpio.get(GpioPin::Dir);
        remote.gpio.set(GpioPin::Safety, dir);
    }
    let session = connected(&backend).await;

    session
        .config()
        .set_door_mode(DoorMode::Locked)
        .unwrap()
        .unwrap()
        .await
        .unwrap();
    let pushed = backend.pushed_configs.lock().unwrap().clone();
    assert_eq!(pushed.len(), 1);
    assert_eq!(pushed[0].door_mode, DoorMode::Locked);

    // touching the pins still requires a clean assignment
    assert!(session.config().set_gpio_pin(GpioPin::BtnOpen, 40).is_err());
    session
        .config()
        .set_gpio_pin(GpioPin::Safety, 13)
        .unwrap()
        .unwrap()
        .await
        .unwrap();
    assert_eq!(backend.pushed_configs.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_two_pins_swap_in_one_push() {
    let backend = RecordingBackend::new();
    let session = connected(&backend).await;

    // one at a time passes through a duplicate
    assert!(session.config().set_gpio_pin(GpioPin::Dir, 21).is_err());
    session
        .config()
        .set_gpio_pins(&[(GpioPin::Dir, 21), (GpioPin::Step, 20)])
        .unwrap()
        .unwrap()
        .await
        .unwrap();

    let pushed = backend.pushed_configs.lock().unwrap().clone();
    assert_eq!(pushed.len(), 1);
    assert_eq!(pushed[0].gpio.get(GpioPin::Dir), 21);
    assert_eq!(pushed[0].gpio.get(GpioPin::Step), 20);
}

#[tokio::test]
async fn test_failed_push_keeps_local_value() {
    let backend = RecordingBackend::new();
    let session = connected(&backend).await;
    backend.fail_push.store(true, Ordering::SeqCst);

    session
        .config()
        .set_hold_open_time(20.0)
        .unwrap()
        .unwrap()
        .await
        .unwrap();

    let s = session.store().snapshot();
    assert_eq!(s.config.hold_open_time, 20.0);
    assert_eq!(s.last_log, "[ERR] Failed to save settings to Pi");
}

#[tokio::test]
async fn test_manual_command_is_sent_and_logged() {
    let backend = RecordingBackend::new();
    let session = connected(&backend).await;

    assert_eq!(session.open().await, CommandOutcome::Sent);
    assert_eq!(
        session.store().read(|s| s.last_log.clone()),
        "[CMD] Manual OPEN Sent"
    );
    assert_eq!(*backend.commands.lock().unwrap(), vec![DoorCommand::Open]);

    backend.fail_command.store(true, Ordering::SeqCst);
    assert!(matches!(session.close().await, CommandOutcome::Failed(_)));
    assert_eq!(
        session.store().read(|s| s.last_log.clone()),
        "[ERR] Failed to send command"
    );
    assert!(!session.store().read(|s| s.commanding));
}

#[tokio::test]
async fn test_locked_mode_makes_close_a_no_op() {
    let backend = RecordingBackend::new();
    backend.set_status(SystemState::Opening, 0.0);
    let session = connected(&backend).await;
    settle().await;

    session
        .config()
        .set_door_mode(DoorMode::Locked)
        .unwrap()
        .unwrap()
        .await
        .unwrap();
    // the controller still reports OPENING
    assert_eq!(session.store().read(|s| s.system_state()), SystemState::Opening);
    assert_eq!(
        session.close().await,
        CommandOutcome::Rejected(RejectReason::Locked)
    );
    assert!(backend.commands.lock().unwrap().is_empty());

    // mode can still be changed back while locked
    assert!(session.config().set_door_mode(DoorMode::Auto).is_ok());
}

#[tokio::test]
async fn test_locked_status_blocks_commands() {
    let backend = RecordingBackend::new();
    backend.set_status(SystemState::Locked, 0.0);
    let session = connected(&backend).await;
    settle().await;

    assert_eq!(
        session.open().await,
        CommandOutcome::Rejected(RejectReason::Locked)
    );
    assert!(backend.commands.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_second_command_is_dropped_while_first_is_pending() {
    let backend = RecordingBackend::new();
    *backend.command_delay.lock().unwrap() = Duration::from_millis(100);
    let session = connected(&backend).await;

    let (first, second) = tokio::join!(session.open(), session.close());
    assert_eq!(first, CommandOutcome::Sent);
    assert_eq!(second, CommandOutcome::Busy);
    assert_eq!(*backend.commands.lock().unwrap(), vec![DoorCommand::Open]);

    // latch is released afterwards
    assert_eq!(session.close().await, CommandOutcome::Sent);
}

#[tokio::test]
async fn test_safety_override_round_trip() {
    let backend = RecordingBackend::new();
    let session = connected(&backend).await;
    let sim = session.simulation();

    sim.toggle_enabled().unwrap().await.unwrap();
    sim.set_override(SensorOverride::Safety, true)
        .unwrap()
        .await
        .unwrap();
    sim.set_override(SensorOverride::Safety, false)
        .unwrap()
        .await
        .unwrap();

    let sims = backend.sims.lock().unwrap().clone();
    assert_eq!(sims.len(), 3);
    assert_eq!(
        serde_json::to_value(&sims[1]).unwrap(),
        json!({"enabled": true, "overrides": {"safety": true}})
    );
    assert_eq!(
        serde_json::to_value(&sims[2]).unwrap(),
        json!({"enabled": true, "overrides": {"safety": false}})
    );
    assert_eq!(sim.current(), sims[2]);
}

#[tokio::test]
async fn test_proximity_pulse_pushes_press_and_release() {
    let backend = RecordingBackend::new();
    let session = connected(&backend).await;

    for h in session.simulation().pulse(SensorOverride::ProxOutside) {
        h.await.unwrap();
    }
    let sims = backend.sims.lock().unwrap().clone();
    assert_eq!(sims.len(), 2);
    let mut seen: Vec<_> = sims.iter().map(|s| s.overrides.prox_outside).collect();
    seen.sort();
    assert_eq!(seen, vec![Some(false), Some(true)]);
    assert_eq!(
        session.simulation().current().overrides.prox_outside,
        Some(false)
    );
}

#[tokio::test]
async fn test_override_toggle_flips_and_pushes() {
    let backend = RecordingBackend::new();
    let session = connected(&backend).await;
    let sim = session.simulation();

    sim.toggle_override(SensorOverride::LimitOpen)
        .unwrap()
        .await
        .unwrap();
    assert_eq!(sim.current().overrides.limit_open, Some(true));
    sim.toggle_override(SensorOverride::LimitOpen)
        .unwrap()
        .await
        .unwrap();
    assert_eq!(sim.current().overrides.limit_open, Some(false));
    assert_eq!(backend.sims.lock().unwrap().len(), 2);
}
