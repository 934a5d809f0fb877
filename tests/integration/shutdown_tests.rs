//! Ways the system comes down: user shutdown, a dead worker, a faulting
//! callback.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::anyhow;

use crate::mock_hw::{RecordingActuator, ScriptedSensor, wait_until};

use fancontrol::app::control::ControlLoop;
use fancontrol::board::MessageBoard;
use fancontrol::board::message::{Message, Topic};
use fancontrol::board::subscriber::Subscriber;
use fancontrol::clock::{Clock, ManualClock};
use fancontrol::component::{ThreadManager, ThreadedComponent};
use fancontrol::drivers::devices::{DeviceSettings, Devices};
use fancontrol::sensors::station::SensorStation;

#[test]
fn user_shutdown_joins_every_worker_then_runs_teardown() {
    let board = Arc::new(MessageBoard::new());
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(100.0));
    let torn_down = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&torn_down);
    let manager = ThreadManager::new(Arc::clone(&board), move || {
        flag.store(true, Ordering::SeqCst);
    })
    .unwrap();

    let station = SensorStation::new(
        Box::new(ScriptedSensor::steady(20.0, 60.0)),
        Box::new(ScriptedSensor::steady(5.0, 80.0)),
        Arc::clone(&clock),
        10,
    )
    .enter(Arc::clone(&board), &manager)
    .unwrap();
    let actuator = RecordingActuator::new();
    let devices = Devices::new(
        Box::new(actuator.clone()),
        Arc::clone(&clock),
        DeviceSettings {
            window_travel_secs: 1.0,
            ..DeviceSettings::default()
        },
    )
    .enter(Arc::clone(&board), &manager)
    .unwrap();
    assert!(manager.all_alive());

    board.post(Message::Shutdown);

    assert!(torn_down.load(Ordering::SeqCst));
    assert!(board.exit_requested());
    assert!(!station.is_alive());
    assert!(!devices.is_alive());
    assert!(!manager.all_alive());
    assert!(!actuator.fan_on());
}

#[test]
fn control_loop_ends_when_a_worker_dies() {
    let board = Arc::new(MessageBoard::new());
    let clock = ManualClock::new(0.0);
    let manager = ThreadManager::new(Arc::clone(&board), || {}).unwrap();

    let flaky = ThreadedComponent::new("flaky", Arc::clone(&board), ())
        .enter(&manager, |_| Err(anyhow!("sensor bus gone")))
        .unwrap();
    assert!(wait_until(|| !flaky.is_alive()));

    let result = ControlLoop::new(&board, &clock, &manager, 1.0).run();

    assert!(result.is_ok());
    assert!(board.exit_requested());
    assert!(board.query(Topic::Time).is_some());
}

#[test]
fn control_loop_fails_on_callback_fault() {
    let board = Arc::new(MessageBoard::new());
    let clock = ManualClock::new(0.0);
    let manager = ThreadManager::new(Arc::clone(&board), || {}).unwrap();

    let broken = Subscriber::new("broken");
    board
        .subscribe(Topic::Time, &broken, |_, _| Err(anyhow!("boom")))
        .unwrap();

    let err = ControlLoop::new(&board, &clock, &manager, 1.0)
        .run()
        .unwrap_err();

    assert!(
        err.to_string().contains("Time callback of 'broken' failed: boom"),
        "{err}"
    );
    assert!(matches!(board.query(Topic::Fault), Some(Message::Fault(_))));
    // One tick only: the fault is seen before the second `Time`.
    assert!(clock.uptime() < 1.5);
}
