//! Threaded components end to end: sensor station → average/status, and
//! fan commands → devices worker → actuator.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use crate::mock_hw::{ActuatorCall, RecordingActuator, ScriptedSensor, wait_until};

use fancontrol::app::ports::WindowMotion;
use fancontrol::app::status::Status;
use fancontrol::average::WindowedAverage;
use fancontrol::board::MessageBoard;
use fancontrol::board::message::{
    DeviceCommand, FanState, Message, TimeTick, Topic,
};
use fancontrol::clock::{Clock, ManualClock};
use fancontrol::component::ThreadManager;
use fancontrol::drivers::devices::{DeviceSettings, Devices};
use fancontrol::error::SensorError;
use fancontrol::sensors::station::SensorStation;

struct Rig {
    board: Arc<MessageBoard>,
    clock: Arc<ManualClock>,
    manager: ThreadManager,
}

fn rig() -> Rig {
    let board = Arc::new(MessageBoard::new());
    let manager = ThreadManager::new(Arc::clone(&board), || {}).unwrap();
    Rig {
        board,
        clock: Arc::new(ManualClock::new(100.0)),
        manager,
    }
}

impl Rig {
    fn shared_clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock) as Arc<dyn Clock>
    }

    fn tick(&self) {
        self.board.post(Message::Time(TimeTick {
            uptime: self.clock.uptime(),
            wall_clock: self.clock.wall_clock(),
        }));
    }
}

// ── Sensor station ────────────────────────────────────────────

#[test]
fn measurement_reaches_average_and_status() {
    let rig = rig();
    let average = WindowedAverage::new(100, rig.shared_clock())
        .component(Arc::clone(&rig.board))
        .enter()
        .unwrap();
    let _status = Status::new()
        .component(Arc::clone(&rig.board))
        .enter()
        .unwrap();
    let station = SensorStation::new(
        Box::new(ScriptedSensor::steady(20.0, 70.0)),
        Box::new(ScriptedSensor::steady(25.0, 40.0)),
        rig.shared_clock(),
        10,
    )
    .enter(Arc::clone(&rig.board), &rig.manager)
    .unwrap();

    rig.tick();
    assert!(wait_until(|| average.state().history().len() == 1));

    let Some(Message::Measurement(m)) = rig.board.query(Topic::Measurement) else {
        panic!("no measurement posted");
    };
    assert!((m.uptime - 100.0).abs() < 1e-9);
    assert!(!m.indoor.error && !m.outdoor.error);
    assert!((m.indoor.temperature - 20.0).abs() < 1e-9);
    assert!((m.outdoor.humidity - 40.0).abs() < 1e-9);

    match rig.board.query(Topic::Status) {
        Some(Message::Status(status)) => assert_eq!(status.text, "Measuring."),
        other => panic!("unexpected status {other:?}"),
    }

    rig.board.post(Message::ExitThread);
    station.stop();
    assert!(!station.is_alive());
    assert_eq!(rig.manager.worker_names(), vec!["sensor".to_string()]);
}

#[test]
fn failed_read_is_flagged_and_sensor_reset() {
    let rig = rig();
    let _status = Status::new()
        .component(Arc::clone(&rig.board))
        .enter()
        .unwrap();
    let indoor = ScriptedSensor::steady(20.0, 70.0).failing_first(1, SensorError::CommFailure);
    let resets = indoor.resets();
    let _station = SensorStation::new(
        Box::new(indoor),
        Box::new(ScriptedSensor::steady(25.0, 40.0)),
        rig.shared_clock(),
        10,
    )
    .enter(Arc::clone(&rig.board), &rig.manager)
    .unwrap();

    rig.tick();
    assert!(wait_until(|| rig.board.query(Topic::HtmlStatus).is_some()));

    let Some(Message::Measurement(m)) = rig.board.query(Topic::Measurement) else {
        panic!("no measurement posted");
    };
    assert!(m.indoor.error);
    assert!(m.indoor.temperature.is_nan());
    assert!(!m.outdoor.error);
    assert_eq!(resets.load(Ordering::SeqCst), 1);

    // The display shows "Measuring." until it reports the frame as drawn.
    rig.board.post(Message::StatusProcessed);
    match rig.board.query(Topic::Status) {
        Some(Message::Status(status)) => assert_eq!(status.text, "Sensor error."),
        other => panic!("unexpected status {other:?}"),
    }
    match rig.board.query(Topic::HtmlStatus) {
        Some(Message::HtmlStatus(html)) => {
            assert_eq!(html.text, "Sensor error.");
            assert_eq!(html.style, "color:red");
        }
        other => panic!("unexpected html status {other:?}"),
    }
}

// ── Devices ───────────────────────────────────────────────────

#[test]
fn devices_close_on_start_follow_commands_and_close_on_exit() {
    let rig = rig();
    let actuator = RecordingActuator::new();
    let devices = Devices::new(
        Box::new(actuator.clone()),
        rig.shared_clock(),
        DeviceSettings {
            window_travel_secs: 2.0,
            ..DeviceSettings::default()
        },
    )
    .enter(Arc::clone(&rig.board), &rig.manager)
    .unwrap();

    assert!(wait_until(|| actuator.calls().len() == 3));
    assert_eq!(
        actuator.calls(),
        vec![
            ActuatorCall::SetFan(false),
            ActuatorCall::DriveWindow(WindowMotion::Closing),
            ActuatorCall::DriveWindow(WindowMotion::Stopped),
        ]
    );

    rig.board.post(Message::Devices(DeviceCommand::VentilationOn));
    assert!(wait_until(|| actuator.fan_on()));
    assert_eq!(
        actuator.calls()[3..],
        [
            ActuatorCall::DriveWindow(WindowMotion::Opening),
            ActuatorCall::DriveWindow(WindowMotion::Stopped),
            ActuatorCall::SetFan(true),
        ]
    );
    assert_eq!(
        rig.board.query(Topic::FanState),
        Some(Message::FanState(FanState::FanOn))
    );

    drop(devices);

    let calls = actuator.calls();
    assert_eq!(
        calls[calls.len() - 4..],
        [
            ActuatorCall::SetFan(false),
            ActuatorCall::DriveWindow(WindowMotion::Closing),
            ActuatorCall::DriveWindow(WindowMotion::Stopped),
            ActuatorCall::AllOff,
        ]
    );
    assert!(!actuator.fan_on());
    assert_eq!(actuator.motor(), WindowMotion::Stopped);
    assert!(rig.board.exit_requested());
}

#[test]
fn devices_without_close_on_exit_only_switch_off() {
    let rig = rig();
    let actuator = RecordingActuator::new();
    let devices = Devices::new(
        Box::new(actuator.clone()),
        rig.shared_clock(),
        DeviceSettings {
            window_travel_secs: 2.0,
            close_window_on_start: false,
            close_window_on_exit: false,
        },
    )
    .enter(Arc::clone(&rig.board), &rig.manager)
    .unwrap();

    rig.board.post(Message::Devices(DeviceCommand::FanOn));
    assert!(wait_until(|| actuator.fan_on()));
    drop(devices);

    assert_eq!(
        actuator.calls(),
        vec![ActuatorCall::SetFan(true), ActuatorCall::AllOff]
    );
}
