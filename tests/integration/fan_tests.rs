//! Fan logic against the real windowed average, driven through the board.
//!
//! No worker threads: measurements and ticks are posted from the test
//! thread, and the `Devices` commands the fan logic emits are recorded.

use std::sync::Arc;

use fancontrol::app::fan::FanLogic;
use fancontrol::app::status::Status;
use fancontrol::average::WindowedAverage;
use fancontrol::board::MessageBoard;
use fancontrol::board::message::{DeviceCommand, Measurement, Message, Mode, TimeTick, Topic};
use fancontrol::board::subscriber::Subscriber;
use fancontrol::clock::{Clock, ManualClock};
use fancontrol::component::ActiveComponent;
use fancontrol::sensors::SensorData;
use parking_lot::Mutex;

struct Rig {
    board: Arc<MessageBoard>,
    clock: Arc<ManualClock>,
    fan: ActiveComponent<FanLogic>,
    _average: Option<ActiveComponent<WindowedAverage>>,
    commands: Arc<Mutex<Vec<DeviceCommand>>>,
    _watcher: Subscriber,
}

impl Rig {
    fn new(with_average: bool) -> Self {
        let board = Arc::new(MessageBoard::new());
        let clock = Arc::new(ManualClock::new(0.0));

        let average = with_average.then(|| {
            let shared: Arc<dyn Clock> = Arc::clone(&clock) as Arc<dyn Clock>;
            WindowedAverage::new(1000, shared)
                .component(Arc::clone(&board))
                .enter()
                .unwrap()
        });
        let fan = FanLogic::new(1200.0)
            .component(Arc::clone(&board))
            .enter()
            .unwrap();

        let watcher = Subscriber::new("devices recorder");
        let commands = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&commands);
        board
            .subscribe(Topic::Devices, &watcher, move |_, message| {
                if let Message::Devices(command) = message {
                    sink.lock().push(*command);
                }
                Ok(None)
            })
            .unwrap();

        Self {
            board,
            clock,
            fan,
            _average: average,
            commands,
            _watcher: watcher,
        }
    }

    /// One sample per second over `[from, to]`, clock left at `to`.
    fn feed(&self, from: u32, to: u32, indoor: (f64, f64), outdoor: (f64, f64)) {
        for t in from..=to {
            let uptime = f64::from(t);
            self.clock.set(uptime);
            self.board.post(Message::Measurement(Measurement {
                uptime,
                indoor: SensorData::reading(indoor.0, indoor.1),
                outdoor: SensorData::reading(outdoor.0, outdoor.1),
            }));
        }
    }

    fn tick(&self, uptime: f64) {
        self.clock.set(uptime);
        self.board.post(Message::Time(TimeTick {
            uptime,
            wall_clock: self.clock.wall_clock(),
        }));
    }

    fn comment(&self) -> Option<String> {
        match self.board.query(Topic::FanComment) {
            Some(Message::FanComment(text)) => Some(text),
            _ => None,
        }
    }

    fn commands(&self) -> Vec<DeviceCommand> {
        self.commands.lock().clone()
    }
}

// ── Decisions ─────────────────────────────────────────────────

#[test]
fn warm_dry_outside_starts_permanent_ventilation() {
    let rig = Rig::new(true);
    rig.feed(0, 99, (20.0, 70.0), (25.0, 40.0));
    rig.tick(99.0);

    assert_eq!(rig.commands(), vec![DeviceCommand::VentilationOn]);
    assert_eq!(
        rig.comment().as_deref(),
        Some("Permanent ventilation: warm and dry outside.")
    );
    assert_eq!(rig.fan.state().is_on(), Some(true));
}

#[test]
fn humid_outside_keeps_ventilation_off_without_repeating_commands() {
    let rig = Rig::new(true);
    rig.feed(0, 99, (20.0, 50.0), (15.0, 95.0));
    for t in 99..110 {
        rig.tick(f64::from(t));
    }

    assert_eq!(rig.commands(), vec![DeviceCommand::VentilationOff]);
    assert_eq!(rig.comment().as_deref(), Some("High outside dew point."));
}

#[test]
fn cold_outside_waits_out_the_wait_period() {
    let rig = Rig::new(true);
    rig.feed(0, 99, (20.0, 60.0), (5.0, 60.0));
    rig.tick(99.0);

    assert_eq!(rig.commands(), vec![DeviceCommand::VentilationOff]);
    assert_eq!(
        rig.comment().as_deref(),
        Some("Wait period: 77 min (77 min remaining).")
    );
    match rig.board.query(Topic::WaitPeriod) {
        Some(Message::WaitPeriod(secs)) => assert!((secs - 4639.4).abs() < 0.5, "{secs}"),
        other => panic!("unexpected wait period {other:?}"),
    }
}

#[test]
fn selecting_auto_mode_ventilates_at_once() {
    let rig = Rig::new(true);
    rig.board.post(Message::Mode(Mode::Auto));
    rig.feed(0, 99, (20.0, 60.0), (5.0, 60.0));
    rig.tick(99.0);

    assert_eq!(rig.commands(), vec![DeviceCommand::VentilationOn]);
    assert_eq!(
        rig.comment().as_deref(),
        Some("Wait period: 77 min (0 min remaining).")
    );
    assert_eq!(
        rig.board.query(Topic::RemainingWaitPeriod),
        Some(Message::RemainingWaitPeriod(0.0))
    );

    // Inside the ventilation period the fan stays on.
    rig.tick(130.0);
    assert_eq!(rig.commands(), vec![DeviceCommand::VentilationOn]);
    assert_eq!(
        rig.comment().as_deref(),
        Some("Remaining ventilation period: 19 min.")
    );
}

#[test]
fn cold_room_is_not_ventilated() {
    let rig = Rig::new(true);
    rig.feed(0, 99, (8.0, 80.0), (2.0, 40.0));
    rig.tick(99.0);

    assert_eq!(rig.commands(), vec![DeviceCommand::VentilationOff]);
    assert_eq!(rig.comment().as_deref(), Some("Low room temperature."));
}

#[test]
fn sparse_history_is_reported_as_insufficient() {
    let rig = Rig::new(true);
    // 10 samples: enough for the 60 s window, not for the 600 s window.
    rig.feed(90, 99, (20.0, 70.0), (25.0, 40.0));
    rig.tick(99.0);

    assert_eq!(rig.commands(), vec![DeviceCommand::VentilationOff]);
    assert_eq!(
        rig.comment().as_deref(),
        Some("Not enough samples for average.")
    );
}

#[test]
fn missing_average_responder_is_an_error() {
    let rig = Rig::new(false);
    rig.tick(99.0);

    assert_eq!(rig.commands(), vec![DeviceCommand::VentilationOff]);
    assert_eq!(rig.comment().as_deref(), Some("Error!"));
}

#[test]
fn manual_mode_leaves_devices_alone() {
    let rig = Rig::new(true);
    rig.board.post(Message::Mode(Mode::Manual));
    rig.feed(0, 99, (20.0, 70.0), (25.0, 40.0));
    rig.tick(99.0);

    assert!(rig.commands().is_empty());
    assert_eq!(rig.fan.state().mode(), Some(Mode::Manual));
    assert_eq!(rig.fan.state().is_on(), None);
}

// ── Status ────────────────────────────────────────────────────

#[test]
fn fan_comment_reaches_web_status() {
    let rig = Rig::new(true);
    let _status = Status::new()
        .component(Arc::clone(&rig.board))
        .enter()
        .unwrap();
    rig.board.post(Message::TimeSync("system clock".into()));

    rig.feed(0, 99, (20.0, 70.0), (25.0, 40.0));
    rig.tick(99.0);
    rig.feed(100, 100, (20.0, 70.0), (25.0, 40.0));

    match rig.board.query(Topic::HtmlStatus) {
        Some(Message::HtmlStatus(html)) => {
            assert_eq!(
                html.text,
                "Status: OK. Permanent ventilation: warm and dry outside."
            );
            assert_eq!(html.last_sync.as_deref(), Some("system clock"));
        }
        other => panic!("unexpected html status {other:?}"),
    }
}
