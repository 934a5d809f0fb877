//! Sensor station: the threaded component that samples both channels.
//!
//! ```text
//!   Time tick ──▶ on_time ──(every N s)──▶ Trigger ──▶ worker
//!                                                      │ wait to T+0.25 s
//!                                                      │ read indoor, outdoor
//!                                                      ▼
//!                                               post Measurement
//! ```
//!
//! The read is started a quarter second after the full wall-clock second to
//! stay clear of the time-signal receiver's pulse edges.

use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use log::{info, warn};

use crate::app::ports::SensorPort;
use crate::board::MessageBoard;
use crate::board::message::{Measurement, Message, Topic};
use crate::clock::{Clock, delay};
use crate::component::{ActiveThreadedComponent, ThreadManager, ThreadedComponent, Trigger, Worker};
use crate::sensors::SensorData;

/// Longest tolerated gap between two measurements.
pub const MAX_GAP_SECS: f64 = 10.5;

const POLL: Duration = Duration::from_secs(1);

/// Measurement schedule, driven by `Time` ticks.
#[derive(Debug)]
pub struct Schedule {
    /// Uptime of the latest tick.
    pub uptime: f64,
    pub last_measurement: f64,
    interval: u64,
    trigger: Arc<Trigger>,
}

impl Schedule {
    fn on_time(&mut self, uptime: f64) {
        self.uptime = uptime;
        let overdue = uptime > self.last_measurement + MAX_GAP_SECS;
        if overdue {
            warn!(
                "Interval between measurements > {MAX_GAP_SECS}s: {:.3}, {:.3}.",
                self.last_measurement, uptime
            );
        }
        if (uptime as u64) % self.interval == 0 || overdue {
            self.last_measurement = uptime;
            self.trigger.set();
        }
    }
}

pub struct SensorStation {
    indoor: Box<dyn SensorPort>,
    outdoor: Box<dyn SensorPort>,
    clock: Arc<dyn Clock>,
    interval: u64,
}

impl SensorStation {
    pub fn new(
        indoor: Box<dyn SensorPort>,
        outdoor: Box<dyn SensorPort>,
        clock: Arc<dyn Clock>,
        measure_interval_secs: u64,
    ) -> Self {
        Self {
            indoor,
            outdoor,
            clock,
            interval: measure_interval_secs.max(1),
        }
    }

    pub fn enter(
        self,
        board: Arc<MessageBoard>,
        manager: &ThreadManager,
    ) -> anyhow::Result<ActiveThreadedComponent<Schedule>> {
        let Self {
            mut indoor,
            mut outdoor,
            clock,
            interval,
        } = self;
        let trigger = Arc::new(Trigger::new());
        let now = clock.uptime();
        let schedule = Schedule {
            uptime: now,
            last_measurement: now,
            interval,
            trigger: Arc::clone(&trigger),
        };

        ThreadedComponent::new("sensor", board, schedule)
            .on(Topic::Time, |schedule, _, message| {
                if let Message::Time(tick) = message {
                    schedule.on_time(tick.uptime);
                }
                Ok(None)
            })
            .enter(manager, move |worker: Worker<Schedule>| {
                while !worker.exit_requested() {
                    if !trigger.wait(POLL) {
                        continue;
                    }
                    delay(clock.as_ref(), wait_for_quarter_past(clock.as_ref()));
                    let uptime = worker.state().uptime;
                    let measurement = Measurement {
                        uptime,
                        indoor: read_channel(indoor.as_mut(), "indoor"),
                        outdoor: read_channel(outdoor.as_mut(), "outdoor"),
                    };
                    worker.board().post(Message::Measurement(measurement));
                    info!(
                        "measurement,{},{}",
                        measurement.indoor, measurement.outdoor
                    );
                }
                Ok(())
            })
    }
}

/// Seconds until 0.25 s past the next full wall-clock second, in `[0, 1)`.
fn wait_for_quarter_past(clock: &dyn Clock) -> f64 {
    let micros = clock
        .wall_clock()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.subsec_micros());
    f64::from((1_250_000 - micros) % 1_000_000) / 1e6
}

fn read_channel(port: &mut dyn SensorPort, label: &str) -> SensorData {
    match port.read() {
        Ok(raw) => raw.into(),
        Err(e) => {
            warn!("{label} sensor: {e}");
            port.reset();
            SensorData::failed()
        }
    }
}
