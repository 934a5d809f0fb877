//! Ventilation decision.
//!
//! Runs once per `Time` tick in automatic mode.  Ventilating means opening
//! the window and running the fan; it only helps when the air outside holds
//! clearly less water than the air inside.
//!
//! ```text
//!   forced off?  ──yes──▶ off
//!   averages ok? ──no───▶ off      "Error!" / "Not enough samples …"
//!   Δτ < 1 K     ──yes──▶ off      forced off for one period
//!   T_in < T_out ──yes──▶ on       forced on for one period
//!   T_in < 10 °C ──yes──▶ off      forced off for one period
//!   forced on?   ──yes──▶ on
//!   wait period elapsed? ─▶ on (forced on for one period) / off
//! ```
//!
//! The wait period grows as it gets colder outside:
//! `expm1((15 - T_out) / 10) × 45 min`, zero below one minute, at most a day.

use std::sync::Arc;

use log::{error, info};

use crate::board::MessageBoard;
use crate::board::message::{DeviceCommand, Message, Mode, Reply, Topic};
use crate::component::Component;

/// Short window for the indoor channel.
pub const SHORT_WINDOW_SECS: u32 = 60;
/// Long window for the outdoor channel.
pub const LONG_WINDOW_SECS: u32 = 600;

const MIN_DEW_POINT_GAP: f64 = 1.0;
const MIN_ROOM_TEMPERATURE: f64 = 10.0;
const MAX_WAIT_SECS: f64 = 86_400.0;
const DAY_AGO: f64 = -90_000.0;

/// Seconds to wait between ventilation periods at outdoor temperature `t`.
pub fn wait_period(t_outdoor: f64) -> f64 {
    let secs = ((15.0 - t_outdoor) / 10.0).exp_m1() * 45.0 * 60.0;
    if secs < 60.0 {
        0.0
    } else {
        secs.min(MAX_WAIT_SECS)
    }
}

fn minutes(secs: f64) -> i64 {
    (secs / 60.0 + 0.5) as i64
}

#[derive(Debug)]
pub struct FanLogic {
    /// Ventilation period length, seconds.
    period: f64,
    mode: Option<Mode>,
    /// Last decision; `None` until the first decision after start or a
    /// switch to auto mode.
    fan_on: Option<bool>,
    /// Uptime of the last switch-off, `None` while ventilating.
    last_off: Option<f64>,
    stay_on_until: f64,
    stay_off_until: f64,
}

impl FanLogic {
    pub fn new(ventilation_period_secs: f64) -> Self {
        Self {
            period: ventilation_period_secs,
            mode: None,
            fan_on: None,
            last_off: None,
            stay_on_until: 0.0,
            stay_off_until: 0.0,
        }
    }

    pub fn is_on(&self) -> Option<bool> {
        self.fan_on
    }

    pub fn mode(&self) -> Option<Mode> {
        self.mode
    }

    pub fn on_mode(&mut self, mode: Mode) {
        self.mode = Some(mode);
        if mode == Mode::Auto {
            self.fan_on = None;
            self.last_off = Some(DAY_AGO);
            self.stay_on_until = 0.0;
            self.stay_off_until = 0.0;
        }
    }

    pub fn on_time(&mut self, board: &MessageBoard, uptime: f64) {
        if self.mode == Some(Mode::Manual) {
            return;
        }
        let on = self.decide(board, uptime);
        if self.fan_on == Some(on) {
            return;
        }
        self.fan_on = Some(on);
        info!("fan,{on}");
        if on {
            board.post(Message::Devices(DeviceCommand::VentilationOn));
            self.last_off = None;
        } else {
            board.post(Message::Devices(DeviceCommand::VentilationOff));
            self.last_off = Some(uptime);
        }
    }

    fn decide(&mut self, board: &MessageBoard, uptime: f64) -> bool {
        if self.stay_off_until > uptime {
            return false;
        }

        let short = board.ask(Message::Average(SHORT_WINDOW_SECS));
        let long = board.ask(Message::Average(LONG_WINDOW_SECS));
        let (Some(Reply::Average(short)), Some(Reply::Average(long))) = (short, long) else {
            error!("fan, Average is None.");
            comment(board, "Error!");
            return false;
        };

        let indoor = short.indoor;
        let outdoor = long.outdoor;
        if indoor.error || outdoor.error {
            comment(board, "Not enough samples for average.");
            return false;
        }

        if indoor.tau - outdoor.tau < MIN_DEW_POINT_GAP {
            comment(board, "High outside dew point.");
            self.stay_off_until = uptime + self.period;
            return false;
        }

        if indoor.temperature < outdoor.temperature {
            comment(board, "Permanent ventilation: warm and dry outside.");
            self.stay_on_until = uptime + self.period;
            return true;
        }

        if indoor.temperature < MIN_ROOM_TEMPERATURE {
            comment(board, "Low room temperature.");
            self.stay_off_until = uptime + self.period;
            return false;
        }

        let remaining_on = self.stay_on_until - uptime;
        if remaining_on > 0.0 {
            comment(
                board,
                format!("Remaining ventilation period: {} min.", minutes(remaining_on)),
            );
            return true;
        }

        let wait = wait_period(outdoor.temperature);
        let remaining = match self.last_off {
            None => wait,
            Some(last_off) => f64::max(0.0, wait - uptime + last_off),
        };
        comment(
            board,
            format!(
                "Wait period: {} min ({} min remaining).",
                minutes(wait),
                minutes(remaining)
            ),
        );
        board.post(Message::WaitPeriod(wait));
        board.post(Message::RemainingWaitPeriod(remaining));

        let on = remaining == 0.0;
        if on {
            self.stay_on_until = uptime + self.period;
        }
        on
    }

    /// Subscribes to `Mode` and `Time`.
    pub fn component(self, board: Arc<MessageBoard>) -> Component<Self> {
        Component::new("fan", board, self)
            .on(Topic::Mode, |fan, _, message| {
                if let Message::Mode(mode) = message {
                    fan.on_mode(*mode);
                }
                Ok(None)
            })
            .on(Topic::Time, |fan, board, message| {
                if let Message::Time(tick) = message {
                    fan.on_time(board, tick.uptime);
                }
                Ok(None)
            })
    }
}

fn comment(board: &MessageBoard, text: impl Into<String>) {
    board.post(Message::FanComment(text.into()));
}
