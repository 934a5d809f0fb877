//! Topics and their payloads.
//!
//! Every topic has exactly one payload shape, expressed as one variant of
//! [`Message`].  Posting derives the topic from the variant, so a payload
//! can never be stored under the wrong key.
//!
//! | Topic               | Producer            | Consumers                     |
//! |---------------------|---------------------|-------------------------------|
//! | Measurement         | sensor station      | average, status, display, web |
//! | Average             | fan logic (`ask`)   | windowed average (responder)  |
//! | Time                | control loop, 1 Hz  | every per-tick consumer       |
//! | ExitThread          | any component exit  | every worker loop, main loop  |
//! | Shutdown            | UI                  | thread manager                |
//! | Mode                | UI                  | fan logic, status             |
//! | Fault               | message board       | main loop (fatal)             |
//! | Devices             | fan logic, UI       | devices                       |
//! | FanState            | devices             | display                       |

use core::fmt;
use std::time::SystemTime;

use crate::sensors::SensorData;

/// Key of a message board channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Topic {
    Measurement,
    Average,
    Time,
    ExitThread,
    Shutdown,
    Mode,
    Fault,
    Devices,
    FanState,
    FanComment,
    WaitPeriod,
    RemainingWaitPeriod,
    Status,
    StatusProcessed,
    HtmlStatus,
    TimeSync,
}

impl Topic {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Measurement => "Measurement",
            Self::Average => "Average",
            Self::Time => "Time",
            Self::ExitThread => "ExitThread",
            Self::Shutdown => "Shutdown",
            Self::Mode => "Mode",
            Self::Fault => "Fault",
            Self::Devices => "Devices",
            Self::FanState => "FanState",
            Self::FanComment => "FanComment",
            Self::WaitPeriod => "WaitPeriod",
            Self::RemainingWaitPeriod => "RemainingWaitPeriod",
            Self::Status => "Status",
            Self::StatusProcessed => "StatusProcessed",
            Self::HtmlStatus => "HtmlStatus",
            Self::TimeSync => "TimeSync",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ───────────────────────────────────────────────────────────────
// Payloads
// ───────────────────────────────────────────────────────────────

/// One sample of both sensor channels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// Uptime (seconds) at which the measurement was triggered.
    pub uptime: f64,
    pub indoor: SensorData,
    pub outdoor: SensorData,
}

/// Control loop tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeTick {
    pub uptime: f64,
    pub wall_clock: SystemTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Auto,
    Manual,
}

/// Requests for the fan/window actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCommand {
    StartOpenWindow,
    StartCloseWindow,
    StopWindowMotor,
    OpenWindow,
    CloseWindow,
    FanOn,
    FanOff,
    /// Open the window, then start the fan.
    VentilationOn,
    /// Stop the fan, then close the window.
    VentilationOff,
}

/// What the actuator is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanState {
    FanOn,
    FanOff,
    OpenWindow,
    CloseWindow,
}

/// A subscriber callback failed during `post` or `ask`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultReport {
    /// Topic being dispatched when the callback failed.
    pub topic: Topic,
    /// Diagnostic name of the faulting subscriber.
    pub subscriber: String,
    pub reason: String,
}

impl fmt::Display for FaultReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} callback of '{}' failed: {}",
            self.topic, self.subscriber, self.reason
        )
    }
}

/// RGB colour for the status display.
pub type Rgb = (u8, u8, u8);

/// Status line for the local display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayStatus {
    pub text: String,
    pub colour: Rgb,
}

/// Status line for the generated web page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlStatus {
    pub text: String,
    /// CSS declaration for the status text.
    pub style: &'static str,
    /// Last radio/network time synchronisation, if any.
    pub last_sync: Option<String>,
}

// ───────────────────────────────────────────────────────────────
// Message / Reply
// ───────────────────────────────────────────────────────────────

/// A payload tagged with its topic.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Measurement(Measurement),
    /// Request: average over the last N seconds.
    Average(u32),
    Time(TimeTick),
    /// Shutdown sentinel.
    ExitThread,
    /// User-initiated shutdown request.
    Shutdown,
    Mode(Mode),
    Fault(FaultReport),
    Devices(DeviceCommand),
    FanState(FanState),
    FanComment(String),
    /// Current ventilation wait period (seconds).
    WaitPeriod(f64),
    /// Remaining part of the wait period (seconds).
    RemainingWaitPeriod(f64),
    Status(DisplayStatus),
    /// The display finished rendering the current status.
    StatusProcessed,
    HtmlStatus(HtmlStatus),
    /// Human-readable time of the last clock synchronisation.
    TimeSync(String),
}

impl Message {
    pub const fn topic(&self) -> Topic {
        match self {
            Self::Measurement(_) => Topic::Measurement,
            Self::Average(_) => Topic::Average,
            Self::Time(_) => Topic::Time,
            Self::ExitThread => Topic::ExitThread,
            Self::Shutdown => Topic::Shutdown,
            Self::Mode(_) => Topic::Mode,
            Self::Fault(_) => Topic::Fault,
            Self::Devices(_) => Topic::Devices,
            Self::FanState(_) => Topic::FanState,
            Self::FanComment(_) => Topic::FanComment,
            Self::WaitPeriod(_) => Topic::WaitPeriod,
            Self::RemainingWaitPeriod(_) => Topic::RemainingWaitPeriod,
            Self::Status(_) => Topic::Status,
            Self::StatusProcessed => Topic::StatusProcessed,
            Self::HtmlStatus(_) => Topic::HtmlStatus,
            Self::TimeSync(_) => Topic::TimeSync,
        }
    }
}

/// Per-channel result of a windowed average.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AverageReport {
    pub indoor: SensorData,
    pub outdoor: SensorData,
}

/// Answer to an [`ask`](super::MessageBoard::ask).
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Average(AverageReport),
}
