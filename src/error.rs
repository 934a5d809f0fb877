//! Unified error types for the ventilation controller.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! control loop's error handling uniform.  Variants are `Copy` so they can
//! be handed across the message board and into fault reports without
//! allocation.
//!
//! Conditions that are *expected* at runtime (a topic never posted, too few
//! samples for an average) are not errors: they are encoded in return
//! values.  Everything here is either a programming error or a hardware
//! fault.

use core::fmt;

use crate::board::message::Topic;
use crate::board::subscriber::SubscriberId;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation of the controller funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Error {
    /// Message board registration misuse.
    Bus(BusError),
    /// Component lifecycle failure.
    Component(ComponentError),
    /// A sensor could not be read.
    Sensor(SensorError),
    /// Measurement history invariant violated.
    History(HistoryError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus(e) => write!(f, "bus: {e}"),
            Self::Component(e) => write!(f, "component: {e}"),
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::History(e) => write!(f, "history: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Message board errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// The same subscriber registered twice for one topic.
    DuplicateSubscription { topic: Topic, subscriber: SubscriberId },
    /// Subscribe/unsubscribe called from inside a callback that the board
    /// is currently dispatching on this thread.  Honouring it would
    /// deadlock on the subscription table.
    ReentrantRegistration { topic: Option<Topic> },
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateSubscription { topic, subscriber } => {
                write!(f, "{subscriber} already subscribed to {topic}")
            }
            Self::ReentrantRegistration { topic: Some(topic) } => {
                write!(f, "registration change for {topic} from inside a dispatch")
            }
            Self::ReentrantRegistration { topic: None } => {
                write!(f, "registration change from inside a dispatch")
            }
        }
    }
}

impl std::error::Error for BusError {}

impl From<BusError> for Error {
    fn from(e: BusError) -> Self {
        Self::Bus(e)
    }
}

// ---------------------------------------------------------------------------
// Component errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentError {
    /// The OS refused to create the worker thread.
    SpawnFailed,
}

impl fmt::Display for ComponentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SpawnFailed => write!(f, "worker thread could not be spawned"),
        }
    }
}

impl std::error::Error for ComponentError {}

impl From<ComponentError> for Error {
    fn from(e: ComponentError) -> Self {
        Self::Component(e)
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// No acknowledge / timeout on the sensor bus.
    CommFailure,
    /// Reading is outside the physically plausible range.
    OutOfRange,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CommFailure => write!(f, "communication failure"),
            Self::OutOfRange => write!(f, "reading out of range"),
        }
    }
}

impl std::error::Error for SensorError {}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// History errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HistoryError {
    /// A sample was recorded with an uptime older than the newest sample.
    NonMonotonic { previous: f64, next: f64 },
}

impl fmt::Display for HistoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonMonotonic { previous, next } => {
                write!(f, "sample at {next:.3}s recorded after sample at {previous:.3}s")
            }
        }
    }
}

impl std::error::Error for HistoryError {}

impl From<HistoryError> for Error {
    fn from(e: HistoryError) -> Self {
        Self::History(e)
    }
}
