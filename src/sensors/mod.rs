//! Humidity/temperature sensing.
//!
//! [`SensorData`] is the per-channel value carried in every `Measurement`
//! and `Average` reply.  The station (see [`station`]) polls the indoor and
//! outdoor channels through [`SensorPort`](crate::app::ports::SensorPort)
//! adapters and publishes both together.

pub mod simulated;
pub mod station;

use core::fmt;

/// Raw converted reading from one sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawReading {
    /// Degrees Celsius.
    pub temperature: f64,
    /// Relative humidity, percent.
    pub humidity: f64,
}

/// One channel's reading, or one channel's average.
///
/// `error` marks a failed read (values are NaN) or, for averages, too few
/// samples in the window.  Consumers must check it before using the values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorData {
    pub humidity: f64,
    pub temperature: f64,
    /// Dew point, degrees Celsius.
    pub tau: f64,
    pub error: bool,
}

impl SensorData {
    pub fn reading(temperature: f64, humidity: f64) -> Self {
        Self {
            humidity,
            temperature,
            tau: dew_point(temperature, humidity),
            error: false,
        }
    }

    pub const fn failed() -> Self {
        Self {
            humidity: f64::NAN,
            temperature: f64::NAN,
            tau: f64::NAN,
            error: true,
        }
    }
}

impl From<RawReading> for SensorData {
    fn from(raw: RawReading) -> Self {
        Self::reading(raw.temperature, raw.humidity)
    }
}

impl fmt::Display for SensorData {
    /// `rh,T,tau,error`, the CSV layout of the measurement log.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.2},{:.2},{:.2},{}",
            self.humidity, self.temperature, self.tau, self.error
        )
    }
}

// ───────────────────────────────────────────────────────────────
// Dew point (Magnus formula)
// ───────────────────────────────────────────────────────────────

const TN_WATER: f64 = 243.12;
const M_WATER: f64 = 17.62;
const TN_ICE: f64 = 272.62;
const M_ICE: f64 = 22.46;

/// Dew point in degrees Celsius for temperature `t` (°C) and relative
/// humidity `rh` (%).  Uses the ice constants below 0 °C.
pub fn dew_point(t: f64, rh: f64) -> f64 {
    let (tn, m) = if t >= 0.0 {
        (TN_WATER, M_WATER)
    } else {
        (TN_ICE, M_ICE)
    };
    let ln_rh = (rh / 100.0).ln();
    let k = m * t / (tn + t);
    tn * (ln_rh + k) / (m - ln_rh - k)
}
