//! Simulated sensor for running without hardware.
//!
//! Temperature follows a daily sine around a base value; relative humidity
//! moves in the opposite direction, which is roughly what a real room and
//! the air outside it do.

use std::f64::consts::TAU;
use std::sync::Arc;

use crate::app::ports::SensorPort;
use crate::clock::Clock;
use crate::error::SensorError;
use crate::sensors::RawReading;

const DAY_SECS: f64 = 86_400.0;

pub struct SimulatedSensor {
    clock: Arc<dyn Clock>,
    base_temperature: f64,
    base_humidity: f64,
    /// Peak deviation of the temperature, °C.
    swing: f64,
}

impl SimulatedSensor {
    pub fn new(clock: Arc<dyn Clock>, base_temperature: f64, base_humidity: f64) -> Self {
        Self {
            clock,
            base_temperature,
            base_humidity,
            swing: 4.0,
        }
    }

    #[must_use]
    pub fn with_swing(mut self, swing: f64) -> Self {
        self.swing = swing;
        self
    }
}

impl SensorPort for SimulatedSensor {
    fn read(&mut self) -> Result<RawReading, SensorError> {
        let phase = (self.clock.uptime() / DAY_SECS * TAU).sin();
        let temperature = self.base_temperature + self.swing * phase;
        let humidity = (self.base_humidity - 2.5 * self.swing * phase).clamp(1.0, 100.0);
        if !temperature.is_finite() {
            return Err(SensorError::OutOfRange);
        }
        Ok(RawReading {
            temperature,
            humidity,
        })
    }
}
