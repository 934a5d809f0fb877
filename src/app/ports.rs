//! Port traits: the boundary between controller logic and hardware.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ sensor station / devices worker
//! ```
//!
//! Driven adapters (the SHT75 bit-banging driver, relay GPIOs, or the
//! simulated stand-ins in this crate) implement these traits.  Components
//! take them as boxed trait objects, so the worker threads never touch
//! hardware directly and tests can substitute recording mocks.

use crate::error::SensorError;
use crate::sensors::RawReading;

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → controller)
// ───────────────────────────────────────────────────────────────

/// One humidity/temperature sensor.
pub trait SensorPort: Send {
    /// Read temperature and relative humidity.
    fn read(&mut self) -> Result<RawReading, SensorError>;

    /// Recover the bus after a failed read.
    fn reset(&mut self) {}
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: controller → hardware)
// ───────────────────────────────────────────────────────────────

/// Direction of the window motor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowMotion {
    Opening,
    Closing,
    Stopped,
}

/// Fan relay and window motor.
pub trait ActuatorPort: Send {
    fn set_fan(&mut self, on: bool);

    fn drive_window(&mut self, motion: WindowMotion);

    /// Fan off, motor stopped.
    fn all_off(&mut self) {
        self.set_fan(false);
        self.drive_window(WindowMotion::Stopped);
    }
}
