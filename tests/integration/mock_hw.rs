//! Mock hardware adapters for integration tests.
//!
//! Records every actuator call and replays scripted sensor readings, so
//! tests can assert on the full command history without a relay board or
//! SHT75 sensors attached.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use fancontrol::app::ports::{ActuatorPort, SensorPort, WindowMotion};
use fancontrol::error::SensorError;
use fancontrol::sensors::RawReading;
use parking_lot::Mutex;

// ── Actuator call record ──────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorCall {
    SetFan(bool),
    DriveWindow(WindowMotion),
    AllOff,
}

// ── RecordingActuator ─────────────────────────────────────────

/// Cloneable: the devices worker owns one clone, the test keeps another.
#[derive(Debug, Clone, Default)]
pub struct RecordingActuator {
    calls: Arc<Mutex<Vec<ActuatorCall>>>,
}

#[allow(dead_code)]
impl RecordingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<ActuatorCall> {
        self.calls.lock().clone()
    }

    pub fn fan_on(&self) -> bool {
        self.calls
            .lock()
            .iter()
            .rev()
            .find_map(|c| match c {
                ActuatorCall::SetFan(on) => Some(*on),
                ActuatorCall::AllOff => Some(false),
                ActuatorCall::DriveWindow(_) => None,
            })
            .unwrap_or(false)
    }

    pub fn motor(&self) -> WindowMotion {
        self.calls
            .lock()
            .iter()
            .rev()
            .find_map(|c| match c {
                ActuatorCall::DriveWindow(motion) => Some(*motion),
                ActuatorCall::AllOff => Some(WindowMotion::Stopped),
                ActuatorCall::SetFan(_) => None,
            })
            .unwrap_or(WindowMotion::Stopped)
    }
}

impl ActuatorPort for RecordingActuator {
    fn set_fan(&mut self, on: bool) {
        self.calls.lock().push(ActuatorCall::SetFan(on));
    }

    fn drive_window(&mut self, motion: WindowMotion) {
        self.calls.lock().push(ActuatorCall::DriveWindow(motion));
    }

    fn all_off(&mut self) {
        self.calls.lock().push(ActuatorCall::AllOff);
    }
}

// ── ScriptedSensor ────────────────────────────────────────────

/// Replays queued results, then returns `fallback` forever.
pub struct ScriptedSensor {
    script: VecDeque<Result<RawReading, SensorError>>,
    fallback: RawReading,
    resets: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl ScriptedSensor {
    pub fn steady(temperature: f64, humidity: f64) -> Self {
        Self {
            script: VecDeque::new(),
            fallback: RawReading {
                temperature,
                humidity,
            },
            resets: Arc::default(),
        }
    }

    pub fn failing_first(mut self, n: usize, error: SensorError) -> Self {
        self.script.extend((0..n).map(|_| Err(error)));
        self
    }

    /// Counter of `reset` calls, readable after the sensor moved into a worker.
    pub fn resets(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.resets)
    }
}

impl SensorPort for ScriptedSensor {
    fn read(&mut self) -> Result<RawReading, SensorError> {
        self.script.pop_front().unwrap_or(Ok(self.fallback))
    }

    fn reset(&mut self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Helpers ───────────────────────────────────────────────────

/// Poll `condition` until it holds or five seconds pass.
#[allow(dead_code)]
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}
