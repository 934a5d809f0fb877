//! In-memory relay board.
//!
//! Stands in for the four-relay GPIO board (fan, motor power, motor
//! direction, shared supply) when running on a host.  State is kept behind
//! a shared handle so the binary and tests can observe it.
//!
//! ## Relay model
//!
//! The shared supply relay is closed whenever the fan or the motor runs;
//! the motor relays only ever see `Opening`, `Closing` or `Stopped`.

use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::app::ports::{ActuatorPort, WindowMotion};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayState {
    pub fan: bool,
    pub motor: WindowMotion,
}

impl RelayState {
    /// Whether the shared supply relay is closed.
    pub fn supply(&self) -> bool {
        self.fan || self.motor != WindowMotion::Stopped
    }
}

impl Default for RelayState {
    fn default() -> Self {
        Self {
            fan: false,
            motor: WindowMotion::Stopped,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimulatedRelays {
    state: Arc<Mutex<RelayState>>,
}

impl SimulatedRelays {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the relay positions.
    pub fn state(&self) -> RelayState {
        *self.state.lock()
    }
}

impl ActuatorPort for SimulatedRelays {
    fn set_fan(&mut self, on: bool) {
        self.state.lock().fan = on;
        debug!("relays: fan {}", if on { "on" } else { "off" });
    }

    fn drive_window(&mut self, motion: WindowMotion) {
        self.state.lock().motor = motion;
        debug!("relays: window motor {motion:?}");
    }
}
