//! Actuator side: the devices worker and the relay adapters it drives.

pub mod devices;
pub mod relays;
