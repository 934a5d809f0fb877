//! Application core: ventilation rules, status reporting and the main loop.
//!
//! These components talk to each other only through the message board.
//! Hardware is reached through the **port traits** in [`ports`], so the
//! whole layer runs in tests against simulated adapters.

pub mod control;
pub mod fan;
pub mod ports;
pub mod status;
