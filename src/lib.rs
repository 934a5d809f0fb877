//! Fancontrol library.
//!
//! Exposes the message board, the component lifecycle and every component
//! of the ventilation controller for integration testing.  The binary in
//! `main.rs` only wires them together.

#![deny(unused_must_use)]

pub mod app;
pub mod average;
pub mod board;
pub mod clock;
pub mod component;
pub mod config;
pub mod drivers;
pub mod error;
pub mod logging;
pub mod sensors;
pub mod signals;
