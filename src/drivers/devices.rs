//! Devices: the threaded component that owns the fan and the window motor.
//!
//! `Devices` commands are queued by the subscriber callback and executed in
//! order on the worker thread, since a full window move takes seconds.
//!
//! ```text
//!   post Devices(cmd) ──▶ queue ──▶ worker ──▶ ActuatorPort
//!                                     │
//!                                     └──▶ post FanState
//! ```
//!
//! Relay switching is followed by a half-second settle delay.  A full window
//! move runs the motor for the configured travel time, cut short when the
//! sentinel is set.

use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::time::Duration;

use anyhow::Context;
use log::debug;

use crate::app::ports::{ActuatorPort, WindowMotion};
use crate::board::MessageBoard;
use crate::board::message::{DeviceCommand, FanState, Message, Topic};
use crate::clock::{Clock, delay};
use crate::component::{ActiveThreadedComponent, ThreadManager, ThreadedComponent};

const SETTLE_SECS: f64 = 0.5;
const POLL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceSettings {
    /// Time for a full window move, seconds.
    pub window_travel_secs: f64,
    /// Queue `VentilationOff` before the worker starts.
    pub close_window_on_start: bool,
    /// Fan off and window closed when the worker leaves its loop.
    pub close_window_on_exit: bool,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            window_travel_secs: 10.0,
            close_window_on_start: true,
            close_window_on_exit: true,
        }
    }
}

/// Component state: the producer end of the command queue.
pub struct CommandQueue {
    tx: Sender<DeviceCommand>,
}

pub struct Devices {
    actuator: Box<dyn ActuatorPort>,
    clock: Arc<dyn Clock>,
    settings: DeviceSettings,
}

impl Devices {
    pub fn new(actuator: Box<dyn ActuatorPort>, clock: Arc<dyn Clock>, settings: DeviceSettings) -> Self {
        Self {
            actuator,
            clock,
            settings,
        }
    }

    pub fn enter(
        self,
        board: Arc<MessageBoard>,
        manager: &ThreadManager,
    ) -> anyhow::Result<ActiveThreadedComponent<CommandQueue>> {
        let (tx, rx) = mpsc::channel();
        if self.settings.close_window_on_start {
            tx.send(DeviceCommand::VentilationOff)
                .context("devices queue closed")?;
        }

        let mut drive = Drive {
            actuator: self.actuator,
            clock: self.clock,
            travel: self.settings.window_travel_secs,
            fan_on: false,
            motor_on: false,
            finishing: false,
        };
        let close_on_exit = self.settings.close_window_on_exit;

        ThreadedComponent::new("devices", board, CommandQueue { tx })
            .on(Topic::Devices, |queue, _, message| {
                if let Message::Devices(command) = message {
                    queue.tx.send(*command).context("devices queue closed")?;
                }
                Ok(None)
            })
            .enter(manager, move |worker| {
                while !worker.exit_requested() {
                    match rx.recv_timeout(POLL) {
                        Ok(command) => drive.execute(worker.board(), command),
                        Err(RecvTimeoutError::Timeout) => {}
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                if close_on_exit {
                    drive.finishing = true;
                    drive.fan_off(worker.board());
                    drive.close_window(worker.board());
                }
                drive.actuator.all_off();
                Ok(())
            })
    }
}

/// Worker-side actuator state.
struct Drive {
    actuator: Box<dyn ActuatorPort>,
    clock: Arc<dyn Clock>,
    travel: f64,
    fan_on: bool,
    motor_on: bool,
    /// Closing the window on exit: run full moves regardless of the sentinel.
    finishing: bool,
}

impl Drive {
    fn execute(&mut self, board: &MessageBoard, command: DeviceCommand) {
        debug!("devices: {command:?}");
        match command {
            DeviceCommand::StartOpenWindow => self.start_window(board, WindowMotion::Opening),
            DeviceCommand::StartCloseWindow => self.start_window(board, WindowMotion::Closing),
            DeviceCommand::StopWindowMotor => self.stop_window_motor(board),
            DeviceCommand::OpenWindow => self.open_window(board),
            DeviceCommand::CloseWindow => self.close_window(board),
            DeviceCommand::FanOn => self.fan_on(board),
            DeviceCommand::FanOff => self.fan_off(board),
            DeviceCommand::VentilationOn => {
                self.open_window(board);
                self.fan_on(board);
            }
            DeviceCommand::VentilationOff => {
                self.fan_off(board);
                self.close_window(board);
            }
        }
    }

    fn settle(&self) {
        delay(self.clock.as_ref(), SETTLE_SECS);
    }

    fn start_window(&mut self, board: &MessageBoard, motion: WindowMotion) {
        if self.motor_on {
            self.stop_window_motor(board);
        }
        let state = if motion == WindowMotion::Opening {
            FanState::OpenWindow
        } else {
            FanState::CloseWindow
        };
        board.post(Message::FanState(state));
        self.motor_on = true;
        self.actuator.drive_window(motion);
        self.settle();
    }

    fn stop_window_motor(&mut self, board: &MessageBoard) {
        let state = if self.fan_on { FanState::FanOn } else { FanState::FanOff };
        board.post(Message::FanState(state));
        self.actuator.drive_window(WindowMotion::Stopped);
        self.motor_on = false;
        self.settle();
    }

    /// Run the motor for the travel time, in slices so a shutdown request
    /// cuts the move short (except while finishing).
    fn travel(&self, board: &MessageBoard) {
        let end = self.clock.uptime() + self.travel;
        loop {
            let remaining = end - self.clock.uptime();
            if remaining <= 0.0 || (!self.finishing && board.exit_requested()) {
                break;
            }
            self.clock.sleep(remaining.min(POLL.as_secs_f64()));
        }
    }

    fn open_window(&mut self, board: &MessageBoard) {
        self.start_window(board, WindowMotion::Opening);
        self.travel(board);
        self.stop_window_motor(board);
    }

    fn close_window(&mut self, board: &MessageBoard) {
        self.start_window(board, WindowMotion::Closing);
        self.travel(board);
        self.stop_window_motor(board);
    }

    fn fan_on(&mut self, board: &MessageBoard) {
        board.post(Message::FanState(FanState::FanOn));
        self.actuator.set_fan(true);
        self.fan_on = true;
        self.settle();
    }

    fn fan_off(&mut self, board: &MessageBoard) {
        self.actuator.set_fan(false);
        self.fan_on = false;
        if !self.motor_on {
            board.post(Message::FanState(FanState::FanOff));
        }
        self.settle();
    }
}
