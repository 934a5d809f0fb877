//! Main control loop.
//!
//! Runs on the main thread while every component is entered.  Once per tick
//! it checks the fault topic, publishes `Time`, sleeps to the next tick
//! boundary and polls thread liveness and pending signals.
//!
//! ```text
//!   time0 ─────── tick ───────▶ time0 + tick ─── tick ───▶ …
//!          post Time, sleep      │
//!                                ├─ woke within 0.1 tick: time0 += tick
//!                                └─ woke later:           time0 = now (warn)
//! ```

use anyhow::anyhow;
use log::warn;

use crate::board::MessageBoard;
use crate::board::message::{Message, TimeTick, Topic};
use crate::clock::Clock;
use crate::component::ThreadManager;
use crate::signals::SignalHandlers;

/// Largest accepted overshoot, as a fraction of a tick.
const MAX_OVERSHOOT: f64 = 0.1;

pub struct ControlLoop<'a> {
    board: &'a MessageBoard,
    clock: &'a dyn Clock,
    manager: &'a ThreadManager,
    signals: Option<&'a SignalHandlers>,
    tick: f64,
}

impl<'a> ControlLoop<'a> {
    pub fn new(
        board: &'a MessageBoard,
        clock: &'a dyn Clock,
        manager: &'a ThreadManager,
        tick_secs: f64,
    ) -> Self {
        Self {
            board,
            clock,
            manager,
            signals: None,
            tick: tick_secs,
        }
    }

    #[must_use]
    pub fn with_signals(mut self, signals: &'a SignalHandlers) -> Self {
        self.signals = Some(signals);
        self
    }

    /// Tick until the sentinel is set.  A fault report on the board ends
    /// the loop with an error.
    pub fn run(&self) -> anyhow::Result<()> {
        let mut time0 = self.clock.uptime();
        while !self.board.exit_requested() {
            if let Some(Message::Fault(report)) = self.board.query(Topic::Fault) {
                return Err(anyhow!("{report}"));
            }
            self.board.post(Message::Time(TimeTick {
                uptime: self.clock.uptime(),
                wall_clock: self.clock.wall_clock(),
            }));
            time0 = self.pace(time0);

            if !self.manager.all_alive() {
                self.board.post(Message::ExitThread);
            }
            if let Some(signals) = self.signals {
                signals.poll(self.board);
            }
        }
        Ok(())
    }

    /// Sleep until `time0 + tick` and return the next reference time.
    fn pace(&self, mut time0: f64) -> f64 {
        let mut time1 = self.clock.uptime();
        if time1 < time0 {
            warn!("Error in uptime: {time1} < {time0}.");
            time0 = time1;
        }
        let mut sleep = self.tick - time1 + time0;
        if sleep <= 0.0 {
            warn!(
                "Zero sleep time: {time0} < {time1}, Δ={:.1}s.",
                time1 - time0
            );
        }
        while sleep > 0.0 {
            self.clock.sleep(sleep);
            time1 = self.clock.uptime();
            sleep = self.tick - time1 + time0;
        }
        if sleep > -MAX_OVERSHOOT * self.tick {
            time0 + self.tick
        } else {
            warn!(
                "Sleep longer than expected: {time0} < {time1}, Δ={:.1}s.",
                time1 - time0
            );
            time1
        }
    }
}
