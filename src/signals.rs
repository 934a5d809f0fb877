//! POSIX signal handling.
//!
//! The handlers only bump atomic counters; the control loop drains them once
//! per tick on the main thread, where posting to the board and logging are
//! safe.  SIGINT and SIGTERM request exit.  SIGUSR1, SIGUSR2 and SIGHUP are
//! acknowledged in the log and otherwise ignored.

use std::sync::atomic::{AtomicUsize, Ordering};

use log::info;
use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};

use crate::board::MessageBoard;
use crate::board::message::Message;

const HANDLED: [Signal; 5] = [
    Signal::SIGINT,
    Signal::SIGTERM,
    Signal::SIGUSR1,
    Signal::SIGUSR2,
    Signal::SIGHUP,
];

static PENDING: [AtomicUsize; 5] = [const { AtomicUsize::new(0) }; 5];

fn slot(signal: Signal) -> Option<usize> {
    HANDLED.iter().position(|s| *s == signal)
}

extern "C" fn on_signal(signum: nix::libc::c_int) {
    if let Ok(signal) = Signal::try_from(signum) {
        if let Some(i) = slot(signal) {
            PENDING[i].fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Proof that the handlers are installed.  Drain with [`poll`](Self::poll).
#[derive(Debug)]
pub struct SignalHandlers {
    _private: (),
}

impl SignalHandlers {
    /// Install the handlers for every handled signal.
    pub fn install() -> nix::Result<Self> {
        let action = SigAction::new(
            SigHandler::Handler(on_signal),
            SaFlags::SA_RESTART,
            SigSet::empty(),
        );
        for signal in HANDLED {
            // SAFETY: the handler only touches atomics, which is
            // async-signal-safe.
            unsafe { sigaction(signal, &action) }?;
        }
        Ok(Self { _private: () })
    }

    /// Handle every signal received since the last call.  Returns whether
    /// exit was requested (the sentinel has then been posted).
    pub fn poll(&self, board: &MessageBoard) -> bool {
        drain(board)
    }
}

fn take(signal: Signal) -> usize {
    slot(signal).map_or(0, |i| PENDING[i].swap(0, Ordering::SeqCst))
}

fn drain(board: &MessageBoard) -> bool {
    let mut exit = false;
    for signal in HANDLED {
        if take(signal) == 0 {
            continue;
        }
        match signal {
            Signal::SIGINT | Signal::SIGTERM => {
                info!("{} received: exit.", signal.as_str());
                exit = true;
            }
            _ => info!("{} received: ignore.", signal.as_str()),
        }
    }
    if exit {
        board.post(Message::ExitThread);
    }
    exit
}
