//! Registry of every worker thread in the process.
//!
//! The manager is built once at startup and handed to each threaded
//! component on `enter`.  It answers the control loop's once-per-tick
//! liveness poll and handles the user's `Shutdown` request:
//!
//! ```text
//!   Shutdown ──▶ post ExitThread ──▶ stop workers in registration order ──▶ teardown
//! ```

use std::sync::Arc;

use log::{error, info, warn};
use parking_lot::Mutex;

use super::threaded::WorkerHandle;
use crate::board::MessageBoard;
use crate::board::message::{Message, Topic};
use crate::board::subscriber::Subscriber;
use crate::error::BusError;

pub struct ThreadManager {
    board: Arc<MessageBoard>,
    subscriber: Subscriber,
    workers: Arc<Mutex<Vec<Arc<WorkerHandle>>>>,
}

impl ThreadManager {
    /// `teardown` runs after a user-requested shutdown has joined every
    /// worker (power-off hook in the binary, no-op in tests).
    pub fn new<F>(board: Arc<MessageBoard>, teardown: F) -> Result<Self, BusError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let subscriber = Subscriber::new("thread manager");
        let workers: Arc<Mutex<Vec<Arc<WorkerHandle>>>> = Arc::default();

        let registry = Arc::clone(&workers);
        board.subscribe(Topic::Shutdown, &subscriber, move |board, _| {
            info!("Shutdown by user request");
            board.post(Message::ExitThread);
            // Snapshot so registration is never blocked behind a join.
            let snapshot = registry.lock().clone();
            for worker in &snapshot {
                worker.stop();
            }
            info!("System shutdown");
            teardown();
            Ok(None)
        })?;

        Ok(Self {
            board,
            subscriber,
            workers,
        })
    }

    pub fn register(&self, worker: Arc<WorkerHandle>) {
        self.workers.lock().push(worker);
    }

    /// False if any registered worker has stopped running.  Each dead
    /// worker is logged.
    pub fn all_alive(&self) -> bool {
        let mut alive = true;
        for worker in self.workers.lock().iter().filter(|w| !w.is_alive()) {
            error!("The {} thread died.", worker.name());
            alive = false;
        }
        alive
    }

    /// Names of the registered workers, in registration order.
    pub fn worker_names(&self) -> Vec<String> {
        self.workers.lock().iter().map(|w| w.name().to_string()).collect()
    }
}

impl Drop for ThreadManager {
    fn drop(&mut self) {
        if let Err(e) = self.board.unsubscribe_all(self.subscriber.id()) {
            warn!("thread manager: {e}");
        }
    }
}
