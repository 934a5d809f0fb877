//! Components that own one background thread.
//!
//! ```text
//!   enter():  subscribe ──▶ spawn "<name>" ──▶ ThreadManager::register
//!   exit():   unsubscribe_all ──▶ post ExitThread ──▶ join
//! ```
//!
//! The loop body receives a [`Worker`] and must return once
//! [`Worker::exit_requested`] turns true, checking at least once per second.
//! An error returned by the body (or a panic) ends the thread; the thread
//! manager's liveness check reports it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use log::{debug, error, info};
use parking_lot::{Condvar, Mutex, MutexGuard};

use super::manager::ThreadManager;
use super::{ActiveComponent, Component};
use crate::board::message::Topic;
use crate::board::subscriber::SubscriberId;
use crate::board::{CallbackResult, MessageBoard, panic_reason};
use crate::error::{ComponentError, Error};

/// A component plus the loop its thread will run.
pub struct ThreadedComponent<S> {
    component: Component<S>,
}

impl<S: Send + 'static> ThreadedComponent<S> {
    pub fn new(name: &str, board: Arc<MessageBoard>, state: S) -> Self {
        Self {
            component: Component::new(name, board, state),
        }
    }

    #[must_use]
    pub fn on<F>(mut self, topic: Topic, handler: F) -> Self
    where
        F: Fn(&mut S, &MessageBoard, &crate::board::message::Message) -> CallbackResult
            + Send
            + Sync
            + 'static,
    {
        self.component = self.component.on(topic, handler);
        self
    }

    /// Subscribe, start the worker thread running `body`, and register the
    /// thread with `manager`.
    pub fn enter<F>(self, manager: &ThreadManager, body: F) -> anyhow::Result<ActiveThreadedComponent<S>>
    where
        F: FnOnce(Worker<S>) -> anyhow::Result<()> + Send + 'static,
    {
        let component = self.component.enter()?;
        let name: Arc<str> = Arc::from(component.name());
        let worker = Worker {
            name: Arc::clone(&name),
            board: Arc::clone(component.board()),
            state: component.shared_state(),
        };

        let finished = Arc::new(AtomicBool::new(false));
        let mark = FinishedMark(Arc::clone(&finished));
        let thread_name = Arc::clone(&name);
        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let _mark = mark;
                let result = body(worker);
                if let Err(e) = &result {
                    error!("The {thread_name} thread failed: {e:#}");
                }
                info!("Leave {thread_name} thread.");
                result
            })
            .map_err(|e| {
                error!("Cannot start the {name} thread: {e}");
                Error::from(ComponentError::SpawnFailed)
            })?;

        let handle = Arc::new(WorkerHandle {
            name,
            thread: join.thread().id(),
            join: Mutex::new(Some(join)),
            finished,
        });
        manager.register(Arc::clone(&handle));

        Ok(ActiveThreadedComponent { component, handle })
    }
}

/// Sets the finished flag when the worker closure ends, panics included.
struct FinishedMark(Arc<AtomicBool>);

impl Drop for FinishedMark {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

// ───────────────────────────────────────────────────────────────
// Worker side
// ───────────────────────────────────────────────────────────────

/// What the loop body gets to work with.
pub struct Worker<S> {
    name: Arc<str>,
    board: Arc<MessageBoard>,
    state: Arc<Mutex<S>>,
}

impl<S> Worker<S> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn board(&self) -> &MessageBoard {
        &self.board
    }

    /// Lock the component's state.  Do not hold the guard across `post`.
    pub fn state(&self) -> MutexGuard<'_, S> {
        self.state.lock()
    }

    pub fn exit_requested(&self) -> bool {
        self.board.exit_requested()
    }
}

/// Join handle shared between the component and the thread manager.
pub struct WorkerHandle {
    name: Arc<str>,
    thread: ThreadId,
    join: Mutex<Option<JoinHandle<anyhow::Result<()>>>>,
    finished: Arc<AtomicBool>,
}

impl WorkerHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_alive(&self) -> bool {
        !self.finished.load(Ordering::Acquire)
    }

    /// Wait for the loop to return and join it.  Later calls return at once;
    /// a call from the worker's own thread does not wait.
    pub fn stop(&self) {
        if thread::current().id() == self.thread {
            debug!("The {} thread cannot join itself.", self.name);
            return;
        }

        let mut slot = self.join.lock();
        let Some(join) = slot.take() else {
            return;
        };
        info!("Join {} thread.", self.name);
        if let Err(payload) = join.join() {
            error!("The {} thread {}", self.name, panic_reason(payload.as_ref()));
        }
        info!("The {} thread has joined.", self.name);
    }
}

// ───────────────────────────────────────────────────────────────
// Entered threaded component
// ───────────────────────────────────────────────────────────────

/// A running threaded component.  Dropping it releases the component and
/// joins the thread.
pub struct ActiveThreadedComponent<S> {
    component: ActiveComponent<S>,
    handle: Arc<WorkerHandle>,
}

impl<S> ActiveThreadedComponent<S> {
    pub fn name(&self) -> &str {
        self.component.name()
    }

    pub fn subscriber_id(&self) -> SubscriberId {
        self.component.subscriber_id()
    }

    pub fn state(&self) -> MutexGuard<'_, S> {
        self.component.state()
    }

    pub fn worker(&self) -> &Arc<WorkerHandle> {
        &self.handle
    }

    pub fn is_alive(&self) -> bool {
        self.handle.is_alive()
    }

    /// Join the worker without releasing the subscriptions.  The loop only
    /// returns once the sentinel is set, so post it first.
    pub fn stop(&self) {
        self.handle.stop();
    }

    pub fn exit(self) {}
}

impl<S> Drop for ActiveThreadedComponent<S> {
    fn drop(&mut self) {
        self.component.release();
        self.handle.stop();
    }
}

// ───────────────────────────────────────────────────────────────
// Trigger
// ───────────────────────────────────────────────────────────────

/// One-shot wake-up flag between a subscriber callback and a worker loop.
#[derive(Debug, Default)]
pub struct Trigger {
    set: Mutex<bool>,
    cond: Condvar,
}

impl Trigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        *self.set.lock() = true;
        self.cond.notify_one();
    }

    /// Wait up to `timeout` for the flag.  Returns whether it was set, and
    /// clears it.
    pub fn wait(&self, timeout: Duration) -> bool {
        let mut set = self.set.lock();
        let _ = self.cond.wait_while_for(&mut set, |set| !*set, timeout);
        std::mem::take(&mut *set)
    }
}
