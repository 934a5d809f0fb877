//! Component lifecycle on top of the message board.
//!
//! ```text
//!   Component::new ──on(..)──▶ enter() ──▶ ActiveComponent ──exit()/drop──▶ released
//!        │                       │                                │
//!   Constructed            subscribe_all under                unsubscribe_all,
//!                          the state lock                     post ExitThread
//! ```
//!
//! A component owns private state behind its own lock.  Every handler it
//! registers takes that lock, so a measurement arriving on the sensor thread
//! and an `ask` arriving on the control thread never see the state
//! half-updated.  Handlers hold the lock only for their own body; a handler
//! must not post to a topic that the same component handles.
//!
//! Release runs exactly once: explicitly through `exit()`, or from `Drop`
//! on every other path (early return, `?`, unwinding).

pub mod manager;
pub mod threaded;

use std::sync::{Arc, Weak};

use log::{info, warn};
use parking_lot::{Mutex, MutexGuard};

use crate::board::message::{Message, Topic};
use crate::board::subscriber::{Subscriber, SubscriberId};
use crate::board::{Callback, CallbackResult, MessageBoard};
use crate::error::BusError;

pub use manager::ThreadManager;
pub use threaded::{ActiveThreadedComponent, ThreadedComponent, Trigger, Worker, WorkerHandle};

/// Handler bound to a component's state.
pub type Handler<S> = Box<dyn Fn(&mut S, &MessageBoard, &Message) -> CallbackResult + Send + Sync>;

/// A constructed, not yet entered component.
pub struct Component<S> {
    subscriber: Subscriber,
    board: Arc<MessageBoard>,
    state: Arc<Mutex<S>>,
    handlers: Vec<(Topic, Handler<S>)>,
}

impl<S: Send + 'static> Component<S> {
    pub fn new(name: &str, board: Arc<MessageBoard>, state: S) -> Self {
        Self {
            subscriber: Subscriber::new(name),
            board,
            state: Arc::new(Mutex::new(state)),
            handlers: Vec::new(),
        }
    }

    /// Handle `topic` with `handler` once entered.
    #[must_use]
    pub fn on<F>(mut self, topic: Topic, handler: F) -> Self
    where
        F: Fn(&mut S, &MessageBoard, &Message) -> CallbackResult + Send + Sync + 'static,
    {
        self.handlers.push((topic, Box::new(handler)));
        self
    }

    pub fn name(&self) -> &str {
        self.subscriber.name()
    }

    pub fn board(&self) -> &Arc<MessageBoard> {
        &self.board
    }

    /// Register every handler and return the live component.
    ///
    /// Registration happens while holding the state lock, so no handler can
    /// run before `enter` has returned.
    pub fn enter(self) -> Result<ActiveComponent<S>, BusError> {
        let Self {
            subscriber,
            board,
            state,
            handlers,
        } = self;

        {
            let _guard = state.lock();
            let callbacks = handlers
                .into_iter()
                .map(|(topic, handler)| (topic, bind(Arc::downgrade(&state), handler)))
                .collect();
            board.subscribe_all(&subscriber, callbacks)?;
        }

        Ok(ActiveComponent {
            subscriber,
            board,
            state,
            released: false,
        })
    }
}

fn bind<S: Send + 'static>(state: Weak<Mutex<S>>, handler: Handler<S>) -> Callback {
    Box::new(move |board, message| match state.upgrade() {
        Some(state) => handler(&mut state.lock(), board, message),
        None => Ok(None),
    })
}

// ───────────────────────────────────────────────────────────────
// Entered component
// ───────────────────────────────────────────────────────────────

/// A component between `enter` and release.
pub struct ActiveComponent<S> {
    subscriber: Subscriber,
    board: Arc<MessageBoard>,
    state: Arc<Mutex<S>>,
    released: bool,
}

impl<S> ActiveComponent<S> {
    pub fn name(&self) -> &str {
        self.subscriber.name()
    }

    pub fn subscriber_id(&self) -> SubscriberId {
        self.subscriber.id()
    }

    pub fn board(&self) -> &Arc<MessageBoard> {
        &self.board
    }

    /// Lock the component's state.
    pub fn state(&self) -> MutexGuard<'_, S> {
        self.state.lock()
    }

    pub(crate) fn shared_state(&self) -> Arc<Mutex<S>> {
        Arc::clone(&self.state)
    }

    /// Leave the component: unsubscribe everything and broadcast the
    /// shutdown sentinel.
    pub fn exit(mut self) {
        self.release();
    }

    pub(crate) fn release(&mut self) {
        if std::mem::replace(&mut self.released, true) {
            return;
        }
        // Inside a dispatch the registrations cannot be removed here; they
        // die with the subscriber when this value is dropped.
        if let Err(e) = self.board.unsubscribe_all(self.subscriber.id()) {
            warn!("{}: {e}", self.subscriber.name());
        }
        self.board.post(Message::ExitThread);
        info!("Exit {} worker.", self.subscriber.name());
    }
}

impl<S> Drop for ActiveComponent<S> {
    fn drop(&mut self) {
        self.release();
    }
}
