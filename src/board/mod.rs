//! Process-wide publish/subscribe message board.
//!
//! The board is the only state shared between the controller's threads.
//! It holds the last value posted for every topic and, per topic, the
//! ordered list of subscriber callbacks.
//!
//! ```text
//!  producers ──post──▶ ┌──────────────────────────────┐ ──callback──▶ subscribers
//!                      │ messages:      Topic → last  │
//!  consumers ◀─query── │ subscriptions: Topic → [cb]  │ ◀──ask──────  requesters
//!                      └──────────────────────────────┘
//! ```
//!
//! ## Locking
//!
//! The two maps are guarded by independent `parking_lot` read/write locks.
//!
//! - `messages` is held only for the store in `post` and the lookup in
//!   `query`, never across a callback.
//! - `subscriptions` is read on every `post`/`ask` and written only when
//!   components start or stop.  Dispatch holds it with
//!   [`RwLock::read_recursive`], which neither waits behind a queued writer
//!   nor deadlocks when a callback re-enters `post`/`ask` on the same
//!   thread.  A pending registration change may therefore wait while
//!   dispatch traffic continues.
//!
//! Registration changes from inside a callback being dispatched on the same
//! thread would self-deadlock on the write lock; they are rejected with
//! [`BusError::ReentrantRegistration`] instead.
//!
//! ## Faults
//!
//! A callback that returns an error or panics is caught at the dispatch
//! boundary.  The fault is logged and posted as [`Message::Fault`]; the
//! remaining subscribers of the topic are still notified.  The locks do
//! not poison, so board state stays consistent.

pub mod message;
pub mod subscriber;

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use log::{debug, error};
use parking_lot::RwLock;

use crate::error::BusError;
use message::{FaultReport, Message, Reply, Topic};
use subscriber::{Subscriber, SubscriberId, SubscriptionToken};

/// What a callback returns: `Some(reply)` when answering an `ask`,
/// `None` for plain notifications.
pub type CallbackResult = anyhow::Result<Option<Reply>>;

/// A subscriber callback.  Receives the board so it can post, query or ask
/// without holding a reference to it.
pub type Callback = Box<dyn Fn(&MessageBoard, &Message) -> CallbackResult + Send + Sync>;

struct Subscription {
    subscriber: SubscriberId,
    name: Arc<str>,
    alive: Weak<()>,
    callback: Callback,
}

impl Subscription {
    fn is_live(&self) -> bool {
        self.alive.strong_count() > 0
    }

    fn invoke(&self, board: &MessageBoard, message: &Message) -> Result<Option<Reply>, String> {
        match panic::catch_unwind(AssertUnwindSafe(|| (self.callback)(board, message))) {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(e)) => Err(format!("{e:#}")),
            Err(payload) => Err(panic_reason(payload.as_ref())),
        }
    }

    fn fault(&self, topic: Topic, reason: String) -> FaultReport {
        FaultReport {
            topic,
            subscriber: self.name.to_string(),
            reason,
        }
    }
}

pub(crate) fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

// Boards currently dispatching on this thread, by address.
thread_local! {
    static DISPATCHING: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

struct DispatchScope(usize);

impl DispatchScope {
    fn enter(board: &MessageBoard) -> Self {
        let key = board.key();
        DISPATCHING.with(|d| d.borrow_mut().push(key));
        Self(key)
    }
}

impl Drop for DispatchScope {
    fn drop(&mut self) {
        DISPATCHING.with(|d| {
            let mut d = d.borrow_mut();
            if let Some(pos) = d.iter().rposition(|k| *k == self.0) {
                d.remove(pos);
            }
        });
    }
}

// ───────────────────────────────────────────────────────────────
// MessageBoard
// ───────────────────────────────────────────────────────────────

/// The shared publish/subscribe board.  Construct once, share via `Arc`.
#[derive(Default)]
pub struct MessageBoard {
    messages: RwLock<HashMap<Topic, Message>>,
    subscriptions: RwLock<HashMap<Topic, Vec<Subscription>>>,
}

impl MessageBoard {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(&self) -> usize {
        std::ptr::from_ref(self) as usize
    }

    fn is_dispatching(&self) -> bool {
        let key = self.key();
        DISPATCHING.with(|d| d.borrow().contains(&key))
    }

    // ── Publishing ────────────────────────────────────────────

    /// Store `message` as the latest value of its topic, then run every live
    /// subscriber of that topic, in subscription order, on this thread.
    pub fn post(&self, message: Message) {
        let topic = message.topic();
        self.messages.write().insert(topic, message.clone());

        let faults = {
            let subscriptions = self.subscriptions.read_recursive();
            let _scope = DispatchScope::enter(self);
            let mut faults = Vec::new();
            if let Some(list) = subscriptions.get(&topic) {
                for sub in list.iter().filter(|s| s.is_live()) {
                    if let Err(reason) = sub.invoke(self, &message) {
                        faults.push(sub.fault(topic, reason));
                    }
                }
            }
            faults
        };

        for fault in faults {
            self.report_fault(fault);
        }
    }

    /// Latest value posted for `topic`, or `None` if it was never posted.
    /// Never runs subscriber code.
    pub fn query(&self, topic: Topic) -> Option<Message> {
        self.messages.read().get(&topic).cloned()
    }

    /// Whether the shutdown sentinel has been posted.
    pub fn exit_requested(&self) -> bool {
        self.messages.read().contains_key(&Topic::ExitThread)
    }

    /// Run the first live subscriber of the request's topic and return its
    /// answer.  `None` if nobody is subscribed or the responder faulted.
    pub fn ask(&self, request: Message) -> Option<Reply> {
        let topic = request.topic();
        let outcome = {
            let subscriptions = self.subscriptions.read_recursive();
            let _scope = DispatchScope::enter(self);
            let responder = subscriptions.get(&topic)?.iter().find(|s| s.is_live())?;
            responder
                .invoke(self, &request)
                .map_err(|reason| responder.fault(topic, reason))
        };

        match outcome {
            Ok(reply) => reply,
            Err(fault) => {
                self.report_fault(fault);
                None
            }
        }
    }

    fn report_fault(&self, fault: FaultReport) {
        error!("{fault}");
        // A faulting fault handler is only logged.
        if fault.topic != Topic::Fault {
            self.post(Message::Fault(fault));
        }
    }

    // ── Registration ──────────────────────────────────────────

    /// Register `callback` for `topic` on behalf of `subscriber`.
    pub fn subscribe<F>(
        &self,
        topic: Topic,
        subscriber: &Subscriber,
        callback: F,
    ) -> Result<SubscriptionToken, BusError>
    where
        F: Fn(&MessageBoard, &Message) -> CallbackResult + Send + Sync + 'static,
    {
        let callback: Callback = Box::new(callback);
        self.subscribe_all(subscriber, vec![(topic, callback)])?;
        Ok(SubscriptionToken {
            topic,
            subscriber: subscriber.id(),
        })
    }

    /// Register several callbacks in one critical section.  Either every
    /// registration succeeds or none is made.
    pub fn subscribe_all(
        &self,
        subscriber: &Subscriber,
        callbacks: Vec<(Topic, Callback)>,
    ) -> Result<Vec<SubscriptionToken>, BusError> {
        if self.is_dispatching() {
            return Err(BusError::ReentrantRegistration {
                topic: callbacks.first().map(|(topic, _)| *topic),
            });
        }

        let id = subscriber.id();
        let mut subscriptions = self.subscriptions.write();

        for (i, (topic, _)) in callbacks.iter().enumerate() {
            let registered = subscriptions
                .get(topic)
                .is_some_and(|list| list.iter().any(|s| s.subscriber == id));
            let repeated = callbacks[..i].iter().any(|(t, _)| t == topic);
            if registered || repeated {
                return Err(BusError::DuplicateSubscription {
                    topic: *topic,
                    subscriber: id,
                });
            }
        }

        let name = subscriber.shared_name();
        let alive = subscriber.liveness();
        let mut tokens = Vec::with_capacity(callbacks.len());
        for (topic, callback) in callbacks {
            let list = subscriptions.entry(topic).or_default();
            list.retain(Subscription::is_live);
            list.push(Subscription {
                subscriber: id,
                name: Arc::clone(&name),
                alive: alive.clone(),
                callback,
            });
            debug!("{name} subscribed to {topic}");
            tokens.push(SubscriptionToken { topic, subscriber: id });
        }
        Ok(tokens)
    }

    /// Remove `subscriber`'s registration for `topic`.  Removing something
    /// that is not registered is not an error.
    pub fn unsubscribe(&self, topic: Topic, subscriber: SubscriberId) -> Result<(), BusError> {
        if self.is_dispatching() {
            return Err(BusError::ReentrantRegistration { topic: Some(topic) });
        }

        let mut subscriptions = self.subscriptions.write();
        if let Some(list) = subscriptions.get_mut(&topic) {
            list.retain(|s| s.subscriber != subscriber && s.is_live());
            if list.is_empty() {
                subscriptions.remove(&topic);
            }
        }
        Ok(())
    }

    /// Remove every registration of `subscriber`.
    pub fn unsubscribe_all(&self, subscriber: SubscriberId) -> Result<(), BusError> {
        if self.is_dispatching() {
            return Err(BusError::ReentrantRegistration { topic: None });
        }

        let mut subscriptions = self.subscriptions.write();
        for list in subscriptions.values_mut() {
            list.retain(|s| s.subscriber != subscriber && s.is_live());
        }
        subscriptions.retain(|_, list| !list.is_empty());
        Ok(())
    }

    /// Undo the registration a token stands for.  Stale tokens are a no-op.
    pub fn cancel(&self, token: SubscriptionToken) -> Result<(), BusError> {
        self.unsubscribe(token.topic, token.subscriber)
    }

    // ── Introspection ─────────────────────────────────────────

    /// Number of live subscribers of `topic`.
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.subscriptions
            .read_recursive()
            .get(&topic)
            .map_or(0, |list| list.iter().filter(|s| s.is_live()).count())
    }

    /// Topics `subscriber` is registered for, sorted.
    pub fn subscriptions_of(&self, subscriber: SubscriberId) -> Vec<Topic> {
        let mut topics: Vec<Topic> = self
            .subscriptions
            .read_recursive()
            .iter()
            .filter(|(_, list)| list.iter().any(|s| s.subscriber == subscriber))
            .map(|(topic, _)| *topic)
            .collect();
        topics.sort_unstable();
        topics
    }

    /// Number of topics with at least one registration, dead ones included.
    pub fn topic_count(&self) -> usize {
        self.subscriptions.read_recursive().len()
    }
}
