//! Subscriber identity.
//!
//! The board never owns a subscriber.  It stores the subscriber's id and a
//! weak view of its liveness anchor; once the [`Subscriber`] is dropped every
//! registration it made is dead and dispatch skips it.

use core::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use super::message::Topic;

static NEXT_SUBSCRIBER_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique subscriber identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subscriber#{}", self.0)
    }
}

/// Identity handed to [`MessageBoard::subscribe`](super::MessageBoard::subscribe).
///
/// Not `Clone`: one value is one identity.
#[derive(Debug)]
pub struct Subscriber {
    id: SubscriberId,
    name: Arc<str>,
    anchor: Arc<()>,
}

impl Subscriber {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            id: SubscriberId(NEXT_SUBSCRIBER_ID.fetch_add(1, Ordering::Relaxed)),
            name: name.into(),
            anchor: Arc::new(()),
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(super) fn shared_name(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    pub(super) fn liveness(&self) -> Weak<()> {
        Arc::downgrade(&self.anchor)
    }
}

/// Receipt for one registration.  Cancelling a stale token is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken {
    pub(super) topic: Topic,
    pub(super) subscriber: SubscriberId,
}

impl SubscriptionToken {
    pub fn topic(&self) -> Topic {
        self.topic
    }

    pub fn subscriber(&self) -> SubscriberId {
        self.subscriber
    }
}
