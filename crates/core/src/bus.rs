// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide typed publish/subscribe fabric.
//!
//! Subscriptions are addressed by `(server, event-kind set)`. Each
//! subscriber owns a bounded queue with an overflow policy; publishing
//! never blocks the publisher except for `Block` subscribers, which is
//! the only suspension point. Within one `(server, source)` the
//! delivery order seen by every subscriber equals publication order —
//! the publisher of a source is a single task and queues are FIFO.

use crate::event::{Event, EventKind};
use crate::id::ServerId;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};

/// What to do when a subscriber's queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Discard the oldest queued event to make room (default).
    #[default]
    DropOldest,
    /// Discard the incoming event.
    DropNew,
    /// Suspend the publisher until the subscriber drains. Lossless;
    /// reserve for subscribers that declare they need it.
    Block,
}

/// Which events a subscription receives.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionFilter {
    /// `None` matches every server.
    pub server: Option<ServerId>,
    /// `None` matches every kind.
    pub kinds: Option<HashSet<EventKind>>,
}

impl SubscriptionFilter {
    /// Match everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// Match one server, any kind.
    pub fn server(server: ServerId) -> Self {
        Self {
            server: Some(server),
            kinds: None,
        }
    }

    /// Match one server and a set of kinds.
    pub fn server_kinds(server: ServerId, kinds: impl IntoIterator<Item = EventKind>) -> Self {
        Self {
            server: Some(server),
            kinds: Some(kinds.into_iter().collect()),
        }
    }

    fn matches(&self, event: &Event) -> bool {
        if let Some(server) = &self.server {
            if *server != event.server {
                return false;
            }
        }
        if let Some(kinds) = &self.kinds {
            if !kinds.contains(&event.kind()) {
                return false;
            }
        }
        true
    }
}

/// Per-subscription tuning.
#[derive(Debug, Clone)]
pub struct SubscriptionOptions {
    pub capacity: usize,
    pub policy: OverflowPolicy,
}

impl Default for SubscriptionOptions {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            policy: OverflowPolicy::default(),
        }
    }
}

/// Default per-subscriber queue bound.
pub const DEFAULT_CAPACITY: usize = 1024;

struct SubShared {
    id: u64,
    filter: SubscriptionFilter,
    policy: OverflowPolicy,
    capacity: usize,
    queue: Mutex<VecDeque<Arc<Event>>>,
    data_ready: Notify,
    /// Free-slot permits; only consulted under `Block`.
    space: Semaphore,
    dropped: AtomicU64,
    closed: AtomicBool,
}

impl SubShared {
    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.space.close();
        self.data_ready.notify_waiters();
        self.data_ready.notify_one();
    }
}

/// The shared event bus. Cheap to clone.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<RwLock<Vec<Arc<SubShared>>>>,
    next_id: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscription.
    pub fn subscribe(&self, filter: SubscriptionFilter, opts: SubscriptionOptions) -> Subscription {
        let capacity = opts.capacity.max(1);
        let shared = Arc::new(SubShared {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            filter,
            policy: opts.policy,
            capacity,
            queue: Mutex::new(VecDeque::with_capacity(capacity.min(64))),
            data_ready: Notify::new(),
            space: Semaphore::new(capacity),
            dropped: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        });
        self.inner.write().push(Arc::clone(&shared));
        Subscription {
            shared,
            bus: self.clone(),
        }
    }

    /// Publish an event to every matching subscriber.
    ///
    /// Suspends only while a `Block` subscriber is full. Returns the
    /// number of subscribers the event was queued to.
    pub async fn publish(&self, event: Event) -> usize {
        let event = Arc::new(event);
        let targets: Vec<Arc<SubShared>> = {
            let subs = self.inner.read();
            subs.iter()
                .filter(|s| !s.closed.load(Ordering::SeqCst) && s.filter.matches(&event))
                .cloned()
                .collect()
        };

        let mut delivered = 0;
        for sub in targets {
            match sub.policy {
                OverflowPolicy::Block => {
                    // Closed subscriptions surface as a closed semaphore.
                    let Ok(permit) = sub.space.acquire().await else {
                        continue;
                    };
                    permit.forget();
                    sub.queue.lock().push_back(Arc::clone(&event));
                    delivered += 1;
                }
                OverflowPolicy::DropOldest => {
                    let mut queue = sub.queue.lock();
                    if queue.len() >= sub.capacity {
                        queue.pop_front();
                        sub.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                    queue.push_back(Arc::clone(&event));
                    delivered += 1;
                }
                OverflowPolicy::DropNew => {
                    let mut queue = sub.queue.lock();
                    if queue.len() >= sub.capacity {
                        sub.dropped.fetch_add(1, Ordering::Relaxed);
                        continue;
                    }
                    queue.push_back(Arc::clone(&event));
                    delivered += 1;
                }
            }
            sub.data_ready.notify_one();
        }
        delivered
    }

    /// Number of live subscriptions (used by health reporting).
    pub fn subscriber_count(&self) -> usize {
        self.inner.read().len()
    }

    fn remove(&self, id: u64) {
        self.inner.write().retain(|s| s.id != id);
    }
}

/// Receiving half of a subscription. Dropping it unsubscribes.
pub struct Subscription {
    shared: Arc<SubShared>,
    bus: EventBus,
}

impl Subscription {
    /// Wait for the next event. Returns `None` after `close()`.
    pub async fn recv(&mut self) -> Option<Arc<Event>> {
        loop {
            if let Some(event) = self.pop() {
                return Some(event);
            }
            if self.shared.closed.load(Ordering::SeqCst) {
                return None;
            }
            self.shared.data_ready.notified().await;
        }
    }

    /// Non-blocking receive.
    pub fn try_recv(&mut self) -> Option<Arc<Event>> {
        self.pop()
    }

    fn pop(&self) -> Option<Arc<Event>> {
        let event = self.shared.queue.lock().pop_front()?;
        if self.shared.policy == OverflowPolicy::Block && !self.shared.closed.load(Ordering::SeqCst)
        {
            self.shared.space.add_permits(1);
        }
        Some(event)
    }

    /// Events discarded on this subscription's queue so far.
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    /// Queue depth right now.
    pub fn depth(&self) -> usize {
        self.shared.queue.lock().len()
    }

    /// Close the subscription, draining outstanding deliveries for up
    /// to `drain_timeout`. Returns the drained events.
    pub async fn close(mut self, drain_timeout: Duration) -> Vec<Arc<Event>> {
        // Stop accepting new deliveries first, then drain what's queued.
        self.shared.close();
        self.bus.remove(self.shared.id);

        let mut drained = Vec::new();
        let deadline = tokio::time::Instant::now() + drain_timeout;
        loop {
            match self.try_recv() {
                Some(event) => drained.push(event),
                None => break,
            }
            if tokio::time::Instant::now() >= deadline {
                break;
            }
        }
        drained
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.shared.close();
        self.bus.remove(self.shared.id);
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
