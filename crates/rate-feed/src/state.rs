//! Rate state and subscriber registry
//!
//! Uses DashMap for the subscriber set so registrations never contend with
//! readers of the current table.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard, RwLock};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};

use jewar_core::RateTable;

use crate::subscriber::{RateSubscriber, SubscriptionId};

/// Authoritative rate table plus everyone listening to it
pub struct RateState {
    current: RwLock<Arc<RateTable>>,
    subscribers: DashMap<SubscriptionId, Arc<dyn RateSubscriber>>,
    /// Held while a table is swapped in and delivered, and while a new
    /// subscriber receives its first table
    publishing: ReentrantMutex<()>,
    next_id: AtomicU64,
    publish_count: AtomicU64,
    failed_deliveries: AtomicU64,
}

impl RateState {
    pub fn new(seed: RateTable) -> Self {
        Self {
            current: RwLock::new(Arc::new(seed)),
            subscribers: DashMap::new(),
            publishing: ReentrantMutex::new(()),
            next_id: AtomicU64::new(1),
            publish_count: AtomicU64::new(0),
            failed_deliveries: AtomicU64::new(0),
        }
    }

    /// Current table, no I/O
    pub fn current(&self) -> Arc<RateTable> {
        Arc::clone(&self.current.read())
    }

    /// Replace the table wholesale
    pub fn replace(&self, table: RateTable) -> Arc<RateTable> {
        let table = Arc::new(table);
        *self.current.write() = Arc::clone(&table);
        self.publish_count.fetch_add(1, Ordering::Relaxed);
        table
    }

    /// Replace the table and deliver it to every subscriber as one step.
    ///
    /// Returns the published table and the number of successful deliveries.
    pub fn publish(&self, table: RateTable) -> (Arc<RateTable>, usize) {
        let _publishing = self.publishing.lock();
        let published = self.replace(table);
        let delivered = self.notify_all(&published);
        (published, delivered)
    }

    /// Block publishing for as long as the guard lives.
    ///
    /// Re-entrant, so subscribers may subscribe from inside `receive`.
    pub fn hold_publishing(&self) -> ReentrantMutexGuard<'_, ()> {
        self.publishing.lock()
    }

    /// Keep prices, advance only the timestamp
    pub fn touch(&self, last_updated: DateTime<Utc>) -> Arc<RateTable> {
        let _publishing = self.publishing.lock();
        let mut current = self.current.write();
        let touched = Arc::new(current.touched(last_updated));
        *current = Arc::clone(&touched);
        touched
    }

    pub fn add_subscriber(&self, subscriber: Arc<dyn RateSubscriber>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.insert(id, subscriber);
        id
    }

    pub fn remove_subscriber(&self, id: SubscriptionId) -> bool {
        self.subscribers.remove(&id).is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Deliver to one subscriber, containing errors and panics
    pub fn deliver(&self, id: SubscriptionId, subscriber: &dyn RateSubscriber, rates: Arc<RateTable>) -> bool {
        match catch_unwind(AssertUnwindSafe(|| subscriber.receive(rates))) {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!("Error notifying subscriber {}: {:#}", id, e);
                self.failed_deliveries.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(_) => {
                error!("Subscriber {} panicked while receiving rates", id);
                self.failed_deliveries.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Deliver the same table to every subscriber; returns successful deliveries
    pub fn notify_all(&self, rates: &Arc<RateTable>) -> usize {
        // snapshot first so subscribers may (un)subscribe from inside receive()
        let targets: Vec<(SubscriptionId, Arc<dyn RateSubscriber>)> = self
            .subscribers
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();

        debug!("Notifying {} subscribers", targets.len());

        let mut delivered = 0;
        for (id, subscriber) in &targets {
            if self.deliver(*id, subscriber.as_ref(), Arc::clone(rates)) {
                delivered += 1;
            }
        }
        delivered
    }

    pub fn stats(&self) -> RateStateStats {
        RateStateStats {
            subscriber_count: self.subscribers.len(),
            publish_count: self.publish_count.load(Ordering::Relaxed),
            failed_deliveries: self.failed_deliveries.load(Ordering::Relaxed),
            last_updated: self.current.read().last_updated,
        }
    }
}

/// Statistics about rate state
#[derive(Debug, Clone)]
pub struct RateStateStats {
    pub subscriber_count: usize,
    pub publish_count: u64,
    pub failed_deliveries: u64,
    pub last_updated: DateTime<Utc>,
}
