//! The order index consumer.
//!
//! A background task drains order-created events from the outbox into the
//! per-user order index. Delivery is at-least-once: an entry is applied
//! before its outbox row is removed, and the apply step dedupes by order
//! id, so a crash between the two only causes a harmless redelivery.
//!
//! The request path never waits on this task; the listing endpoint may lag
//! order creation by up to one poll interval (less when the commit nudge
//! arrives).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use payflow_store::{Result, RocksStore, Store};

use crate::config::ServiceConfig;

/// Background consumer building the per-user order index from the outbox.
pub struct OrderIndexer {
    store: Arc<RocksStore>,
    poll_interval: Duration,
    batch_size: usize,
    nudge: Arc<Notify>,
}

impl OrderIndexer {
    /// Create a consumer for the given store and configuration.
    #[must_use]
    pub fn new(store: Arc<RocksStore>, config: &ServiceConfig) -> Self {
        Self {
            store,
            poll_interval: Duration::from_millis(config.index_poll_interval_ms),
            batch_size: config.index_batch_size,
            nudge: Arc::new(Notify::new()),
        }
    }

    /// Handle used by the request path to wake the consumer after a commit.
    #[must_use]
    pub fn nudge_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.nudge)
    }

    /// Spawn the consumer loop onto the current tokio runtime.
    pub fn spawn(self) {
        tracing::info!(
            poll_interval_ms = %self.poll_interval.as_millis(),
            batch_size = %self.batch_size,
            "order index consumer started"
        );
        tokio::spawn(self.run());
    }

    async fn run(self) {
        loop {
            tokio::select! {
                () = self.nudge.notified() => {}
                () = tokio::time::sleep(self.poll_interval) => {}
            }

            loop {
                match self.drain_pending() {
                    Ok(0) => break,
                    Ok(applied) => {
                        tracing::debug!(applied = %applied, "order index entries applied");
                    }
                    Err(err) => {
                        // Events stay in the outbox; the next cycle retries.
                        tracing::error!(error = %err, "order index drain failed");
                        break;
                    }
                }
            }
        }
    }

    /// Apply one batch of pending events. Returns how many were processed.
    fn drain_pending(&self) -> Result<usize> {
        let events = self.store.peek_outbox(self.batch_size)?;
        let count = events.len();

        for event in events {
            self.store.apply_index_entry(&event)?;
            self.store.remove_outbox(&event.event_id)?;
        }

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use payflow_core::{Account, Order, OrderCreated, UserId};
    use tempfile::TempDir;

    fn indexer_with_store() -> (OrderIndexer, Arc<RocksStore>, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RocksStore::open(dir.path()).unwrap());
        let indexer = OrderIndexer::new(Arc::clone(&store), &ServiceConfig::default());
        (indexer, store, dir)
    }

    fn committed_order(store: &RocksStore, user_id: &UserId, amount: i64) -> OrderCreated {
        let order = Order::new(user_id.clone(), amount, "indexed".into());
        let event = OrderCreated::for_order(&order);
        store.debit_and_insert_order(&order, &event).unwrap();
        event
    }

    #[test]
    fn drain_applies_and_clears_outbox() {
        let (indexer, store, _dir) = indexer_with_store();
        let user_id = UserId::new("idx-user").unwrap();
        store.create_account(&Account::new(user_id.clone())).unwrap();
        store.deposit(&user_id, 1000).unwrap();

        let event = committed_order(&store, &user_id, 100);

        assert_eq!(indexer.drain_pending().unwrap(), 1);
        assert_eq!(indexer.drain_pending().unwrap(), 0);

        let entries = store.list_index_entries(&user_id, 10, 0).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].order_id, event.order.order_id);
        assert!(store.peek_outbox(10).unwrap().is_empty());
    }

    #[test]
    fn redelivered_events_do_not_duplicate_entries() {
        let (indexer, store, _dir) = indexer_with_store();
        let user_id = UserId::new("idx-user").unwrap();
        store.create_account(&Account::new(user_id.clone())).unwrap();
        store.deposit(&user_id, 1000).unwrap();

        let event = committed_order(&store, &user_id, 100);

        // Simulate a crash after apply but before remove: the entry exists
        // and the event is still in the outbox.
        store.apply_index_entry(&event).unwrap();
        assert_eq!(indexer.drain_pending().unwrap(), 1);

        let entries = store.list_index_entries(&user_id, 10, 0).unwrap();
        assert_eq!(entries.len(), 1);
    }
}
