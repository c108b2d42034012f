//! `RocksDB` storage implementation.

use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options, WriteBatch,
};

use payflow_core::{
    Account, EventId, IdempotencyRecord, Order, OrderCreated, OrderId, OrderIndexEntry,
    RecordState, StoredResponse, UserId,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::{Reservation, Store};

/// RocksDB-backed storage implementation.
///
/// Balance mutations and idempotency transitions for one user serialize on
/// a per-account lock; different accounts proceed independently.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    account_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            account_locks: DashMap::new(),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Get the lock guarding a single account's state.
    fn account_lock(&self, user_id: &UserId) -> Arc<Mutex<()>> {
        self.account_locks
            .entry(user_id.as_str().to_owned())
            .or_default()
            .clone()
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn get_record<T: serde::de::DeserializeOwned>(
        &self,
        cf_name: &str,
        key: &[u8],
    ) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn put_record<T: serde::Serialize>(&self, cf_name: &str, key: &[u8], value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        let value = Self::serialize(value)?;
        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Account Operations
    // =========================================================================

    fn create_account(&self, account: &Account) -> Result<()> {
        let lock = self.account_lock(&account.user_id);
        let _guard = lock.lock();

        if self.get_account(&account.user_id)?.is_some() {
            return Err(StoreError::AlreadyExists);
        }

        self.put_record(cf::ACCOUNTS, &keys::account_key(&account.user_id), account)
    }

    fn get_account(&self, user_id: &UserId) -> Result<Option<Account>> {
        self.get_record(cf::ACCOUNTS, &keys::account_key(user_id))
    }

    fn deposit(&self, user_id: &UserId, amount: i64) -> Result<i64> {
        let lock = self.account_lock(user_id);
        let _guard = lock.lock();

        let mut account = self.get_account(user_id)?.ok_or(StoreError::NotFound)?;
        account.balance += amount;
        account.updated_at = chrono::Utc::now();

        self.put_record(cf::ACCOUNTS, &keys::account_key(user_id), &account)?;
        Ok(account.balance)
    }

    // =========================================================================
    // Order Operations
    // =========================================================================

    fn debit_and_insert_order(&self, order: &Order, event: &OrderCreated) -> Result<i64> {
        let lock = self.account_lock(&order.user_id);
        let _guard = lock.lock();

        let mut account = self
            .get_account(&order.user_id)?
            .ok_or(StoreError::NotFound)?;

        if account.balance < order.amount {
            return Err(StoreError::InsufficientFunds {
                balance: account.balance,
                required: order.amount,
            });
        }

        account.balance -= order.amount;
        account.updated_at = chrono::Utc::now();

        let cf_accounts = self.cf(cf::ACCOUNTS)?;
        let cf_orders = self.cf(cf::ORDERS)?;
        let cf_outbox = self.cf(cf::OUTBOX)?;

        let account_value = Self::serialize(&account)?;
        let order_value = Self::serialize(order)?;
        let event_value = Self::serialize(event)?;

        // The debit, the order, and its event commit or fail together.
        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_accounts, keys::account_key(&order.user_id), &account_value);
        batch.put_cf(&cf_orders, keys::order_key(&order.order_id), &order_value);
        batch.put_cf(&cf_outbox, keys::outbox_key(&event.event_id), &event_value);

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(account.balance)
    }

    fn get_order(&self, order_id: &OrderId) -> Result<Option<Order>> {
        self.get_record(cf::ORDERS, &keys::order_key(order_id))
    }

    // =========================================================================
    // Order Index Operations
    // =========================================================================

    fn peek_outbox(&self, limit: usize) -> Result<Vec<OrderCreated>> {
        let cf_outbox = self.cf(cf::OUTBOX)?;
        let mut events = Vec::new();

        for item in self.db.iterator_cf(&cf_outbox, IteratorMode::Start) {
            if events.len() >= limit {
                break;
            }
            let (_, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            events.push(Self::deserialize(&value)?);
        }

        Ok(events)
    }

    fn remove_outbox(&self, event_id: &EventId) -> Result<()> {
        let cf_outbox = self.cf(cf::OUTBOX)?;
        self.db
            .delete_cf(&cf_outbox, keys::outbox_key(event_id))
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn apply_index_entry(&self, event: &OrderCreated) -> Result<bool> {
        let order = &event.order;
        let key = keys::user_order_key(&order.user_id, &order.order_id);

        let existing: Option<OrderIndexEntry> = self.get_record(cf::ORDERS_BY_USER, &key)?;
        if existing.is_some() {
            tracing::debug!(
                order_id = %order.order_id,
                event_id = %event.event_id,
                "duplicate order-created event, index entry already present"
            );
            return Ok(false);
        }

        self.put_record(cf::ORDERS_BY_USER, &key, &OrderIndexEntry::from(order))?;
        Ok(true)
    }

    fn list_index_entries(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<OrderIndexEntry>> {
        let cf_by_user = self.cf(cf::ORDERS_BY_USER)?;
        let prefix = keys::user_orders_prefix(user_id);

        // ULID suffixes sort oldest first; collect the prefix range and
        // reverse for newest-first listing.
        let iter = self.db.iterator_cf(
            &cf_by_user,
            IteratorMode::From(&prefix, rocksdb::Direction::Forward),
        );

        let mut all: Vec<OrderIndexEntry> = Vec::new();
        for item in iter {
            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            all.push(Self::deserialize(&value)?);
        }

        all.reverse();
        Ok(all.into_iter().skip(offset).take(limit).collect())
    }

    // =========================================================================
    // Idempotency Operations
    // =========================================================================

    fn reserve_idempotency(
        &self,
        user_id: &UserId,
        key: &str,
        fingerprint: &str,
    ) -> Result<Reservation> {
        let lock = self.account_lock(user_id);
        let _guard = lock.lock();

        let db_key = keys::idempotency_key(user_id, key);
        let existing: Option<IdempotencyRecord> = self.get_record(cf::IDEMPOTENCY, &db_key)?;

        match existing {
            None => {
                let record = IdempotencyRecord::reserve(fingerprint.to_owned());
                self.put_record(cf::IDEMPOTENCY, &db_key, &record)?;
                Ok(Reservation::Fresh)
            }
            Some(record) if record.fingerprint != fingerprint => {
                Err(StoreError::IdempotencyMismatch)
            }
            Some(record) => match record.state {
                RecordState::Pending => Ok(Reservation::InFlight),
                RecordState::Committed(response) => Ok(Reservation::Duplicate(response)),
            },
        }
    }

    fn commit_idempotency(
        &self,
        user_id: &UserId,
        key: &str,
        response: &StoredResponse,
    ) -> Result<()> {
        let lock = self.account_lock(user_id);
        let _guard = lock.lock();

        let db_key = keys::idempotency_key(user_id, key);
        let mut record: IdempotencyRecord = self
            .get_record(cf::IDEMPOTENCY, &db_key)?
            .ok_or(StoreError::NoReservation)?;

        if matches!(record.state, RecordState::Committed(_)) {
            return Err(StoreError::AlreadyExists);
        }

        record.state = RecordState::Committed(response.clone());
        self.put_record(cf::IDEMPOTENCY, &db_key, &record)
    }

    fn release_idempotency(&self, user_id: &UserId, key: &str) -> Result<()> {
        let lock = self.account_lock(user_id);
        let _guard = lock.lock();

        let db_key = keys::idempotency_key(user_id, key);
        let record: Option<IdempotencyRecord> = self.get_record(cf::IDEMPOTENCY, &db_key)?;

        match record {
            Some(record) if matches!(record.state, RecordState::Pending) => {
                let cf = self.cf(cf::IDEMPOTENCY)?;
                self.db
                    .delete_cf(&cf, db_key)
                    .map_err(|e| StoreError::Database(e.to_string()))
            }
            _ => Err(StoreError::NoReservation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (RocksStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        (store, dir)
    }

    fn user(name: &str) -> UserId {
        UserId::new(name).unwrap()
    }

    fn funded_account(store: &RocksStore, name: &str, balance: i64) -> UserId {
        let user_id = user(name);
        store.create_account(&Account::new(user_id.clone())).unwrap();
        if balance > 0 {
            store.deposit(&user_id, balance).unwrap();
        }
        user_id
    }

    #[test]
    fn account_create_and_deposit() {
        let (store, _dir) = create_test_store();
        let user_id = user("u1");

        store.create_account(&Account::new(user_id.clone())).unwrap();
        let account = store.get_account(&user_id).unwrap().unwrap();
        assert_eq!(account.balance, 0);

        let balance = store.deposit(&user_id, 500).unwrap();
        assert_eq!(balance, 500);

        let account = store.get_account(&user_id).unwrap().unwrap();
        assert_eq!(account.balance, 500);
    }

    #[test]
    fn duplicate_account_rejected() {
        let (store, _dir) = create_test_store();
        let user_id = user("u1");

        store.create_account(&Account::new(user_id.clone())).unwrap();
        let result = store.create_account(&Account::new(user_id));
        assert!(matches!(result, Err(StoreError::AlreadyExists)));
    }

    #[test]
    fn deposit_to_missing_account_fails() {
        let (store, _dir) = create_test_store();
        let result = store.deposit(&user("ghost"), 100);
        assert!(matches!(result, Err(StoreError::NotFound)));
    }

    #[test]
    fn debit_writes_order_and_outbox_atomically() {
        let (store, _dir) = create_test_store();
        let user_id = funded_account(&store, "u1", 1000);

        let order = Order::new(user_id.clone(), 300, "widgets".into());
        let event = OrderCreated::for_order(&order);

        let balance = store.debit_and_insert_order(&order, &event).unwrap();
        assert_eq!(balance, 700);

        // Order is immediately readable from the primary records.
        let stored = store.get_order(&order.order_id).unwrap().unwrap();
        assert_eq!(stored.amount, 300);
        assert_eq!(stored.user_id, user_id);

        // The event landed in the outbox in the same commit.
        let pending = store.peek_outbox(10).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].order.order_id, order.order_id);
    }

    #[test]
    fn insufficient_funds_leaves_nothing_behind() {
        let (store, _dir) = create_test_store();
        let user_id = funded_account(&store, "u1", 100);

        let order = Order::new(user_id.clone(), 500, "too much".into());
        let event = OrderCreated::for_order(&order);

        let result = store.debit_and_insert_order(&order, &event);
        assert!(matches!(
            result,
            Err(StoreError::InsufficientFunds {
                balance: 100,
                required: 500
            })
        ));

        assert_eq!(store.get_account(&user_id).unwrap().unwrap().balance, 100);
        assert!(store.get_order(&order.order_id).unwrap().is_none());
        assert!(store.peek_outbox(10).unwrap().is_empty());
    }

    #[test]
    fn index_apply_is_idempotent() {
        let (store, _dir) = create_test_store();
        let user_id = funded_account(&store, "u1", 1000);

        let order = Order::new(user_id.clone(), 100, "once".into());
        let event = OrderCreated::for_order(&order);
        store.debit_and_insert_order(&order, &event).unwrap();

        assert!(store.apply_index_entry(&event).unwrap());
        // Redelivery of the same event must not duplicate the entry.
        assert!(!store.apply_index_entry(&event).unwrap());

        let entries = store.list_index_entries(&user_id, 10, 0).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].order_id, order.order_id);
    }

    #[test]
    fn outbox_drain_removes_delivered_events() {
        let (store, _dir) = create_test_store();
        let user_id = funded_account(&store, "u1", 1000);

        let order = Order::new(user_id, 100, "drain".into());
        let event = OrderCreated::for_order(&order);
        store.debit_and_insert_order(&order, &event).unwrap();

        let pending = store.peek_outbox(10).unwrap();
        assert_eq!(pending.len(), 1);

        store.apply_index_entry(&pending[0]).unwrap();
        store.remove_outbox(&pending[0].event_id).unwrap();
        assert!(store.peek_outbox(10).unwrap().is_empty());
    }

    #[test]
    fn list_entries_newest_first_with_pagination() {
        let (store, _dir) = create_test_store();
        let user_id = funded_account(&store, "u1", 1000);

        for i in 0..3 {
            let order = Order::new(user_id.clone(), 100, format!("order {i}"));
            let event = OrderCreated::for_order(&order);
            store.debit_and_insert_order(&order, &event).unwrap();
            store.apply_index_entry(&event).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(2)); // distinct ULID timestamps
        }

        let entries = store.list_index_entries(&user_id, 10, 0).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].description, "order 2");
        assert_eq!(entries[2].description, "order 0");

        let page1 = store.list_index_entries(&user_id, 2, 0).unwrap();
        let page2 = store.list_index_entries(&user_id, 2, 2).unwrap();
        assert_eq!(page1.len(), 2);
        assert_eq!(page2.len(), 1);
        assert_eq!(page2[0].description, "order 0");
    }

    #[test]
    fn index_entries_are_scoped_per_user() {
        let (store, _dir) = create_test_store();
        let alice = funded_account(&store, "alice", 1000);
        let bob = funded_account(&store, "bob", 1000);

        let order = Order::new(alice.clone(), 100, "alice's".into());
        let event = OrderCreated::for_order(&order);
        store.debit_and_insert_order(&order, &event).unwrap();
        store.apply_index_entry(&event).unwrap();

        assert_eq!(store.list_index_entries(&alice, 10, 0).unwrap().len(), 1);
        assert!(store.list_index_entries(&bob, 10, 0).unwrap().is_empty());
    }

    #[test]
    fn idempotency_reserve_commit_replay() {
        let (store, _dir) = create_test_store();
        let user_id = user("u1");

        let first = store.reserve_idempotency(&user_id, "k1", "fp").unwrap();
        assert!(matches!(first, Reservation::Fresh));

        // Same key while pending: concurrent duplicate must wait.
        let second = store.reserve_idempotency(&user_id, "k1", "fp").unwrap();
        assert!(matches!(second, Reservation::InFlight));

        let response = StoredResponse {
            status: 201,
            body: b"{\"balance\":0}".to_vec(),
        };
        store.commit_idempotency(&user_id, "k1", &response).unwrap();

        let third = store.reserve_idempotency(&user_id, "k1", "fp").unwrap();
        match third {
            Reservation::Duplicate(stored) => assert_eq!(stored, response),
            other => panic!("expected duplicate, got {other:?}"),
        }
    }

    #[test]
    fn idempotency_fingerprint_mismatch_rejected() {
        let (store, _dir) = create_test_store();
        let user_id = user("u1");

        store.reserve_idempotency(&user_id, "k1", "fp-a").unwrap();
        let result = store.reserve_idempotency(&user_id, "k1", "fp-b");
        assert!(matches!(result, Err(StoreError::IdempotencyMismatch)));
    }

    #[test]
    fn idempotency_keys_are_per_user() {
        let (store, _dir) = create_test_store();
        let alice = user("alice");
        let bob = user("bob");

        assert!(matches!(
            store.reserve_idempotency(&alice, "k1", "fp").unwrap(),
            Reservation::Fresh
        ));
        // The same key for a different user is independent.
        assert!(matches!(
            store.reserve_idempotency(&bob, "k1", "fp").unwrap(),
            Reservation::Fresh
        ));
    }

    #[test]
    fn commit_without_reservation_rejected() {
        let (store, _dir) = create_test_store();
        let response = StoredResponse {
            status: 200,
            body: Vec::new(),
        };
        let result = store.commit_idempotency(&user("u1"), "k1", &response);
        assert!(matches!(result, Err(StoreError::NoReservation)));
    }

    #[test]
    fn release_returns_key_to_fresh() {
        let (store, _dir) = create_test_store();
        let user_id = user("u1");

        store.reserve_idempotency(&user_id, "k1", "fp").unwrap();
        store.release_idempotency(&user_id, "k1").unwrap();

        let again = store.reserve_idempotency(&user_id, "k1", "fp").unwrap();
        assert!(matches!(again, Reservation::Fresh));
    }

    #[test]
    fn concurrent_deposits_serialize_per_account() {
        let (store, _dir) = create_test_store();
        let store = std::sync::Arc::new(store);
        let user_id = funded_account(&store, "u1", 0);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = std::sync::Arc::clone(&store);
            let user_id = user_id.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..25 {
                    store.deposit(&user_id, 10).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(
            store.get_account(&user_id).unwrap().unwrap().balance,
            8 * 25 * 10
        );
    }

    #[test]
    fn concurrent_debits_never_overdraw() {
        let (store, _dir) = create_test_store();
        let store = std::sync::Arc::new(store);
        let user_id = funded_account(&store, "u1", 500);

        // Ten racing debits of 100 against a balance of 500: exactly five
        // can win under any interleaving.
        let mut handles = Vec::new();
        for _ in 0..10 {
            let store = std::sync::Arc::clone(&store);
            let user_id = user_id.clone();
            handles.push(std::thread::spawn(move || {
                let order = Order::new(user_id, 100, "race".into());
                let event = OrderCreated::for_order(&order);
                store.debit_and_insert_order(&order, &event).is_ok()
            }));
        }

        let wins = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|won| *won)
            .count();

        assert_eq!(wins, 5);
        assert_eq!(store.get_account(&user_id).unwrap().unwrap().balance, 0);
    }
}
