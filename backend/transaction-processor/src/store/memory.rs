//! In-process store for local runs and tests
//!
//! Transactions are serialized on one async lock, which plays the role of the
//! advisory lock in the PostgreSQL store. Faults can be injected per
//! operation, and every call is appended to an [`OperationLog`] so callers can
//! assert on ordering.
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use super::{CardRecord, Identities, StoreError, StoreTransaction, TransactionStore, UserRecord};
use crate::guard::DedupKey;
use crate::models::CanonicalTransaction;

/// Shared, ordered record of store and broker calls
pub type OperationLog = Arc<Mutex<Vec<String>>>;

#[derive(Default)]
struct MemoryState {
    users: HashSet<String>,
    cards: HashMap<String, String>,
    transactions: Vec<CanonicalTransaction>,
    failing_inserts: u32,
    failing_begins: u32,
    insert_delay: Option<Duration>,
}

#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    serial: Arc<tokio::sync::Mutex<()>>,
    log: OperationLog,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_log(OperationLog::default())
    }

    pub fn with_log(log: OperationLog) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            serial: Arc::new(tokio::sync::Mutex::new(())),
            log,
        }
    }

    pub fn log(&self) -> OperationLog {
        self.log.clone()
    }

    pub fn add_user(&self, user_id: &str) {
        self.state.lock().users.insert(user_id.to_string());
    }

    pub fn add_card(&self, card_id: &str, owner_id: &str) {
        self.state
            .lock()
            .cards
            .insert(card_id.to_string(), owner_id.to_string());
    }

    /// Make the next `n` inserts fail with a database error
    pub fn fail_next_inserts(&self, n: u32) {
        self.state.lock().failing_inserts = n;
    }

    /// Make the next `n` calls to `begin` fail
    pub fn fail_next_begins(&self, n: u32) {
        self.state.lock().failing_begins = n;
    }

    /// Slow every insert down, to exercise timeouts
    pub fn set_insert_delay(&self, delay: Duration) {
        self.state.lock().insert_delay = Some(delay);
    }

    /// Committed transactions
    pub fn transactions(&self) -> Vec<CanonicalTransaction> {
        self.state.lock().transactions.clone()
    }

    fn record(&self, op: impl Into<String>) {
        self.log.lock().push(op.into());
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        {
            let mut state = self.state.lock();
            if state.failing_begins > 0 {
                state.failing_begins -= 1;
                drop(state);
                self.record("store:begin_failed");
                return Err(StoreError::Database("connection refused".to_string()));
            }
        }

        let guard = self.serial.clone().lock_owned().await;
        self.record("store:begin");
        Ok(Box::new(MemoryTransaction {
            store: self.clone(),
            pending: Vec::new(),
            _guard: guard,
        }))
    }
}

struct MemoryTransaction {
    store: MemoryStore,
    pending: Vec<CanonicalTransaction>,
    _guard: OwnedMutexGuard<()>,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn find_duplicate(&mut self, key: &DedupKey) -> Result<Option<Uuid>, StoreError> {
        self.store.record("store:find_duplicate");
        let state = self.store.state.lock();
        Ok(state
            .transactions
            .iter()
            .chain(self.pending.iter())
            .find(|t| DedupKey::of(t) == *key)
            .map(|t| t.id))
    }

    async fn find_user_and_card(
        &mut self,
        user_id: &str,
        card_id: &str,
    ) -> Result<Identities, StoreError> {
        self.store.record("store:find_user_and_card");
        let state = self.store.state.lock();
        Ok(Identities {
            user: state.users.get(user_id).map(|id| UserRecord { id: id.clone() }),
            card: state.cards.get(card_id).map(|owner| CardRecord {
                id: card_id.to_string(),
                user_id: owner.clone(),
            }),
        })
    }

    async fn insert_transaction(
        &mut self,
        record: &CanonicalTransaction,
    ) -> Result<CanonicalTransaction, StoreError> {
        let delay = self.store.state.lock().insert_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        {
            let mut state = self.store.state.lock();
            if state.failing_inserts > 0 {
                state.failing_inserts -= 1;
                drop(state);
                self.store.record("store:insert_failed");
                return Err(StoreError::Database("disk full".to_string()));
            }
        }

        self.store.record("store:insert");
        self.pending.push(record.clone());
        Ok(record.clone())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let this = *self;
        this.store.record("store:commit");
        this.store.state.lock().transactions.extend(this.pending);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.store.record("store:rollback");
        Ok(())
    }
}
