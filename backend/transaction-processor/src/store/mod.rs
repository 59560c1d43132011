//! Persistence boundary of the processor
//!
//! Every check and the insert for one record run inside a single
//! [`StoreTransaction`], so a concurrent redelivery cannot slip between the
//! duplicate check and the write.
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::guard::DedupKey;
use crate::models::CanonicalTransaction;

pub mod memory;
pub mod postgres;

pub use memory::{MemoryStore, OperationLog};
pub use postgres::PgTransactionStore;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Connection, query or commit failure
    #[error("Database error: {0}")]
    Database(String),

    /// Unique or foreign key constraint rejected the write
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            // 23505 unique_violation, 23503 foreign_key_violation
            if matches!(db_err.code().as_deref(), Some("23505") | Some("23503")) {
                return StoreError::Conflict(db_err.message().to_string());
            }
        }
        StoreError::Database(err.to_string())
    }
}

/// A user row as seen by the referential check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: String,
}

/// A card row with its owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardRecord {
    pub id: String,
    pub user_id: String,
}

/// Result of looking up both identities referenced by a transaction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identities {
    pub user: Option<UserRecord>,
    pub card: Option<CardRecord>,
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Open a transactional scope
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError>;
}

#[async_trait]
pub trait StoreTransaction: Send {
    /// Id of an already persisted transaction with the same composite key
    async fn find_duplicate(&mut self, key: &DedupKey) -> Result<Option<Uuid>, StoreError>;

    async fn find_user_and_card(
        &mut self,
        user_id: &str,
        card_id: &str,
    ) -> Result<Identities, StoreError>;

    /// Insert and return the row as stored
    async fn insert_transaction(
        &mut self,
        record: &CanonicalTransaction,
    ) -> Result<CanonicalTransaction, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
