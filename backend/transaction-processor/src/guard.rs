//! Duplicate suppression and referential checks
//!
//! The duplicate key is a heuristic composite of user, card, amount and
//! timestamp. Two genuinely identical purchases in the same minute collapse
//! into one record.
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::models::CanonicalTransaction;
use crate::store::{Identities, StoreError, StoreTransaction};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub user_id: String,
    pub card_id: String,
    pub amount: Decimal,
    pub transaction_date: NaiveDateTime,
}

impl DedupKey {
    pub fn of(record: &CanonicalTransaction) -> Self {
        Self {
            user_id: record.user_id.clone(),
            card_id: record.credit_card_id.clone(),
            amount: record.amount,
            transaction_date: record.transaction_date,
        }
    }

    /// Stable text form; equal keys render equally regardless of amount scale
    pub fn lock_name(&self) -> String {
        format!(
            "txn:{}:{}:{}:{}",
            self.user_id,
            self.card_id,
            self.amount.normalize(),
            self.transaction_date.format("%Y-%m-%dT%H:%M:%S")
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferentialError {
    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Credit card not found: {0}")]
    CardNotFound(String),

    #[error("Credit card {card_id} does not belong to user {user_id}")]
    CardOwnershipMismatch {
        card_id: String,
        user_id: String,
        owner_id: String,
    },
}

/// Failure of either guard check
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError {
    #[error(transparent)]
    Referential(#[from] ReferentialError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Look for an already persisted copy of `record`
pub async fn find_duplicate(
    tx: &mut dyn StoreTransaction,
    record: &CanonicalTransaction,
) -> Result<Option<Uuid>, StoreError> {
    let key = DedupKey::of(record);
    let existing = tx.find_duplicate(&key).await?;
    if let Some(id) = existing {
        debug!(existing_id = %id, key = %key.lock_name(), "Duplicate transaction found");
    }
    Ok(existing)
}

/// Require that the user and card exist and that the card belongs to the user
pub async fn verify_references(
    tx: &mut dyn StoreTransaction,
    record: &CanonicalTransaction,
) -> Result<(), GuardError> {
    let found = tx
        .find_user_and_card(&record.user_id, &record.credit_card_id)
        .await?;
    check_ownership(&record.user_id, &record.credit_card_id, &found)?;
    Ok(())
}

/// Pure part of [`verify_references`]
pub fn check_ownership(
    user_id: &str,
    card_id: &str,
    found: &Identities,
) -> Result<(), ReferentialError> {
    if found.user.is_none() {
        return Err(ReferentialError::UserNotFound(user_id.to_string()));
    }
    let card = found
        .card
        .as_ref()
        .ok_or_else(|| ReferentialError::CardNotFound(card_id.to_string()))?;

    if card.user_id != user_id {
        return Err(ReferentialError::CardOwnershipMismatch {
            card_id: card_id.to_string(),
            user_id: user_id.to_string(),
            owner_id: card.user_id.clone(),
        });
    }
    Ok(())
}
