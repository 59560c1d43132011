//! Per-record business logic: transform, dedup, referential check, insert
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ProcessingError;
use crate::guard;
use crate::models::CanonicalTransaction;
use crate::store::{StoreTransaction, TransactionStore};
use crate::transform::transform_payload;

/// Outcomes that allow the offset to be committed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// A new row was durably written
    Persisted(CanonicalTransaction),
    /// The record had already been persisted under `existing_id`
    Duplicate { existing_id: Uuid },
}

pub struct RecordHandler {
    store: Arc<dyn TransactionStore>,
}

impl RecordHandler {
    pub fn new(store: Arc<dyn TransactionStore>) -> Self {
        Self { store }
    }

    /// Process one record payload.
    ///
    /// `Ok` means the business effect is durable and the offset may advance.
    pub async fn handle(&self, payload: &[u8]) -> Result<ProcessOutcome, ProcessingError> {
        let record = transform_payload(payload)?;

        let mut tx = self.store.begin().await?;
        match persist(tx.as_mut(), &record).await {
            Ok(outcome) => {
                tx.commit().await?;
                match &outcome {
                    ProcessOutcome::Persisted(stored) => info!(
                        transaction_id = %stored.id,
                        user_id = %stored.user_id,
                        card_id = %stored.credit_card_id,
                        amount = %stored.amount,
                        "Transaction persisted"
                    ),
                    ProcessOutcome::Duplicate { existing_id } => info!(
                        existing_id = %existing_id,
                        "Transaction already exists, skipping"
                    ),
                }
                Ok(outcome)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "Rollback failed");
                }
                Err(e)
            }
        }
    }
}

async fn persist(
    tx: &mut dyn StoreTransaction,
    record: &CanonicalTransaction,
) -> Result<ProcessOutcome, ProcessingError> {
    if let Some(existing_id) = guard::find_duplicate(tx, record).await? {
        return Ok(ProcessOutcome::Duplicate { existing_id });
    }

    guard::verify_references(tx, record).await?;

    let stored = tx.insert_transaction(record).await?;
    Ok(ProcessOutcome::Persisted(stored))
}
