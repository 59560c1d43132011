//! Raw event to canonical transaction mapping
//!
//! Pure code: nothing here touches the store or the broker.
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;
use transaction_events::{RawEvent, ScheduleError};
use uuid::Uuid;

use crate::models::{
    CanonicalTransaction, IngestionMetadata, TransactionStatus, TransactionType,
};

pub const DEFAULT_CURRENCY: &str = "USD";
pub const DEFAULT_COUNTRY: &str = "US";
pub const UNKNOWN_MERCHANT: &str = "Unknown Merchant";
pub const UNKNOWN_CATEGORY: &str = "UNKNOWN";

/// Amounts are stored as NUMERIC(12, 2)
pub const AMOUNT_SCALE: u32 = 2;
const AMOUNT_MAX_DIGITS: i64 = 999_999_999_999;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    /// Payload is not a JSON `RawEvent` at all
    #[error("Malformed transaction payload: {0}")]
    Malformed(String),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error("Amount {0} exceeds the storable range")]
    AmountOutOfRange(Decimal),
}

/// Round to cents the way PostgreSQL does on insert, so the dedup key and
/// the stored row carry the same value
pub fn normalize_amount(amount: Decimal) -> Result<Decimal, TransformError> {
    let rounded = amount.round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::MidpointAwayFromZero);
    if rounded.abs() > Decimal::new(AMOUNT_MAX_DIGITS, AMOUNT_SCALE) {
        return Err(TransformError::AmountOutOfRange(amount));
    }
    Ok(rounded)
}

/// Decode and transform one record payload
pub fn transform_payload(payload: &[u8]) -> Result<CanonicalTransaction, TransformError> {
    let event = RawEvent::from_slice(payload).map_err(|e| TransformError::Malformed(e.to_string()))?;
    transform(&event)
}

/// Map a raw event to a canonical transaction with a fresh identifier
pub fn transform(event: &RawEvent) -> Result<CanonicalTransaction, TransformError> {
    transform_with_id(event, Uuid::new_v4())
}

/// Same as [`transform`] with a caller-chosen identifier
pub fn transform_with_id(event: &RawEvent, id: Uuid) -> Result<CanonicalTransaction, TransformError> {
    let transaction_date = event.transaction_datetime()?;
    let amount = normalize_amount(event.amount)?;

    let merchant = event
        .merchant_id
        .map(|m| m.to_string())
        .unwrap_or_else(|| UNKNOWN_MERCHANT.to_string());
    let category = event
        .mcc
        .map(|c| c.to_string())
        .unwrap_or_else(|| UNKNOWN_CATEGORY.to_string());

    Ok(CanonicalTransaction {
        id,
        user_id: event.user_ref(),
        credit_card_id: event.card_ref(),
        amount,
        currency: DEFAULT_CURRENCY.to_string(),
        description: format!("Transaction at {merchant}"),
        merchant_name: merchant,
        merchant_category: category,
        transaction_date,
        transaction_type: TransactionType::Purchase,
        status: TransactionStatus::Pending,
        merchant_location: None,
        merchant_city: event.merchant_city.clone(),
        merchant_state: event.merchant_state.clone(),
        merchant_country: DEFAULT_COUNTRY.to_string(),
        authorization_code: None,
        reference_number: None,
        metadata: IngestionMetadata {
            use_chip: event.use_chip.clone(),
            zip_code: event.zip.clone(),
            is_fraud: event.is_fraud,
            errors: event.errors.clone(),
        },
    })
}
