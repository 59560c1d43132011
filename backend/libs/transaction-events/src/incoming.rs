use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::raw_event::RawEvent;
use crate::schedule::ScheduleError;

/// Transaction in the column layout of the card-transaction dataset
///
/// Amounts arrive as dollar strings (`"$10.00"`) and the fraud flag as
/// `"Yes"`/`"No"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingTransaction {
    #[serde(rename = "User")]
    pub user: i64,
    #[serde(rename = "Card")]
    pub card: i64,
    #[serde(rename = "Year")]
    pub year: i64,
    #[serde(rename = "Month")]
    pub month: i64,
    #[serde(rename = "Day")]
    pub day: i64,
    #[serde(rename = "Time")]
    pub time: String,
    #[serde(rename = "Amount")]
    pub amount: String,
    #[serde(rename = "Use Chip", default)]
    pub use_chip: Option<String>,
    #[serde(rename = "Merchant Name", default)]
    pub merchant_name: Option<i64>,
    #[serde(rename = "Merchant City", default)]
    pub merchant_city: Option<String>,
    #[serde(rename = "Merchant State", default)]
    pub merchant_state: Option<String>,
    #[serde(rename = "Zip", default)]
    pub zip: Option<String>,
    #[serde(rename = "MCC", default)]
    pub mcc: Option<i64>,
    #[serde(rename = "Errors?", default)]
    pub errors: Option<String>,
    #[serde(rename = "Is Fraud?", default)]
    pub is_fraud: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

impl IncomingTransaction {
    /// Convert to the wire event published on the transactions topic
    pub fn normalize(self) -> Result<RawEvent, NormalizeError> {
        let amount = parse_dollar_amount(&self.amount)?;
        let is_fraud = self.is_fraud.as_deref().map(str::trim) == Some("Yes");

        RawEvent {
            user: self.user,
            card: self.card,
            year: Some(self.year),
            month: Some(self.month),
            day: Some(self.day),
            time: Some(self.time),
            amount,
            use_chip: self.use_chip,
            merchant_id: self.merchant_name,
            merchant_city: self.merchant_city,
            merchant_state: self.merchant_state,
            zip: self.zip,
            mcc: self.mcc,
            errors: self.errors,
            is_fraud,
        }
        .normalized()
        .map_err(NormalizeError::from)
    }
}

fn parse_dollar_amount(raw: &str) -> Result<Decimal, NormalizeError> {
    let cleaned = raw.trim().replace('$', "");
    Decimal::from_str(&cleaned).map_err(|_| NormalizeError::InvalidAmount(raw.to_string()))
}
