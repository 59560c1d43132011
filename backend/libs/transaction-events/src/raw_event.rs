use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::schedule::{self, ScheduleError};

/// Producer-side transaction payload as carried on the transactions topic
///
/// Calendar fields are optional on the wire so that a consumer can report
/// exactly which one is missing instead of failing with a generic decode error.
///
/// ```json
/// {
///   "user": 1, "card": 7,
///   "year": 2024, "month": 3, "day": 5, "time": "09:15:00",
///   "amount": 42.5,
///   "use_chip": "Chip Transaction",
///   "merchant_id": 999, "merchant_city": "Austin", "merchant_state": "TX",
///   "zip": "78701", "mcc": 5411,
///   "errors": null, "is_fraud": false
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    pub user: i64,
    pub card: i64,
    #[serde(default)]
    pub year: Option<i64>,
    #[serde(default)]
    pub month: Option<i64>,
    #[serde(default)]
    pub day: Option<i64>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default, with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(default)]
    pub use_chip: Option<String>,
    #[serde(default)]
    pub merchant_id: Option<i64>,
    #[serde(default)]
    pub merchant_city: Option<String>,
    #[serde(default)]
    pub merchant_state: Option<String>,
    #[serde(default)]
    pub zip: Option<String>,
    #[serde(default)]
    pub mcc: Option<i64>,
    #[serde(default)]
    pub errors: Option<String>,
    #[serde(default)]
    pub is_fraud: bool,
}

impl RawEvent {
    /// Decode a record payload
    pub fn from_slice(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    /// Encode for publishing
    pub fn to_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Combined transaction timestamp, validating every calendar field
    pub fn transaction_datetime(&self) -> Result<NaiveDateTime, ScheduleError> {
        schedule::combine(self.year, self.month, self.day, self.time.as_deref())
    }

    /// Validate the schedule and rewrite `time` as `HH:MM:SS`
    pub fn normalized(mut self) -> Result<Self, ScheduleError> {
        let at = self.transaction_datetime()?;
        self.time = Some(at.format("%H:%M:%S").to_string());
        Ok(self)
    }

    /// String reference to the user, as stored by the processor
    pub fn user_ref(&self) -> String {
        self.user.to_string()
    }

    /// String reference to the card, as stored by the processor
    pub fn card_ref(&self) -> String {
        self.card.to_string()
    }

    /// Partitioning key: all of one user's transactions share a partition
    pub fn message_key(&self) -> String {
        self.user_ref()
    }
}
