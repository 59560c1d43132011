use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::info;
use transaction_events::RawEvent;

use super::AppState;
use crate::broker::{test_transaction, BrokerError};
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestTransactionRequest {
    pub user_id: String,
    pub credit_card_id: String,
}

#[derive(Debug, Serialize)]
pub struct TestTransactionResponse {
    pub message: &'static str,
    pub transaction: RawEvent,
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

fn parse_id(field: &str, value: &str) -> Result<i64, ApiError> {
    value
        .trim()
        .parse()
        .map_err(|_| ApiError::Validation(format!("{field} must be numeric, got {value:?}")))
}

/// Publish a synthetic purchase stamped with the current local time
///
/// POST /send-test-transaction
pub async fn send_test_transaction(
    state: web::Data<AppState>,
    request: web::Json<TestTransactionRequest>,
) -> Result<HttpResponse, ApiError> {
    let user = parse_id("userId", &request.user_id)?;
    let card = parse_id("creditCardId", &request.credit_card_id)?;

    let event = test_transaction(user, card, chrono::Local::now().naive_local());
    let payload = event
        .to_payload()
        .map_err(|e| BrokerError::Send(e.to_string()))?;

    let sent = state
        .broker
        .send(&state.topic, &event.message_key(), &payload)
        .await?;

    info!(
        user,
        card,
        partition = sent.partition,
        offset = sent.offset,
        "Test transaction sent"
    );

    Ok(HttpResponse::Ok().json(TestTransactionResponse {
        message: "Test transaction sent successfully",
        transaction: event,
        topic: sent.topic,
        partition: sent.partition,
        offset: sent.offset,
    }))
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.route(
        "/send-test-transaction",
        web::post().to(send_test_transaction),
    );
}
