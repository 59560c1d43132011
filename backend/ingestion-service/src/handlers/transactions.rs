/// Transaction intake handlers
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::{info, warn};
use transaction_events::{IncomingTransaction, RawEvent};

use super::AppState;
use crate::error::{AppError, Result};

/// Either the dataset column layout or the already-normalized wire shape
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TransactionPayload {
    Dataset(IncomingTransaction),
    Event(RawEvent),
}

impl TransactionPayload {
    /// Validate and convert to the event that goes on the wire
    pub fn into_event(self) -> Result<RawEvent> {
        match self {
            TransactionPayload::Dataset(incoming) => incoming
                .normalize()
                .map_err(|e| AppError::Validation(e.to_string())),
            TransactionPayload::Event(event) => event
                .normalized()
                .map_err(|e| AppError::Validation(e.to_string())),
        }
    }
}

/// Publish a transaction to the transactions topic
///
/// POST /transactions/
pub async fn create_transaction(
    state: web::Data<AppState>,
    payload: web::Json<TransactionPayload>,
) -> Result<HttpResponse> {
    let event = payload.into_inner().into_event().map_err(|e| {
        warn!(error = %e, "Rejected invalid transaction payload");
        e
    })?;

    let key = event.message_key();
    let receipt = state
        .manager
        .send_json(&state.topic, &key, &event)
        .await?;

    info!(
        user = event.user,
        card = event.card,
        partition = receipt.partition,
        offset = receipt.offset,
        "Transaction accepted"
    );

    Ok(HttpResponse::Ok().json(event))
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/transactions/", web::post().to(create_transaction))
        .route("/transactions", web::post().to(create_transaction));
}
