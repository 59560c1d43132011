use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::broker::BrokerError;
use crate::consumer::SourceError;
use crate::guard::{GuardError, ReferentialError};
use crate::store::StoreError;
use crate::transform::TransformError;

/// Why a record was not processed; every variant withholds its offset
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProcessingError {
    #[error("Transform failed: {0}")]
    Transform(#[from] TransformError),

    #[error("Referential check failed: {0}")]
    Referential(#[from] ReferentialError),

    #[error("Persistence failed: {0}")]
    Persistence(#[from] StoreError),

    #[error("Processing timed out after {0:?}")]
    Timeout(Duration),

    #[error("Persistence worker unavailable: {0}")]
    WorkerUnavailable(String),
}

impl ProcessingError {
    /// Whether redelivering the same record can succeed without an upstream fix
    pub fn is_retryable(&self) -> bool {
        match self {
            ProcessingError::Transform(_) | ProcessingError::Referential(_) => false,
            ProcessingError::Persistence(_)
            | ProcessingError::Timeout(_)
            | ProcessingError::WorkerUnavailable(_) => true,
        }
    }
}

impl From<GuardError> for ProcessingError {
    fn from(err: GuardError) -> Self {
        match err {
            GuardError::Referential(e) => ProcessingError::Referential(e),
            GuardError::Store(e) => ProcessingError::Persistence(e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsumerError {
    #[error("Consumer is already {0}")]
    InvalidState(&'static str),

    #[error("Failed to open subscription: {0}")]
    Subscribe(#[from] SourceError),
}

/// Failures of the operator HTTP surface
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Failed to send test transaction: {0}")]
    Broker(#[from] BrokerError),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        let code = self.status_code();
        HttpResponse::build(code).json(ErrorResponse {
            error: self.to_string(),
            code: code.as_u16(),
        })
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Broker(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
