use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

/// Failures of the producing path
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KafkaError {
    /// Broker unreachable or handshake failed after the whole retry budget
    #[error("Unable to connect to Kafka: {0}")]
    Unavailable(String),

    /// A recent failure is still inside the cooldown window; nothing was attempted
    #[error("Kafka connection failed recently. Please try again in {retry_after_secs} seconds.")]
    CooldownRejected { retry_after_secs: u64 },

    /// Connection was healthy but the publish failed or was not acknowledged
    #[error("Failed to send message to Kafka: {0}")]
    SendFailed(String),

    #[error("Failed to serialize message: {0}")]
    Serialization(String),
}

impl KafkaError {
    /// Errors that mean "broker not usable right now" rather than "this message failed"
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            KafkaError::Unavailable(_) | KafkaError::CooldownRejected { .. }
        )
    }

    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            KafkaError::CooldownRejected { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Kafka(#[from] KafkaError),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let code = self.status_code();
        let mut response = HttpResponse::build(code);

        if let AppError::Kafka(err) = self {
            if let Some(secs) = err.retry_after_secs() {
                response.insert_header(("Retry-After", secs.to_string()));
            }
        }

        response.json(ErrorResponse {
            error: self.to_string(),
            code: code.as_u16(),
        })
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Kafka(err) if err.is_unavailable() => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Kafka(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
