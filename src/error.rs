use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Top-level error type for the entire application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Scheduling error: {0}")]
    Schedule(#[from] ScheduleError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Extraction-boundary errors
///
/// The extraction collaborator is a black box; everything it can do wrong is
/// converted to one of these at the point of use and never propagates as
/// untyped data into the core.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Extraction API call failed: {0}")]
    Api(String),

    #[error("Extraction response malformed: {0}")]
    MalformedResponse(String),

    #[error("Extracted record failed validation: {0}")]
    Validation(String),
}

/// Scheduling errors
#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Invoice {invoice_number} has unusable due date: {raw}")]
    InvalidDueDate { invoice_number: String, raw: String },

    #[error("Invoice {invoice_number} is in state {state}, cannot schedule")]
    NotSchedulable {
        invoice_number: String,
        state: String,
    },
}

/// Execution Gateway errors
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Withdraw failed: {0}")]
    WithdrawFailed(String),

    #[error("Deposit failed: {0}")]
    DepositFailed(String),

    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    #[error("Balance query failed: {0}")]
    BalanceUnavailable(String),

    #[error("Amount {0} not representable in base units")]
    AmountOutOfRange(String),

    #[error("Gateway transport error: {0}")]
    Transport(String),
}

/// API error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            AppError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("Not found: {}", what),
            ),
            AppError::InvalidInput(msg) => {
                (StatusCode::BAD_REQUEST, "INVALID_INPUT", msg.clone())
            }
            AppError::Extraction(e) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "EXTRACTION_FAILED",
                e.to_string(),
            ),
            AppError::Schedule(e) => {
                (StatusCode::CONFLICT, "SCHEDULE_REJECTED", e.to_string())
            }
            AppError::Gateway(_) => (
                StatusCode::BAD_GATEWAY,
                "GATEWAY_ERROR",
                "Execution gateway call failed".to_string(),
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            ),
        };

        let body = Json(ErrorResponse {
            error: message,
            error_code: error_code.to_string(),
        });

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal(format!("Error converting: {:?}", error))
    }
}

impl From<rust_decimal::Error> for AppError {
    fn from(error: rust_decimal::Error) -> Self {
        AppError::InvalidInput(format!("Decimal conversion error: {:?}", error))
    }
}

impl From<reqwest::Error> for ExtractionError {
    fn from(error: reqwest::Error) -> Self {
        ExtractionError::Api(format!("HTTP request error: {:?}", error))
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(error: reqwest::Error) -> Self {
        GatewayError::Transport(format!("HTTP request error: {:?}", error))
    }
}

/// Result type alias for the application
pub type AppResult<T> = Result<T, AppError>;
