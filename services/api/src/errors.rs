use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use balance_store::StoreError;
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Account not found: {0}")]
    AccountNotFound(uuid::Uuid),

    #[error("Balance store error: {0}")]
    BalanceStore(StoreError),

    #[error("Ledger store error: {0}")]
    LedgerStore(#[from] ledger_store::LedgerError),

    #[error("Publish error: {0}")]
    Publish(#[from] message_bus::Error),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AccountNotFound(id) => ApiError::AccountNotFound(id),
            other => ApiError::BalanceStore(other),
        }
    }
}

impl ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();
        let error_message = self.to_string();

        HttpResponse::build(status_code).json(json!({
            "error": {
                "code": status_code.as_u16(),
                "message": error_message,
                "type": self.error_type()
            }
        }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::AccountNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BalanceStore(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::LedgerStore(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Publish(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ApiError {
    fn error_type(&self) -> &str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::AccountNotFound(_) => "not_found",
            ApiError::BalanceStore(_) => "store_error",
            ApiError::LedgerStore(_) => "ledger_error",
            ApiError::Publish(_) => "publish_error",
        }
    }
}
