use crate::errors::ApiError;
use crate::models::{
    AcceptedResponse, BalanceResponse, CreateAccountRequest, CreateAccountResponse,
    LedgerResponse, TransactionRequest, TransferRequest,
};
use actix_web::{web, HttpRequest, HttpResponse};
use balance_store::BalanceStore;
use chrono::Utc;
use ledger_store::LedgerStore;
use message_bus::{Publisher, TransferMessage, TxMessage};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

/// How many ledger entries the history endpoint returns
const RECENT_LEDGER_LIMIT: i64 = 50;

/// Shared intake dependencies
pub struct AppState {
    pub balances: Arc<BalanceStore>,
    pub ledger: Arc<LedgerStore>,
    pub publisher: Arc<Publisher>,
}

pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().body("ok")
}

pub async fn readiness() -> HttpResponse {
    HttpResponse::Ok().body("ok")
}

/// Create an account; the only synchronous write intake performs
pub async fn create_account(
    state: web::Data<AppState>,
    request: web::Json<CreateAccountRequest>,
) -> Result<HttpResponse, ApiError> {
    let request = request.into_inner();
    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let id = state
        .balances
        .create_account(&request.owner, &request.currency, request.initial_balance)
        .await?;

    info!(%id, owner = %request.owner, "account created");
    Ok(HttpResponse::Created().json(CreateAccountResponse { id }))
}

/// Current balance of an account
pub async fn get_account(
    state: web::Data<AppState>,
    account_id: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let account = state.balances.get_account(*account_id).await?;
    Ok(HttpResponse::Ok().json(BalanceResponse {
        balance: account.balance,
    }))
}

/// Most recent ledger entries for an account, newest first
pub async fn get_ledger(
    state: web::Data<AppState>,
    account_id: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let entries = state
        .ledger
        .recent(*account_id, RECENT_LEDGER_LIMIT)
        .await?;
    Ok(HttpResponse::Ok().json(LedgerResponse { entries }))
}

/// Queue a deposit or withdrawal.
///
/// Account existence is deliberately not checked here; the authoritative
/// check happens in the worker, behind the row lock.
pub async fn enqueue_transaction(
    state: web::Data<AppState>,
    http_request: HttpRequest,
    request: web::Json<TransactionRequest>,
) -> Result<HttpResponse, ApiError> {
    let request = request.into_inner();
    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let key = resolve_idempotency_key(
        request.idempotency_key.as_deref(),
        header_key(&http_request).as_deref(),
    );

    let message = TxMessage {
        account_id: request.account_id,
        kind: request.kind,
        amount: request.amount,
        idempotency_key: key.clone(),
        created_at: Utc::now(),
    };
    state.publisher.publish_transaction(&message).await?;

    info!(account = %message.account_id, kind = %message.kind, amount = message.amount, key = %key, "transaction queued");
    Ok(HttpResponse::Accepted().json(AcceptedResponse::queued(key)))
}

/// Queue a transfer between two accounts
pub async fn enqueue_transfer(
    state: web::Data<AppState>,
    http_request: HttpRequest,
    request: web::Json<TransferRequest>,
) -> Result<HttpResponse, ApiError> {
    let request = request.into_inner();
    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let key = resolve_idempotency_key(
        request.idempotency_key.as_deref(),
        header_key(&http_request).as_deref(),
    );

    let message = TransferMessage {
        from_account_id: request.from_account_id,
        to_account_id: request.to_account_id,
        amount: request.amount,
        idempotency_key: key.clone(),
        created_at: Utc::now(),
    };
    state.publisher.publish_transfer(&message).await?;

    info!(from = %message.from_account_id, to = %message.to_account_id, amount = message.amount, key = %key, "transfer queued");
    Ok(HttpResponse::Accepted().json(AcceptedResponse::queued(key)))
}

fn header_key(request: &HttpRequest) -> Option<String> {
    request
        .headers()
        .get("Idempotency-Key")
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

/// Body field wins over the header; absent both, mint a fresh key. The
/// resolved key is echoed back so the client can retry safely.
fn resolve_idempotency_key(body: Option<&str>, header: Option<&str>) -> String {
    body.filter(|key| !key.is_empty())
        .or_else(|| header.filter(|key| !key.is_empty()))
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Configure routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/v1")
            .route("/accounts", web::post().to(create_account))
            .route("/accounts/{id}", web::get().to(get_account))
            .route("/accounts/{id}/ledger", web::get().to(get_ledger))
            .route("/transactions", web::post().to(enqueue_transaction))
            .route("/transfers", web::post().to(enqueue_transfer)),
    )
    .route("/healthz", web::get().to(health_check))
    .route("/readyz", web::get().to(readiness));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_key_takes_precedence() {
        assert_eq!(resolve_idempotency_key(Some("body"), Some("header")), "body");
    }

    #[test]
    fn test_header_key_used_when_body_absent() {
        assert_eq!(resolve_idempotency_key(None, Some("header")), "header");
        assert_eq!(resolve_idempotency_key(Some(""), Some("header")), "header");
    }

    #[test]
    fn test_key_generated_when_both_absent() {
        let key = resolve_idempotency_key(None, None);
        assert!(Uuid::parse_str(&key).is_ok());

        let key = resolve_idempotency_key(Some(""), Some(""));
        assert!(Uuid::parse_str(&key).is_ok());
    }
}
