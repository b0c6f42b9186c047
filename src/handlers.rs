// HTTP request handlers for the relayer API

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::Json,
};

use crate::app_state::SharedState;
use crate::error::IngressError;
use crate::ingress::IngressService;
use crate::models::*;

// ===== SUBMIT =====

/// POST /v1/sendTransaction
///
/// Verification runs before anything is stored; the call never waits for the chain.
pub async fn send_transaction(
    State(state): State<SharedState>,
    body: Result<Json<Option<AATransaction>>, JsonRejection>,
) -> Result<Json<SendTransactionResponse>, IngressError> {
    let Json(tx) = body.map_err(|rejection| IngressError::InvalidBody(rejection.body_text()))?;
    let response = state.ingress.submit(tx).await?;
    Ok(Json(response))
}

// ===== QUERY =====

/// GET /v1/getTransactionReceipt/:id
pub async fn get_transaction_receipt(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<AAStateTransaction>, IngressError> {
    let id = IngressService::parse_id(&id)?;
    let record = state.ingress.query(&id)?;
    Ok(Json(record))
}

// ===== HEALTH =====

pub async fn health_check(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        relayer: state.relayer_address,
        invoker: state.ingress.invoker_address(),
        chain_id: state.ingress.chain_id(),
        pool_size: state.ingress.pool_size(),
    })
}
