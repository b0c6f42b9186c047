// Routes module - wires the HTTP endpoints to their handlers

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::app_state::SharedState;
use crate::handlers::{get_transaction_receipt, health_check, send_transaction};

pub fn router(state: SharedState) -> Router {
    Router::new()
        // ===== RELAYER ENDPOINTS =====
        .route("/v1/sendTransaction", post(send_transaction))
        .route("/v1/getTransactionReceipt/:id", get(get_transaction_receipt))
        // ===== HEALTH CHECK =====
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
