// Error taxonomy for the relayer pipeline

use alloy_primitives::{Address, B256};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

// ===== VERIFICATION =====

/// Why a submitted transaction was refused admission
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    #[error("tx is not valid")]
    MissingTransaction,

    #[error("tx from {0} does not have any payload")]
    EmptyPayload(Address),

    #[error("tx from {from} has invalid payload {index} - gas limit not specified")]
    MissingGasLimit { from: Address, index: usize },

    #[error("tx from {from} has invalid payload {index} - value not specified")]
    MissingValue { from: Address, index: usize },

    #[error("tx from {from} has contract creation payload {index}")]
    ContractCreationNotAllowed { from: Address, index: usize },

    #[error("invalid signature")]
    InvalidSignature,

    #[error("tx has from which is not allowed: {0}")]
    SenderNotAllowed(Address),

    #[error("invalid tx: expected sender {expected} but signature does not recover")]
    UnrecoverableSigner { expected: Address },

    #[error("invalid tx: expected sender {expected} but got {recovered}")]
    SenderMismatch { expected: Address, recovered: Address },

    /// Custom policy rejection, surfaced verbatim
    #[error("{0}")]
    Policy(String),
}

// ===== STORE =====

#[derive(Debug, Error)]
pub enum StateError {
    #[error("transaction {0} already exists")]
    DuplicateKey(B256),

    #[error("transaction {0} not found")]
    NotFound(B256),

    #[error("storage failure: {0}")]
    Storage(#[from] sled::Error),

    #[error("corrupt record: {0}")]
    Codec(#[from] serde_json::Error),
}

// ===== RELAYER LOOP =====

/// Failures that stop the relayer loop; chain errors are recorded on the transaction instead
#[derive(Debug, Error)]
pub enum RelayerError {
    #[error("relayer store failure: {0}")]
    State(#[from] StateError),
}

// ===== INGRESS =====

#[derive(Debug, Error)]
pub enum IngressError {
    #[error(transparent)]
    Validation(#[from] VerificationError),

    #[error("transaction {0} not found")]
    NotFound(B256),

    #[error("invalid transaction id: {0}")]
    InvalidId(String),

    #[error("invalid request body: {0}")]
    InvalidBody(String),

    #[error("failed to persist transaction: {0}")]
    Storage(StateError),
}

impl From<StateError> for IngressError {
    fn from(error: StateError) -> Self {
        match error {
            StateError::NotFound(id) => IngressError::NotFound(id),
            other => IngressError::Storage(other),
        }
    }
}

impl IngressError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            IngressError::Validation(_) | IngressError::InvalidId(_) | IngressError::InvalidBody(_) => {
                StatusCode::BAD_REQUEST
            }
            IngressError::NotFound(_) => StatusCode::NOT_FOUND,
            IngressError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for IngressError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "success": false,
            "error": self.to_string(),
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_client_error() {
        let err: IngressError = StateError::NotFound(B256::ZERO).into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_duplicate_maps_to_storage_when_unhandled() {
        let err: IngressError = StateError::DuplicateKey(B256::ZERO).into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_policy_error_is_verbatim() {
        let err = VerificationError::Policy("sender is rate limited".into());
        assert_eq!(err.to_string(), "sender is rate limited");
        assert_eq!(IngressError::from(err).status_code(), StatusCode::BAD_REQUEST);
    }
}
