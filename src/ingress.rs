// Ingress service: admission and status lookup, independent of the HTTP layer

use std::sync::Arc;

use alloy_primitives::{Address, B256};
use tracing::{info, warn};

use crate::error::{IngressError, StateError, VerificationError};
use crate::models::{AAStateTransaction, AATransaction, SendTransactionResponse};
use crate::pool::AAPool;
use crate::state::AATxState;
use crate::verification::AAVerification;

pub struct IngressService {
    verification: Arc<AAVerification>,
    state: Arc<AATxState>,
    pool: Arc<AAPool>,
}

impl IngressService {
    pub fn new(verification: Arc<AAVerification>, state: Arc<AATxState>, pool: Arc<AAPool>) -> Self {
        Self {
            verification,
            state,
            pool,
        }
    }

    /// Verify, persist and enqueue. Resubmitting a stored identity is acknowledged, not an error.
    pub async fn submit(&self, tx: Option<AATransaction>) -> Result<SendTransactionResponse, IngressError> {
        if let Err(e) = self.verification.validate(tx.as_ref()) {
            warn!(from = ?tx.as_ref().map(|tx| tx.from()), error = %e, "transaction rejected");
            return Err(e.into());
        }
        let Some(tx) = tx else {
            return Err(VerificationError::MissingTransaction.into());
        };

        let from = tx.from();
        match self.state.add(tx).await {
            Ok(record) => {
                self.pool.push(record.id);
                info!(id = %record.id, from = %from, "transaction admitted");
                Ok(SendTransactionResponse {
                    success: true,
                    id: record.id,
                    status: record.status,
                    already_submitted: false,
                })
            }
            Err(StateError::DuplicateKey(id)) => {
                let existing = self.state.get(&id)?;
                info!(id = %id, from = %from, status = %existing.status, "duplicate submission");
                Ok(SendTransactionResponse {
                    success: true,
                    id,
                    status: existing.status,
                    already_submitted: true,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn query(&self, id: &B256) -> Result<AAStateTransaction, IngressError> {
        Ok(self.state.get(id)?)
    }

    /// Parse a `0x`-prefixed 32-byte identity from a path segment
    pub fn parse_id(raw: &str) -> Result<B256, IngressError> {
        raw.parse::<B256>()
            .map_err(|_| IngressError::InvalidId(raw.to_string()))
    }

    pub fn pool_size(&self) -> usize {
        self.pool.len()
    }

    pub fn invoker_address(&self) -> Address {
        self.verification.invoker_address()
    }

    pub fn chain_id(&self) -> u64 {
        self.verification.chain_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AAConfig;
    use crate::crypto;
    use crate::invoker;
    use crate::models::{AAStatus, Payload, Transaction};
    use alloy_primitives::{Bytes, U256};
    use secp256k1::SecretKey;

    const CHAIN_ID: u64 = 100;

    fn invoker_address() -> Address {
        Address::repeat_byte(0x1c)
    }

    fn service() -> (IngressService, Arc<AATxState>, Arc<AAPool>) {
        let verification = Arc::new(AAVerification::new(
            Arc::new(AAConfig::default()),
            invoker_address(),
            CHAIN_ID,
        ));
        let state = Arc::new(AATxState::temporary().unwrap());
        let pool = Arc::new(AAPool::new());
        (IngressService::new(verification, state.clone(), pool.clone()), state, pool)
    }

    fn signed_for_chain(chain_id: u64) -> AATransaction {
        let key = SecretKey::from_slice(&[0x0b; 32]).unwrap();
        let tx = Transaction {
            from: crypto::secret_key_to_address(&key),
            nonce: 0,
            payload: vec![Payload {
                to: Some(Address::repeat_byte(0xaa)),
                value: Some(U256::ZERO),
                gas_limit: Some(U256::from(21_000u64)),
                input: Bytes::new(),
            }],
        };
        invoker::sign_transaction(tx, &key, invoker_address(), chain_id)
    }

    #[tokio::test]
    async fn test_submit_stores_and_enqueues_once() {
        let (ingress, state, pool) = service();
        let tx = signed_for_chain(CHAIN_ID);

        let response = ingress.submit(Some(tx.clone())).await.unwrap();
        assert!(response.success);
        assert!(!response.already_submitted);
        assert_eq!(response.id, tx.id());
        assert_eq!(response.status, AAStatus::Pending);

        assert_eq!(state.len(), 1);
        assert_eq!(pool.len(), 1);
        assert_eq!(ingress.query(&response.id).unwrap().status, AAStatus::Pending);
    }

    #[tokio::test]
    async fn test_resubmission_is_idempotent() {
        let (ingress, state, pool) = service();
        let tx = signed_for_chain(CHAIN_ID);

        let first = ingress.submit(Some(tx.clone())).await.unwrap();
        let second = ingress.submit(Some(tx)).await.unwrap();

        assert!(second.already_submitted);
        assert_eq!(second.id, first.id);
        assert_eq!(state.len(), 1);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.pop(), Some(first.id));
        assert_eq!(pool.pop(), None);
    }

    #[tokio::test]
    async fn test_resubmission_reports_current_status() {
        let (ingress, state, _) = service();
        let tx = signed_for_chain(CHAIN_ID);

        let first = ingress.submit(Some(tx.clone())).await.unwrap();
        state.update(&first.id, |r| r.status = AAStatus::Mined).await.unwrap();

        let again = ingress.submit(Some(tx)).await.unwrap();
        assert!(again.already_submitted);
        assert_eq!(again.status, AAStatus::Mined);
    }

    #[tokio::test]
    async fn test_wrong_chain_rejected_without_side_effects() {
        let (ingress, state, pool) = service();

        let err = ingress.submit(Some(signed_for_chain(CHAIN_ID + 1))).await.unwrap_err();
        assert!(matches!(
            err,
            IngressError::Validation(VerificationError::SenderMismatch { .. })
        ));
        assert!(state.is_empty());
        assert!(pool.is_empty());
    }

    #[tokio::test]
    async fn test_missing_body_rejected() {
        let (ingress, _, _) = service();
        assert!(matches!(
            ingress.submit(None).await,
            Err(IngressError::Validation(VerificationError::MissingTransaction))
        ));
    }

    #[test]
    fn test_query_unknown_is_not_found() {
        let (ingress, _, _) = service();
        assert!(matches!(ingress.query(&B256::ZERO), Err(IngressError::NotFound(_))));
    }

    #[test]
    fn test_parse_id() {
        let id = B256::repeat_byte(0xab);
        assert_eq!(IngressService::parse_id(&id.to_string()).unwrap(), id);
        assert!(matches!(IngressService::parse_id("0x1234"), Err(IngressError::InvalidId(_))));
    }
}
