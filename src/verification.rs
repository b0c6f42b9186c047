//! Admission checks for incoming AA transactions.
//!
//! `AAVerification::validate` is a pure function of the transaction, the
//! policy config, the invoker address and the chain id, plus an optional
//! custom policy. It fails fast on the first violation and is safe to call
//! from many requests at once.

use std::sync::Arc;

use alloy_primitives::Address;

use crate::config::AAConfig;
use crate::crypto;
use crate::error::VerificationError;
use crate::invoker;
use crate::models::AATransaction;

/// Extra admission rule run after the built-in checks
pub trait ValidationPolicy: Send + Sync {
    fn check(&self, tx: &AATransaction) -> Result<(), String>;
}

impl<F> ValidationPolicy for F
where
    F: Fn(&AATransaction) -> Result<(), String> + Send + Sync,
{
    fn check(&self, tx: &AATransaction) -> Result<(), String> {
        self(tx)
    }
}

pub struct AAVerification {
    config: Arc<AAConfig>,
    invoker_address: Address,
    chain_id: u64,
    policy: Option<Arc<dyn ValidationPolicy>>,
}

impl AAVerification {
    pub fn new(config: Arc<AAConfig>, invoker_address: Address, chain_id: u64) -> Self {
        Self {
            config,
            invoker_address,
            chain_id,
            policy: None,
        }
    }

    pub fn with_policy(mut self, policy: impl ValidationPolicy + 'static) -> Self {
        self.policy = Some(Arc::new(policy));
        self
    }

    pub fn invoker_address(&self) -> Address {
        self.invoker_address
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn validate(&self, tx: Option<&AATransaction>) -> Result<(), VerificationError> {
        let tx = tx.ok_or(VerificationError::MissingTransaction)?;
        let from = tx.transaction.from;

        if tx.transaction.payload.is_empty() {
            return Err(VerificationError::EmptyPayload(from));
        }

        for (index, payload) in tx.transaction.payload.iter().enumerate() {
            if payload.gas_limit.is_none() {
                return Err(VerificationError::MissingGasLimit { from, index });
            }

            if payload.value.is_none() {
                return Err(VerificationError::MissingValue { from, index });
            }

            if payload.to.is_none() && !self.config.allow_contract_creation {
                return Err(VerificationError::ContractCreationNotAllowed { from, index });
            }
        }

        if !crypto::is_valid_signature(&tx.signature) {
            return Err(VerificationError::InvalidSignature);
        }

        if !self.config.is_address_allowed(&from) {
            return Err(VerificationError::SenderNotAllowed(from));
        }

        let recovered = invoker::recover_sender(tx, self.invoker_address, self.chain_id)
            .ok_or(VerificationError::UnrecoverableSigner { expected: from })?;
        if recovered != from {
            return Err(VerificationError::SenderMismatch {
                expected: from,
                recovered,
            });
        }

        if let Some(policy) = &self.policy {
            policy.check(tx).map_err(VerificationError::Policy)?;
        }

        Ok(())
    }
}
