//! Invoker contract binding.
//!
//! A batch is signed as EIP-712 typed data under the domain
//! `{ name: "Invoker", version: "1.0.0", chainId, verifyingContract }`, which
//! binds the signature to one invoker deployment on one chain. The relayer
//! forwards the batch and the signature to `invoke(...)` unchanged.

use std::borrow::Cow;

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::{sol, Eip712Domain, SolCall, SolStruct};
use secp256k1::SecretKey;

use crate::crypto;
use crate::models::{AATransaction, Payload, Transaction};

pub const INVOKER_DOMAIN_NAME: &str = "Invoker";
pub const INVOKER_DOMAIN_VERSION: &str = "1.0.0";

sol! {
    interface Invoker {
        struct Signature {
            uint256 r;
            uint256 s;
            bool v;
        }

        struct TransactionPayload {
            address to;
            uint256 value;
            uint256 gasLimit;
            bytes data;
        }

        struct Transaction {
            address from;
            uint256 nonce;
            TransactionPayload[] payload;
        }

        function invoke(Signature calldata signature, Transaction calldata transaction) external payable;
    }
}

impl From<&Payload> for Invoker::TransactionPayload {
    fn from(payload: &Payload) -> Self {
        // contract creation hashes with the zero address
        Self {
            to: payload.to.unwrap_or(Address::ZERO),
            value: payload.value.unwrap_or_default(),
            gasLimit: payload.gas_limit.unwrap_or_default(),
            data: payload.input.clone(),
        }
    }
}

impl From<&Transaction> for Invoker::Transaction {
    fn from(tx: &Transaction) -> Self {
        Self {
            from: tx.from,
            nonce: U256::from(tx.nonce),
            payload: tx.payload.iter().map(Into::into).collect(),
        }
    }
}

pub fn domain(invoker: Address, chain_id: u64) -> Eip712Domain {
    Eip712Domain::new(
        Some(Cow::Borrowed(INVOKER_DOMAIN_NAME)),
        Some(Cow::Borrowed(INVOKER_DOMAIN_VERSION)),
        Some(U256::from(chain_id)),
        Some(invoker),
        None,
    )
}

/// Digest the sender signs: EIP-712 signing hash under the invoker domain
pub fn signing_hash(tx: &Transaction, invoker: Address, chain_id: u64) -> B256 {
    Invoker::Transaction::from(tx).eip712_signing_hash(&domain(invoker, chain_id))
}

/// Content identity: EIP-712 struct hash, independent of domain and signature
pub fn transaction_id(tx: &Transaction) -> B256 {
    Invoker::Transaction::from(tx).eip712_hash_struct()
}

/// Address that produced `tx.signature` over the invoker domain
pub fn recover_sender(tx: &AATransaction, invoker: Address, chain_id: u64) -> Option<Address> {
    let hash = signing_hash(&tx.transaction, invoker, chain_id);
    crypto::recover_address(&hash, &tx.signature)
}

/// Calldata for `invoke(signature, transaction)`; `None` if the signature is malformed
pub fn encode_invoke(tx: &AATransaction) -> Option<Bytes> {
    if !crypto::is_valid_signature(&tx.signature) {
        return None;
    }

    let signature = Invoker::Signature {
        r: U256::from_be_slice(&tx.signature[..32]),
        s: U256::from_be_slice(&tx.signature[32..64]),
        v: crypto::normalize_v(tx.signature[64])? == 1,
    };

    let call = Invoker::invokeCall {
        signature,
        transaction: Invoker::Transaction::from(&tx.transaction),
    };

    Some(call.abi_encode().into())
}

/// Sign a batch the way a client wallet would
pub fn sign_transaction(
    transaction: Transaction,
    key: &SecretKey,
    invoker: Address,
    chain_id: u64,
) -> AATransaction {
    let hash = signing_hash(&transaction, invoker, chain_id);
    let signature = crypto::sign_hash(&hash, key);

    AATransaction {
        transaction,
        signature: Bytes::copy_from_slice(&signature),
    }
}
