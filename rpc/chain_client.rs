//! Downstream chain interface.
//!
//! `ChainClient` is everything the relayer loop needs from a node: a nonce
//! source for its own account, fee and gas quotes, a broadcaster for signed
//! envelopes and a receipt lookup. `JsonRpcClient` implements it over
//! Ethereum JSON-RPC with reqwest.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy_primitives::{Address, Bytes, B256, U256, U64};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::models::AAReceipt;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("request to node failed: {0}")]
    Request(reqwest::Error),

    #[error("node error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("invalid response from node: {0}")]
    InvalidResponse(String),

    #[error("node call timed out")]
    Timeout,
}

impl From<reqwest::Error> for ChainError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            ChainError::Timeout
        } else {
            ChainError::Request(error)
        }
    }
}

// ============================================================================
// TRAIT
// ============================================================================

#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Pending transaction count of `address`
    async fn get_nonce(&self, address: Address) -> Result<u64, ChainError>;

    async fn gas_price(&self) -> Result<u128, ChainError>;

    async fn estimate_gas(&self, from: Address, to: Address, data: &Bytes) -> Result<u64, ChainError>;

    /// Broadcast a signed envelope, returning the hash the node assigned
    async fn send_raw_transaction(&self, raw: &Bytes) -> Result<B256, ChainError>;

    /// `Ok(None)` while the transaction is not yet included
    async fn get_transaction_receipt(&self, hash: B256) -> Result<Option<AAReceipt>, ChainError>;
}

// ============================================================================
// JSON-RPC CLIENT
// ============================================================================

pub struct JsonRpcClient {
    url: String,
    client: Client,
    next_id: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: B256,
    #[serde(default)]
    block_hash: Option<B256>,
    #[serde(default)]
    block_number: Option<U64>,
    gas_used: U64,
    /// Absent on pre-Byzantium chains
    #[serde(default)]
    status: Option<U64>,
}

impl From<RpcReceipt> for AAReceipt {
    fn from(receipt: RpcReceipt) -> Self {
        AAReceipt {
            tx_hash: receipt.transaction_hash,
            block_hash: receipt.block_hash,
            block_number: receipt.block_number.map(|n| n.to::<u64>()).unwrap_or_default(),
            gas_used: receipt.gas_used.to::<u64>(),
            success: receipt.status.map_or(true, |status| status == U64::from(1)),
        }
    }
}

impl JsonRpcClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ChainError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: url.into(),
            client,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Raw call; a JSON `null` result comes back as `None`
    async fn call(&self, method: &str, params: Value) -> Result<Option<Value>, ChainError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        debug!(method, id, "node call");

        let response: RpcResponse = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(error) = response.error {
            return Err(ChainError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        Ok(response.result.filter(|value| !value.is_null()))
    }

    async fn call_required<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, ChainError> {
        let value = self
            .call(method, params)
            .await?
            .ok_or_else(|| ChainError::InvalidResponse(format!("{} returned null", method)))?;
        decode(method, value)
    }
}

fn decode<T: DeserializeOwned>(method: &str, value: Value) -> Result<T, ChainError> {
    serde_json::from_value(value).map_err(|e| ChainError::InvalidResponse(format!("{}: {}", method, e)))
}

/// Some nodes answer an unknown hash with an error rather than `null`
fn is_not_found(error: &ChainError) -> bool {
    matches!(error, ChainError::Rpc { message, .. } if message.to_lowercase().contains("not found"))
}

#[async_trait]
impl ChainClient for JsonRpcClient {
    async fn get_nonce(&self, address: Address) -> Result<u64, ChainError> {
        let nonce: U64 = self
            .call_required("eth_getTransactionCount", json!([address, "pending"]))
            .await?;
        Ok(nonce.to::<u64>())
    }

    async fn gas_price(&self) -> Result<u128, ChainError> {
        let price: U256 = self.call_required("eth_gasPrice", json!([])).await?;
        u128::try_from(price).map_err(|_| ChainError::InvalidResponse(format!("gas price {} overflows", price)))
    }

    async fn estimate_gas(&self, from: Address, to: Address, data: &Bytes) -> Result<u64, ChainError> {
        let gas: U64 = self
            .call_required(
                "eth_estimateGas",
                json!([{ "from": from, "to": to, "data": data, "value": "0x0" }]),
            )
            .await?;
        Ok(gas.to::<u64>())
    }

    async fn send_raw_transaction(&self, raw: &Bytes) -> Result<B256, ChainError> {
        self.call_required("eth_sendRawTransaction", json!([raw])).await
    }

    async fn get_transaction_receipt(&self, hash: B256) -> Result<Option<AAReceipt>, ChainError> {
        match self.call("eth_getTransactionReceipt", json!([hash])).await {
            Ok(Some(value)) => {
                let receipt: RpcReceipt = decode("eth_getTransactionReceipt", value)?;
                Ok(Some(receipt.into()))
            }
            Ok(None) => Ok(None),
            Err(error) if is_not_found(&error) => Ok(None),
            Err(error) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};

    /// Fake node answering each method with a canned JSON-RPC body
    async fn fake_node(handler: fn(&str) -> Value) -> String {
        let app = Router::new().route(
            "/",
            post(move |Json(request): Json<Value>| async move {
                let method = request["method"].as_str().unwrap_or_default().to_string();
                let mut body = handler(&method);
                body["jsonrpc"] = json!("2.0");
                body["id"] = request["id"].clone();
                Json(body)
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client(url: String) -> JsonRpcClient {
        JsonRpcClient::new(url, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_hex_quantities_decoded() {
        let url = fake_node(|method| match method {
            "eth_getTransactionCount" => json!({ "result": "0x1a" }),
            "eth_gasPrice" => json!({ "result": "0x3b9aca00" }),
            "eth_estimateGas" => json!({ "result": "0x5208" }),
            _ => json!({ "error": { "code": -32601, "message": "method not supported" } }),
        })
        .await;
        let node = client(url);

        assert_eq!(node.get_nonce(Address::ZERO).await.unwrap(), 26);
        assert_eq!(node.gas_price().await.unwrap(), 1_000_000_000);
        assert_eq!(
            node.estimate_gas(Address::ZERO, Address::ZERO, &Bytes::new()).await.unwrap(),
            21_000
        );
    }

    #[tokio::test]
    async fn test_receipt_null_and_not_found_are_pending() {
        let url = fake_node(|_| json!({ "result": null })).await;
        assert_eq!(client(url).get_transaction_receipt(B256::ZERO).await.unwrap(), None);

        let url = fake_node(|_| json!({ "error": { "code": -32000, "message": "Not Found" } })).await;
        assert_eq!(client(url).get_transaction_receipt(B256::ZERO).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_receipt_decoded() {
        let url = fake_node(|_| {
            json!({ "result": {
                "transactionHash": format!("0x{}", "11".repeat(32)),
                "blockHash": format!("0x{}", "22".repeat(32)),
                "blockNumber": "0x10",
                "gasUsed": "0xa410",
                "status": "0x0"
            }})
        })
        .await;

        let receipt = client(url)
            .get_transaction_receipt(B256::repeat_byte(0x11))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(receipt.tx_hash, B256::repeat_byte(0x11));
        assert_eq!(receipt.block_hash, Some(B256::repeat_byte(0x22)));
        assert_eq!(receipt.block_number, 16);
        assert_eq!(receipt.gas_used, 42_000);
        assert!(!receipt.success);
    }

    #[tokio::test]
    async fn test_send_rejection_surfaces_node_error() {
        let url = fake_node(|_| json!({ "error": { "code": -32000, "message": "nonce too low" } })).await;

        let err = client(url)
            .send_raw_transaction(&Bytes::from_static(&[0xf8]))
            .await
            .unwrap_err();

        assert!(matches!(err, ChainError::Rpc { code: -32000, ref message } if message == "nonce too low"));
    }
}
