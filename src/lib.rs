//! AA Relayer
//! Verifies, stores and submits account-abstraction transactions through an invoker contract

pub mod account;
pub mod app_state;
pub mod config;
pub mod crypto;
pub mod error;
pub mod handlers;
pub mod ingress;
pub mod invoker;
pub mod models;
pub mod pool;
pub mod relayer;
pub mod routes;
pub mod runtime;
pub mod shutdown;
pub mod state;
pub mod verification;

#[path = "../rpc/mod.rs"]
pub mod rpc;

pub use account::{AccountError, RelayerAccount};
pub use app_state::{AppState, SharedState};
pub use config::{AAConfig, ConfigError, RelayerSettings};
pub use error::{IngressError, RelayerError, StateError, VerificationError};
pub use ingress::IngressService;
pub use models::{AAReceipt, AAStateTransaction, AAStatus, AATransaction, Payload, Transaction};
pub use pool::AAPool;
pub use relayer::{AARelayerService, CycleOutcome, CyclePhase};
pub use rpc::{ChainClient, ChainError, JsonRpcClient};
pub use shutdown::{ShutdownListener, ShutdownSignal};
pub use state::AATxState;
pub use verification::{AAVerification, ValidationPolicy};
