//! Relayer configuration.
//!
//! Everything is read once at startup from the environment (a `.env` file is
//! loaded first when present) and is read-only afterwards.

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use alloy_primitives::Address;
use thiserror::Error;

// ============================================================================
// DEFAULTS
// ============================================================================

pub const DEFAULT_ADDR: &str = "0.0.0.0:8198";
pub const DEFAULT_DB_PATH: &str = "aa-relayer-db";
pub const DEFAULT_JSONRPC_URL: &str = "http://127.0.0.1:8545";
pub const DEFAULT_CHAIN_ID: u64 = 100;
pub const DEFAULT_PULL_TIME_MS: u64 = 5_000;
pub const DEFAULT_RECEIPT_DELAY_MS: u64 = 500;
pub const DEFAULT_RECEIPT_RETRIES: u32 = 100;
pub const DEFAULT_RPC_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

// ============================================================================
// POLICY / TIMING
// ============================================================================

/// Admission policy and relayer timing, shared read-only by verification and the relayer loop
#[derive(Debug, Clone)]
pub struct AAConfig {
    pub allow_contract_creation: bool,
    /// Empty means every sender is allowed
    pub allow_list: HashSet<Address>,
    pub deny_list: HashSet<Address>,
    /// Interval between pool pulls
    pub pull_time: Duration,
    /// Delay before each receipt poll
    pub receipt_retry_delay: Duration,
    /// Receipt polls before a sent transaction is given up on
    pub receipt_num_retries: u32,
    /// Ceiling on every call to the node
    pub rpc_timeout: Duration,
}

impl Default for AAConfig {
    fn default() -> Self {
        Self {
            allow_contract_creation: false,
            allow_list: HashSet::new(),
            deny_list: HashSet::new(),
            pull_time: Duration::from_millis(DEFAULT_PULL_TIME_MS),
            receipt_retry_delay: Duration::from_millis(DEFAULT_RECEIPT_DELAY_MS),
            receipt_num_retries: DEFAULT_RECEIPT_RETRIES,
            rpc_timeout: Duration::from_secs(DEFAULT_RPC_TIMEOUT_SECS),
        }
    }
}

impl AAConfig {
    pub fn is_address_allowed(&self, address: &Address) -> bool {
        if self.deny_list.contains(address) {
            return false;
        }

        self.allow_list.is_empty() || self.allow_list.contains(address)
    }

    fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            allow_contract_creation: parse_or(lookup, "AA_ALLOW_CONTRACT_CREATION", false)?,
            allow_list: parse_address_list(lookup, "AA_ALLOW_LIST")?,
            deny_list: parse_address_list(lookup, "AA_DENY_LIST")?,
            pull_time: Duration::from_millis(parse_or(lookup, "AA_PULL_TIME_MS", DEFAULT_PULL_TIME_MS)?),
            receipt_retry_delay: Duration::from_millis(parse_or(
                lookup,
                "AA_RECEIPT_DELAY_MS",
                DEFAULT_RECEIPT_DELAY_MS,
            )?),
            receipt_num_retries: parse_or(lookup, "AA_RECEIPT_RETRIES", DEFAULT_RECEIPT_RETRIES)?,
            rpc_timeout: Duration::from_secs(parse_or(
                lookup,
                "AA_RPC_TIMEOUT_SECS",
                DEFAULT_RPC_TIMEOUT_SECS,
            )?),
        })
    }
}

// ============================================================================
// PROCESS SETTINGS
// ============================================================================

/// Everything the binary needs to wire the relayer together
#[derive(Clone)]
pub struct RelayerSettings {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub jsonrpc_url: String,
    pub invoker_address: Address,
    pub chain_id: u64,
    /// Hex-encoded relayer key; parsed by `RelayerAccount`
    pub private_key: String,
    pub aa: AAConfig,
}

impl fmt::Debug for RelayerSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayerSettings")
            .field("addr", &self.addr)
            .field("db_path", &self.db_path)
            .field("jsonrpc_url", &self.jsonrpc_url)
            .field("invoker_address", &self.invoker_address)
            .field("chain_id", &self.chain_id)
            .field("aa", &self.aa)
            .finish_non_exhaustive()
    }
}

impl RelayerSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let invoker_address = lookup("AA_RELAYER_INVOKER_ADDR")
            .ok_or(ConfigError::Missing("AA_RELAYER_INVOKER_ADDR"))?;
        let private_key = lookup("AA_RELAYER_PRIVATE_KEY")
            .ok_or(ConfigError::Missing("AA_RELAYER_PRIVATE_KEY"))?;

        Ok(Self {
            addr: parse_or(&lookup, "AA_RELAYER_ADDR", parse_default(DEFAULT_ADDR)?)?,
            db_path: lookup("AA_RELAYER_DB_PATH")
                .unwrap_or_else(|| DEFAULT_DB_PATH.to_string())
                .into(),
            jsonrpc_url: normalize_jsonrpc_url(
                &lookup("AA_RELAYER_JSONRPC").unwrap_or_else(|| DEFAULT_JSONRPC_URL.to_string()),
            ),
            invoker_address: parse_value("AA_RELAYER_INVOKER_ADDR", invoker_address.trim())?,
            chain_id: parse_or(&lookup, "AA_RELAYER_CHAIN_ID", DEFAULT_CHAIN_ID)?,
            private_key,
            aa: AAConfig::from_lookup(&lookup)?,
        })
    }
}

/// Prefix `http://` when the endpoint was given as a bare host:port
pub fn normalize_jsonrpc_url(url: &str) -> String {
    let url = url.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("http://{}", url)
    }
}

// ===== PARSING HELPERS =====

fn parse_value<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.parse::<T>().map_err(|e| ConfigError::Invalid {
        key,
        reason: format!("{} ({:?})", e, raw),
    })
}

fn parse_default<T>(raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    parse_value("default", raw)
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => parse_value(key, raw.trim()),
        _ => Ok(default),
    }
}

fn parse_address_list<F>(lookup: &F, key: &'static str) -> Result<HashSet<Address>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(HashSet::new());
    };

    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| parse_value(key, entry))
        .collect()
}
