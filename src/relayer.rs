//! Relayer loop.
//!
//! A single sequential task that owns the relayer account. Every `pull_time`
//! it drains the pool one transaction at a time:
//!
//! ```text
//! Idle -> Building -> Broadcasting -> AwaitingReceipt -> Confirmed | Exhausted
//! ```
//!
//! Only one transaction is ever between Building and AwaitingReceipt, so the
//! relayer's nonce advances without gaps. Chain failures are recorded on the
//! transaction as `Failed`; only store failures stop the loop.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, B256, U256};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::account::RelayerAccount;
use crate::config::AAConfig;
use crate::error::{RelayerError, StateError};
use crate::invoker;
use crate::models::{AAReceipt, AAStateTransaction, AAStatus};
use crate::pool::AAPool;
use crate::rpc::{ChainClient, ChainError, LegacyTransaction};
use crate::shutdown::ShutdownListener;
use crate::state::AATxState;

/// Where the current submission cycle is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    Building,
    Broadcasting,
    AwaitingReceipt,
}

/// How one submission cycle ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Pool had nothing ready
    Empty,
    /// Popped identity no longer needed work
    Skipped,
    Confirmed(AAReceipt),
    /// Receipt never showed up within the retry budget
    Exhausted,
    Failed(String),
    /// Shutdown interrupted the cycle; the record keeps its last status
    Cancelled,
}

pub struct AARelayerService {
    state: Arc<AATxState>,
    pool: Arc<AAPool>,
    chain: Arc<dyn ChainClient>,
    account: RelayerAccount,
    config: Arc<AAConfig>,
    invoker_address: Address,
    chain_id: u64,
    phase: CyclePhase,
}

impl AARelayerService {
    pub fn new(
        state: Arc<AATxState>,
        pool: Arc<AAPool>,
        chain: Arc<dyn ChainClient>,
        account: RelayerAccount,
        config: Arc<AAConfig>,
        invoker_address: Address,
        chain_id: u64,
    ) -> Self {
        Self {
            state,
            pool,
            chain,
            account,
            config,
            invoker_address,
            chain_id,
            phase: CyclePhase::Idle,
        }
    }

    pub fn address(&self) -> Address {
        self.account.address()
    }

    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    // ========================================================================
    // LOOP
    // ========================================================================

    /// Run until shutdown. Resumes receipt polling for records left `Sent` by a
    /// previous process before the first pull.
    pub async fn run(mut self, mut shutdown: ShutdownListener) -> Result<(), RelayerError> {
        info!(
            relayer = %self.account.address(),
            invoker = %self.invoker_address,
            chain_id = self.chain_id,
            pull_ms = self.config.pull_time.as_millis() as u64,
            "relayer loop started"
        );

        self.resume_sent(&mut shutdown).await?;

        // interval() rejects a zero period
        let period = self.config.pull_time.max(Duration::from_millis(1));
        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !shutdown.is_cancelled() {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            while !shutdown.is_cancelled() {
                match self.process_next(&mut shutdown).await? {
                    CycleOutcome::Empty | CycleOutcome::Cancelled => break,
                    _ => {}
                }
            }
        }

        info!("relayer loop stopped");
        Ok(())
    }

    /// Poll receipts for transactions broadcast before the last shutdown
    pub async fn resume_sent(&mut self, shutdown: &mut ShutdownListener) -> Result<(), RelayerError> {
        let sent = self.state.get_all_sent()?;
        if sent.is_empty() {
            return Ok(());
        }

        info!(count = sent.len(), "resuming receipt polling for sent transactions");
        for record in sent {
            if shutdown.is_cancelled() {
                break;
            }

            match record.tx_hash {
                Some(hash) => {
                    self.await_receipt(record.id, hash, shutdown).await?;
                }
                None => {
                    self.fail(record.id, "sent without a transaction hash".into()).await?;
                }
            }
        }

        self.phase = CyclePhase::Idle;
        Ok(())
    }

    /// One full cycle for the next ready transaction
    pub async fn process_next(&mut self, shutdown: &mut ShutdownListener) -> Result<CycleOutcome, RelayerError> {
        let Some(id) = self.pool.pop() else {
            return Ok(CycleOutcome::Empty);
        };

        let outcome = self.process(id, shutdown).await;
        self.phase = CyclePhase::Idle;
        outcome
    }

    async fn process(&mut self, id: B256, shutdown: &mut ShutdownListener) -> Result<CycleOutcome, RelayerError> {
        let record = match self.state.get(&id) {
            Ok(record) => record,
            Err(StateError::NotFound(_)) => {
                warn!(id = %id, "pooled transaction missing from store");
                self.pool.remove(&id);
                return Ok(CycleOutcome::Skipped);
            }
            Err(e) => return Err(e.into()),
        };

        if !record.status.is_pending() {
            debug!(id = %id, status = %record.status, "skipping transaction that is no longer pending");
            self.pool.remove(&id);
            return Ok(CycleOutcome::Skipped);
        }

        // ===== BUILDING =====
        self.phase = CyclePhase::Building;
        let record = self.state.update(&id, |r| r.status = AAStatus::Queued).await?;
        debug!(id = %id, from = %record.tx.from(), "queued for submission");

        let unsigned = tokio::select! {
            built = self.build(&record) => built,
            _ = shutdown.cancelled() => return Ok(CycleOutcome::Cancelled),
        };
        let unsigned = match unsigned {
            Ok(unsigned) => unsigned,
            Err(reason) => return self.fail(id, reason).await,
        };

        // ===== BROADCASTING =====
        self.phase = CyclePhase::Broadcasting;
        let envelope = unsigned.sign(self.account.secret_key());
        let hash = match self.rpc(self.chain.send_raw_transaction(&envelope.raw)).await {
            Ok(hash) => hash,
            Err(e) => return self.fail(id, format!("failed to send transaction: {}", e)).await,
        };

        self.account.mark_used(unsigned.nonce);
        if hash != envelope.hash {
            warn!(id = %id, node_hash = %hash, local_hash = %envelope.hash, "node reported a different transaction hash");
        }

        self.state
            .update(&id, |r| {
                r.status = AAStatus::Sent;
                r.tx_hash = Some(hash);
                r.error = None;
            })
            .await?;
        self.pool.remove(&id);
        info!(id = %id, hash = %hash, nonce = unsigned.nonce, "transaction sent");

        // ===== AWAITING RECEIPT =====
        self.await_receipt(id, hash, shutdown).await
    }

    async fn build(&self, record: &AAStateTransaction) -> Result<LegacyTransaction, String> {
        let data = invoker::encode_invoke(&record.tx).ok_or_else(|| "malformed signature".to_string())?;
        let from = self.account.address();

        let chain_nonce = self
            .rpc(self.chain.get_nonce(from))
            .await
            .map_err(|e| format!("failed to get relayer nonce: {}", e))?;
        let gas_price = self
            .rpc(self.chain.gas_price())
            .await
            .map_err(|e| format!("failed to get gas price: {}", e))?;
        let gas_limit = self
            .rpc(self.chain.estimate_gas(from, self.invoker_address, &data))
            .await
            .map_err(|e| format!("failed to estimate gas: {}", e))?;

        Ok(LegacyTransaction {
            nonce: self.account.nonce_for(chain_nonce),
            gas_price,
            gas_limit,
            to: self.invoker_address,
            value: U256::ZERO,
            data,
            chain_id: self.chain_id,
        })
    }

    async fn await_receipt(
        &mut self,
        id: B256,
        hash: B256,
        shutdown: &mut ShutdownListener,
    ) -> Result<CycleOutcome, RelayerError> {
        self.phase = CyclePhase::AwaitingReceipt;
        let max_attempts = self.config.receipt_num_retries;

        for attempt in 1..=max_attempts {
            tokio::select! {
                _ = time::sleep(self.config.receipt_retry_delay) => {}
                _ = shutdown.cancelled() => {
                    info!(id = %id, hash = %hash, "shutdown while awaiting receipt; left as sent");
                    return Ok(CycleOutcome::Cancelled);
                }
            }

            match self.rpc(self.chain.get_transaction_receipt(hash)).await {
                Ok(Some(receipt)) => {
                    self.state
                        .update(&id, |r| {
                            r.status = AAStatus::Mined;
                            r.retries = attempt;
                            r.receipt = Some(receipt.clone());
                            r.error = None;
                        })
                        .await?;
                    self.pool.remove(&id);

                    if receipt.success {
                        info!(id = %id, hash = %hash, block = receipt.block_number, "transaction mined");
                    } else {
                        warn!(id = %id, hash = %hash, block = receipt.block_number, "transaction mined but reverted");
                    }
                    return Ok(CycleOutcome::Confirmed(receipt));
                }
                Ok(None) => {
                    debug!(id = %id, attempt, max_attempts, "receipt not found yet");
                    self.state.update(&id, |r| r.retries = attempt).await?;
                }
                Err(e) => {
                    return self.fail(id, format!("failed to get receipt: {}", e)).await;
                }
            }
        }

        let reason = format!("receipt not found after {} attempts", max_attempts);
        warn!(id = %id, hash = %hash, "{}", reason);
        self.fail(id, reason).await?;
        Ok(CycleOutcome::Exhausted)
    }

    // ========================================================================
    // HELPERS
    // ========================================================================

    async fn fail(&self, id: B256, reason: String) -> Result<CycleOutcome, RelayerError> {
        error!(id = %id, error = %reason, "transaction failed");
        self.state
            .update(&id, |r| {
                r.status = AAStatus::Failed;
                r.error = Some(reason.clone());
            })
            .await?;
        self.pool.remove(&id);
        Ok(CycleOutcome::Failed(reason))
    }

    /// Bound every node call by the configured timeout
    async fn rpc<T, F>(&self, call: F) -> Result<T, ChainError>
    where
        F: Future<Output = Result<T, ChainError>>,
    {
        time::timeout(self.config.rpc_timeout, call)
            .await
            .map_err(|_| ChainError::Timeout)?
    }
}
