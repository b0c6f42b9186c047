//! Process wiring.
//!
//! The signal listener, the ingress server and the relayer loop run side by
//! side under one `ShutdownSignal`. Whichever finishes first triggers it for
//! the others, and the process only returns once all three have drained.

use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::account::RelayerAccount;
use crate::app_state::AppState;
use crate::config::RelayerSettings;
use crate::error::RelayerError;
use crate::ingress::IngressService;
use crate::pool::AAPool;
use crate::relayer::AARelayerService;
use crate::routes;
use crate::rpc::ChainClient;
use crate::shutdown::{self, ShutdownSignal};
use crate::state::AATxState;
use crate::verification::AAVerification;

/// Open the store, seed the pool, bind the listener and run until shutdown
pub async fn run(
    settings: RelayerSettings,
    chain: Arc<dyn ChainClient>,
    signal: ShutdownSignal,
) -> anyhow::Result<()> {
    // ===== STORE & POOL =====
    let state = Arc::new(
        AATxState::open(&settings.db_path)
            .with_context(|| format!("failed to open store at {}", settings.db_path.display()))?,
    );
    let pending = state.get_all_pending().context("failed to load pending transactions")?;
    let pool = Arc::new(AAPool::new());
    pool.init(pending.iter().map(|record| record.id));
    info!(pending = pool.len(), "pool seeded from store");

    // ===== PIPELINE =====
    let config = Arc::new(settings.aa.clone());
    let account = RelayerAccount::from_hex(&settings.private_key).context("invalid relayer private key")?;
    let relayer_address = account.address();

    let verification = Arc::new(AAVerification::new(
        config.clone(),
        settings.invoker_address,
        settings.chain_id,
    ));
    let relayer = AARelayerService::new(
        state.clone(),
        pool.clone(),
        chain,
        account,
        config,
        settings.invoker_address,
        settings.chain_id,
    );

    let app_state = AppState::new(IngressService::new(verification, state, pool), relayer_address).shared();
    let app = routes::router(app_state);

    let listener = TcpListener::bind(settings.addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.addr))?;
    info!(addr = %settings.addr, relayer = %relayer_address, jsonrpc = %settings.jsonrpc_url, "relayer listening");

    let stop = signal.subscribe();
    serve_until_shutdown(listener, app, relayer.run(stop), signal).await
}

/// Drive the three activities to completion and report the first failure
/// (signals, then server, then relayer).
pub async fn serve_until_shutdown<F>(
    listener: TcpListener,
    app: Router,
    relayer: F,
    signal: ShutdownSignal,
) -> anyhow::Result<()>
where
    F: Future<Output = Result<(), RelayerError>>,
{
    let signals = {
        let signal = signal.clone();
        async move {
            let result = shutdown::listen_for_signals(signal.clone()).await;
            if let Err(e) = &result {
                error!(error = %e, "signal listener failed; shutting down");
                signal.trigger();
            }
            result.context("signal listener failed")
        }
    };

    let server = {
        let signal = signal.clone();
        let mut stop = signal.subscribe();
        async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move { stop.cancelled().await })
                .await;
            signal.trigger();
            result.context("ingress server failed")
        }
    };

    let relayer = {
        let signal = signal.clone();
        async move {
            let result = relayer.await;
            if let Err(e) = &result {
                error!(error = %e, "relayer loop failed; shutting down");
            }
            signal.trigger();
            result.context("relayer loop failed")
        }
    };

    let (signals, server, relayer) = tokio::join!(signals, server, relayer);
    signals.and(server).and(relayer)
}
