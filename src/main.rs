// AA Relayer - Main Entry Point

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use aa_relayer::{runtime, JsonRpcClient, RelayerSettings, ShutdownSignal};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = RelayerSettings::from_env().context("invalid relayer configuration")?;
    info!(?settings, "starting aa relayer");

    let chain = Arc::new(
        JsonRpcClient::new(settings.jsonrpc_url.clone(), settings.aa.rpc_timeout)
            .context("failed to build json-rpc client")?,
    );

    runtime::run(settings, chain, ShutdownSignal::new()).await?;

    info!("aa relayer stopped");
    Ok(())
}
