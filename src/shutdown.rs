//! Cooperative cancellation shared by the signal listener, the HTTP server and
//! the relayer loop.
//!
//! One `ShutdownSignal` is created in `main`; every activity holds a
//! `ShutdownListener` and checks it at its own wait points.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

#[derive(Clone)]
pub struct ShutdownSignal {
    tx: Arc<watch::Sender<bool>>,
}

#[derive(Clone)]
pub struct ShutdownListener {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.tx.subscribe(),
        }
    }

    /// Ask every listener to stop; idempotent
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownListener {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown was triggered (or the signal was dropped)
    pub async fn cancelled(&mut self) {
        // a dropped sender counts as shutdown
        let _ = self.rx.wait_for(|stop| *stop).await;
    }
}

/// Wait for SIGINT/SIGTERM and trigger shutdown. Returns early if some other
/// activity triggered it first. Receiving a signal is not an error.
pub async fn listen_for_signals(signal: ShutdownSignal) -> std::io::Result<()> {
    let mut listener = signal.subscribe();

    tokio::select! {
        received = wait_for_signal() => {
            let name = received?;
            info!(signal = name, "shutdown signal received");
            signal.trigger();
        }
        _ = listener.cancelled() => {}
    }

    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("Ctrl+C")
}
