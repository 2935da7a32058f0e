//! Cooperative cancellation for one dispatch.
//!
//! A single [`CancellationToken`] spans the filter chain and the handler. It is
//! triggered by an OS interruption (Ctrl-C, and SIGTERM on Unix) when the
//! dispatcher installs [`listen_for_interrupt`].

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Clonable cancellation signal.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    tx: Arc<watch::Sender<bool>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Completes once cancellation has been requested.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this only returns on cancellation.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn a task that cancels `token` on the first interruption signal.
///
/// Must be called from within a Tokio runtime. Abort the returned handle once the
/// dispatch finishes.
pub fn listen_for_interrupt(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        if wait_for_signal().await {
            tracing::info!("Interrupt received, cancelling command");
            token.cancel();
        }
    })
}

#[cfg(unix)]
async fn wait_for_signal() -> bool {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install SIGTERM handler");
            return tokio::signal::ctrl_c().await.is_ok();
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => result.is_ok(),
        received = terminate.recv() => received.is_some(),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> bool {
    tokio::signal::ctrl_c().await.is_ok()
}
