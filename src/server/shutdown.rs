//! Graceful shutdown signalling
//!
//! A `ShutdownController` fans a single shutdown notification out to every
//! `ShutdownSignal` clone (scheduler loop, HTTP server).

use tokio::sync::watch;
use tracing::{info, warn};

/// Sending half: triggers shutdown for all signals
#[derive(Debug)]
pub struct ShutdownController {
    tx: watch::Sender<bool>,
}

/// Receiving half: resolves once shutdown was requested
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

/// Create a connected controller/signal pair
pub fn shutdown_channel() -> (ShutdownController, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownController { tx }, ShutdownSignal { rx })
}

impl ShutdownController {
    /// Request shutdown. Idempotent.
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }

    /// A new signal tied to this controller
    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl ShutdownSignal {
    /// Whether shutdown has already been requested
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until shutdown is requested
    ///
    /// A dropped controller counts as shutdown.
    pub async fn wait(&mut self) {
        // Err means the controller is gone
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }
}

/// Wait for SIGINT or SIGTERM
#[cfg(unix)]
pub async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "Failed to install SIGTERM handler, only Ctrl-C will stop the process");
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for Ctrl-C");
            }
            return;
        }
    };

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                warn!(error = %e, "Failed to listen for Ctrl-C");
            }
            info!("Received SIGINT");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM");
        }
    }
}

/// Wait for Ctrl-C
#[cfg(not(unix))]
pub async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
    }
    info!("Received Ctrl-C");
}
