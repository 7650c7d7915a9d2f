use std::sync::Arc;

use tokio::sync::watch;

use crate::config::{Config, ConfigLoader};

/// A one-shot, many-listener shutdown signal. Every long-running task holds
/// its own clone and awaits `recv()` inside its `select!` loop; any clone
/// can fire `broadcast_shutdown()` to wake every other clone at once.
#[derive(Clone)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
    rx: watch::Receiver<bool>,
}

impl Default for Shutdown {
    fn default() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx, rx }
    }
}

impl Shutdown {
    /// `true` once `broadcast_shutdown` has fired on any clone.
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves immediately if the signal already fired; otherwise waits
    /// for the next `broadcast_shutdown` call on any clone of this signal.
    pub async fn recv(&mut self) {
        if self.is_shutdown() {
            return;
        }
        // The sender is held by every clone too, so this only errors once
        // all of them (including `self`) are dropped — never while we're
        // awaiting it ourselves.
        let _ = self.rx.changed().await;
    }

    pub fn broadcast_shutdown(&mut self) {
        let _ = self.tx.send(true);
    }
}

/// Carries the pieces every long-running task in the binary needs: its own
/// name (for logging), a handle to reload configuration, and the shared
/// shutdown signal.
#[derive(Clone)]
pub struct ServiceContext {
    name: String,
    config_loader: Arc<ConfigLoader>,
    shutdown: Shutdown,
}

impl ServiceContext {
    pub fn new(
        name: String,
        config_loader: Arc<ConfigLoader>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            name,
            config_loader,
            shutdown,
        }
    }

    pub fn service_name(&self) -> &str {
        &self.name
    }

    pub fn load_config(&self) -> Config {
        self.config_loader.load().unwrap()
    }

    pub fn config_loader(&self) -> Arc<ConfigLoader> {
        self.config_loader.clone()
    }

    /// Awaits the shutdown signal.
    pub async fn recv_shutdown_signal(&mut self) {
        self.shutdown.recv().await
    }

    /// Causes all listeners to start the shutdown sequence.
    pub fn broadcast_shutdown(&mut self) {
        self.shutdown.broadcast_shutdown()
    }
}
