//! Cooperative shutdown signal shared by the agent's background tasks

use tokio_util::sync::CancellationToken;

/// Cloneable shutdown signal
///
/// Triggering any clone wakes every task waiting on any other clone.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    token: CancellationToken,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wake every waiter; later waits resolve immediately
    pub fn trigger(&self) {
        self.token.cancel();
    }

    /// Resolves once the signal has been triggered
    pub async fn wait(&self) {
        self.token.cancelled().await
    }
}

#[cfg(test)]
#[path = "shutdown_test.rs"]
mod tests;
