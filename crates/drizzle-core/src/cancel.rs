//! Cancellation for a streaming run
//!
//! An interrupt cancels the token; the pipeline observes it between reads,
//! flushes, and pacing delays.

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{debug, warn};

/// Wrapper around CancellationToken for one pipeline run
#[derive(Clone, Debug)]
pub struct StreamCancellation {
    token: CancellationToken,
}

impl StreamCancellation {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Cancel the run
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once `cancel` has been called
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// Cancel when the process receives Ctrl-C.
    ///
    /// Must be called from within a tokio runtime.
    pub fn cancel_on_ctrl_c(&self) {
        let token = self.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    match result {
                        Ok(()) => {
                            debug!("Interrupt received");
                            token.cancel();
                        }
                        Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
                    }
                }
                _ = token.cancelled() => {}
            }
        });
    }
}

impl Default for StreamCancellation {
    fn default() -> Self {
        Self::new()
    }
}
