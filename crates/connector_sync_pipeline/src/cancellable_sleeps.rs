use std::time::Duration;

use connector_sync_common::ConnectorError;
use tokio_util::sync::CancellationToken;

/// A sleep primitive that belongs to a shared cancellation group (§4.6,
/// §5). Every clone shares the same underlying token, so `cancel()` called
/// on any one of them wakes every outstanding `sleep()` across the group
/// atomically — grounded in the shutdown-token pattern the orchestrator
/// reference loop uses to propagate a single cancellation signal through
/// `tokio::select!` (`akamaotto`'s scheduler `run(shutdown: CancellationToken)`).
#[derive(Clone)]
pub struct CancellableSleeps {
    token: CancellationToken,
}

impl Default for CancellableSleeps {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellableSleeps {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Sleeps for `duration`, or returns early with
    /// [`ErrorCode::Cancelled`](connector_sync_common::ErrorCode::Cancelled)
    /// if `cancel()` fires first.
    pub async fn sleep(&self, duration: Duration) -> Result<(), ConnectorError> {
        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            _ = self.token.cancelled() => Err(ConnectorError::cancelled()),
        }
    }

    /// Wakes every outstanding and future `sleep()` on this group.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Resolves once `cancel()` has fired. Lets a caller race a blocking
    /// operation directly against the group's cancellation signal instead
    /// of only through `sleep()` (§5).
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}
