//! Process-wide cancellation flag.

use tokio_util::sync::CancellationToken;
use tracing::info;

/// Cooperative cancellation shared between signal listeners and the engine.
///
/// Once requested, cancellation stays requested for the life of the value
/// and all its clones. The engine only looks at it between parts.
#[derive(Debug, Clone, Default)]
pub struct InterruptCoordinator {
    token: CancellationToken,
}

impl InterruptCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flag. Repeated requests are no-ops.
    pub fn request_cancellation(&self) {
        if !self.token.is_cancelled() {
            info!("cancellation requested, pausing at the next part boundary");
        }
        self.token.cancel();
    }

    pub fn cancellation_requested(&self) -> bool {
        self.token.is_cancelled()
    }
}
