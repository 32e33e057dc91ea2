//! Clock and task-spawning context for the orchestrator.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

/// The orchestrator's view of time and background execution.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time` and `tokio::spawn`
/// - **Simulation**: `SimContext` (in `rigel_sim`) - virtual clock that only
///   moves when the monitoring loop sleeps
///
/// The monitoring loop never blocks on a message; it only blocks on
/// [`RunContext::sleep`], which is why swapping this trait is enough to make
/// a whole run deterministic.
#[async_trait]
pub trait RunContext: Send + Sync + 'static {
    /// Returns the monotonic time elapsed since the context was created.
    fn now(&self) -> Duration;

    /// Suspends the caller for the given duration.
    ///
    /// In production: wraps `tokio::time::sleep`
    /// In simulation: advances the virtual clock and yields
    async fn sleep(&self, duration: Duration);

    /// Spawns a background task (one per requirement listener).
    fn spawn<F>(&self, name: &str, future: F)
    where
        F: Future<Output = ()> + Send + 'static;
}
