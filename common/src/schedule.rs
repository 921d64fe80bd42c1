//! Contract between the background engines and the scheduler that drives them.

use async_trait::async_trait;
use std::time::Duration;

/// Result of one tick, as seen by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The tick ran to completion and handled `items` units of work.
    Completed { items: usize },
    /// The tick was abandoned. The schedule continues regardless.
    Failed { reason: String },
}

impl TickOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, TickOutcome::Failed { .. })
    }
}

/// A unit of periodic work.
///
/// Implementations must not panic or propagate errors out of [`tick`]; every
/// failure is folded into a [`TickOutcome::Failed`] so the loop survives.
///
/// [`tick`]: PeriodicTask::tick
#[async_trait]
pub trait PeriodicTask: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Time between the starts of consecutive ticks.
    fn interval(&self) -> Duration;

    /// Delay before the first tick.
    fn initial_delay(&self) -> Duration {
        Duration::ZERO
    }

    /// Run one tick.
    async fn tick(&self) -> TickOutcome;
}
