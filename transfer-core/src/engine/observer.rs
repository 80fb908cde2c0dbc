//! State change notification

use super::state::EngineSnapshot;

/// Receives a snapshot after every engine transition.
///
/// Called synchronously on the task that caused the transition, with no
/// engine lock held.
pub trait EngineObserver: Send + Sync {
    fn on_state_change(&self, snapshot: &EngineSnapshot);
}

impl<F> EngineObserver for F
where
    F: Fn(&EngineSnapshot) + Send + Sync,
{
    fn on_state_change(&self, snapshot: &EngineSnapshot) {
        self(snapshot)
    }
}
