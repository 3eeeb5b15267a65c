//! Two-phase cancellation for one turn
//!
//! Every turn gets a fresh pair of tokens: one for the model call (and any
//! compression sub-request), one for tool execution (the running tool, its
//! permission wait, and hook processes). Tokens are never reused across turns.

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Signals of one turn, passed explicitly down the call chain
#[derive(Debug, Clone, Default)]
pub struct TurnSignals {
    pub model: CancellationToken,
    pub tools: CancellationToken,
}

impl TurnSignals {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once either signal fired
    pub fn is_aborted(&self) -> bool {
        self.model.is_cancelled() || self.tools.is_cancelled()
    }
}

/// Owns the signals of the current turn
#[derive(Default)]
pub struct AbortCoordinator {
    current: Mutex<TurnSignals>,
}

impl AbortCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install and return a fresh pair of signals
    pub fn begin_turn(&self) -> TurnSignals {
        let signals = TurnSignals::new();
        *self.current.lock() = signals.clone();
        signals
    }

    /// Cancel both signals; repeated calls are no-ops
    pub fn abort(&self) {
        let current = self.current.lock();
        if !current.is_aborted() {
            info!("Aborting turn");
        }
        current.model.cancel();
        current.tools.cancel();
    }

    pub fn abort_model_call(&self) {
        self.current.lock().model.cancel();
    }

    pub fn abort_tools(&self) {
        self.current.lock().tools.cancel();
    }

    pub fn current(&self) -> TurnSignals {
        self.current.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abort_cancels_both_idempotently() {
        let coordinator = AbortCoordinator::new();
        let signals = coordinator.begin_turn();
        coordinator.abort();
        coordinator.abort();
        assert!(signals.model.is_cancelled());
        assert!(signals.tools.is_cancelled());
    }

    #[test]
    fn signals_cancel_independently() {
        let coordinator = AbortCoordinator::new();
        let signals = coordinator.begin_turn();
        coordinator.abort_model_call();
        assert!(signals.model.is_cancelled());
        assert!(!signals.tools.is_cancelled());
        assert!(signals.is_aborted());

        let signals = coordinator.begin_turn();
        coordinator.abort_tools();
        assert!(!signals.model.is_cancelled());
        assert!(signals.tools.is_cancelled());
    }

    #[test]
    fn new_turn_gets_fresh_signals() {
        let coordinator = AbortCoordinator::new();
        let first = coordinator.begin_turn();
        coordinator.abort();
        let second = coordinator.begin_turn();
        assert!(first.is_aborted());
        assert!(!second.is_aborted());
        assert!(!coordinator.current().is_aborted());
    }
}
