//! Monitoring mode toggle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The two pipeline modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// The reference keeps refreshing to the latest frame.
    Idle,
    /// The reference is frozen; every frame is compared against it.
    Monitoring,
}

/// Shared handle to the monitoring toggle.
///
/// The control thread writes it, the serial worker samples it exactly once
/// per frame turn. The frozen baseline is therefore the last frame fully
/// processed before the first turn that observes the flipped flag.
#[derive(Debug, Clone, Default)]
pub struct MonitorHandle {
    monitoring: Arc<AtomicBool>,
}

impl MonitorHandle {
    /// New handle in the `Idle` state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the mode. Returns the state after the flip.
    pub fn toggle(&self) -> MonitorState {
        let was = self.monitoring.fetch_xor(true, Ordering::SeqCst);
        if was {
            MonitorState::Idle
        } else {
            MonitorState::Monitoring
        }
    }

    /// Force a specific state.
    pub fn set(&self, state: MonitorState) {
        self.monitoring
            .store(state == MonitorState::Monitoring, Ordering::SeqCst);
    }

    /// The current state.
    pub fn state(&self) -> MonitorState {
        if self.monitoring.load(Ordering::SeqCst) {
            MonitorState::Monitoring
        } else {
            MonitorState::Idle
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.state() == MonitorState::Monitoring
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle() {
        assert_eq!(MonitorHandle::new().state(), MonitorState::Idle);
    }

    #[test]
    fn toggle_alternates_states() {
        let handle = MonitorHandle::new();
        assert_eq!(handle.toggle(), MonitorState::Monitoring);
        assert_eq!(handle.state(), MonitorState::Monitoring);
        assert_eq!(handle.toggle(), MonitorState::Idle);
        assert_eq!(handle.state(), MonitorState::Idle);
    }

    #[test]
    fn clones_share_the_flag() {
        let handle = MonitorHandle::new();
        let control = handle.clone();
        control.set(MonitorState::Monitoring);
        assert!(handle.is_monitoring());
    }
}
