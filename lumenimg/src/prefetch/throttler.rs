//! Prefetch throttling.
//!
//! The executor asks a [`PrefetchThrottler`] before each item whether it
//! should hold off. It does not know why; the production implementation
//! pauses while the network is offline, and tests plug in fixed answers.

use std::fmt;
use std::sync::Arc;

use crate::network::{NetworkClass, NetworkConditionMonitor};

/// Throttle state as shown in logs and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleState {
    /// Prefetch may proceed.
    Active,
    /// Prefetch is paused.
    Paused,
}

impl ThrottleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThrottleState::Active => "Active",
            ThrottleState::Paused => "Paused",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, ThrottleState::Active)
    }
}

impl fmt::Display for ThrottleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Decides whether background prefetch should pause.
///
/// # Implementors
///
/// - `NetworkThrottler` - pauses while the network is offline
/// - `NeverThrottle` - testing: always allows prefetch
/// - `AlwaysThrottle` - testing: never allows prefetch
pub trait PrefetchThrottler: Send + Sync {
    /// Returns `true` if prefetch should not issue further fetches now.
    fn should_throttle(&self) -> bool {
        !self.state().is_active()
    }

    /// Current throttle state.
    fn state(&self) -> ThrottleState;
}

/// Pauses prefetch while the monitor classifies the network as offline.
#[derive(Debug)]
pub struct NetworkThrottler {
    monitor: Arc<NetworkConditionMonitor>,
}

impl NetworkThrottler {
    pub fn new(monitor: Arc<NetworkConditionMonitor>) -> Self {
        Self { monitor }
    }
}

impl PrefetchThrottler for NetworkThrottler {
    fn state(&self) -> ThrottleState {
        match self.monitor.classify() {
            NetworkClass::Offline => ThrottleState::Paused,
            NetworkClass::Slow | NetworkClass::Fast => ThrottleState::Active,
        }
    }
}

/// Testing throttler that never throttles.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverThrottle;

impl PrefetchThrottler for NeverThrottle {
    fn state(&self) -> ThrottleState {
        ThrottleState::Active
    }
}

/// Testing throttler that always throttles.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysThrottle;

impl PrefetchThrottler for AlwaysThrottle {
    fn state(&self) -> ThrottleState {
        ThrottleState::Paused
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{ConnectivitySnapshot, EffectiveType, SharedConnectivity};
    use std::time::Duration;

    #[test]
    fn test_throttle_state_as_str() {
        assert_eq!(ThrottleState::Active.as_str(), "Active");
        assert_eq!(ThrottleState::Paused.to_string(), "Paused");
    }

    #[test]
    fn test_fixed_throttlers() {
        assert!(!NeverThrottle.should_throttle());
        assert!(AlwaysThrottle.should_throttle());
    }

    #[test]
    fn test_network_throttler_pauses_offline() {
        let signals = Arc::new(SharedConnectivity::new());
        let monitor = Arc::new(NetworkConditionMonitor::new(
            signals.clone(),
            Duration::ZERO,
        ));
        let throttler = NetworkThrottler::new(monitor);

        assert!(!throttler.should_throttle());

        signals.update(ConnectivitySnapshot::online(EffectiveType::TwoG));
        assert_eq!(throttler.state(), ThrottleState::Active);

        signals.update(ConnectivitySnapshot::offline());
        assert_eq!(throttler.state(), ThrottleState::Paused);
        assert!(throttler.should_throttle());
    }

    #[test]
    fn test_throttler_is_dyn_compatible() {
        let throttler: Arc<dyn PrefetchThrottler> = Arc::new(NeverThrottle);
        assert!(throttler.state().is_active());
    }
}
