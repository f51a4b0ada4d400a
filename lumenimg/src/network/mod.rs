//! Network condition classification.
//!
//! The host reports connectivity signals (online state, save-data
//! preference, effective link type) through a [`ConnectivitySignals`]
//! source. [`NetworkConditionMonitor`] folds them into a coarse
//! [`NetworkClass`] and holds the answer for a short window so that a
//! render pass resolving hundreds of images sees one consistent class
//! instead of oscillating between readings.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use lumenimg::network::{
//!     ConnectivitySnapshot, EffectiveType, NetworkClass, NetworkConditionMonitor,
//!     SharedConnectivity,
//! };
//!
//! let signals = Arc::new(SharedConnectivity::new());
//! signals.update(ConnectivitySnapshot::online(EffectiveType::ThreeG));
//!
//! let monitor = NetworkConditionMonitor::new(signals, Duration::from_secs(5));
//! assert_eq!(monitor.classify(), NetworkClass::Slow);
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tracing::trace;

/// Default time a classification stays valid.
pub const DEFAULT_CLASSIFY_WINDOW: Duration = Duration::from_secs(5);

/// Coarse connectivity class driving transform selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkClass {
    /// No connectivity.
    Offline,
    /// Constrained link or data-saving mode.
    Slow,
    /// Anything else, including "unknown".
    Fast,
}

impl NetworkClass {
    /// Short name for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkClass::Offline => "offline",
            NetworkClass::Slow => "slow",
            NetworkClass::Fast => "fast",
        }
    }

    /// Returns true when the link should be treated as constrained.
    pub fn is_constrained(&self) -> bool {
        !matches!(self, NetworkClass::Fast)
    }
}

impl fmt::Display for NetworkClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Effective link type as reported by the host runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectiveType {
    Slow2g,
    TwoG,
    ThreeG,
    FourG,
}

impl EffectiveType {
    /// Parse the conventional `slow-2g` / `2g` / `3g` / `4g` labels.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "slow-2g" => Some(EffectiveType::Slow2g),
            "2g" => Some(EffectiveType::TwoG),
            "3g" => Some(EffectiveType::ThreeG),
            "4g" => Some(EffectiveType::FourG),
            _ => None,
        }
    }

    fn is_slow(&self) -> bool {
        !matches!(self, EffectiveType::FourG)
    }
}

/// One reading of the connectivity signals. Every field is optional
/// because hosts expose different subsets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectivitySnapshot {
    pub online: Option<bool>,
    pub save_data: Option<bool>,
    pub effective_type: Option<EffectiveType>,
}

impl ConnectivitySnapshot {
    /// Snapshot for an online host with a known link type.
    pub fn online(effective_type: EffectiveType) -> Self {
        Self {
            online: Some(true),
            save_data: None,
            effective_type: Some(effective_type),
        }
    }

    /// Snapshot for a host reporting no connectivity.
    pub fn offline() -> Self {
        Self {
            online: Some(false),
            ..Self::default()
        }
    }

    /// Set the save-data preference.
    pub fn with_save_data(mut self, save_data: bool) -> Self {
        self.save_data = Some(save_data);
        self
    }

    /// Fold the signals into a class. Missing signals are optimistic.
    pub fn classify(&self) -> NetworkClass {
        if self.online == Some(false) {
            return NetworkClass::Offline;
        }
        if self.save_data == Some(true) {
            return NetworkClass::Slow;
        }
        match self.effective_type {
            Some(t) if t.is_slow() => NetworkClass::Slow,
            _ => NetworkClass::Fast,
        }
    }
}

/// Source of connectivity readings.
///
/// Returns `None` when the host exposes no signals at all, in which case
/// the monitor assumes a fast link.
pub trait ConnectivitySignals: Send + Sync {
    fn snapshot(&self) -> Option<ConnectivitySnapshot>;
}

/// Signal source for hosts that expose nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSignals;

impl ConnectivitySignals for NoSignals {
    fn snapshot(&self) -> Option<ConnectivitySnapshot> {
        None
    }
}

/// Signal source the host pushes readings into.
///
/// Create one instance per application context and hand clones of the
/// `Arc` to whatever observes connectivity changes.
#[derive(Debug, Default)]
pub struct SharedConnectivity {
    latest: RwLock<Option<ConnectivitySnapshot>>,
}

impl SharedConnectivity {
    /// Create a source with no reading yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the latest reading.
    pub fn update(&self, snapshot: ConnectivitySnapshot) {
        *self.latest.write() = Some(snapshot);
    }

    /// Forget the latest reading.
    pub fn clear(&self) {
        *self.latest.write() = None;
    }
}

impl ConnectivitySignals for SharedConnectivity {
    fn snapshot(&self) -> Option<ConnectivitySnapshot> {
        *self.latest.read()
    }
}

/// Classifies connectivity, caching the result for a short window.
pub struct NetworkConditionMonitor {
    signals: Arc<dyn ConnectivitySignals>,
    window: Duration,
    cached: Mutex<Option<(Instant, NetworkClass)>>,
}

impl NetworkConditionMonitor {
    /// Create a monitor over the given signal source.
    pub fn new(signals: Arc<dyn ConnectivitySignals>, window: Duration) -> Self {
        Self {
            signals,
            window,
            cached: Mutex::new(None),
        }
    }

    /// Monitor for a host without signals; always classifies as `Fast`.
    pub fn without_signals() -> Self {
        Self::new(Arc::new(NoSignals), DEFAULT_CLASSIFY_WINDOW)
    }

    /// Current network class.
    pub fn classify(&self) -> NetworkClass {
        self.classify_at(Instant::now())
    }

    /// Current network class as of `now`.
    pub fn classify_at(&self, now: Instant) -> NetworkClass {
        let mut cached = self.cached.lock();
        if let Some((at, class)) = *cached {
            if now.saturating_duration_since(at) < self.window {
                return class;
            }
        }

        let class = self
            .signals
            .snapshot()
            .map(|s| s.classify())
            .unwrap_or(NetworkClass::Fast);
        trace!(class = %class, "Network reclassified");
        *cached = Some((now, class));
        class
    }

    /// Drop the cached class so the next call reads the signals again.
    pub fn invalidate(&self) {
        *self.cached.lock() = None;
    }

    /// Configured validity window.
    pub fn window(&self) -> Duration {
        self.window
    }
}

impl fmt::Debug for NetworkConditionMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkConditionMonitor")
            .field("window", &self.window)
            .field("cached", &*self.cached.lock())
            .finish()
    }
}
