//! Runtime configuration.

/// Tunables for a [`Runtime`](crate::reactive::Runtime).
///
/// ```rust
/// use ripple_core::{Runtime, RuntimeConfig};
///
/// let rt = Runtime::with_config(RuntimeConfig::default().debug_registry(true));
/// assert!(rt.debug_registry().is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Log errors swallowed during cleanup and inside error handlers.
    pub verbose: bool,

    /// Install a [`DebugRegistry`](crate::debug::DebugRegistry) observer.
    pub debug_registry: bool,

    /// How many times one effect may run within a single flush before it
    /// is treated as part of an update cycle and skipped.
    pub max_effect_runs: usize,
}

impl RuntimeConfig {
    pub const DEFAULT_MAX_EFFECT_RUNS: usize = 100;

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn debug_registry(mut self, enabled: bool) -> Self {
        self.debug_registry = enabled;
        self
    }

    pub fn max_effect_runs(mut self, runs: usize) -> Self {
        self.max_effect_runs = runs.max(1);
        self
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            verbose: cfg!(debug_assertions),
            debug_registry: false,
            max_effect_runs: Self::DEFAULT_MAX_EFFECT_RUNS,
        }
    }
}
