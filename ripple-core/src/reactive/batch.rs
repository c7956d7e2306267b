//! Batch Coordinator
//!
//! Inside a batch, effect re-runs are deferred and deduplicated: an effect
//! notified several times runs once, after the outermost batch closes, and
//! sees only the final values. Computed staleness is never deferred.
//!
//! Every signal write opens an implicit batch around its own propagation,
//! so an explicit batch only matters when several writes should coalesce.
//!
//! Only one flush is active at a time. Writes made by effects while it runs
//! queue more work for that same flush instead of starting a nested one, so
//! a long chain of effects costs loop iterations, not stack depth.

use std::collections::HashMap;

use indexmap::IndexSet;
use tracing::{error, trace};

use super::runtime::Runtime;
use crate::graph::NodeId;

#[derive(Debug, Default)]
pub(crate) struct BatchState {
    /// Open batch scopes. Only the outermost one flushes.
    depth: usize,

    /// Effects waiting for the flush, in notification order.
    pending: IndexSet<NodeId>,

    /// Whether a flush is on the call stack.
    flushing: bool,

    /// Runs per effect in the active flush, to detect update cycles.
    runs: HashMap<NodeId, usize>,
}

impl BatchState {
    pub(crate) fn clear(&mut self) {
        self.pending.clear();
        self.runs.clear();
    }

    pub(crate) fn forget(&mut self, id: NodeId) {
        self.pending.shift_remove(&id);
    }
}

/// Closes one batch scope on drop, flushing if it was the outermost.
///
/// A scope unwound by a panic does not flush; its queued effects wait for
/// the next outermost batch to close.
pub(crate) struct BatchGuard<'rt> {
    runtime: &'rt Runtime,
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        let outermost = {
            let mut state = self.runtime.inner.batch.borrow_mut();
            state.depth -= 1;
            state.depth == 0
        };
        if outermost && !std::thread::panicking() {
            self.runtime.flush();
        }
    }
}

struct FlushGuard<'rt> {
    runtime: &'rt Runtime,
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.runtime.inner.batch.borrow_mut();
        state.flushing = false;
        state.runs.clear();
    }
}

impl Runtime {
    /// Run `f` with effect re-runs deferred until the outermost batch ends.
    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.begin_batch();
        f()
    }

    /// Whether a batch scope is open.
    pub fn is_batching(&self) -> bool {
        self.inner.batch.borrow().depth > 0
    }

    pub(crate) fn begin_batch(&self) -> BatchGuard<'_> {
        self.inner.batch.borrow_mut().depth += 1;
        BatchGuard { runtime: self }
    }

    /// Notify an effect: queue it while batching, dispatch it otherwise.
    pub(crate) fn invalidate_effect(&self, id: NodeId) {
        {
            let mut state = self.inner.batch.borrow_mut();
            if state.depth > 0 {
                state.pending.insert(id);
                return;
            }
        }
        self.dispatch_effect(id);
    }

    /// Run every pending effect once, in the order collected, until the
    /// queue stays empty.
    ///
    /// Called while a flush is already running, this returns at once: the
    /// active flush picks the new work up. An effect queued more than
    /// `max_effect_runs` times in one flush is part of an update cycle and
    /// is skipped for the rest of that flush.
    pub(crate) fn flush(&self) {
        {
            let mut state = self.inner.batch.borrow_mut();
            if state.flushing {
                return;
            }
            state.flushing = true;
        }
        let _guard = FlushGuard { runtime: self };

        let limit = self.inner.config.max_effect_runs;
        loop {
            let pending = std::mem::take(&mut self.inner.batch.borrow_mut().pending);
            if pending.is_empty() {
                break;
            }
            trace!(count = pending.len(), "flushing effects");
            for id in pending {
                let runs = {
                    let mut state = self.inner.batch.borrow_mut();
                    let runs = state.runs.entry(id).or_insert(0);
                    *runs += 1;
                    *runs
                };
                if runs > limit {
                    if runs == limit + 1 {
                        error!(
                            effect = %id,
                            limit,
                            "effect re-triggered itself past max_effect_runs in one flush, skipping"
                        );
                    }
                    continue;
                }
                self.dispatch_effect(id);
            }
        }
    }
}

/// Run `f` on the current thread's runtime with effect re-runs deferred
/// until the outermost batch ends.
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    Runtime::current().batch(f)
}

/// Whether the current thread's runtime is inside a batch.
pub fn is_batching() -> bool {
    Runtime::current().is_batching()
}
