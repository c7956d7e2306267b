//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a signal is read,
//! we can register the current computation as a dependent.
//!
//! # Implementation
//!
//! Each [`Runtime`] keeps a stack of frames. When entering a reactive
//! context (running a computed or effect), we push the listener onto the
//! stack. When the computation completes, we pop it. An untracked frame
//! (`None`) hides every listener below it, which is how [`untracked`] works.
//!
//! This design supports nested reactive contexts (e.g., a computed that
//! reads from another computed, or an effect created inside an effect).

use smallvec::SmallVec;

use super::runtime::Runtime;
use crate::graph::NodeId;

/// The per-runtime stack of active listeners.
#[derive(Debug, Default)]
pub(crate) struct TrackingStack {
    frames: SmallVec<[Option<NodeId>; 8]>,
}

impl TrackingStack {
    pub(crate) fn push(&mut self, listener: Option<NodeId>) {
        self.frames.push(listener);
    }

    pub(crate) fn pop(&mut self) -> Option<Option<NodeId>> {
        self.frames.pop()
    }

    /// The listener reads should be attributed to, if any.
    pub(crate) fn current(&self) -> Option<NodeId> {
        self.frames.last().copied().flatten()
    }

    pub(crate) fn depth(&self) -> usize {
        self.frames.len()
    }
}

/// Guard that pops the context when dropped.
///
/// This ensures the context stack is properly maintained even if
/// the computation panics.
pub struct ReactiveContext<'rt> {
    runtime: &'rt Runtime,
    listener: Option<NodeId>,
}

impl<'rt> ReactiveContext<'rt> {
    /// Enter a new reactive context for the given listener.
    ///
    /// While this context is active, any signal or computed that is read
    /// will register the listener as a dependent. `None` enters an
    /// untracked context.
    pub fn enter(runtime: &'rt Runtime, listener: Option<NodeId>) -> Self {
        runtime.inner.stack.borrow_mut().push(listener);
        Self { runtime, listener }
    }

    /// The listener this context was entered for.
    pub fn listener(&self) -> Option<NodeId> {
        self.listener
    }
}

impl Drop for ReactiveContext<'_> {
    fn drop(&mut self) {
        let popped = self.runtime.inner.stack.borrow_mut().pop();

        // Verify we're popping the right context.
        // This helps catch bugs where contexts are mismatched.
        if let Some(frame) = popped {
            debug_assert_eq!(
                frame, self.listener,
                "ReactiveContext mismatch: expected {:?}, got {:?}",
                self.listener, frame
            );
        }
    }
}

impl std::fmt::Debug for ReactiveContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactiveContext")
            .field("listener", &self.listener)
            .finish()
    }
}

/// Run `f` on the current thread's runtime without recording any
/// dependencies.
///
/// Lets code peek at reactive values from inside an effect or computed
/// without becoming a dependent.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    Runtime::current().untracked(f)
}
