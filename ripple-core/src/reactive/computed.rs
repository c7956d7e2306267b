//! Computed Implementation
//!
//! A Computed is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Computeds Work
//!
//! 1. Creating a computed runs nothing. It starts stale.
//!
//! 2. On first access, the computed runs its derivation and caches the
//!    result.
//!
//! 3. When accessed again, if no dependencies have changed, returns the
//!    cached value without calling the derivation.
//!
//! 4. When a dependency changes, the computed is marked stale, and so is
//!    everything downstream of it. Nothing is recomputed yet.
//!
//! 5. On next access, the computed drops its old dependencies, re-derives,
//!    and records exactly the dependencies read during that run.
//!
//! # Why This Matters
//!
//! This push-invalidate, pull-recompute approach avoids unnecessary work:
//!
//! - A signal changes
//! - 10 computeds depend on it
//! - Only the computeds actually accessed will recompute
//! - Computeds that are never read stay stale (no wasted work)
//!
//! A computed reached twice in one change (a diamond) is marked stale once
//! and recomputes at most once.

use std::cell::{Cell, RefCell};
use std::fmt::Debug;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use tracing::trace;

use super::effect::{boxed_worker, Effect};
use super::runtime::Runtime;
use crate::error::{ReactiveError, Result};
use crate::graph::{NodeId, NodeKind};

struct ComputedCell<T> {
    derive: Box<dyn Fn() -> T>,

    /// The cached value (None if never computed or disposed).
    value: RefCell<Option<T>>,

    /// Set while the derivation runs, to catch a computed reading itself.
    computing: Cell<bool>,

    /// The last derivation panicked. The graph node is left clean so that
    /// writes to the dependencies it did read still reach its readers; this
    /// flag forces the next read to derive again.
    failed: Cell<bool>,
}

struct ComputingGuard<'a>(&'a Cell<bool>);

impl Drop for ComputingGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// A cached derived value that recomputes only when dependencies change.
///
/// # Example
///
/// ```rust
/// use ripple_core::{computed, signal};
///
/// let count = signal(2);
/// let doubled = computed({
///     let count = count.clone();
///     move || count.get() * 2
/// });
///
/// assert_eq!(doubled.get(), 4);
/// count.set(5);
/// assert_eq!(doubled.get(), 10);
/// ```
pub struct Computed<T: 'static> {
    rt: Runtime,
    id: NodeId,
    cell: Rc<ComputedCell<T>>,
}

impl Runtime {
    /// Create a new computed with the given derivation.
    ///
    /// The derivation is not run immediately. It runs on first access.
    pub fn computed<T: 'static>(&self, derive: impl Fn() -> T + 'static) -> Computed<T> {
        Computed {
            rt: self.clone(),
            id: self.register(NodeKind::Computed),
            cell: Rc::new(ComputedCell {
                derive: Box::new(derive),
                value: RefCell::new(None),
                computing: Cell::new(false),
                failed: Cell::new(false),
            }),
        }
    }
}

/// Create a computed on the current thread's runtime.
pub fn computed<T: 'static>(derive: impl Fn() -> T + 'static) -> Computed<T> {
    Runtime::current().computed(derive)
}

impl<T: 'static> Computed<T> {
    /// Get the computed's unique ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn runtime(&self) -> &Runtime {
        &self.rt
    }

    pub fn is_disposed(&self) -> bool {
        !self.rt.contains(self.id)
    }

    /// Whether the next read will re-derive.
    pub fn is_stale(&self) -> bool {
        self.rt.is_stale(self.id) || self.cell.failed.get()
    }

    /// Check if the computed has a cached value.
    pub fn has_value(&self) -> bool {
        self.cell.value.borrow().is_some()
    }

    pub fn dependency_count(&self) -> usize {
        self.rt.inner.graph.borrow().dependency_count(self.id)
    }

    pub fn listener_count(&self) -> usize {
        self.rt.inner.graph.borrow().dependent_count(self.id)
    }

    fn disposed_error(&self) -> ReactiveError {
        ReactiveError::Disposed {
            kind: NodeKind::Computed,
            id: self.id,
        }
    }

    /// Re-derive if stale.
    fn refresh(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(self.disposed_error());
        }
        if !self.is_stale() {
            return Ok(());
        }
        if self.cell.computing.replace(true) {
            return Err(ReactiveError::Cycle { id: self.id });
        }
        let _computing = ComputingGuard(&self.cell.computing);

        self.rt.inner.graph.borrow_mut().unlink_dependencies(self.id);

        trace!(computed = %self.id, "deriving");
        let derived = panic::catch_unwind(AssertUnwindSafe(|| {
            self.rt
                .run_with_listener(Some(self.id), || (self.cell.derive)())
        }));
        self.rt.inner.graph.borrow_mut().mark_clean(self.id);

        match derived {
            Ok(value) => {
                self.cell.failed.set(false);
                let previous = self.cell.value.borrow_mut().replace(value);
                drop(previous);
                Ok(())
            }
            Err(payload) => {
                self.cell.failed.set(true);
                // The reader must hear about the change that fixes this.
                self.rt.track(self.id);
                panic::resume_unwind(payload)
            }
        }
    }

    /// Borrow the up-to-date value, registering the active listener as a
    /// dependent.
    ///
    /// `f` must not write signals this computed depends on.
    pub fn try_with<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R> {
        self.refresh()?;
        self.rt.track(self.id);
        let value = self.cell.value.borrow();
        value.as_ref().map(f).ok_or_else(|| self.disposed_error())
    }

    /// Like [`Computed::try_with`].
    ///
    /// # Panics
    ///
    /// Panics if the computed has been disposed or depends on itself.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.try_with(f).unwrap_or_else(|err| panic!("{err}"))
    }

    /// Tear the computed down: subscriber effects are disposed, edges in
    /// both directions are dropped, and the cached value is released.
    /// Repeat calls do nothing.
    pub fn dispose(&self) {
        if self.rt.dispose_source(self.id) {
            let cached = self.cell.value.borrow_mut().take();
            drop(cached);
        }
    }
}

impl<T: Clone + 'static> Computed<T> {
    /// Get the current value, recomputing if necessary.
    ///
    /// This is the main entry point for reading a computed's value.
    ///
    /// # Panics
    ///
    /// Panics if the computed has been disposed or depends on itself.
    /// A panic inside the derivation propagates to the caller.
    pub fn get(&self) -> T {
        self.try_get().unwrap_or_else(|err| panic!("{err}"))
    }

    pub fn try_get(&self) -> Result<T> {
        self.try_with(T::clone)
    }

    /// Get the current value without registering a dependency on it.
    ///
    /// # Panics
    ///
    /// Panics if the computed has been disposed or depends on itself.
    pub fn peek(&self) -> T {
        self.try_peek().unwrap_or_else(|err| panic!("{err}"))
    }

    pub fn try_peek(&self) -> Result<T> {
        self.rt.untracked(|| self.try_get())
    }

    /// Call `callback` with the current value now and again after every
    /// change. Disposing the returned effect ends the subscription.
    pub fn subscribe(&self, mut callback: impl FnMut(T) + 'static) -> Effect {
        let computed = self.clone();
        self.rt.create_effect(
            boxed_worker(move || {
                if let Ok(value) = computed.try_get() {
                    computed.rt.untracked(|| callback(value));
                }
            }),
            None,
            Some(self.id),
        )
    }
}

impl<T: 'static> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            rt: self.rt.clone(),
            id: self.id,
            cell: Rc::clone(&self.cell),
        }
    }
}

impl<T: Debug + 'static> Debug for Computed<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.id)
            .field("stale", &self.is_stale())
            .field("value", &self.cell.value.borrow())
            .field("listener_count", &self.listener_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn counting<T: 'static>(
        rt: &Runtime,
        calls: &Rc<Cell<i32>>,
        f: impl Fn() -> T + 'static,
    ) -> Computed<T> {
        let calls = calls.clone();
        rt.computed(move || {
            calls.set(calls.get() + 1);
            f()
        })
    }

    #[test]
    fn computed_is_lazy() {
        let rt = Runtime::new();
        let calls = Rc::new(Cell::new(0));
        let computed = counting(&rt, &calls, || 42);

        // Not computed yet
        assert!(!computed.has_value());
        assert!(computed.is_stale());
        assert_eq!(calls.get(), 0);

        // First access triggers computation
        assert_eq!(computed.get(), 42);
        assert_eq!(calls.get(), 1);
        assert!(computed.has_value());
    }

    #[test]
    fn computed_caches_value_when_clean() {
        let rt = Runtime::new();
        let calls = Rc::new(Cell::new(0));
        let computed = counting(&rt, &calls, || 42);

        assert_eq!(computed.get(), 42);
        assert_eq!(computed.get(), 42);
        assert_eq!(computed.peek(), 42);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn computed_recomputes_once_per_change() {
        let rt = Runtime::new();
        let s = rt.signal(1);
        let calls = Rc::new(Cell::new(0));
        let computed = counting(&rt, &calls, {
            let s = s.clone();
            move || s.get() * 10
        });

        assert_eq!(computed.get(), 10);

        s.set(2);
        assert!(computed.is_stale());
        s.set(3);
        assert_eq!(calls.get(), 1);

        assert_eq!(computed.get(), 30);
        assert_eq!(computed.get(), 30);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn computed_depends_on_computed() {
        let rt = Runtime::new();
        let base = rt.signal(5);
        let doubled = rt.computed({
            let base = base.clone();
            move || base.get() * 2
        });
        let plus_ten = rt.computed({
            let doubled = doubled.clone();
            move || doubled.get() + 10
        });

        assert_eq!(plus_ten.get(), 20);
        assert_eq!(doubled.listener_count(), 1);

        base.set(10);
        assert!(doubled.is_stale());
        assert!(plus_ten.is_stale());
        assert_eq!(plus_ten.get(), 30);
    }

    #[test]
    fn dependencies_follow_the_last_run() {
        let rt = Runtime::new();
        let use_a = rt.signal(true);
        let a = rt.signal(1);
        let b = rt.signal(2);
        let pick = rt.computed({
            let (use_a, a, b) = (use_a.clone(), a.clone(), b.clone());
            move || if use_a.get() { a.get() } else { b.get() }
        });

        assert_eq!(pick.get(), 1);
        assert_eq!(a.listener_count(), 1);
        assert_eq!(b.listener_count(), 0);

        use_a.set(false);
        assert_eq!(pick.get(), 2);
        assert_eq!(a.listener_count(), 0);
        assert_eq!(b.listener_count(), 1);

        a.set(100);
        assert!(!pick.is_stale());
    }

    #[test]
    fn self_reference_is_a_cycle_error() {
        let rt = Runtime::new();
        let slot: Rc<RefCell<Option<Computed<i32>>>> = Rc::new(RefCell::new(None));
        let computed = rt.computed({
            let slot = slot.clone();
            move || match slot.borrow().as_ref() {
                Some(me) => me.try_get().unwrap_or(-1),
                None => 0,
            }
        });
        *slot.borrow_mut() = Some(computed.clone());

        assert_eq!(computed.get(), -1);
    }

    #[test]
    fn derivation_panic_leaves_computed_stale() {
        let rt = Runtime::new();
        let fail = rt.signal(true);
        let computed = rt.computed({
            let fail = fail.clone();
            move || {
                if fail.get() {
                    panic!("derivation failed");
                }
                1
            }
        });

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| computed.get()));
        assert!(result.is_err());
        assert!(computed.is_stale());

        fail.set(false);
        assert_eq!(computed.get(), 1);
    }

    #[test]
    fn handled_reader_recovers_after_derivation_panic() {
        let rt = Runtime::new();
        let s = rt.signal(0);
        let computed = rt.computed({
            let s = s.clone();
            move || {
                let v = s.get();
                if v == 1 {
                    panic!("bad input");
                }
                v * 10
            }
        });

        let seen = Rc::new(RefCell::new(Vec::new()));
        let errors = Rc::new(Cell::new(0));
        let reader = rt.effect_with_handler(
            {
                let (computed, seen) = (computed.clone(), seen.clone());
                move || seen.borrow_mut().push(computed.get())
            },
            {
                let errors = errors.clone();
                move |_: &crate::EffectError| errors.set(errors.get() + 1)
            },
        );

        s.set(1);
        assert_eq!(errors.get(), 1);
        assert!(computed.is_stale());
        assert_eq!(reader.dependency_count(), 1);
        assert_eq!(computed.dependency_count(), 1);

        s.set(2);
        s.set(3);

        assert_eq!(*seen.borrow(), vec![0, 20, 30]);
        assert_eq!(errors.get(), 1);
        assert!(!reader.is_disposed());
        assert!(!computed.is_stale());
    }

    #[test]
    fn dispose_releases_value_and_subscribers() {
        let rt = Runtime::new();
        let s = rt.signal(1);
        let computed = rt.computed({
            let s = s.clone();
            move || s.get()
        });
        let sub = computed.subscribe(|_| {});

        assert_eq!(s.listener_count(), 1);
        computed.dispose();
        computed.dispose();

        assert!(sub.is_disposed());
        assert!(!computed.has_value());
        assert_eq!(s.listener_count(), 0);
        assert!(matches!(
            computed.try_get(),
            Err(ReactiveError::Disposed { kind: NodeKind::Computed, .. })
        ));
    }
}
