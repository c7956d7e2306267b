//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a reactive context (computed/effect), the
//!    signal registers that context as a listener.
//!
//! 2. When a signal's value changes, all listeners are notified: computeds
//!    become stale, effects re-run.
//!
//! 3. Writing a value equal to the current one notifies no one, unless the
//!    write is forced.
//!
//! # Memory Layout
//!
//! Each signal handle consists of:
//! - A handle to its runtime
//! - A node ID in the runtime's graph (listeners live there, not here)
//! - The value, shared between clones of the handle

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

use tracing::trace;

use super::effect::{boxed_worker, Effect};
use super::runtime::Runtime;
use crate::error::{ReactiveError, Result};
use crate::graph::{NodeId, NodeKind};

/// A reactive signal holding a value of type T.
///
/// # Example
///
/// ```rust
/// use ripple_core::signal;
///
/// let count = signal(0);
///
/// // Read the value
/// assert_eq!(count.get(), 0);
///
/// // Update the value (notifies listeners)
/// assert!(count.set(5));
/// assert!(!count.set(5));
/// ```
pub struct Signal<T: 'static> {
    rt: Runtime,
    id: NodeId,
    value: Rc<RefCell<T>>,
}

impl Runtime {
    /// Create a new signal with the given initial value.
    pub fn signal<T: 'static>(&self, value: T) -> Signal<T> {
        Signal {
            rt: self.clone(),
            id: self.register(NodeKind::Signal),
            value: Rc::new(RefCell::new(value)),
        }
    }
}

/// Create a signal on the current thread's runtime.
pub fn signal<T: 'static>(value: T) -> Signal<T> {
    Runtime::current().signal(value)
}

impl<T: 'static> Signal<T> {
    /// Get the signal's unique ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn runtime(&self) -> &Runtime {
        &self.rt
    }

    pub fn is_disposed(&self) -> bool {
        !self.rt.contains(self.id)
    }

    /// Get the number of computeds and effects currently reading this signal.
    pub fn listener_count(&self) -> usize {
        self.rt.inner.graph.borrow().dependent_count(self.id)
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(ReactiveError::Disposed {
                kind: NodeKind::Signal,
                id: self.id,
            });
        }
        Ok(())
    }

    /// Borrow the value, registering the active listener as a dependent.
    ///
    /// `f` must not write this signal.
    pub fn try_with<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R> {
        self.ensure_live()?;
        self.rt.track(self.id);
        Ok(f(&self.value.borrow()))
    }

    /// Like [`Signal::try_with`].
    ///
    /// # Panics
    ///
    /// Panics if the signal has been disposed.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.try_with(f).unwrap_or_else(|err| panic!("{err}"))
    }

    /// Store `value` and notify every listener, even if it equals the
    /// current value.
    ///
    /// Returns `false` only if the signal is disposed.
    pub fn set_forced(&self, value: T) -> bool {
        if self.is_disposed() {
            trace!(signal = %self.id, "write to disposed signal ignored");
            return false;
        }
        let previous = std::mem::replace(&mut *self.value.borrow_mut(), value);
        drop(previous);

        self.rt.propagate(self.id);
        true
    }

    /// Tear the signal down. Subscriber effects created through
    /// [`Signal::subscribe`] are disposed; other listeners just stop
    /// hearing from it. Repeat calls do nothing.
    pub fn dispose(&self) {
        self.rt.dispose_source(self.id);
    }
}

impl<T: Clone + 'static> Signal<T> {
    /// Get the current value.
    ///
    /// If called within a reactive context, this also registers the
    /// current computation as a listener.
    ///
    /// # Panics
    ///
    /// Panics if the signal has been disposed. See [`Signal::try_get`].
    pub fn get(&self) -> T {
        self.try_get().unwrap_or_else(|err| panic!("{err}"))
    }

    pub fn try_get(&self) -> Result<T> {
        self.try_with(T::clone)
    }

    /// Get the current value without tracking dependencies.
    ///
    /// # Panics
    ///
    /// Panics if the signal has been disposed.
    pub fn peek(&self) -> T {
        self.try_peek().unwrap_or_else(|err| panic!("{err}"))
    }

    pub fn try_peek(&self) -> Result<T> {
        self.ensure_live()?;
        Ok(self.value.borrow().clone())
    }

    /// Call `callback` with the current value now and again after every
    /// change. Disposing the returned effect ends the subscription.
    pub fn subscribe(&self, mut callback: impl FnMut(T) + 'static) -> Effect {
        let signal = self.clone();
        self.rt.create_effect(
            boxed_worker(move || {
                if let Ok(value) = signal.try_get() {
                    signal.rt.untracked(|| callback(value));
                }
            }),
            None,
            Some(self.id),
        )
    }
}

impl<T: PartialEq + 'static> Signal<T> {
    /// Set a new value and notify listeners.
    ///
    /// Returns whether listeners were notified: writing a value equal to
    /// the current one (or writing a disposed signal) does nothing.
    pub fn set(&self, value: T) -> bool {
        if self.is_disposed() || *self.value.borrow() == value {
            return false;
        }
        self.set_forced(value)
    }

    /// Update the value using a function.
    ///
    /// This is useful for updates that depend on the current value.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        if self.is_disposed() {
            return;
        }
        let next = f(&self.value.borrow());
        self.set(next);
    }
}

impl<T: 'static> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            rt: self.rt.clone(),
            id: self.id,
            value: Rc::clone(&self.value),
        }
    }
}

impl<T: Debug + 'static> Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id)
            .field("value", &self.value.borrow())
            .field("listener_count", &self.listener_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    #[test]
    fn signal_get_and_set() {
        let rt = Runtime::new();
        let signal = rt.signal(0);
        assert_eq!(signal.get(), 0);

        assert!(signal.set(42));
        assert_eq!(signal.get(), 42);
    }

    #[test]
    fn signal_update() {
        let rt = Runtime::new();
        let signal = rt.signal(10);
        signal.update(|v| v + 5);
        assert_eq!(signal.get(), 15);
    }

    #[test]
    fn same_value_is_suppressed_unless_forced() {
        let rt = Runtime::new();
        let signal = rt.signal(3);
        let runs = Rc::new(Cell::new(0));
        let _e = rt.effect({
            let (signal, runs) = (signal.clone(), runs.clone());
            move || {
                signal.get();
                runs.set(runs.get() + 1);
            }
        });

        assert!(!signal.set(3));
        assert_eq!(runs.get(), 1);

        assert!(signal.set_forced(3));
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn peek_does_not_track() {
        let rt = Runtime::new();
        let signal = rt.signal(1);
        let _e = rt.effect({
            let signal = signal.clone();
            move || {
                signal.peek();
            }
        });
        assert_eq!(signal.listener_count(), 0);
    }

    #[test]
    fn subscribe_calls_immediately_and_on_change() {
        let rt = Runtime::new();
        let signal = rt.signal("a".to_string());
        let seen = Rc::new(RefCell::new(Vec::new()));

        let sub = signal.subscribe({
            let seen = seen.clone();
            move |v| seen.borrow_mut().push(v)
        });
        signal.set("b".to_string());
        sub.dispose();
        sub.dispose();
        signal.set("c".to_string());

        assert_eq!(*seen.borrow(), vec!["a", "b"]);
    }

    #[test]
    fn subscriber_callback_reads_are_untracked() {
        let rt = Runtime::new();
        let source = rt.signal(0);
        let other = rt.signal(0);
        let calls = Rc::new(Cell::new(0));

        let _sub = source.subscribe({
            let (other, calls) = (other.clone(), calls.clone());
            move |_| {
                other.get();
                calls.set(calls.get() + 1);
            }
        });
        other.set(1);

        assert_eq!(calls.get(), 1);
        assert_eq!(other.listener_count(), 0);
    }

    #[test]
    fn dispose_tears_down_subscribers() {
        let rt = Runtime::new();
        let signal = rt.signal(0);
        let sub = signal.subscribe(|_| {});

        signal.dispose();
        signal.dispose();

        assert!(sub.is_disposed());
        assert!(signal.is_disposed());
        assert!(!signal.set(1));
        assert_eq!(
            signal.try_get(),
            Err(ReactiveError::Disposed {
                kind: NodeKind::Signal,
                id: signal.id()
            })
        );
    }

    #[test]
    #[should_panic(expected = "has been disposed")]
    fn get_after_dispose_panics() {
        let rt = Runtime::new();
        let signal = rt.signal(0);
        signal.dispose();
        signal.get();
    }

    #[test]
    fn signal_clone_shares_state() {
        let rt = Runtime::new();
        let signal1 = rt.signal(0);
        let signal2 = signal1.clone();

        signal1.set(42);
        assert_eq!(signal2.get(), 42);

        signal2.set(100);
        assert_eq!(signal1.get(), 100);
    }

    #[test]
    fn signal_ids_are_unique() {
        let rt = Runtime::new();
        let s1 = rt.signal(0);
        let s2 = rt.signal(0);
        assert_ne!(s1.id(), s2.id());
    }
}
