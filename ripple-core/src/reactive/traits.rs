//! Capability traits shared by the reactive handles.
//!
//! Code that only needs to read a value, or only needs to tear something
//! down, can take these instead of a concrete handle type.

use super::computed::Computed;
use super::effect::Effect;
use super::signal::Signal;
use crate::error::Result;

/// Something that produces a value and can be tracked.
pub trait Readable<T> {
    /// Read the value, registering the active listener as a dependent.
    fn try_get(&self) -> Result<T>;

    /// Read the value without registering a dependency.
    fn try_peek(&self) -> Result<T>;

    /// # Panics
    ///
    /// Panics if the source has been disposed.
    fn get(&self) -> T {
        self.try_get().unwrap_or_else(|err| panic!("{err}"))
    }

    /// # Panics
    ///
    /// Panics if the source has been disposed.
    fn peek(&self) -> T {
        self.try_peek().unwrap_or_else(|err| panic!("{err}"))
    }
}

/// Something with an explicit end of life.
pub trait Disposable {
    /// Release the node. Calling this more than once does nothing.
    fn dispose(&self);

    fn is_disposed(&self) -> bool;
}

impl<T: Clone + 'static> Readable<T> for Signal<T> {
    fn try_get(&self) -> Result<T> {
        Signal::try_get(self)
    }

    fn try_peek(&self) -> Result<T> {
        Signal::try_peek(self)
    }
}

impl<T: Clone + 'static> Readable<T> for Computed<T> {
    fn try_get(&self) -> Result<T> {
        Computed::try_get(self)
    }

    fn try_peek(&self) -> Result<T> {
        Computed::try_peek(self)
    }
}

impl<T: 'static> Disposable for Signal<T> {
    fn dispose(&self) {
        Signal::dispose(self)
    }

    fn is_disposed(&self) -> bool {
        Signal::is_disposed(self)
    }
}

impl<T: 'static> Disposable for Computed<T> {
    fn dispose(&self) {
        Computed::dispose(self)
    }

    fn is_disposed(&self) -> bool {
        Computed::is_disposed(self)
    }
}

impl Disposable for Effect {
    fn dispose(&self) {
        Effect::dispose(self)
    }

    fn is_disposed(&self) -> bool {
        Effect::is_disposed(self)
    }
}

/// Dispose every target in order.
pub fn dispose(targets: &[&dyn Disposable]) {
    for target in targets {
        target.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::runtime::Runtime;

    fn sum(sources: &[&dyn Readable<i32>]) -> i32 {
        sources.iter().map(|source| source.get()).sum()
    }

    #[test]
    fn readable_unifies_signals_and_computeds() {
        let rt = Runtime::new();
        let s = rt.signal(2);
        let c = rt.computed({
            let s = s.clone();
            move || s.get() * 10
        });

        assert_eq!(sum(&[&s, &c]), 22);
        assert_eq!(Readable::peek(&c), 20);
    }

    #[test]
    fn dispose_tears_down_mixed_handles() {
        let rt = Runtime::new();
        let s = rt.signal(0);
        let c = rt.computed({
            let s = s.clone();
            move || s.get()
        });
        let e = rt.effect({
            let c = c.clone();
            move || {
                c.get();
            }
        });

        dispose(&[&e, &c, &s]);
        dispose(&[&e, &c, &s]);

        assert!(Disposable::is_disposed(&e));
        assert!(Disposable::is_disposed(&c));
        assert!(Disposable::is_disposed(&s));
        assert_eq!(rt.node_count(), 0);
    }

    #[test]
    fn readable_reports_disposal() {
        let rt = Runtime::new();
        let s = rt.signal(1);
        Disposable::dispose(&s);
        assert!(Readable::try_get(&s).is_err());
    }
}
