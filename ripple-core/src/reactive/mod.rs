//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, computeds, and
//! effects, plus the batch coordinator and tracking context that tie them
//! together.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! within a tracking context (such as a computed or effect), the signal
//! automatically registers that context as a dependent. When the signal's
//! value changes, all dependents are notified.
//!
//! ## Computeds
//!
//! A Computed is a derived value that caches its result. It re-evaluates only
//! when one of its dependencies changes, and only when someone reads it.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change. Effects may return a [`Cleanup`] that runs before the
//! next execution and on disposal. Effects created while another effect runs
//! become its children and are disposed with it.
//!
//! # Implementation Notes
//!
//! Every handle belongs to a [`Runtime`]. Relationships between nodes live in
//! the runtime's [`Graph`](crate::graph::Graph) as id-based edges; the handles
//! themselves only hold their id and their value. The free functions
//! ([`signal`], [`computed`], [`effect`], [`batch`]) use the current thread's
//! default runtime.

mod batch;
mod computed;
mod context;
mod effect;
mod runtime;
mod signal;
mod traits;

pub use batch::{batch, is_batching};
pub use computed::{computed, Computed};
pub use context::{untracked, ReactiveContext};
pub use effect::{effect, effect_with_handler, Cleanup, Effect, EffectOutput, ErrorHandler};
pub use runtime::Runtime;
pub use signal::{signal, Signal};
pub use traits::{dispose, Disposable, Readable};
