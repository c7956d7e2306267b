//! Ripple Core
//!
//! A fine-grained reactive engine for single-threaded Rust programs.
//! It implements:
//!
//! - Reactive primitives (signals, computeds, effects)
//! - Automatic dependency discovery through a tracking context
//! - Glitch-free change propagation with batched effect scheduling
//! - Ownership of nested effects, with ordered cleanup and error containment
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Core reactive primitives, the runtime, and batching
//! - `graph`: Id-based dependency graph the runtime stores relationships in
//! - `debug`: Lifecycle observers and an optional registry of live nodes
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use ripple_core::{batch, computed, effect, signal};
//!
//! // Create a signal
//! let count = signal(1);
//!
//! // Create a derived value
//! let doubled = computed({
//!     let count = count.clone();
//!     move || count.get() * 2
//! });
//!
//! // Create an effect
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let logger = effect({
//!     let (count, doubled, seen) = (count.clone(), doubled.clone(), seen.clone());
//!     move || seen.borrow_mut().push((count.get(), doubled.get()))
//! });
//!
//! // Update the signal; the effect runs once per batch
//! count.set(5);
//! batch(|| {
//!     count.set(6);
//!     count.set(7);
//! });
//!
//! assert_eq!(*seen.borrow(), vec![(1, 2), (5, 10), (7, 14)]);
//! logger.dispose();
//! ```

pub mod debug;
pub mod graph;
pub mod reactive;

mod config;
mod error;

pub use config::RuntimeConfig;
pub use debug::{DebugRegistry, RuntimeObserver};
pub use error::{BoxError, EffectError, ReactiveError, Result};
pub use graph::{NodeId, NodeKind};
pub use reactive::{
    batch, computed, dispose, effect, effect_with_handler, is_batching, signal, untracked, Cleanup,
    Computed, Disposable, Effect, EffectOutput, ErrorHandler, Readable, ReactiveContext, Runtime,
    Signal,
};
