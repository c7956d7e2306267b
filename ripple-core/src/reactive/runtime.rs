//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals, computeds,
//! and effects. It owns the dependency graph, the tracking stack, the batch
//! queue, and the bodies of live effects.
//!
//! # How It Works
//!
//! 1. When a signal, computed, or effect is created, it registers a node with
//!    the runtime's graph.
//!
//! 2. When a computed or effect reads a signal, the runtime records the
//!    dependency edge in both directions.
//!
//! 3. When a signal's value changes, the runtime:
//!    a. Opens an implicit batch
//!    b. Marks every computed downstream as stale
//!    c. Queues every effect downstream
//!    d. Closes the batch, which runs each queued effect once
//!
//!    Computeds are lazy - they recompute on next access. Because every
//!    computed is marked before any effect runs, an effect never observes a
//!    half-updated graph.
//!
//! # Threading
//!
//! A runtime is single-threaded (`!Send`). Each thread gets its own default
//! runtime through [`Runtime::current`]; independent runtimes can be created
//! with [`Runtime::new`] and never share state.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, error, trace};

use super::batch::BatchState;
use super::context::{ReactiveContext, TrackingStack};
use super::effect::{EffectBody, ErrorHandler};
use crate::config::RuntimeConfig;
use crate::debug::{DebugRegistry, RuntimeObserver};
use crate::error::EffectError;
use crate::graph::{Graph, NodeId, NodeKind};

thread_local! {
    static CURRENT: RefCell<Runtime> = RefCell::new(Runtime::new());
}

/// Handle to one reactive graph.
///
/// Cloning is cheap and yields a handle to the same graph.
#[derive(Clone)]
pub struct Runtime {
    pub(crate) inner: Rc<RuntimeInner>,
}

pub(crate) struct RuntimeInner {
    pub(crate) config: RuntimeConfig,
    pub(crate) graph: RefCell<Graph>,
    pub(crate) stack: RefCell<TrackingStack>,
    pub(crate) batch: RefCell<BatchState>,

    /// Live effects. The runtime owns them; signals only know their ids.
    pub(crate) effects: RefCell<HashMap<NodeId, Rc<EffectBody>>>,

    pub(crate) default_handler: RefCell<ErrorHandler>,
    pub(crate) observers: RefCell<Vec<Rc<dyn RuntimeObserver>>>,
    pub(crate) debug: Option<Rc<DebugRegistry>>,
}

impl Runtime {
    /// Create an independent runtime with the default configuration.
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        let debug = config.debug_registry.then(|| Rc::new(DebugRegistry::new()));
        let mut observers: Vec<Rc<dyn RuntimeObserver>> = Vec::new();
        if let Some(registry) = &debug {
            observers.push(registry.clone());
        }

        Self {
            inner: Rc::new(RuntimeInner {
                config,
                graph: RefCell::new(Graph::new()),
                stack: RefCell::new(TrackingStack::default()),
                batch: RefCell::new(BatchState::default()),
                effects: RefCell::new(HashMap::new()),
                default_handler: RefCell::new(default_error_handler()),
                observers: RefCell::new(observers),
                debug,
            }),
        }
    }

    /// The current thread's default runtime, used by the free functions
    /// ([`signal`](crate::signal), [`effect`](crate::effect), ...).
    pub fn current() -> Runtime {
        CURRENT.with(|current| current.borrow().clone())
    }

    /// Replace the current thread's default runtime, returning the old one.
    pub fn set_current(runtime: Runtime) -> Runtime {
        CURRENT.with(|current| current.replace(runtime))
    }

    /// Whether two handles point at the same graph.
    pub fn ptr_eq(&self, other: &Runtime) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// The registry installed by [`RuntimeConfig::debug_registry`].
    pub fn debug_registry(&self) -> Option<Rc<DebugRegistry>> {
        self.inner.debug.clone()
    }

    /// Register an observer for node creation and disposal.
    pub fn add_observer(&self, observer: Rc<dyn RuntimeObserver>) {
        self.inner.observers.borrow_mut().push(observer);
    }

    /// Replace the handler that receives errors from effects that have no
    /// handler of their own. Such effects are disposed after the handler
    /// returns.
    pub fn set_default_error_handler(&self, handler: impl Fn(&EffectError) + 'static) {
        *self.inner.default_handler.borrow_mut() = Rc::new(handler);
    }

    /// The listener that reads are currently attributed to.
    pub fn current_listener(&self) -> Option<NodeId> {
        self.inner.stack.borrow().current()
    }

    /// Run `f` with `listener` installed as the active consumer, restoring
    /// the previous one afterward (also on panic).
    pub fn run_with_listener<R>(&self, listener: Option<NodeId>, f: impl FnOnce() -> R) -> R {
        let _ctx = ReactiveContext::enter(self, listener);
        f()
    }

    /// Run `f` without recording any dependencies.
    pub fn untracked<R>(&self, f: impl FnOnce() -> R) -> R {
        self.run_with_listener(None, f)
    }

    /// Get the total number of live nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.inner.graph.borrow().node_count()
    }

    /// Dispose everything this runtime owns: effects first (roots, which
    /// cascade to their children), then computeds and signals.
    ///
    /// Handles keep working afterward in the sense that every read reports
    /// [`ReactiveError::Disposed`](crate::ReactiveError::Disposed).
    pub fn reset(&self) {
        let roots: Vec<NodeId> = {
            let graph = self.inner.graph.borrow();
            graph
                .ids_of(NodeKind::Effect)
                .into_iter()
                .filter(|id| graph.parent(*id).is_none())
                .collect()
        };
        for id in roots.into_iter().rev() {
            self.dispose_effect(id);
        }

        let leftovers = self.inner.graph.borrow().ids_of(NodeKind::Effect);
        for id in leftovers.into_iter().rev() {
            self.dispose_effect(id);
        }

        for kind in [NodeKind::Computed, NodeKind::Signal] {
            let ids = self.inner.graph.borrow().ids_of(kind);
            for id in ids.into_iter().rev() {
                self.dispose_source(id);
            }
        }

        self.inner.batch.borrow_mut().clear();
        debug!("runtime reset");
    }

    pub(crate) fn contains(&self, id: NodeId) -> bool {
        self.inner.graph.borrow().contains(id)
    }

    pub(crate) fn is_stale(&self, id: NodeId) -> bool {
        self.inner.graph.borrow().is_stale(id)
    }

    /// Insert a node and announce it to observers.
    pub(crate) fn register(&self, kind: NodeKind) -> NodeId {
        let id = self.inner.graph.borrow_mut().insert(kind);
        self.notify_created(id, kind);
        id
    }

    /// Record a read of `source` by the active listener, if there is one.
    pub(crate) fn track(&self, source: NodeId) {
        let listener = self.current_listener();
        if let Some(listener) = listener {
            self.inner.graph.borrow_mut().link(source, listener);
        }
    }

    /// Push a change of `source` through the graph.
    pub(crate) fn propagate(&self, source: NodeId) {
        let _batch = self.begin_batch();
        let effects = self.inner.graph.borrow_mut().invalidate(source);
        trace!(node = %source, effects = effects.len(), "propagating change");
        for id in effects {
            self.invalidate_effect(id);
        }
    }

    /// Tear down a signal or computed node.
    ///
    /// Subscriber effects that exist only to watch it are disposed; every
    /// other listener just loses the edge. Returns `false` if the node was
    /// already gone.
    pub(crate) fn dispose_source(&self, id: NodeId) -> bool {
        let observers = {
            let graph = self.inner.graph.borrow();
            if !graph.contains(id) {
                return false;
            }
            graph.observers_of(id)
        };
        for effect in observers.into_iter().rev() {
            self.dispose_effect(effect);
        }

        let removed = self.inner.graph.borrow_mut().remove(id);
        match removed {
            Some(node) => {
                debug!(node = %id, kind = %node.kind(), "disposed");
                self.notify_disposed(id, node.kind());
                true
            }
            None => false,
        }
    }

    pub(crate) fn notify_created(&self, id: NodeId, kind: NodeKind) {
        let observers = self.inner.observers.borrow().clone();
        for observer in observers {
            observer.node_created(id, kind);
        }
    }

    pub(crate) fn notify_disposed(&self, id: NodeId, kind: NodeKind) {
        let observers = self.inner.observers.borrow().clone();
        for observer in observers {
            observer.node_disposed(id, kind);
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("node_count", &self.node_count())
            .field("effect_count", &self.inner.effects.borrow().len())
            .field("batching", &self.is_batching())
            .field("config", &self.inner.config)
            .finish()
    }
}

fn default_error_handler() -> ErrorHandler {
    Rc::new(|err: &EffectError| {
        error!(
            effect = %err.effect_id(),
            error = %err,
            "unhandled effect error, disposing effect"
        );
    })
}
