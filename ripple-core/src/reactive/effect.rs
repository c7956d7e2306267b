//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies.
//!
//! 2. When any dependency changes, the effect re-runs (once per batch).
//!
//! 3. Before re-running, the effect calls its previous cleanup, disposes the
//!    effects it created last time, and clears its old dependencies. New ones
//!    are tracked during execution.
//!
//! # Differences from Computed
//!
//! - Computeds return a value; effects do not.
//! - Computeds are lazy (compute on access); effects are eager (run when deps change).
//! - Computeds cache results; effects just run their side effect.
//!
//! # Cleanup
//!
//! Effects can optionally return a [`Cleanup`]. It is called before the
//! effect re-runs and when the effect is disposed. A cleanup that panics is
//! logged (in verbose mode) and otherwise ignored.
//!
//! # Nesting
//!
//! An effect created while another effect is running becomes its child.
//! Children are disposed before their parent re-runs or is disposed, newest
//! first, so cleanups always run innermost-first.
//!
//! # Errors
//!
//! A worker may fail by returning `Err` or by panicking. With a handler of
//! its own the effect reports the error and stays live. Without one, the
//! runtime's default handler is called and the effect is disposed.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use tracing::{debug, trace, warn};

use super::runtime::Runtime;
use crate::error::{panic_message, BoxError, EffectError};
use crate::graph::{NodeId, NodeKind};

/// Receives the errors of an effect.
pub type ErrorHandler = Rc<dyn Fn(&EffectError)>;

type InvalidateHook = Rc<dyn Fn(&Effect)>;

pub(crate) type Worker = Box<dyn FnMut() -> Result<Option<Cleanup>, BoxError>>;

/// Teardown returned by an effect run.
pub struct Cleanup(Box<dyn FnOnce()>);

impl Cleanup {
    pub fn new(f: impl FnOnce() + 'static) -> Self {
        Self(Box::new(f))
    }

    fn call(self) {
        (self.0)()
    }
}

impl fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Cleanup")
    }
}

/// What an effect worker may return.
pub trait EffectOutput {
    fn into_outcome(self) -> Result<Option<Cleanup>, BoxError>;
}

impl EffectOutput for () {
    fn into_outcome(self) -> Result<Option<Cleanup>, BoxError> {
        Ok(None)
    }
}

impl EffectOutput for Cleanup {
    fn into_outcome(self) -> Result<Option<Cleanup>, BoxError> {
        Ok(Some(self))
    }
}

impl EffectOutput for Option<Cleanup> {
    fn into_outcome(self) -> Result<Option<Cleanup>, BoxError> {
        Ok(self)
    }
}

impl<E: Into<BoxError>> EffectOutput for Result<(), E> {
    fn into_outcome(self) -> Result<Option<Cleanup>, BoxError> {
        self.map(|()| None).map_err(Into::into)
    }
}

impl<E: Into<BoxError>> EffectOutput for Result<Cleanup, E> {
    fn into_outcome(self) -> Result<Option<Cleanup>, BoxError> {
        self.map(Some).map_err(Into::into)
    }
}

pub(crate) fn boxed_worker<R: EffectOutput>(mut f: impl FnMut() -> R + 'static) -> Worker {
    Box::new(move || f().into_outcome())
}

/// The runtime-owned half of an effect.
pub(crate) struct EffectBody {
    worker: RefCell<Worker>,
    cleanup: RefCell<Option<Cleanup>>,
    on_error: Option<ErrorHandler>,
    on_invalidate: RefCell<Option<InvalidateHook>>,
    running: Cell<bool>,
}

struct RunningGuard<'a>(&'a Cell<bool>);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Handle to an effect; also its disposer.
///
/// The runtime keeps the effect alive until it is disposed, so dropping the
/// handle does not stop it.
///
/// # Example
///
/// ```rust
/// use ripple_core::{effect, signal};
///
/// let count = signal(0);
/// let handle = effect({
///     let count = count.clone();
///     move || println!("Count is: {}", count.get())
/// });
///
/// count.set(5); // Prints: "Count is: 5"
/// handle.dispose();
/// count.set(6); // Prints nothing
/// ```
#[derive(Clone)]
pub struct Effect {
    rt: Runtime,
    id: NodeId,
}

impl Effect {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn runtime(&self) -> &Runtime {
        &self.rt
    }

    /// Run the effect now. Does nothing if it is disposed or already running.
    pub fn run(&self) {
        self.rt.run_effect(self.id);
    }

    /// Notify the effect that a dependency changed.
    ///
    /// Queued while a batch is open; otherwise handed to the invalidation
    /// hook if one is installed, else run immediately.
    pub fn invalidate(&self) {
        self.rt.invalidate_effect(self.id);
    }

    /// Redirect scheduling: when notified, call `hook` instead of running.
    /// The hook is expected to call [`Effect::run`] later.
    pub fn set_on_invalidate(&self, hook: impl Fn(&Effect) + 'static) {
        if let Some(body) = self.rt.effect_body(self.id) {
            *body.on_invalidate.borrow_mut() = Some(Rc::new(hook));
        }
    }

    pub fn clear_on_invalidate(&self) {
        if let Some(body) = self.rt.effect_body(self.id) {
            body.on_invalidate.borrow_mut().take();
        }
    }

    /// Stop the effect: dispose its children, call its cleanup, and drop its
    /// dependencies. Repeat calls do nothing.
    pub fn dispose(&self) {
        self.rt.dispose_effect(self.id);
    }

    pub fn is_disposed(&self) -> bool {
        self.rt.effect_body(self.id).is_none()
    }

    pub fn dependency_count(&self) -> usize {
        self.rt.inner.graph.borrow().dependency_count(self.id)
    }

    pub fn child_count(&self) -> usize {
        self.rt.inner.graph.borrow().child_count(self.id)
    }

    /// The effect this one was created inside, if any.
    pub fn parent(&self) -> Option<NodeId> {
        self.rt.inner.graph.borrow().parent(self.id)
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id)
            .field("dependency_count", &self.dependency_count())
            .field("child_count", &self.child_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl Runtime {
    /// Create an effect and run it once.
    pub fn effect<R: EffectOutput>(&self, f: impl FnMut() -> R + 'static) -> Effect {
        self.create_effect(boxed_worker(f), None, None)
    }

    /// Create an effect whose errors go to `on_error`. The effect stays live
    /// after an error.
    pub fn effect_with_handler<R: EffectOutput>(
        &self,
        f: impl FnMut() -> R + 'static,
        on_error: impl Fn(&EffectError) + 'static,
    ) -> Effect {
        self.create_effect(boxed_worker(f), Some(Rc::new(on_error)), None)
    }

    pub(crate) fn create_effect(
        &self,
        worker: Worker,
        on_error: Option<ErrorHandler>,
        observes: Option<NodeId>,
    ) -> Effect {
        let listener = self.current_listener();
        let (id, orphaned) = {
            let mut graph = self.inner.graph.borrow_mut();
            let id = graph.insert(NodeKind::Effect);
            if let Some(source) = observes {
                graph.set_observes(id, source);
            }
            if let Some(parent) = listener.filter(|p| graph.kind(*p) == Some(NodeKind::Effect)) {
                graph.attach_child(parent, id);
            }
            // Created by a run whose owner was disposed mid-run.
            let orphaned = listener.is_some_and(|p| !graph.contains(p));
            (id, orphaned)
        };

        let body = Rc::new(EffectBody {
            worker: RefCell::new(worker),
            cleanup: RefCell::new(None),
            on_error,
            on_invalidate: RefCell::new(None),
            running: Cell::new(false),
        });
        self.inner.effects.borrow_mut().insert(id, body);
        self.notify_created(id, NodeKind::Effect);

        self.run_effect(id);
        if orphaned {
            debug!(effect = %id, "owner disposed during its run, disposing child");
            self.dispose_effect(id);
        }

        Effect {
            rt: self.clone(),
            id,
        }
    }

    pub(crate) fn effect_body(&self, id: NodeId) -> Option<Rc<EffectBody>> {
        self.inner.effects.borrow().get(&id).cloned()
    }

    /// Hand a notified effect to its invalidation hook, or run it.
    pub(crate) fn dispatch_effect(&self, id: NodeId) {
        let Some(body) = self.effect_body(id) else {
            return;
        };
        let hook = body.on_invalidate.borrow().clone();
        match hook {
            Some(hook) => {
                let effect = Effect {
                    rt: self.clone(),
                    id,
                };
                let result =
                    panic::catch_unwind(AssertUnwindSafe(|| self.untracked(|| hook(&effect))));
                if let Err(payload) = result {
                    if self.inner.config.verbose {
                        warn!(
                            effect = %id,
                            panic = %panic_message(payload.as_ref()),
                            "effect invalidation hook panicked"
                        );
                    }
                }
            }
            None => self.run_effect(id),
        }
    }

    pub(crate) fn run_effect(&self, id: NodeId) {
        let Some(body) = self.effect_body(id) else {
            return;
        };
        if body.running.replace(true) {
            trace!(effect = %id, "effect already running, skipping");
            return;
        }
        let _running = RunningGuard(&body.running);

        let previous = body.cleanup.borrow_mut().take();
        if let Some(cleanup) = previous {
            self.invoke_cleanup(id, cleanup);
        }

        let children = self.inner.graph.borrow_mut().take_children(id);
        for child in children.into_iter().rev() {
            self.dispose_effect(child);
        }

        self.inner.graph.borrow_mut().unlink_dependencies(id);

        trace!(effect = %id, "running effect");
        let result = {
            let mut worker = body.worker.borrow_mut();
            panic::catch_unwind(AssertUnwindSafe(|| {
                self.run_with_listener(Some(id), &mut *worker)
            }))
        };
        let outcome = match result {
            Ok(Ok(cleanup)) => Ok(cleanup),
            Ok(Err(source)) => Err(EffectError::Failed { id, source }),
            Err(payload) => Err(EffectError::from_panic(id, payload)),
        };

        match outcome {
            Ok(None) => {}
            Ok(Some(cleanup)) => {
                if self.effect_body(id).is_some() {
                    *body.cleanup.borrow_mut() = Some(cleanup);
                } else {
                    // Disposed itself while running.
                    self.invoke_cleanup(id, cleanup);
                }
            }
            Err(err) => {
                self.handle_effect_error(id, &body, err);
                // A panic skips the flush of any batch it unwound through.
                if !self.is_batching() {
                    self.flush();
                }
            }
        }
    }

    fn handle_effect_error(&self, id: NodeId, body: &EffectBody, err: EffectError) {
        match &body.on_error {
            Some(handler) => self.call_error_handler(handler, &err),
            None => {
                let handler = self.inner.default_handler.borrow().clone();
                self.call_error_handler(&handler, &err);
                self.dispose_effect(id);
            }
        }
    }

    fn call_error_handler(&self, handler: &ErrorHandler, err: &EffectError) {
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.untracked(|| handler(err))));
        if let Err(payload) = result {
            if self.inner.config.verbose {
                warn!(
                    effect = %err.effect_id(),
                    panic = %panic_message(payload.as_ref()),
                    "effect error handler panicked"
                );
            }
        }
    }

    fn invoke_cleanup(&self, id: NodeId, cleanup: Cleanup) {
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.untracked(|| cleanup.call())));
        if let Err(payload) = result {
            if self.inner.config.verbose {
                warn!(
                    effect = %id,
                    panic = %panic_message(payload.as_ref()),
                    "effect cleanup panicked"
                );
            }
        }
    }

    pub(crate) fn dispose_effect(&self, id: NodeId) {
        let Some(body) = self.inner.effects.borrow_mut().remove(&id) else {
            return;
        };

        let children = self.inner.graph.borrow_mut().take_children(id);
        for child in children.into_iter().rev() {
            self.dispose_effect(child);
        }

        let cleanup = body.cleanup.borrow_mut().take();
        if let Some(cleanup) = cleanup {
            self.invoke_cleanup(id, cleanup);
        }

        self.inner.batch.borrow_mut().forget(id);
        let removed = self.inner.graph.borrow_mut().remove(id);
        if removed.is_some() {
            debug!(effect = %id, "effect disposed");
            self.notify_disposed(id, NodeKind::Effect);
        }

        // Drops the worker, and everything it captured, outside any borrow.
        drop(body);
    }
}

/// Create an effect on the current thread's runtime and run it once.
pub fn effect<R: EffectOutput>(f: impl FnMut() -> R + 'static) -> Effect {
    Runtime::current().effect(f)
}

/// Create an effect whose errors go to `on_error` instead of the runtime's
/// default handler. The effect stays live after an error.
pub fn effect_with_handler<R: EffectOutput>(
    f: impl FnMut() -> R + 'static,
    on_error: impl Fn(&EffectError) + 'static,
) -> Effect {
    Runtime::current().effect_with_handler(f, on_error)
}
