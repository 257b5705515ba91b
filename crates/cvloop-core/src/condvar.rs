//! Condition variables over a cooperative event loop
//!
//! A [`CondVar`] starts not ready and becomes ready exactly once, when a
//! producer calls [`send`](CondVar::send) or [`croak`](CondVar::croak),
//! or when a [`begin`](CondVar::begin)/[`end`](CondVar::end) group drains.
//!
//! A consumer either registers a callback, which fires synchronously on
//! the readiness transition, or calls [`recv`](CondVar::recv). `recv`
//! does not park the thread: it pumps the registry's event loop one pass
//! at a time until this particular condition variable is ready.
//!
//! ```ignore
//! let cv: CondVar<&str> = runtime.condvar();
//! runtime.set_timeout(Duration::from_millis(100), {
//!     let cv = cv.clone();
//!     move || cv.send("x")
//! });
//! assert_eq!(cv.recv(), Ok(Some("x")));
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::error::RecvError;
use crate::id::CvId;
use crate::pump::pump_until;
use crate::registry::WaiterRegistry;
use crate::traits::Trigger;
use crate::{ktrace, kwarn};

/// Callback invoked with the condition variable that fired it
pub type Callback<T, E> = Rc<dyn Fn(&CondVar<T, E>)>;

/// Resolution state of the value slot
enum Slot<T, E> {
    /// Not ready
    Pending,
    /// Ready through a drained group whose end callback has not written
    /// a value yet. The first `send`/`croak` still lands.
    Settling,
    /// Resolved with a value (`None` for "no value")
    Sent(Option<T>),
    /// Resolved with an error
    Croaked(E),
}

impl<T, E> Slot<T, E> {
    #[inline]
    fn is_ready(&self) -> bool {
        !matches!(self, Slot::Pending)
    }

    #[inline]
    fn is_written(&self) -> bool {
        matches!(self, Slot::Sent(_) | Slot::Croaked(_))
    }
}

struct State<T, E> {
    slot: Slot<T, E>,
    callback: Option<Callback<T, E>>,
    group_end: Option<Callback<T, E>>,
    /// Outstanding `begin()` calls; caller discipline keeps it >= 0
    pending: i64,
}

struct Inner<T, E> {
    id: CvId,
    registry: Rc<WaiterRegistry>,
    state: RefCell<State<T, E>>,
}

/// A one-shot value or error that becomes available later
///
/// Cloning yields another handle to the same condition variable. The
/// type is single-threaded (`!Send`); it belongs to the loop thread.
pub struct CondVar<T, E = String> {
    inner: Rc<Inner<T, E>>,
}

impl<T, E> Clone for CondVar<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T, E> CondVar<T, E> {
    /// Create a condition variable tracked by `registry`
    pub fn new(registry: &Rc<WaiterRegistry>) -> Self {
        Self::build(registry, None)
    }

    /// Create a condition variable with a callback already registered
    pub fn with_callback<F>(registry: &Rc<WaiterRegistry>, callback: F) -> Self
    where
        F: Fn(&CondVar<T, E>) + 'static,
    {
        Self::build(registry, Some(Rc::new(callback)))
    }

    fn build(registry: &Rc<WaiterRegistry>, callback: Option<Callback<T, E>>) -> Self {
        let id = registry.register();
        ktrace!("cvloop: {} created", id);
        Self {
            inner: Rc::new(Inner {
                id,
                registry: Rc::clone(registry),
                state: RefCell::new(State {
                    slot: Slot::Pending,
                    callback,
                    group_end: None,
                    pending: 0,
                }),
            }),
        }
    }

    #[inline]
    pub fn id(&self) -> CvId {
        self.inner.id
    }

    /// The registry this condition variable is accounted in
    #[inline]
    pub fn registry(&self) -> &Rc<WaiterRegistry> {
        &self.inner.registry
    }

    /// Check if two handles refer to the same condition variable
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Whether the readiness latch has flipped
    #[inline]
    pub fn ready(&self) -> bool {
        self.inner.state.borrow().slot.is_ready()
    }

    // ========================================================================
    // Producer side
    // ========================================================================

    /// Resolve with `value`
    ///
    /// No-op once a value or error has been stored: the first writer wins.
    /// The registered callback, if any, runs synchronously before this
    /// returns.
    pub fn send(&self, value: T) {
        self.resolve(Slot::Sent(Some(value)));
    }

    /// Resolve with no value
    pub fn send_empty(&self) {
        self.resolve(Slot::Sent(None));
    }

    /// Resolve with an error; every later `recv()` returns it
    pub fn croak(&self, error: E) {
        self.resolve(Slot::Croaked(error));
    }

    /// Resolve with the empty error marker `E::default()`
    pub fn croak_default(&self)
    where
        E: Default,
    {
        self.croak(E::default());
    }

    fn resolve(&self, slot: Slot<T, E>) {
        let callback = {
            let mut state = self.inner.state.borrow_mut();
            if state.slot.is_written() {
                ktrace!("cvloop: {} already resolved, ignoring", self.inner.id);
                return;
            }
            state.slot = slot;
            state.callback.clone()
        };
        ktrace!("cvloop: {} resolved", self.inner.id);
        if let Some(callback) = callback {
            callback(self);
        }
    }

    // ========================================================================
    // Callback subscription
    // ========================================================================

    /// The currently registered callback
    pub fn cb(&self) -> Option<Callback<T, E>> {
        self.inner.state.borrow().callback.clone()
    }

    /// Register `callback`, replacing any previous one, and return it
    pub fn set_cb<F>(&self, callback: F) -> Callback<T, E>
    where
        F: Fn(&CondVar<T, E>) + 'static,
    {
        let callback: Callback<T, E> = Rc::new(callback);
        self.inner.state.borrow_mut().callback = Some(Rc::clone(&callback));
        callback
    }

    /// Remove the registered callback, returning it
    pub fn clear_cb(&self) -> Option<Callback<T, E>> {
        self.inner.state.borrow_mut().callback.take()
    }

    // ========================================================================
    // Fan-in groups
    // ========================================================================

    /// Register one more outstanding sub-task
    pub fn begin(&self) {
        self.inner.state.borrow_mut().pending += 1;
    }

    /// Register one more outstanding sub-task and set the group-end
    /// callback, replacing any previous one
    ///
    /// The group-end callback runs instead of the default no-value
    /// resolution when the group drains.
    pub fn begin_with<F>(&self, on_end: F)
    where
        F: Fn(&CondVar<T, E>) + 'static,
    {
        let mut state = self.inner.state.borrow_mut();
        state.group_end = Some(Rc::new(on_end));
        state.pending += 1;
    }

    /// Mark one sub-task finished
    ///
    /// When the count returns to exactly zero the condition variable
    /// becomes ready. With a group-end callback set, that callback runs
    /// and may still `send` the group's value; otherwise the condition
    /// variable resolves with no value.
    pub fn end(&self) {
        let group_end = {
            let mut state = self.inner.state.borrow_mut();
            state.pending -= 1;
            if state.pending != 0 {
                if state.pending < 0 {
                    kwarn!(
                        "cvloop: {} end() without matching begin() (pending {})",
                        self.inner.id,
                        state.pending
                    );
                }
                return;
            }
            let group_end = state.group_end.clone();
            if group_end.is_some() && !state.slot.is_ready() {
                state.slot = Slot::Settling;
            }
            group_end
        };
        ktrace!("cvloop: {} group drained", self.inner.id);
        match group_end {
            Some(on_end) => on_end(self),
            None => self.send_empty(),
        }
    }

    /// Outstanding sub-tasks
    #[inline]
    pub fn pending(&self) -> i64 {
        self.inner.state.borrow().pending
    }

    // ========================================================================
    // Consumer side
    // ========================================================================

    /// Whether the condition variable was resolved with `croak`
    pub fn is_croaked(&self) -> bool {
        matches!(self.inner.state.borrow().slot, Slot::Croaked(_))
    }

    /// The croaked error, if any, without consuming anything
    pub fn error(&self) -> Option<E>
    where
        E: Clone,
    {
        match &self.inner.state.borrow().slot {
            Slot::Croaked(e) => Some(e.clone()),
            _ => None,
        }
    }

    /// Wait for the condition variable and return its value
    ///
    /// If not ready yet, pumps the event loop until it is. Only one
    /// blocking wait may pump at a time: calling `recv()` on a pending
    /// condition variable from inside a callback that is itself being run
    /// by a pumping wait fails with [`RecvError::ReentrantWait`].
    ///
    /// Every call, including ones that fail or return immediately,
    /// counts as one completed wait against the registry's live count.
    ///
    /// Repeatable: once ready, each call returns the same value (or the
    /// same croaked error) again.
    pub fn recv(&self) -> Result<Option<T>, RecvError<E>>
    where
        T: Clone,
        E: Clone,
    {
        let registry = &self.inner.registry;
        let mut reentrant = false;

        if !self.ready() {
            match registry.enter_wait() {
                Some(_wait) => {
                    let outcome = pump_until(registry.event_loop().as_ref(), || self.ready());
                    ktrace!(
                        "cvloop: {} wait finished after {} pass(es), ready={}",
                        self.inner.id,
                        outcome.passes(),
                        outcome.is_ready()
                    );
                }
                None => reentrant = true,
            }
        }

        registry.wait_completed();

        if reentrant {
            return Err(RecvError::ReentrantWait);
        }

        let state = self.inner.state.borrow();
        match &state.slot {
            Slot::Croaked(e) => Err(RecvError::Croaked(e.clone())),
            Slot::Sent(value) => Ok(value.clone()),
            Slot::Settling => Ok(None),
            Slot::Pending => Err(RecvError::Exhausted),
        }
    }
}

impl<T, E> Trigger for CondVar<T, E> {
    /// Resolve with no value, like a bare callback invocation
    #[inline]
    fn trigger(&self) {
        self.send_empty();
    }
}

impl<T, E> fmt::Debug for CondVar<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("CondVar")
            .field("id", &self.inner.id)
            .field("ready", &state.slot.is_ready())
            .field("croaked", &matches!(state.slot, Slot::Croaked(_)))
            .field("pending", &state.pending)
            .field("has_cb", &state.callback.is_some())
            .finish()
    }
}
