#![forbid(unsafe_code)]

//! One-shot "context is ready" future.
//!
//! [`ContextReadyNotifier::wait_for_context`] returns a [`ContextReady`]
//! future that resolves with the host's context the first time it is
//! non-empty.
//!
//! # Invariants
//!
//! 1. If the context is already present, the future is resolved before
//!    `wait_for_context` returns and no handler is ever registered.
//! 2. Otherwise exactly one context-changed handler is registered. It is
//!    removed on the first non-empty change, before the future resolves.
//! 3. Resolution happens at most once. A `completed` flag guards the resolve
//!    path; later attempts (re-entrant changes delivered from an older
//!    handler snapshot) are ignored.
//! 4. The future holds the host weakly. Dropping an unresolved future, or
//!    cancelling it through a [`ReadyCanceller`], removes its handler.
//!
//! # Failure Modes
//!
//! If the host is dropped while the future is pending, the future stays
//! pending forever. Callers that care cancel it (see `abortable`).

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll, Waker};

use behave_core::{
    HandlerId, HostRef, Value, WeakHostRef, add_context_changed_handler,
    remove_context_changed_handler,
};
use tracing::trace;

#[derive(Default)]
struct ReadyState {
    completed: bool,
    value: Option<Value>,
    waker: Option<Waker>,
    registration: Option<(WeakHostRef, HandlerId)>,
}

impl ReadyState {
    fn take_registration(&mut self) -> Option<(HostRef, HandlerId)> {
        let (host, id) = self.registration.take()?;
        host.upgrade().map(|host| (host, id))
    }
}

fn resolve(state: &RefCell<ReadyState>, value: Value) {
    let (waker, registration) = {
        let mut state = state.borrow_mut();
        if state.completed {
            trace!("context already resolved; ignoring later change");
            return;
        }
        state.completed = true;
        state.value = Some(value);
        (state.waker.take(), state.take_registration())
    };
    if let Some((host, id)) = registration {
        remove_context_changed_handler(&*host, id);
    }
    if let Some(waker) = waker {
        waker.wake();
    }
}

/// Builds [`ContextReady`] futures for one host.
#[derive(Debug, Clone)]
pub struct ContextReadyNotifier {
    host: HostRef,
}

impl ContextReadyNotifier {
    #[must_use]
    pub fn new(host: &HostRef) -> Self {
        Self {
            host: Rc::clone(host),
        }
    }

    /// Future resolving with the first non-empty context of the host.
    pub fn wait_for_context(self) -> ContextReady {
        let state = Rc::new(RefCell::new(ReadyState::default()));
        if let Some(value) = self.host.context().get() {
            resolve(&state, value);
            return ContextReady { state };
        }

        let weak: Weak<RefCell<ReadyState>> = Rc::downgrade(&state);
        let id = add_context_changed_handler(&*self.host, move |change| {
            let (Some(value), Some(state)) = (change.new.as_ref(), weak.upgrade()) else {
                return;
            };
            resolve(&state, value.clone());
        });
        state.borrow_mut().registration = Some((Rc::downgrade(&self.host), id));
        trace!(host = %self.host.host_id(), handler = %id, "waiting for context");
        ContextReady { state }
    }
}

/// Single-resolution future over a host's context.
#[must_use = "futures do nothing unless polled"]
pub struct ContextReady {
    state: Rc<RefCell<ReadyState>>,
}

impl ContextReady {
    /// Whether the value has arrived.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.state.borrow().value.is_some()
    }

    /// Handle that stops this future from resolving, usable after the
    /// future has been moved into a task.
    #[must_use]
    pub fn canceller(&self) -> ReadyCanceller {
        ReadyCanceller {
            state: Rc::downgrade(&self.state),
        }
    }

    /// The resolved value, without polling.
    #[must_use]
    pub fn peek(&self) -> Option<Value> {
        self.state.borrow().value.clone()
    }
}

/// Cancels a pending [`ContextReady`] and removes its handler at once.
#[derive(Debug, Clone)]
pub struct ReadyCanceller {
    state: Weak<RefCell<ReadyState>>,
}

impl ReadyCanceller {
    /// Returns `false` if the future already resolved, was already cancelled,
    /// or no longer exists.
    pub fn cancel(&self) -> bool {
        let Some(state) = self.state.upgrade() else {
            return false;
        };
        let registration = {
            let mut state = state.borrow_mut();
            if state.completed {
                return false;
            }
            state.completed = true;
            state.waker = None;
            state.take_registration()
        };
        if let Some((host, id)) = registration {
            remove_context_changed_handler(&*host, id);
        }
        true
    }
}

impl Future for ContextReady {
    type Output = Value;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Value> {
        let mut state = self.state.borrow_mut();
        match &state.value {
            Some(value) => Poll::Ready(value.clone()),
            None => {
                state.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

impl Drop for ContextReady {
    fn drop(&mut self) {
        let registration = self.state.borrow_mut().take_registration();
        if let Some((host, id)) = registration {
            remove_context_changed_handler(&*host, id);
        }
    }
}

impl std::fmt::Debug for ContextReady {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("ContextReady")
            .field("completed", &state.completed)
            .field("value", &state.value)
            .finish()
    }
}
