#![forbid(unsafe_code)]

//! Delegate-style event lists.
//!
//! An [`EventSource`] owns its handlers. Registration returns a
//! [`HandlerId`]; removal is by that id. This is the shape of a host's
//! loaded/unloaded events: whatever a handler captures lives exactly as long
//! as the host keeps the handler, so state reachable only from a handler is
//! torn down with the host (or on explicit removal) and never earlier.
//!
//! # Invariants
//!
//! 1. Handlers run in subscription order.
//! 2. `raise` iterates a snapshot: handlers added during a raise are not
//!    called in that round; handlers removed during a raise that have not
//!    run yet are still called in that round.
//! 3. Ids are process-unique, so an id from one source never removes a
//!    handler from another.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a registered handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

impl HandlerId {
    fn next() -> Self {
        Self(NEXT_HANDLER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler#{}", self.0)
    }
}

type Handler<A> = Rc<dyn Fn(&A)>;

/// An ordered list of owned handlers.
pub struct EventSource<A> {
    handlers: RefCell<Vec<(HandlerId, Handler<A>)>>,
}

impl<A> Default for EventSource<A> {
    fn default() -> Self {
        Self {
            handlers: RefCell::new(Vec::new()),
        }
    }
}

impl<A> fmt::Debug for EventSource<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSource")
            .field("handlers", &self.handlers.borrow().len())
            .finish()
    }
}

impl<A> EventSource<A> {
    /// Empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `handler`; it is kept until removed or the source is dropped.
    pub fn subscribe(&self, handler: impl Fn(&A) + 'static) -> HandlerId {
        let id = HandlerId::next();
        self.handlers.borrow_mut().push((id, Rc::new(handler)));
        id
    }

    /// Remove the handler registered as `id`. Returns `false` if absent.
    pub fn unsubscribe(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.borrow_mut();
        match handlers.iter().position(|(hid, _)| *hid == id) {
            Some(pos) => {
                // Dropped after the borrow ends: a handler's captures may
                // touch this source in their own Drop.
                let removed = handlers.remove(pos);
                drop(handlers);
                drop(removed);
                true
            }
            None => false,
        }
    }

    /// Whether `id` is currently registered here.
    #[must_use]
    pub fn contains(&self, id: HandlerId) -> bool {
        self.handlers.borrow().iter().any(|(hid, _)| *hid == id)
    }

    /// Invoke every handler with `args`.
    pub fn raise(&self, args: &A) {
        let snapshot: Vec<Handler<A>> = self
            .handlers
            .borrow()
            .iter()
            .map(|(_, h)| Rc::clone(h))
            .collect();
        for handler in &snapshot {
            handler(args);
        }
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.borrow().len()
    }

    /// Whether no handler is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.borrow().is_empty()
    }

    /// Remove every handler.
    pub fn clear(&self) {
        let drained = std::mem::take(&mut *self.handlers.borrow_mut());
        drop(drained);
    }
}
