#![forbid(unsafe_code)]

//! Observable slot with ordered change notification.
//!
//! # Design
//!
//! [`Observable<T>`] keeps a value in shared, reference-counted storage
//! (`Rc<RefCell<..>>`). A mutation that changes the value (by `PartialEq`)
//! notifies every live subscriber in registration order with the previous
//! and the new value. A host's context slot is an
//! `Observable<Option<Value>>`; behaviors mirror their own context into one
//! as well.
//!
//! Subscribers are held weakly. The strong callback lives in the
//! [`Subscription`] guard, so dropping the guard is the unsubscribe and the
//! slot never keeps a subscriber's captures alive.
//!
//! # Performance
//!
//! | Operation     | Complexity                 |
//! |---------------|----------------------------|
//! | `get()`       | O(1)                       |
//! | `set()`       | O(S) where S = subscribers |
//! | `subscribe()` | O(1) amortized             |
//!
//! # Failure Modes
//!
//! - **Re-entrant set**: a subscriber may call `set()` on the same slot.
//!   No borrow is held while callbacks run, so the nested change notifies
//!   depth-first before the outer round finishes.
//! - **Subscriber leak**: guards stored forever keep their callbacks alive.
//!   Dead weak entries are pruned lazily during notification.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

type CallbackRc<T> = Rc<dyn Fn(&T, &T)>;
type CallbackWeak<T> = Weak<dyn Fn(&T, &T)>;

struct ObservableInner<T> {
    value: T,
    version: u64,
    /// Weak subscriber entries; dead ones are pruned on notify.
    subscribers: Vec<CallbackWeak<T>>,
}

/// A shared, version-tracked value with change notification.
///
/// Cloning an `Observable` creates another handle to the **same** slot.
///
/// # Invariants
///
/// 1. `version` increments by exactly 1 on each value-changing mutation.
/// 2. `set(v)` where `v == current` is a no-op.
/// 3. Subscribers are notified in registration order.
/// 4. A dropped [`Subscription`] is never invoked again.
pub struct Observable<T> {
    inner: Rc<RefCell<ObservableInner<T>>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Observable")
            .field("value", &inner.value)
            .field("version", &inner.version)
            .field("subscriber_count", &inner.subscribers.len())
            .finish()
    }
}

impl<T: Default + Clone + PartialEq + 'static> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    /// Create a slot holding `value`, at version 0.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ObservableInner {
                value,
                version: 0,
                subscribers: Vec::new(),
            })),
        }
    }

    /// Clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.borrow().value.clone()
    }

    /// Read the current value by reference.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.borrow().value)
    }

    /// Store `value`. Returns `true` (and notifies) if it differs from the
    /// current value.
    pub fn set(&self, value: T) -> bool {
        let old = {
            let mut inner = self.inner.borrow_mut();
            if inner.value == value {
                return false;
            }
            inner.version += 1;
            std::mem::replace(&mut inner.value, value)
        };
        self.notify(&old);
        true
    }

    /// Mutate the value in place. Notifies if the result differs from the
    /// value before the closure ran.
    pub fn update(&self, f: impl FnOnce(&mut T)) -> bool {
        let old = {
            let mut inner = self.inner.borrow_mut();
            let old = inner.value.clone();
            f(&mut inner.value);
            if inner.value == old {
                return false;
            }
            inner.version += 1;
            old
        };
        self.notify(&old);
        true
    }

    /// Register `callback(old, new)` for every future change.
    ///
    /// The callback stays registered for as long as the returned guard is
    /// alive.
    pub fn subscribe(&self, callback: impl Fn(&T, &T) + 'static) -> Subscription {
        let strong: CallbackRc<T> = Rc::new(callback);
        self.inner
            .borrow_mut()
            .subscribers
            .push(Rc::downgrade(&strong));
        Subscription::new(strong)
    }

    /// Number of value-changing mutations so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Registered entries, including dropped guards not yet pruned.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().subscribers.len()
    }

    /// Registered entries whose guard is still alive.
    #[must_use]
    pub fn live_subscriber_count(&self) -> usize {
        self.inner
            .borrow()
            .subscribers
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    fn notify(&self, old: &T) {
        // Upgrade first so no borrow is held while callbacks run.
        let (callbacks, new) = {
            let mut inner = self.inner.borrow_mut();
            inner.subscribers.retain(|w| w.strong_count() > 0);
            let callbacks: Vec<CallbackRc<T>> =
                inner.subscribers.iter().filter_map(Weak::upgrade).collect();
            (callbacks, inner.value.clone())
        };
        for cb in &callbacks {
            cb(old, &new);
        }
    }
}

/// RAII guard for a subscriber callback.
///
/// Dropping the guard drops the only strong reference to the callback, so
/// the weak entry in the subscriber list fails to upgrade from then on.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    _guard: Box<dyn std::any::Any>,
}

impl Subscription {
    /// Wrap any strong handle whose drop ends the subscription.
    pub fn new<G: 'static>(guard: G) -> Self {
        Self {
            _guard: Box::new(guard),
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}
