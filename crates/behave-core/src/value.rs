#![forbid(unsafe_code)]

//! Dynamically typed, shared values for context slots and property stores.
//!
//! A [`Value`] is an `Rc<dyn Any>` with identity equality: two values are
//! equal only if they are the same allocation. Hosts expose arbitrary view
//! models as context, so structural comparison is neither available nor
//! wanted; re-assigning the same instance is a no-op, assigning a fresh
//! instance is a change.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

/// A shared, type-erased value compared by identity.
#[derive(Clone)]
pub struct Value {
    inner: Rc<dyn Any>,
    type_name: &'static str,
}

impl Value {
    /// Wrap `value` in a fresh shared allocation.
    #[must_use]
    pub fn new<T: Any>(value: T) -> Self {
        Self {
            inner: Rc::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Share an existing allocation without copying it.
    #[must_use]
    pub fn from_rc<T: Any>(value: Rc<T>) -> Self {
        Self {
            inner: value,
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Borrow the payload if it is a `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Get a typed shared handle to the payload if it is a `T`.
    #[must_use]
    pub fn downcast_rc<T: Any>(&self) -> Option<Rc<T>> {
        Rc::clone(&self.inner).downcast::<T>().ok()
    }

    /// Whether the payload is a `T`.
    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }

    /// Whether both values share one allocation.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Name of the payload type, for diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Value {}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value<{}>@{:p}", self.type_name, Rc::as_ptr(&self.inner))
    }
}
