#![forbid(unsafe_code)]

//! Generic keyed property store.
//!
//! Hosts carry a [`PropertyStore`] so the framework can stash per-element
//! bookkeeping (handler chains, attached collections) without touching the
//! element's own type. The interface is deliberately narrow: get, set,
//! clear, and per-key change subscription. [`PropertyMap`] is the default
//! in-memory implementation.
//!
//! Keys are registered once and compared by id, so two keys with the same
//! name never alias.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::observable::Subscription;
use crate::value::Value;

static NEXT_PROPERTY_KEY: AtomicU64 = AtomicU64::new(1);

/// Identity of a registered property.
#[derive(Clone, Copy)]
pub struct PropertyKey {
    id: u64,
    name: &'static str,
}

impl PropertyKey {
    /// Register a new property. Every call yields a distinct key.
    #[must_use]
    pub fn register(name: &'static str) -> Self {
        Self {
            id: NEXT_PROPERTY_KEY.fetch_add(1, Ordering::Relaxed),
            name,
        }
    }

    /// Name given at registration, for diagnostics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for PropertyKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PropertyKey {}

impl std::hash::Hash for PropertyKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.id)
    }
}

/// A change delivered to property subscribers.
#[derive(Debug, Clone)]
pub struct PropertyChange {
    pub key: PropertyKey,
    pub old: Option<Value>,
    pub new: Option<Value>,
}

/// Keyed value storage with change notification.
pub trait PropertyStore {
    /// Current value for `key`, if set.
    fn get(&self, key: PropertyKey) -> Option<Value>;

    /// Store `value` under `key`. Re-setting the identical value is a no-op.
    fn set(&self, key: PropertyKey, value: Value);

    /// Remove `key`, returning the previous value.
    fn clear(&self, key: PropertyKey) -> Option<Value>;

    /// Observe changes to `key` for as long as the guard lives.
    fn subscribe(&self, key: PropertyKey, callback: Box<dyn Fn(&PropertyChange)>)
    -> Subscription;
}

type ChangeCallback = Rc<dyn Fn(&PropertyChange)>;

/// Default [`PropertyStore`]: a hash map plus weak per-key subscriber lists.
#[derive(Default)]
pub struct PropertyMap {
    values: RefCell<HashMap<PropertyKey, Value>>,
    subscribers: RefCell<HashMap<PropertyKey, Vec<Weak<dyn Fn(&PropertyChange)>>>>,
}

impl PropertyMap {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with a value.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.borrow().len()
    }

    /// Whether no key has a value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.borrow().is_empty()
    }

    /// Whether `key` has a value.
    #[must_use]
    pub fn contains(&self, key: PropertyKey) -> bool {
        self.values.borrow().contains_key(&key)
    }

    fn notify(&self, change: &PropertyChange) {
        let callbacks: Vec<ChangeCallback> = {
            let mut subs = self.subscribers.borrow_mut();
            let Some(list) = subs.get_mut(&change.key) else {
                return;
            };
            list.retain(|w| w.strong_count() > 0);
            let live: Vec<ChangeCallback> = list.iter().filter_map(Weak::upgrade).collect();
            if list.is_empty() {
                subs.remove(&change.key);
            }
            live
        };
        for cb in &callbacks {
            cb(change);
        }
    }
}

impl fmt::Debug for PropertyMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<PropertyKey> = self.values.borrow().keys().copied().collect();
        keys.sort_by_key(|k| k.id);
        f.debug_struct("PropertyMap").field("keys", &keys).finish()
    }
}

impl PropertyStore for PropertyMap {
    fn get(&self, key: PropertyKey) -> Option<Value> {
        self.values.borrow().get(&key).cloned()
    }

    fn set(&self, key: PropertyKey, value: Value) {
        let old = {
            let mut values = self.values.borrow_mut();
            if values.get(&key).is_some_and(|cur| cur.ptr_eq(&value)) {
                return;
            }
            values.insert(key, value.clone())
        };
        self.notify(&PropertyChange {
            key,
            old,
            new: Some(value),
        });
    }

    fn clear(&self, key: PropertyKey) -> Option<Value> {
        let old = self.values.borrow_mut().remove(&key)?;
        self.notify(&PropertyChange {
            key,
            old: Some(old.clone()),
            new: None,
        });
        Some(old)
    }

    fn subscribe(
        &self,
        key: PropertyKey,
        callback: Box<dyn Fn(&PropertyChange)>,
    ) -> Subscription {
        let strong: ChangeCallback = Rc::from(callback);
        self.subscribers
            .borrow_mut()
            .entry(key)
            .or_default()
            .push(Rc::downgrade(&strong));
        Subscription::new(strong)
    }
}
