#![forbid(unsafe_code)]

//! Ordered sequence with structured change events.
//!
//! Every mutation raises exactly one [`SequenceChange`] after the items have
//! been updated, so a handler reading the sequence sees the new state.
//! Bulk operations (`clear`, `replace_all`) raise a single `Reset` that
//! carries both the removed and the present items.

use std::cell::RefCell;
use std::fmt;

use behave_core::{EventSource, HandlerId};

/// What changed in an [`ObservableSequence`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceChange<T> {
    Inserted { index: usize, item: T },
    Removed { index: usize, item: T },
    Replaced { index: usize, old: T, new: T },
    Reset { old: Vec<T>, new: Vec<T> },
}

/// A `Vec` that announces its mutations.
pub struct ObservableSequence<T> {
    items: RefCell<Vec<T>>,
    changed: EventSource<SequenceChange<T>>,
}

impl<T> Default for ObservableSequence<T> {
    fn default() -> Self {
        Self {
            items: RefCell::new(Vec::new()),
            changed: EventSource::new(),
        }
    }
}

impl<T: Clone> ObservableSequence<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Panics
    ///
    /// Panics if `index > len`.
    pub fn insert(&self, index: usize, item: T) {
        self.items.borrow_mut().insert(index, item.clone());
        self.changed.raise(&SequenceChange::Inserted { index, item });
    }

    pub fn push(&self, item: T) {
        let index = self.len();
        self.insert(index, item);
    }

    /// # Panics
    ///
    /// Panics if `index >= len`.
    pub fn remove_at(&self, index: usize) -> T {
        let item = self.items.borrow_mut().remove(index);
        self.changed.raise(&SequenceChange::Removed {
            index,
            item: item.clone(),
        });
        item
    }

    /// Swap the item at `index` for `item`, returning the old one.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`.
    pub fn replace(&self, index: usize, item: T) -> T {
        let old = std::mem::replace(&mut self.items.borrow_mut()[index], item.clone());
        self.changed.raise(&SequenceChange::Replaced {
            index,
            old: old.clone(),
            new: item,
        });
        old
    }

    /// Remove everything, returning the removed items.
    pub fn clear(&self) -> Vec<T> {
        self.replace_all(Vec::new())
    }

    /// Replace the whole contents, returning the previous items.
    pub fn replace_all(&self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        let new: Vec<T> = items.into_iter().collect();
        let old = std::mem::replace(&mut *self.items.borrow_mut(), new.clone());
        self.changed.raise(&SequenceChange::Reset {
            old: old.clone(),
            new,
        });
        old
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<T> {
        self.items.borrow().get(index).cloned()
    }

    /// Snapshot of the items in order.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.items.borrow().clone()
    }

    /// Iterate a snapshot; mutation during iteration is allowed.
    pub fn iter(&self) -> std::vec::IntoIter<T> {
        self.to_vec().into_iter()
    }

    #[must_use]
    pub fn position(&self, pred: impl FnMut(&T) -> bool) -> Option<usize> {
        self.items.borrow().iter().position(pred)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    /// Handlers run in subscription order after each mutation.
    pub fn subscribe(&self, handler: impl Fn(&SequenceChange<T>) + 'static) -> HandlerId {
        self.changed.subscribe(handler)
    }

    pub fn unsubscribe(&self, id: HandlerId) -> bool {
        self.changed.unsubscribe(id)
    }
}

impl<T: fmt::Debug> fmt::Debug for ObservableSequence<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.borrow().iter()).finish()
    }
}
