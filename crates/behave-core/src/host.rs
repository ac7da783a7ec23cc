#![forbid(unsafe_code)]

//! The host capability surface.
//!
//! A host is an element of an external retained UI tree. Behaviors and
//! collections only ever see it through [`Host`]: identity, a static type
//! lineage for constraint checks, loaded/unloaded events, the context slot,
//! a property store, and the dispatcher of the UI event queue the host lives
//! on.
//!
//! Hosts are shared as [`HostRef`] (`Rc<dyn Host>`). Anything that must not
//! extend a host's lifetime keeps a [`WeakHostRef`] instead.

use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use futures::task::LocalSpawn;

use crate::event::EventSource;
use crate::observable::Observable;
use crate::property::PropertyStore;
use crate::value::Value;

/// Strong, shared handle to a host.
pub type HostRef = Rc<dyn Host>;

/// Non-owning handle to a host.
pub type WeakHostRef = Weak<dyn Host>;

/// A host's context slot: empty until the host has data to expose.
pub type ContextSlot = Observable<Option<Value>>;

/// Spawner for the single-threaded UI event queue.
///
/// Futures spawned here resume on later turns of the same queue; nothing is
/// ever moved to another thread.
pub type Dispatcher = Rc<dyn LocalSpawn>;

static NEXT_HOST_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique host identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostId(u64);

impl HostId {
    /// Allocate a fresh id. Hosts call this once, at construction.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_HOST_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "host#{}", self.0)
    }
}

/// Static type lineage of a host, most-derived first.
///
/// Declared as `static`s so constraints can be named at compile time:
///
/// ```
/// use behave_core::host::{ELEMENT, HostType};
///
/// static CONTROL: HostType = HostType::derived("Control", &ELEMENT);
/// static BUTTON: HostType = HostType::derived("Button", &CONTROL);
///
/// assert!(BUTTON.is_assignable_to(&CONTROL));
/// assert!(BUTTON.is_assignable_to(&ELEMENT));
/// assert!(!CONTROL.is_assignable_to(&BUTTON));
/// ```
#[derive(Debug)]
pub struct HostType {
    name: &'static str,
    base: Option<&'static HostType>,
}

/// Root of every lineage; the constraint that every host satisfies.
pub static ELEMENT: HostType = HostType::root("Element");

impl HostType {
    /// A type with no base.
    #[must_use]
    pub const fn root(name: &'static str) -> Self {
        Self { name, base: None }
    }

    /// A type deriving from `base`.
    #[must_use]
    pub const fn derived(name: &'static str, base: &'static HostType) -> Self {
        Self {
            name,
            base: Some(base),
        }
    }

    /// Type name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Immediate base type.
    #[must_use]
    pub const fn base(&self) -> Option<&'static HostType> {
        self.base
    }

    /// This type followed by each ancestor.
    pub fn lineage(&self) -> impl Iterator<Item = &HostType> {
        std::iter::successors(Some(self), |t| t.base)
    }

    /// Whether a host of this type satisfies `constraint`.
    ///
    /// Types are compared by identity; a same-named type from another
    /// lineage does not match.
    #[must_use]
    pub fn is_assignable_to(&self, constraint: &HostType) -> bool {
        self.lineage().any(|t| std::ptr::eq(t, constraint))
    }
}

impl fmt::Display for HostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Capabilities a UI element must expose to carry behaviors.
pub trait Host {
    /// Stable identity, used for "same host" checks.
    fn host_id(&self) -> HostId;

    /// Most-derived type of this element.
    fn host_type(&self) -> &'static HostType;

    /// Raised when the element enters the live tree.
    fn loaded(&self) -> &EventSource<()>;

    /// Raised when the element leaves the live tree.
    fn unloaded(&self) -> &EventSource<()>;

    /// The context value the element exposes to dependents.
    fn context(&self) -> &ContextSlot;

    /// Per-element bookkeeping storage.
    fn properties(&self) -> &dyn PropertyStore;

    /// The event queue this element is confined to.
    fn dispatcher(&self) -> Dispatcher;
}

impl fmt::Debug for dyn Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host")
            .field("id", &self.host_id())
            .field("type", &self.host_type().name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    static PANEL: HostType = HostType::derived("Panel", &ELEMENT);
    static LIST_ITEM: HostType = HostType::derived("ListItem", &PANEL);
    static SHAPE: HostType = HostType::root("Shape");

    #[test]
    fn lineage_walks_to_root() {
        let names: Vec<&str> = LIST_ITEM.lineage().map(HostType::name).collect();
        assert_eq!(names, vec!["ListItem", "Panel", "Element"]);
    }

    #[test]
    fn assignability_follows_lineage() {
        assert!(LIST_ITEM.is_assignable_to(&LIST_ITEM));
        assert!(LIST_ITEM.is_assignable_to(&PANEL));
        assert!(LIST_ITEM.is_assignable_to(&ELEMENT));
        assert!(!PANEL.is_assignable_to(&LIST_ITEM));
        assert!(!SHAPE.is_assignable_to(&ELEMENT));
    }

    #[test]
    fn same_name_in_another_lineage_is_not_assignable() {
        static WIDGETS_BUTTON: HostType = HostType::derived("Button", &ELEMENT);
        static SHAPES_BUTTON: HostType = HostType::root("Button");
        static FANCY_BUTTON: HostType = HostType::derived("FancyButton", &WIDGETS_BUTTON);

        assert!(!SHAPES_BUTTON.is_assignable_to(&WIDGETS_BUTTON));
        assert!(!WIDGETS_BUTTON.is_assignable_to(&SHAPES_BUTTON));
        assert!(FANCY_BUTTON.is_assignable_to(&WIDGETS_BUTTON));
        assert!(!FANCY_BUTTON.is_assignable_to(&SHAPES_BUTTON));
    }

    #[test]
    fn host_ids_are_unique() {
        let a = HostId::next();
        let b = HostId::next();
        assert_ne!(a, b);
        assert!(a.to_string().starts_with("host#"));
    }

    // Random forests of types that all share one name: assignability must
    // follow the parent links alone.
    fn forest() -> impl Strategy<Value = Vec<Option<usize>>> {
        proptest::collection::vec((any::<bool>(), any::<prop::sample::Index>()), 1..12).prop_map(
            |nodes| {
                nodes
                    .into_iter()
                    .enumerate()
                    .map(|(i, (root, idx))| (i > 0 && !root).then(|| idx.index(i)))
                    .collect()
            },
        )
    }

    fn build(parents: &[Option<usize>]) -> Vec<&'static HostType> {
        let mut types: Vec<&'static HostType> = Vec::with_capacity(parents.len());
        for parent in parents {
            let ty = match parent {
                Some(p) => HostType::derived("Node", types[*p]),
                None => HostType::root("Node"),
            };
            types.push(Box::leak(Box::new(ty)));
        }
        types
    }

    fn is_ancestor_or_self(parents: &[Option<usize>], mut node: usize, target: usize) -> bool {
        loop {
            if node == target {
                return true;
            }
            match parents[node] {
                Some(p) => node = p,
                None => return false,
            }
        }
    }

    proptest! {
        #[test]
        fn assignability_matches_parent_links(parents in forest()) {
            let types = build(&parents);
            for (i, ty) in types.iter().enumerate() {
                let depth = (0..parents.len()).filter(|&j| is_ancestor_or_self(&parents, i, j)).count();
                prop_assert_eq!(ty.lineage().count(), depth);
                for (j, constraint) in types.iter().enumerate() {
                    prop_assert_eq!(
                        ty.is_assignable_to(constraint),
                        is_ancestor_or_self(&parents, i, j),
                        "type {} against constraint {}", i, j
                    );
                }
            }
        }
    }
}
