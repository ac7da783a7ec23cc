#![forbid(unsafe_code)]

//! Weak lifetime observation.
//!
//! A [`WeakLifetimeObserver`] forwards a host's loaded/unloaded events to a
//! [`LifetimeTarget`] without owning either side. The target is reached
//! through a [`TargetHandle`] into a [`LifetimeRegistry`]: a generational
//! arena of weak entries that the target's owner can tombstone at any time.
//!
//! # Ownership
//!
//! ```text
//! host ──owns──▶ loaded/unloaded handlers ──handle──▶ registry slot ··weak··▶ target
//! ```
//!
//! The handlers live in the host's own event lists, so they go away with the
//! host. They capture the host weakly and the target by handle only.
//!
//! # Invariants
//!
//! 1. A handle resolves only while its slot generation matches and the
//!    target is still alive. Reused slots get a new generation, so an old
//!    handle never reaches a new target.
//! 2. A failed resolution drops the notification. It is never an error.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use behave_core::{HandlerId, HostId, HostRef, WeakHostRef};
use tracing::trace;

/// Receiver of forwarded host lifetime events.
pub trait LifetimeTarget {
    fn associated_object_loaded(&self, host: &HostRef);
    fn associated_object_unloaded(&self, host: &HostRef);
}

/// Stable reference to a registry slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetHandle {
    index: u32,
    generation: u32,
}

impl TargetHandle {
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

struct Slot {
    generation: u32,
    target: Option<Weak<dyn LifetimeTarget>>,
}

#[derive(Default)]
struct Arena {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

/// Generational arena of weak lifetime targets.
#[derive(Default)]
pub struct LifetimeRegistry {
    arena: RefCell<Arena>,
}

thread_local! {
    static CURRENT_REGISTRY: Rc<LifetimeRegistry> = Rc::new(LifetimeRegistry::new());
}

impl LifetimeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry shared by everything on this thread.
    #[must_use]
    pub fn current() -> Rc<Self> {
        CURRENT_REGISTRY.with(Rc::clone)
    }

    /// Store `target`, reusing a tombstoned slot if one is free.
    pub fn register(&self, target: Weak<dyn LifetimeTarget>) -> TargetHandle {
        let mut arena = self.arena.borrow_mut();
        if let Some(index) = arena.free.pop() {
            let slot = &mut arena.slots[index as usize];
            slot.target = Some(target);
            return TargetHandle {
                index,
                generation: slot.generation,
            };
        }
        let index = u32::try_from(arena.slots.len()).unwrap_or(u32::MAX);
        arena.slots.push(Slot {
            generation: 0,
            target: Some(target),
        });
        TargetHandle {
            index,
            generation: 0,
        }
    }

    /// The live target behind `handle`, if any.
    #[must_use]
    pub fn resolve(&self, handle: TargetHandle) -> Option<Rc<dyn LifetimeTarget>> {
        let arena = self.arena.borrow();
        let slot = arena.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.target.as_ref()?.upgrade()
    }

    /// Tombstone the slot. Returns `false` for a stale or unknown handle.
    pub fn invalidate(&self, handle: TargetHandle) -> bool {
        let mut arena = self.arena.borrow_mut();
        let Some(slot) = arena.slots.get_mut(handle.index as usize) else {
            return false;
        };
        if slot.generation != handle.generation || slot.target.is_none() {
            return false;
        }
        slot.target = None;
        slot.generation = slot.generation.wrapping_add(1);
        arena.free.push(handle.index);
        true
    }

    /// Occupied slots whose target is still alive.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.arena
            .borrow()
            .slots
            .iter()
            .filter(|s| s.target.as_ref().is_some_and(|t| t.strong_count() > 0))
            .count()
    }
}

impl fmt::Debug for LifetimeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arena = self.arena.borrow();
        f.debug_struct("LifetimeRegistry")
            .field("slots", &arena.slots.len())
            .field("free", &arena.free.len())
            .finish()
    }
}

/// Non-owning link from a host's lifetime events to a registered target.
///
/// Dropping the observer leaves the link in place; the host keeps it until
/// the host itself goes away or [`disconnect`](Self::disconnect) is called.
pub struct WeakLifetimeObserver {
    host: WeakHostRef,
    host_id: HostId,
    loaded: HandlerId,
    unloaded: HandlerId,
    connected: Cell<bool>,
}

impl WeakLifetimeObserver {
    /// Subscribe to `host` on behalf of the target at `handle`.
    pub fn observe(host: &HostRef, registry: &Rc<LifetimeRegistry>, handle: TargetHandle) -> Self {
        let loaded = host.loaded().subscribe(forwarder(host, registry, handle, |target, host| {
            target.associated_object_loaded(host);
        }));
        let unloaded = host.unloaded().subscribe(forwarder(host, registry, handle, |target, host| {
            target.associated_object_unloaded(host);
        }));
        trace!(host = %host.host_id(), slot = handle.index, "lifetime observer connected");
        Self {
            host: Rc::downgrade(host),
            host_id: host.host_id(),
            loaded,
            unloaded,
            connected: Cell::new(true),
        }
    }

    #[must_use]
    pub fn host_id(&self) -> HostId {
        self.host_id
    }

    /// The observed host, if it is still alive.
    #[must_use]
    pub fn host(&self) -> Option<HostRef> {
        self.host.upgrade()
    }

    /// Whether both handlers are still registered on a live host.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.get()
            && self
                .host
                .upgrade()
                .is_some_and(|h| {
                    h.loaded().contains(self.loaded) && h.unloaded().contains(self.unloaded)
                })
    }

    /// Remove both handlers from the host. Idempotent.
    pub fn disconnect(&self) {
        if !self.connected.replace(false) {
            return;
        }
        if let Some(host) = self.host.upgrade() {
            host.loaded().unsubscribe(self.loaded);
            host.unloaded().unsubscribe(self.unloaded);
            trace!(host = %self.host_id, "lifetime observer disconnected");
        }
    }
}

fn forwarder(
    host: &HostRef,
    registry: &Rc<LifetimeRegistry>,
    handle: TargetHandle,
    deliver: fn(&dyn LifetimeTarget, &HostRef),
) -> impl Fn(&()) + 'static {
    let host = Rc::downgrade(host);
    let registry = Rc::clone(registry);
    move |()| {
        let Some(host) = host.upgrade() else {
            return;
        };
        match registry.resolve(handle) {
            Some(target) => deliver(&*target, &host),
            None => trace!(host = %host.host_id(), slot = handle.index, "lifetime target gone; notification dropped"),
        }
    }
}

impl fmt::Debug for WeakLifetimeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakLifetimeObserver")
            .field("host", &self.host_id)
            .field("connected", &self.connected.get())
            .finish()
    }
}
