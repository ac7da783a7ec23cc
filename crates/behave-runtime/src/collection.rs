#![forbid(unsafe_code)]

//! Ordered attachable collection bound to one host.
//!
//! [`AttachableCollection`] keeps its members in an [`ObservableSequence`]
//! and turns each membership change into attach/detach calls on the members,
//! but only while the collection is loaded. Changes made while unloaded are
//! recorded and materialized at the next load.
//!
//! # Invariants
//!
//! 1. Members are attached to the recorded host iff the collection is
//!    loaded.
//! 2. Attach and detach always walk members in sequence order, for single
//!    changes and for bulk load, unload and reset alike.
//! 3. Membership operations validate first and mutate second. A rejected
//!    item leaves the sequence and every member untouched.
//! 4. The host is recorded weakly.
//!
//! # Failure Modes
//!
//! - A load against a new host while still loaded against an old one (a
//!   missed unload) first unloads the old host.
//! - A member that fails to attach during a bulk load is logged and skipped;
//!   the remaining members still attach.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use behave_core::{HandlerId, HostId, HostRef, InteractivityConfig, WeakHostRef};
use tracing::{debug, trace, warn};

use crate::attachable::{Attachable, AttachableId, AttachableRef};
use crate::error::{AttachError, AttachResult};
use crate::lifetime::LifetimeTarget;
use crate::sequence::{ObservableSequence, SequenceChange};

/// Collection-level extension points. Both default to no-ops.
pub trait CollectionHooks {
    /// After every member has been attached on load.
    fn on_attached(&self, _host: &HostRef) {}

    /// After every member has been detached on unload.
    fn on_detaching(&self, _host: &HostRef) {}
}

struct NoHooks;

impl CollectionHooks for NoHooks {}

/// Ordered members that follow the collection's host.
pub struct AttachableCollection {
    id: AttachableId,
    members: ObservableSequence<AttachableRef>,
    host: RefCell<Option<WeakHostRef>>,
    loaded: Cell<bool>,
    config: InteractivityConfig,
    hooks: Box<dyn CollectionHooks>,
}

impl AttachableCollection {
    /// Empty collection using the process-wide config.
    pub fn new() -> Rc<Self> {
        Self::build(InteractivityConfig::current(), Box::new(NoHooks))
    }

    pub fn with_config(config: InteractivityConfig) -> Rc<Self> {
        Self::build(config, Box::new(NoHooks))
    }

    pub fn with_hooks(hooks: Box<dyn CollectionHooks>) -> Rc<Self> {
        Self::build(InteractivityConfig::current(), hooks)
    }

    pub fn with_config_and_hooks(
        config: InteractivityConfig,
        hooks: Box<dyn CollectionHooks>,
    ) -> Rc<Self> {
        Self::build(config, hooks)
    }

    fn build(config: InteractivityConfig, hooks: Box<dyn CollectionHooks>) -> Rc<Self> {
        Rc::new_cyclic(|this: &Weak<Self>| {
            let members = ObservableSequence::new();
            let this = this.clone();
            members.subscribe(move |change: &SequenceChange<AttachableRef>| {
                if let Some(this) = this.upgrade() {
                    this.materialize(change);
                }
            });
            Self {
                id: AttachableId::next(),
                members,
                host: RefCell::new(None),
                loaded: Cell::new(false),
                config,
                hooks,
            }
        })
    }

    #[must_use]
    pub fn id(&self) -> AttachableId {
        self.id
    }

    #[must_use]
    pub fn config(&self) -> InteractivityConfig {
        self.config
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded.get()
    }

    /// The recorded host, if it is still alive.
    #[must_use]
    pub fn associated_host(&self) -> Option<HostRef> {
        self.host.borrow().as_ref().and_then(Weak::upgrade)
    }

    /// Snapshot of the members in order.
    #[must_use]
    pub fn members(&self) -> Vec<AttachableRef> {
        self.members.to_vec()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<AttachableRef> {
        self.members.get(index)
    }

    #[must_use]
    pub fn position(&self, id: AttachableId) -> Option<usize> {
        self.members.position(|m| m.attachable_id() == id)
    }

    #[must_use]
    pub fn contains(&self, id: AttachableId) -> bool {
        self.position(id).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Observe membership changes. Handlers run after members have been
    /// attached or detached for the change.
    pub fn subscribe_changes(
        &self,
        handler: impl Fn(&SequenceChange<AttachableRef>) + 'static,
    ) -> HandlerId {
        self.members.subscribe(handler)
    }

    pub fn unsubscribe_changes(&self, id: HandlerId) -> bool {
        self.members.unsubscribe(id)
    }

    fn loaded_host(&self) -> Option<HostRef> {
        if self.loaded.get() {
            self.associated_host()
        } else {
            None
        }
    }

    fn check_new_member(&self, item: &AttachableRef) -> AttachResult {
        let host = self.loaded_host();
        if self.contains(item.attachable_id()) {
            return Err(already_member(item, host.as_ref()));
        }
        check_admissible(item, host.as_ref())
    }

    /// Insert `item` at `index`; attaches it at once if loaded.
    ///
    /// # Errors
    ///
    /// `AlreadyAttached` if `item` is already a member or is bound to a
    /// different host; `TypeConstraint` if the loaded host does not satisfy
    /// it.
    ///
    /// # Panics
    ///
    /// Panics if `index > len`.
    pub fn insert(&self, index: usize, item: AttachableRef) -> AttachResult {
        self.check_new_member(&item)?;
        self.members.insert(index, item);
        Ok(())
    }

    /// Append `item`. Same errors as [`insert`](Self::insert).
    pub fn push(&self, item: AttachableRef) -> AttachResult {
        self.check_new_member(&item)?;
        self.members.push(item);
        Ok(())
    }

    /// Remove the member at `index`, detaching it if loaded.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`.
    pub fn remove_at(&self, index: usize) -> AttachableRef {
        self.members.remove_at(index)
    }

    /// Remove the member with `id`, if present.
    pub fn remove(&self, id: AttachableId) -> Option<AttachableRef> {
        self.position(id).map(|index| self.remove_at(index))
    }

    /// Replace the member at `index`. When loaded, the old member is detached
    /// before the new one is attached.
    ///
    /// # Errors
    ///
    /// As for [`insert`](Self::insert). Replacing a member with itself is a
    /// no-op.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`.
    pub fn replace(&self, index: usize, item: AttachableRef) -> AttachResult {
        let host = self.loaded_host();
        match self.position(item.attachable_id()) {
            Some(at) if at == index => return Ok(()),
            Some(_) => return Err(already_member(&item, host.as_ref())),
            None => {}
        }
        assert!(index < self.len(), "replace index {index} out of range");
        check_admissible(&item, host.as_ref())?;
        self.members.replace(index, item);
        Ok(())
    }

    /// Remove every member, detaching each in order if loaded.
    pub fn clear(&self) -> Vec<AttachableRef> {
        self.members.clear()
    }

    /// Swap the whole membership. When loaded, every previous member is
    /// detached in order, then every new member is attached in order.
    ///
    /// # Errors
    ///
    /// `AlreadyAttached` if `items` repeats an item or holds one bound to a
    /// different host; `TypeConstraint` as for [`insert`](Self::insert).
    pub fn replace_all(&self, items: Vec<AttachableRef>) -> AttachResult {
        let host = self.loaded_host();
        for (i, item) in items.iter().enumerate() {
            let id = item.attachable_id();
            if items[..i].iter().any(|prior| prior.attachable_id() == id) {
                return Err(already_member(item, host.as_ref()));
            }
            if !self.contains(id) {
                check_admissible(item, host.as_ref())?;
            }
        }
        self.members.replace_all(items);
        Ok(())
    }

    fn materialize(&self, change: &SequenceChange<AttachableRef>) {
        let Some(host) = self.loaded_host() else {
            return;
        };
        match change {
            SequenceChange::Inserted { item, .. } => self.attach_member(item, &host),
            SequenceChange::Removed { item, .. } => item.detach(),
            SequenceChange::Replaced { old, new, .. } => {
                old.detach();
                self.attach_member(new, &host);
            }
            SequenceChange::Reset { old, new } => {
                for item in old {
                    item.detach();
                }
                for item in new {
                    self.attach_member(item, &host);
                }
            }
        }
    }

    fn attach_member(&self, item: &AttachableRef, host: &HostRef) {
        if let Err(err) = item.attach(host) {
            warn!(collection = %self.id, item = %item.attachable_id(), host = %host.host_id(),
                error = %err, "member failed to attach");
        }
    }

    /// The host became live.
    ///
    /// No-op if already loaded against `host`. If loaded against a different
    /// host, that host is unloaded first.
    pub fn associated_object_loaded(&self, host: &HostRef) {
        if self.loaded.get() {
            match self.associated_host() {
                Some(current) if current.host_id() == host.host_id() => return,
                Some(current) => {
                    debug!(collection = %self.id, stale = %current.host_id(), host = %host.host_id(),
                        "load without unload; unloading previous host");
                    self.associated_object_unloaded(&current);
                }
                None => self.unload_members(None),
            }
        }

        *self.host.borrow_mut() = Some(Rc::downgrade(host));
        if self.config.design_mode {
            trace!(collection = %self.id, host = %host.host_id(), "design mode; members left detached");
            return;
        }
        self.loaded.set(true);
        debug!(collection = %self.id, host = %host.host_id(), members = self.len(), "collection loaded");
        for item in self.members.iter() {
            if !self.is_loaded_against(host) {
                break;
            }
            self.attach_member(&item, host);
        }
        if self.is_loaded_against(host) {
            self.hooks.on_attached(host);
        }
    }

    /// The host left the live tree. No-op if not loaded.
    ///
    /// Members are detached from whatever host is recorded, even if `host`
    /// is a different one.
    pub fn associated_object_unloaded(&self, host: &HostRef) {
        if !self.loaded.get() {
            *self.host.borrow_mut() = None;
            return;
        }
        let recorded = self.associated_host();
        self.unload_members(Some(recorded.as_ref().unwrap_or(host)));
    }

    fn unload_members(&self, host: Option<&HostRef>) {
        debug!(collection = %self.id, host = ?host.map(|h| h.host_id()), members = self.len(),
            "collection unloading");
        for item in self.members.iter() {
            item.detach();
        }
        if let Some(host) = host {
            self.hooks.on_detaching(host);
        }
        *self.host.borrow_mut() = None;
        self.loaded.set(false);
    }

    /// A member hook may unload or reload the collection mid-loop.
    fn is_loaded_against(&self, host: &HostRef) -> bool {
        self.loaded.get() && self.host_id() == Some(host.host_id())
    }

    fn host_id(&self) -> Option<HostId> {
        self.associated_host().map(|h| h.host_id())
    }
}

fn already_member(item: &AttachableRef, host: Option<&HostRef>) -> AttachError {
    let host = host.map(|h| h.host_id());
    AttachError::AlreadyAttached {
        item: item.attachable_id(),
        current: host,
        requested: host,
    }
}

fn check_admissible(item: &AttachableRef, host: Option<&HostRef>) -> AttachResult {
    match host {
        Some(host) => item.can_attach(host),
        None => match item.associated_host() {
            Some(current) => Err(AttachError::AlreadyAttached {
                item: item.attachable_id(),
                current: Some(current.host_id()),
                requested: None,
            }),
            None => Ok(()),
        },
    }
}

impl Attachable for AttachableCollection {
    fn attachable_id(&self) -> AttachableId {
        self.id
    }

    /// Load against `host` immediately.
    fn attach(&self, host: &HostRef) -> AttachResult {
        self.can_attach(host)?;
        self.associated_object_loaded(host);
        Ok(())
    }

    fn detach(&self) {
        match self.associated_host() {
            Some(host) => self.associated_object_unloaded(&host),
            None if self.loaded.get() => self.unload_members(None),
            None => *self.host.borrow_mut() = None,
        }
    }

    fn associated_host(&self) -> Option<HostRef> {
        AttachableCollection::associated_host(self)
    }

    fn can_attach(&self, host: &HostRef) -> AttachResult {
        match self.loaded_host() {
            Some(current) if current.host_id() != host.host_id() => {
                Err(AttachError::AlreadyAttached {
                    item: self.id,
                    current: Some(current.host_id()),
                    requested: Some(host.host_id()),
                })
            }
            _ => Ok(()),
        }
    }
}

impl LifetimeTarget for AttachableCollection {
    fn associated_object_loaded(&self, host: &HostRef) {
        AttachableCollection::associated_object_loaded(self, host);
    }

    fn associated_object_unloaded(&self, host: &HostRef) {
        AttachableCollection::associated_object_unloaded(self, host);
    }
}

impl Drop for AttachableCollection {
    fn drop(&mut self) {
        if self.loaded.get() {
            for item in self.members.iter() {
                item.detach();
            }
        }
        if self.config.trace_teardown {
            debug!(collection = %self.id, members = self.members.len(), "collection dropped");
        }
    }
}

impl fmt::Debug for AttachableCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttachableCollection")
            .field("id", &self.id)
            .field("members", &self.len())
            .field("loaded", &self.loaded.get())
            .field("host", &self.host_id())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::{Behavior, BehaviorAttachment};
    use behave_core::testing::TestElement;
    use behave_core::{ELEMENT, HostType};
    use futures::executor::LocalPool;

    type Log = Rc<RefCell<Vec<String>>>;

    struct Named {
        name: &'static str,
        log: Log,
    }

    impl Behavior for Named {
        fn on_attached(&self, _host: &HostRef) {
            self.log.borrow_mut().push(format!("+{}", self.name));
        }
        fn on_detaching(&self, _host: &HostRef) {
            self.log.borrow_mut().push(format!("-{}", self.name));
        }
    }

    struct LoggingHooks(Log);

    impl CollectionHooks for LoggingHooks {
        fn on_attached(&self, _host: &HostRef) {
            self.0.borrow_mut().push("+collection".into());
        }
        fn on_detaching(&self, _host: &HostRef) {
            self.0.borrow_mut().push("-collection".into());
        }
    }

    fn member(name: &'static str, log: &Log) -> Rc<BehaviorAttachment<Named>> {
        BehaviorAttachment::new(Named {
            name,
            log: Rc::clone(log),
        })
    }

    fn as_ref(m: &Rc<BehaviorAttachment<Named>>) -> AttachableRef {
        Rc::clone(m) as AttachableRef
    }

    fn host(pool: &LocalPool) -> HostRef {
        TestElement::new("host", Rc::new(pool.spawner())).host_ref()
    }

    fn take(log: &Log) -> Vec<String> {
        std::mem::take(&mut *log.borrow_mut())
    }

    fn collection(log: &Log) -> Rc<AttachableCollection> {
        AttachableCollection::with_config_and_hooks(
            InteractivityConfig::new(),
            Box::new(LoggingHooks(Rc::clone(log))),
        )
    }

    #[test]
    fn load_and_unload_walk_members_in_order() {
        let pool = LocalPool::new();
        let log = Log::default();
        let c = collection(&log);
        for name in ["m1", "m2", "m3"] {
            c.push(as_ref(&member(name, &log))).unwrap();
        }
        assert!(take(&log).is_empty());

        let h = host(&pool);
        c.associated_object_loaded(&h);
        assert_eq!(take(&log), ["+m1", "+m2", "+m3", "+collection"]);
        c.associated_object_unloaded(&h);
        assert_eq!(take(&log), ["-m1", "-m2", "-m3", "-collection"]);
        assert!(!c.is_loaded());
        assert!(c.associated_host().is_none());
    }

    struct Jumper {
        log: Log,
        collection: RefCell<Weak<AttachableCollection>>,
        target: HostRef,
        jumped: Cell<bool>,
    }

    impl Behavior for Jumper {
        fn on_attached(&self, _host: &HostRef) {
            self.log.borrow_mut().push("+jumper".into());
            if self.jumped.replace(true) {
                return;
            }
            if let Some(c) = self.collection.borrow().upgrade() {
                c.associated_object_loaded(&self.target);
            }
        }
        fn on_detaching(&self, _host: &HostRef) {
            self.log.borrow_mut().push("-jumper".into());
        }
    }

    #[test]
    fn reload_from_member_hook_stops_the_outer_load() {
        let pool = LocalPool::new();
        let log = Log::default();
        let c = collection(&log);
        let (h1, h2) = (host(&pool), host(&pool));
        let jumper = BehaviorAttachment::new(Jumper {
            log: Rc::clone(&log),
            collection: RefCell::new(Weak::new()),
            target: Rc::clone(&h2),
            jumped: Cell::new(false),
        });
        *jumper.behavior().collection.borrow_mut() = Rc::downgrade(&c);
        let m2 = member("m2", &log);
        c.push(Rc::clone(&jumper) as AttachableRef).unwrap();
        c.push(as_ref(&m2)).unwrap();

        c.associated_object_loaded(&h1);
        assert_eq!(
            take(&log),
            ["+jumper", "-jumper", "-collection", "+jumper", "+m2", "+collection"]
        );
        assert_eq!(c.associated_host().map(|h| h.host_id()), Some(h2.host_id()));
        for bound in [jumper.associated_host(), m2.associated_host()] {
            assert_eq!(bound.map(|h| h.host_id()), Some(h2.host_id()));
        }
    }

    #[test]
    fn insert_while_loaded_attaches_immediately() {
        let pool = LocalPool::new();
        let log = Log::default();
        let c = collection(&log);
        let h = host(&pool);
        c.associated_object_loaded(&h);
        take(&log);

        let m = member("m", &log);
        c.insert(0, as_ref(&m)).unwrap();
        assert!(m.is_attached());
        assert_eq!(take(&log), ["+m"]);
    }

    #[test]
    fn insert_while_unloaded_defers() {
        let pool = LocalPool::new();
        let log = Log::default();
        let c = collection(&log);
        let m = member("m", &log);
        c.push(as_ref(&m)).unwrap();
        assert!(!m.is_attached());

        c.associated_object_loaded(&host(&pool));
        assert!(m.is_attached());
    }

    #[test]
    fn remove_and_replace_detach_when_loaded() {
        let pool = LocalPool::new();
        let log = Log::default();
        let c = collection(&log);
        let (a, b, n) = (member("a", &log), member("b", &log), member("n", &log));
        c.push(as_ref(&a)).unwrap();
        c.push(as_ref(&b)).unwrap();
        let h = host(&pool);
        c.associated_object_loaded(&h);
        take(&log);

        c.replace(0, as_ref(&n)).unwrap();
        assert_eq!(take(&log), ["-a", "+n"]);
        assert!(!a.is_attached());

        let removed = c.remove_at(1);
        assert_eq!(removed.attachable_id(), b.id());
        assert_eq!(take(&log), ["-b"]);
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn remove_while_unloaded_only_drops() {
        let log = Log::default();
        let c = collection(&log);
        let a = member("a", &log);
        c.push(as_ref(&a)).unwrap();
        assert!(c.remove(a.id()).is_some());
        assert!(c.remove(a.id()).is_none());
        assert!(take(&log).is_empty());
    }

    #[test]
    fn reset_detaches_old_then_attaches_new_in_order() {
        let pool = LocalPool::new();
        let log = Log::default();
        let c = collection(&log);
        let (a, b, x) = (member("a", &log), member("b", &log), member("x", &log));
        c.replace_all(vec![as_ref(&a), as_ref(&b)]).unwrap();
        c.associated_object_loaded(&host(&pool));
        take(&log);

        c.replace_all(vec![as_ref(&b), as_ref(&x)]).unwrap();
        assert_eq!(take(&log), ["-a", "-b", "+b", "+x"]);

        let cleared = c.clear();
        assert_eq!(cleared.len(), 2);
        assert_eq!(take(&log), ["-b", "-x"]);
        assert!(!b.is_attached() && !x.is_attached());
    }

    #[test]
    fn duplicate_member_is_rejected() {
        let log = Log::default();
        let c = collection(&log);
        let a = member("a", &log);
        c.push(as_ref(&a)).unwrap();
        let err = c.push(as_ref(&a)).unwrap_err();
        assert!(matches!(err, AttachError::AlreadyAttached { current: None, .. }));
        assert_eq!(c.len(), 1);

        let b = member("b", &log);
        assert!(c.replace_all(vec![as_ref(&b), as_ref(&b)]).is_err());
        assert_eq!(c.members()[0].attachable_id(), a.id());
    }

    #[test]
    fn item_attached_elsewhere_fails_fast() {
        let pool = LocalPool::new();
        let log = Log::default();
        let c = collection(&log);
        let (h1, h2) = (host(&pool), host(&pool));
        c.associated_object_loaded(&h1);

        let stray = member("stray", &log);
        stray.attach(&h2).unwrap();
        let err = c.insert(0, as_ref(&stray)).unwrap_err();
        assert_eq!(
            err,
            AttachError::AlreadyAttached {
                item: stray.id(),
                current: Some(h2.host_id()),
                requested: Some(h1.host_id()),
            }
        );
        assert!(c.is_empty());
        assert_eq!(stray.associated_host().map(|h| h.host_id()), Some(h2.host_id()));

        // Also refused while unloaded.
        let idle = collection(&log);
        assert!(idle.push(as_ref(&stray)).is_err());
    }

    #[test]
    fn constraint_violation_rejected_when_loaded() {
        static BUTTON: HostType = HostType::derived("Button", &ELEMENT);
        let pool = LocalPool::new();
        let log = Log::default();
        let c = collection(&log);
        let h = host(&pool);
        c.associated_object_loaded(&h);

        let picky = BehaviorAttachment::with_constraint(
            Named {
                name: "picky",
                log: Rc::clone(&log),
            },
            &BUTTON,
        );
        let err = c.push(Rc::clone(&picky) as AttachableRef).unwrap_err();
        assert!(matches!(err, AttachError::TypeConstraint { required: "Button", .. }));
        assert!(c.is_empty());
    }

    #[test]
    fn replace_with_self_is_noop() {
        let pool = LocalPool::new();
        let log = Log::default();
        let c = collection(&log);
        let a = member("a", &log);
        c.push(as_ref(&a)).unwrap();
        c.associated_object_loaded(&host(&pool));
        take(&log);
        c.replace(0, as_ref(&a)).unwrap();
        assert!(take(&log).is_empty());
    }

    #[test]
    fn load_against_new_host_without_unload_recovers() {
        let pool = LocalPool::new();
        let log = Log::default();
        let c = collection(&log);
        let a = member("a", &log);
        c.push(as_ref(&a)).unwrap();
        let (h1, h2) = (host(&pool), host(&pool));

        c.associated_object_loaded(&h1);
        c.associated_object_loaded(&h1);
        c.associated_object_loaded(&h2);
        assert_eq!(
            take(&log),
            ["+a", "+collection", "-a", "-collection", "+a", "+collection"]
        );
        assert_eq!(a.associated_host().map(|h| h.host_id()), Some(h2.host_id()));
        assert_eq!(c.associated_host().map(|h| h.host_id()), Some(h2.host_id()));
    }

    #[test]
    fn duplicate_unload_is_noop() {
        let pool = LocalPool::new();
        let log = Log::default();
        let c = collection(&log);
        c.push(as_ref(&member("a", &log))).unwrap();
        let h = host(&pool);
        c.associated_object_loaded(&h);
        c.associated_object_unloaded(&h);
        take(&log);
        c.associated_object_unloaded(&h);
        assert!(take(&log).is_empty());
    }

    #[test]
    fn unload_from_unexpected_host_still_detaches() {
        let pool = LocalPool::new();
        let log = Log::default();
        let c = collection(&log);
        let a = member("a", &log);
        c.push(as_ref(&a)).unwrap();
        let (h1, h2) = (host(&pool), host(&pool));
        c.associated_object_loaded(&h1);
        c.associated_object_unloaded(&h2);
        assert!(!a.is_attached());
        assert!(!c.is_loaded());
    }

    #[test]
    fn design_mode_records_host_without_attaching() {
        let pool = LocalPool::new();
        let log = Log::default();
        let c = AttachableCollection::with_config(InteractivityConfig::new().with_design_mode(true));
        let a = member("a", &log);
        c.push(as_ref(&a)).unwrap();
        let h = host(&pool);
        c.associated_object_loaded(&h);
        assert!(!c.is_loaded());
        assert!(!a.is_attached());
        assert_eq!(c.associated_host().map(|x| x.host_id()), Some(h.host_id()));
        c.associated_object_unloaded(&h);
        assert!(c.associated_host().is_none());
    }

    #[test]
    fn collection_is_itself_attachable() {
        let pool = LocalPool::new();
        let log = Log::default();
        let outer = collection(&log);
        let inner = AttachableCollection::with_config(InteractivityConfig::new());
        inner.push(as_ref(&member("leaf", &log))).unwrap();
        outer.push(Rc::clone(&inner) as AttachableRef).unwrap();

        let (h1, h2) = (host(&pool), host(&pool));
        outer.associated_object_loaded(&h1);
        assert!(inner.is_loaded());
        assert_eq!(take(&log), ["+leaf", "+collection"]);
        assert!(Attachable::attach(&*inner, &h2).is_err());
        assert!(Attachable::attach(&*inner, &h1).is_ok());

        outer.associated_object_unloaded(&h1);
        assert!(!inner.is_loaded());
        assert_eq!(take(&log), ["-leaf", "-collection"]);
    }

    #[test]
    fn change_subscribers_run_after_materialization() {
        let pool = LocalPool::new();
        let log = Log::default();
        let c = collection(&log);
        let h = host(&pool);
        c.associated_object_loaded(&h);
        let seen = Rc::new(Cell::new(false));
        let (seen_cb, log_cb) = (Rc::clone(&seen), Rc::clone(&log));
        c.subscribe_changes(move |_| seen_cb.set(log_cb.borrow().contains(&"+m".to_string())));
        c.push(as_ref(&member("m", &log))).unwrap();
        assert!(seen.get());
    }

    #[test]
    fn dropping_loaded_collection_detaches_members() {
        let pool = LocalPool::new();
        let log = Log::default();
        let c = collection(&log);
        let a = member("a", &log);
        c.push(as_ref(&a)).unwrap();
        c.associated_object_loaded(&host(&pool));
        drop(c);
        assert!(!a.is_attached());
    }

    #[test]
    fn host_is_recorded_weakly() {
        let pool = LocalPool::new();
        let log = Log::default();
        let c = collection(&log);
        let el = TestElement::new("h", Rc::new(pool.spawner()));
        c.associated_object_loaded(&el.host_ref());
        let weak = Rc::downgrade(&el);
        drop(el);
        assert!(weak.upgrade().is_none());
        assert!(c.associated_host().is_none());
    }
}
