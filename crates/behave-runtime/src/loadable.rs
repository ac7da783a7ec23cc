#![forbid(unsafe_code)]

//! Collection driven by its host's loaded/unloaded events.
//!
//! Attaching a [`LoadableAttachableCollection`] does not attach any member.
//! It installs a [`WeakLifetimeObserver`] on the host, and the host's next
//! `loaded` event loads the inner [`AttachableCollection`]. Item containers
//! that recycle their children fire `unloaded`/`loaded` around each reuse,
//! so the same collection follows its container from host to host.
//!
//! The inner collection is owned here and registered weakly in the thread's
//! [`LifetimeRegistry`]. Dropping the loadable collection tombstones its
//! registry slot, so handlers still sitting in a host's event lists resolve
//! to nothing.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use behave_core::{HostRef, InteractivityConfig};
use tracing::{debug, trace};

use crate::attachable::{Attachable, AttachableId};
use crate::collection::{AttachableCollection, CollectionHooks};
use crate::error::{AttachError, AttachResult};
use crate::lifetime::{LifetimeRegistry, LifetimeTarget, TargetHandle, WeakLifetimeObserver};

/// Attachable collection that loads and unloads with its host.
pub struct LoadableAttachableCollection {
    id: AttachableId,
    inner: Rc<AttachableCollection>,
    registry: Rc<LifetimeRegistry>,
    handle: TargetHandle,
    observer: RefCell<Option<WeakLifetimeObserver>>,
}

impl LoadableAttachableCollection {
    pub fn new() -> Rc<Self> {
        Self::from_collection(AttachableCollection::new(), LifetimeRegistry::current())
    }

    pub fn with_config(config: InteractivityConfig) -> Rc<Self> {
        Self::from_collection(
            AttachableCollection::with_config(config),
            LifetimeRegistry::current(),
        )
    }

    pub fn with_hooks(hooks: Box<dyn CollectionHooks>) -> Rc<Self> {
        Self::from_collection(
            AttachableCollection::with_hooks(hooks),
            LifetimeRegistry::current(),
        )
    }

    /// Wrap an existing collection, registering it in `registry`.
    pub fn from_collection(
        inner: Rc<AttachableCollection>,
        registry: Rc<LifetimeRegistry>,
    ) -> Rc<Self> {
        let target: Rc<dyn LifetimeTarget> = Rc::clone(&inner) as Rc<dyn LifetimeTarget>;
        let handle = registry.register(Rc::downgrade(&target));
        Rc::new(Self {
            id: AttachableId::next(),
            inner,
            registry,
            handle,
            observer: RefCell::new(None),
        })
    }

    #[must_use]
    pub fn id(&self) -> AttachableId {
        self.id
    }

    /// The inner collection, for membership changes.
    #[must_use]
    pub fn collection(&self) -> &Rc<AttachableCollection> {
        &self.inner
    }

    #[must_use]
    pub fn handle(&self) -> TargetHandle {
        self.handle
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.inner.is_loaded()
    }

    /// Whether an observer is installed on a live host.
    #[must_use]
    pub fn is_observing(&self) -> bool {
        self.observer
            .borrow()
            .as_ref()
            .is_some_and(WeakLifetimeObserver::is_connected)
    }

    fn observed_host(&self) -> Option<HostRef> {
        self.observer.borrow().as_ref().and_then(WeakLifetimeObserver::host)
    }

    fn disconnect(&self) {
        let observer = self.observer.borrow_mut().take();
        if let Some(observer) = observer {
            observer.disconnect();
        }
    }

    /// Start following `host`'s lifetime events.
    ///
    /// No-op if already following `host`. Following a different host is
    /// allowed once the inner collection has unloaded from the previous one.
    ///
    /// # Errors
    ///
    /// `AlreadyAttached` while the inner collection is still loaded against
    /// another live host.
    pub fn attach(&self, host: &HostRef) -> AttachResult {
        if self
            .observed_host()
            .is_some_and(|current| current.host_id() == host.host_id())
            && self.is_observing()
        {
            return Ok(());
        }
        if self.inner.is_loaded() {
            if let Some(current) = self.inner.associated_host() {
                if current.host_id() != host.host_id() {
                    return Err(AttachError::AlreadyAttached {
                        item: self.id,
                        current: Some(current.host_id()),
                        requested: Some(host.host_id()),
                    });
                }
            }
        }

        self.disconnect();
        if self.inner.config().design_mode {
            trace!(collection = %self.id, host = %host.host_id(), "design mode; no lifetime observer");
            self.inner.associated_object_loaded(host);
            return Ok(());
        }
        let observer = WeakLifetimeObserver::observe(host, &self.registry, self.handle);
        *self.observer.borrow_mut() = Some(observer);
        debug!(collection = %self.id, host = %host.host_id(), "following host lifetime");
        Ok(())
    }

    /// Stop following the host and unload the inner collection.
    pub fn detach(&self) {
        self.disconnect();
        Attachable::detach(&*self.inner);
    }
}

impl Attachable for LoadableAttachableCollection {
    fn attachable_id(&self) -> AttachableId {
        self.id
    }

    fn attach(&self, host: &HostRef) -> AttachResult {
        LoadableAttachableCollection::attach(self, host)
    }

    fn detach(&self) {
        LoadableAttachableCollection::detach(self);
    }

    fn associated_host(&self) -> Option<HostRef> {
        self.inner.associated_host()
    }

    fn can_attach(&self, host: &HostRef) -> AttachResult {
        match self.inner.associated_host() {
            Some(current) if self.inner.is_loaded() && current.host_id() != host.host_id() => {
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

impl Drop for LoadableAttachableCollection {
    fn drop(&mut self) {
        self.disconnect();
        self.registry.invalidate(self.handle);
        if self.inner.config().trace_teardown {
            debug!(collection = %self.id, "loadable collection dropped");
        }
    }
}

impl fmt::Debug for LoadableAttachableCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadableAttachableCollection")
            .field("id", &self.id)
            .field("inner", &self.inner)
            .field("handle", &self.handle)
            .field("observing", &self.is_observing())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachable::AttachableRef;
    use crate::behavior::{Behavior, BehaviorAttachment};
    use behave_core::Host;
    use behave_core::testing::TestElement;
    use futures::executor::LocalPool;
    use std::cell::Cell;

    #[derive(Default)]
    struct Counts {
        attached: Cell<u32>,
        detaching: Cell<u32>,
    }

    impl Behavior for Counts {
        fn on_attached(&self, _host: &HostRef) {
            self.attached.set(self.attached.get() + 1);
        }
        fn on_detaching(&self, _host: &HostRef) {
            self.detaching.set(self.detaching.get() + 1);
        }
    }

    fn loadable() -> Rc<LoadableAttachableCollection> {
        LoadableAttachableCollection::from_collection(
            AttachableCollection::with_config(InteractivityConfig::new()),
            Rc::new(LifetimeRegistry::new()),
        )
    }

    fn element(pool: &LocalPool, name: &str) -> Rc<TestElement> {
        TestElement::new(name, Rc::new(pool.spawner()))
    }

    #[test]
    fn attach_waits_for_loaded_event() {
        let pool = LocalPool::new();
        let el = element(&pool, "row");
        let c = loadable();
        let b = BehaviorAttachment::new(Counts::default());
        c.collection().push(Rc::clone(&b) as AttachableRef).unwrap();

        c.attach(&el.host_ref()).unwrap();
        assert!(c.is_observing());
        assert!(!b.is_attached());

        el.load();
        assert!(c.is_loaded());
        assert!(b.is_attached());

        el.unload();
        assert!(!c.is_loaded());
        assert!(!b.is_attached());
        assert_eq!((b.behavior().attached.get(), b.behavior().detaching.get()), (1, 1));
    }

    #[test]
    fn recycles_onto_a_new_host() {
        let pool = LocalPool::new();
        let (h1, h2) = (element(&pool, "row-1"), element(&pool, "row-2"));
        let c = loadable();
        let b = BehaviorAttachment::new(Counts::default());
        c.collection().push(Rc::clone(&b) as AttachableRef).unwrap();

        c.attach(&h1.host_ref()).unwrap();
        h1.load();
        h1.unload();

        c.attach(&h2.host_ref()).unwrap();
        let late = BehaviorAttachment::new(Counts::default());
        c.collection().push(Rc::clone(&late) as AttachableRef).unwrap();
        assert!(!late.is_attached());

        h2.load();
        assert_eq!(b.associated_host().map(|h| h.host_id()), Some(h2.host_ref().host_id()));
        assert!(late.is_attached());

        // The old host no longer drives the collection.
        h1.load();
        assert_eq!(c.collection().associated_host().map(|h| h.host_id()), Some(h2.host_ref().host_id()));
        assert_eq!((h1.loaded().len(), h1.unloaded().len()), (0, 0));
    }

    #[test]
    fn attaching_elsewhere_while_loaded_fails() {
        let pool = LocalPool::new();
        let (h1, h2) = (element(&pool, "a"), element(&pool, "b"));
        let c = loadable();
        c.attach(&h1.host_ref()).unwrap();
        h1.load();

        let err = c.attach(&h2.host_ref()).unwrap_err();
        assert!(matches!(err, AttachError::AlreadyAttached { .. }));
        assert!(c.is_observing());
        assert!(c.attach(&h1.host_ref()).is_ok());
        assert_eq!(h1.loaded().len(), 1);
    }

    #[test]
    fn detach_disconnects_and_unloads() {
        let pool = LocalPool::new();
        let el = element(&pool, "row");
        let c = loadable();
        let b = BehaviorAttachment::new(Counts::default());
        c.collection().push(Rc::clone(&b) as AttachableRef).unwrap();
        c.attach(&el.host_ref()).unwrap();
        el.load();

        c.detach();
        assert!(!c.is_observing());
        assert!(!b.is_attached());
        el.unload();
        el.load();
        assert!(!b.is_attached());
    }

    #[test]
    fn dropped_collection_leaves_host_events_harmless() {
        let pool = LocalPool::new();
        let el = element(&pool, "row");
        let registry = Rc::new(LifetimeRegistry::new());
        let c = LoadableAttachableCollection::from_collection(
            AttachableCollection::with_config(InteractivityConfig::new()),
            Rc::clone(&registry),
        );
        let handle = c.handle();
        c.attach(&el.host_ref()).unwrap();
        let observer = WeakLifetimeObserver::observe(&el.host_ref(), &registry, handle);

        drop(c);
        assert!(registry.resolve(handle).is_none());
        assert_eq!(registry.live_count(), 0);
        el.load();
        el.unload();
        observer.disconnect();
    }

    #[test]
    fn design_mode_installs_no_observer() {
        let pool = LocalPool::new();
        let el = element(&pool, "row");
        let c = LoadableAttachableCollection::from_collection(
            AttachableCollection::with_config(InteractivityConfig::new().with_design_mode(true)),
            Rc::new(LifetimeRegistry::new()),
        );
        c.attach(&el.host_ref()).unwrap();
        assert!(!c.is_observing());
        assert_eq!(el.loaded().len(), 0);
        assert!(c.collection().associated_host().is_some());
    }
}
