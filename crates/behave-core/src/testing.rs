#![forbid(unsafe_code)]

//! Reference host element for tests.
//!
//! [`TestElement`] implements [`Host`] with in-memory events, a context slot
//! and a [`PropertyMap`]. Tests drive it by hand: `load()`/`unload()` raise
//! the lifetime events, `set_context()` writes the context slot. Pair it with
//! a `futures::executor::LocalPool` whose spawner is the dispatcher, and run
//! `run_until_stalled()` wherever the real UI queue would take a turn.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::event::EventSource;
use crate::host::{ContextSlot, Dispatcher, ELEMENT, Host, HostId, HostRef, HostType};
use crate::observable::Observable;
use crate::property::{PropertyMap, PropertyStore};
use crate::value::Value;

/// In-memory host element.
pub struct TestElement {
    id: HostId,
    name: String,
    host_type: &'static HostType,
    loaded: EventSource<()>,
    unloaded: EventSource<()>,
    context: ContextSlot,
    properties: PropertyMap,
    dispatcher: Dispatcher,
    live: Cell<bool>,
}

impl TestElement {
    /// Element of the root [`ELEMENT`] type.
    pub fn new(name: impl Into<String>, dispatcher: Dispatcher) -> Rc<Self> {
        Self::with_type(name, &ELEMENT, dispatcher)
    }

    /// Element of a specific type.
    pub fn with_type(
        name: impl Into<String>,
        host_type: &'static HostType,
        dispatcher: Dispatcher,
    ) -> Rc<Self> {
        Rc::new(Self {
            id: HostId::next(),
            name: name.into(),
            host_type,
            loaded: EventSource::new(),
            unloaded: EventSource::new(),
            context: Observable::new(None),
            properties: PropertyMap::new(),
            dispatcher,
            live: Cell::new(false),
        })
    }

    /// Name given at construction.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the element is in the live tree.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live.get()
    }

    /// Enter the live tree and raise `loaded`.
    pub fn load(&self) {
        self.live.set(true);
        self.loaded.raise(&());
    }

    /// Leave the live tree and raise `unloaded`.
    pub fn unload(&self) {
        self.live.set(false);
        self.unloaded.raise(&());
    }

    /// Write the context slot.
    pub fn set_context(&self, value: Option<Value>) {
        self.context.set(value);
    }

    /// The concrete property store.
    #[must_use]
    pub fn property_map(&self) -> &PropertyMap {
        &self.properties
    }

    /// Upcast a shared element to a [`HostRef`].
    #[must_use]
    pub fn host_ref(self: &Rc<Self>) -> HostRef {
        Rc::clone(self) as HostRef
    }
}

impl Host for TestElement {
    fn host_id(&self) -> HostId {
        self.id
    }

    fn host_type(&self) -> &'static HostType {
        self.host_type
    }

    fn loaded(&self) -> &EventSource<()> {
        &self.loaded
    }

    fn unloaded(&self) -> &EventSource<()> {
        &self.unloaded
    }

    fn context(&self) -> &ContextSlot {
        &self.context
    }

    fn properties(&self) -> &dyn PropertyStore {
        &self.properties
    }

    fn dispatcher(&self) -> Dispatcher {
        Rc::clone(&self.dispatcher)
    }
}

impl fmt::Debug for TestElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestElement")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("type", &self.host_type.name())
            .field("live", &self.live.get())
            .finish_non_exhaustive()
    }
}
