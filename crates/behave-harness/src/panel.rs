#![forbid(unsafe_code)]

//! Simulated virtualizing item container.
//!
//! A [`VirtualizingPanel`] owns a fixed number of containers, each carrying
//! a [`LoadableAttachableCollection`] of behaviors built once from a
//! template. Scrolling realizes a window of items; containers leaving the
//! window are recycled for items entering it, the way list controls reuse
//! their children:
//!
//! - [`RecycleMode::ReuseElement`]: the container's element is unloaded,
//!   given the new item as context, and loaded again.
//! - [`RecycleMode::FreshElement`]: the old element is unloaded and a new
//!   element takes its place; the behavior collection moves to it.
//!
//! With [`PanelConfig::skip_unload`] the old element is never unloaded,
//! reproducing hosts that drop the unload notification. The collection then
//! cannot be re-attached normally, so the panel wires a raw
//! [`WeakLifetimeObserver`] to the new element and relies on the
//! collection's missed-unload recovery.
//!
//! Nothing here lays anything out.

use std::rc::Rc;

use behave_core::testing::TestElement;
use behave_core::{Dispatcher, InteractivityConfig, Value};
use behave_runtime::{
    AttachError, AttachResult, AttachableCollection, AttachableRef, LifetimeRegistry,
    LoadableAttachableCollection, WeakLifetimeObserver,
};
use tracing::debug;

use crate::behaviors::RecordingHooks;
use crate::log::{EventKind, LifecycleLog};

/// How a container gets its next host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecycleMode {
    ReuseElement,
    #[default]
    FreshElement,
}

/// Panel behavior switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelConfig {
    /// Number of containers (and realized items).
    pub viewport: usize,
    pub recycle: RecycleMode,
    /// Replace elements without unloading the old one.
    pub skip_unload: bool,
    /// Set the item context after `loaded` instead of before it.
    pub context_after_load: bool,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            viewport: 3,
            recycle: RecycleMode::FreshElement,
            skip_unload: false,
            context_after_load: false,
        }
    }
}

impl PanelConfig {
    #[must_use]
    pub fn with_viewport(mut self, viewport: usize) -> Self {
        self.viewport = viewport;
        self
    }

    #[must_use]
    pub fn with_recycle(mut self, recycle: RecycleMode) -> Self {
        self.recycle = recycle;
        self
    }

    #[must_use]
    pub fn with_skip_unload(mut self, skip: bool) -> Self {
        self.skip_unload = skip;
        self
    }

    #[must_use]
    pub fn with_context_after_load(mut self, after: bool) -> Self {
        self.context_after_load = after;
        self
    }
}

struct Container {
    element: Rc<TestElement>,
    behaviors: Rc<LoadableAttachableCollection>,
    item: Option<usize>,
    generation: u32,
    uses: u32,
    forced: Vec<WeakLifetimeObserver>,
}

/// Fixed pool of containers recycled over a list of items.
pub struct VirtualizingPanel {
    dispatcher: Dispatcher,
    registry: Rc<LifetimeRegistry>,
    items: Vec<Value>,
    config: PanelConfig,
    containers: Vec<Container>,
    retired: Vec<Rc<TestElement>>,
    log: LifecycleLog,
    first: usize,
}

impl VirtualizingPanel {
    /// Build `config.viewport` containers; `template(slot)` supplies each
    /// container's behaviors.
    ///
    /// # Errors
    ///
    /// Propagates a template that yields a duplicate member.
    pub fn new(
        dispatcher: Dispatcher,
        items: Vec<Value>,
        config: PanelConfig,
        log: &LifecycleLog,
        template: impl Fn(usize) -> Vec<AttachableRef>,
    ) -> Result<Self, AttachError> {
        let registry = Rc::new(LifetimeRegistry::new());
        let mut containers = Vec::with_capacity(config.viewport);
        for slot in 0..config.viewport {
            let inner = AttachableCollection::with_config_and_hooks(
                InteractivityConfig::new(),
                Box::new(RecordingHooks::new(format!("slot{slot}"), log)),
            );
            for member in template(slot) {
                inner.push(member)?;
            }
            let behaviors =
                LoadableAttachableCollection::from_collection(inner, Rc::clone(&registry));
            let element = TestElement::new(element_name(slot, 0), Rc::clone(&dispatcher));
            behaviors.attach(&element.host_ref())?;
            containers.push(Container {
                element,
                behaviors,
                item: None,
                generation: 0,
                uses: 0,
                forced: Vec::new(),
            });
        }
        Ok(Self {
            dispatcher,
            registry,
            items,
            config,
            containers,
            retired: Vec::new(),
            log: log.clone(),
            first: 0,
        })
    }

    #[must_use]
    pub fn config(&self) -> PanelConfig {
        self.config
    }

    #[must_use]
    pub fn first(&self) -> usize {
        self.first
    }

    #[must_use]
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn container_count(&self) -> usize {
        self.containers.len()
    }

    #[must_use]
    pub fn registry(&self) -> &Rc<LifetimeRegistry> {
        &self.registry
    }

    /// Current element of `slot`.
    #[must_use]
    pub fn element(&self, slot: usize) -> Option<Rc<TestElement>> {
        self.containers.get(slot).map(|c| Rc::clone(&c.element))
    }

    #[must_use]
    pub fn behaviors(&self, slot: usize) -> Option<&Rc<LoadableAttachableCollection>> {
        self.containers.get(slot).map(|c| &c.behaviors)
    }

    /// Item realized in each slot.
    #[must_use]
    pub fn realized(&self) -> Vec<Option<usize>> {
        self.containers.iter().map(|c| c.item).collect()
    }

    /// Elements replaced while `skip_unload` was set; still loaded.
    #[must_use]
    pub fn retired(&self) -> &[Rc<TestElement>] {
        &self.retired
    }

    /// Realize items `first..first + viewport`.
    ///
    /// # Errors
    ///
    /// Propagates attach errors other than the already-attached case that
    /// `skip_unload` produces on purpose.
    pub fn scroll_to(&mut self, first: usize) -> AttachResult {
        self.first = first;
        for slot in 0..self.containers.len() {
            let target = first + slot;
            let want = (target < self.items.len()).then_some(target);
            if self.containers[slot].item == want {
                continue;
            }
            self.recycle(slot, want)?;
        }
        Ok(())
    }

    fn recycle(&mut self, slot: usize, want: Option<usize>) -> AttachResult {
        let config = self.config;
        let container = &mut self.containers[slot];
        debug!(slot, from = ?container.item, to = ?want, "recycling container");

        if container.item.is_some() && !config.skip_unload {
            self.log.record(
                EventKind::HostUnloaded,
                container.element.name(),
                Some(container.element.host_ref().host_id()),
                None,
            );
            container.element.unload();
        }
        container.item = want;
        let Some(index) = want else {
            return Ok(());
        };

        let reused = container.uses > 0;
        container.uses += 1;
        if config.recycle == RecycleMode::FreshElement && reused {
            container.generation += 1;
            let fresh = TestElement::new(
                element_name(slot, container.generation),
                Rc::clone(&self.dispatcher),
            );
            let old = std::mem::replace(&mut container.element, fresh);
            if config.skip_unload && old.is_live() {
                self.retired.push(old);
            }
            let host = container.element.host_ref();
            match container.behaviors.attach(&host) {
                Ok(()) => {}
                Err(AttachError::AlreadyAttached { .. }) if config.skip_unload => {
                    let observer = WeakLifetimeObserver::observe(
                        &host,
                        &self.registry,
                        container.behaviors.handle(),
                    );
                    container.forced.push(observer);
                }
                Err(err) => return Err(err),
            }
        }

        let element = Rc::clone(&container.element);
        let context = self.items[index].clone();
        if !config.context_after_load {
            element.set_context(Some(context.clone()));
        }
        self.log.record(
            EventKind::HostLoaded,
            element.name(),
            Some(element.host_ref().host_id()),
            Some(format!("item {index}")),
        );
        element.load();
        if config.context_after_load {
            element.set_context(Some(context));
        }
        Ok(())
    }

    /// Unload every realized container.
    pub fn unload_all(&mut self) {
        for container in &mut self.containers {
            if container.item.take().is_some() {
                self.log.record(
                    EventKind::HostUnloaded,
                    container.element.name(),
                    Some(container.element.host_ref().host_id()),
                    None,
                );
                container.element.unload();
            }
        }
    }

    /// Number of raw observers wired by `skip_unload` recycling.
    #[must_use]
    pub fn forced_observers(&self) -> usize {
        self.containers.iter().map(|c| c.forced.len()).sum()
    }
}

fn element_name(slot: usize, generation: u32) -> String {
    format!("container{slot}.{generation}")
}

impl std::fmt::Debug for VirtualizingPanel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualizingPanel")
            .field("items", &self.items.len())
            .field("config", &self.config)
            .field("realized", &self.realized())
            .field("first", &self.first)
            .finish_non_exhaustive()
    }
}
