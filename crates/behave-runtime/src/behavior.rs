#![forbid(unsafe_code)]

//! Attach/detach state machine for a single behavior.
//!
//! A [`BehaviorAttachment`] wraps a user [`Behavior`] and binds it to at most
//! one host at a time. On attach it records the host, announces the change,
//! and starts mirroring the host's context into its own context slot: the
//! first value comes through a [`ContextReady`](crate::ContextReady) future,
//! and from then on a standing context-changed handler keeps the mirror in
//! sync until detach.
//!
//! ```text
//! Detached ──attach──▶ Attaching ──▶ Attached ──detach──▶ Detaching ──▶ Detached
//! ```
//!
//! # Hook order
//!
//! - Context already present on the host: `on_data_context_changed` runs
//!   synchronously inside `attach`, then `on_attached`.
//! - Context still empty: `on_attached` runs inside `attach`; the first
//!   `on_data_context_changed` follows on a later turn of the host's
//!   dispatcher.
//!
//! # Invariants
//!
//! 1. A host is recorded only while the state is not `Detached`.
//! 2. Type and already-attached checks run before any state changes.
//! 3. Every asynchronous continuation carries the epoch it was started in
//!    and does nothing once attach or detach has moved the epoch on. A
//!    detached behavior never sees `on_data_context_changed`.
//! 4. The host is held strongly only between attach and detach.
//!    Continuations and handlers installed on the host hold the attachment
//!    weakly.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use behave_core::{
    ContextSlot, ELEMENT, EventSource, HandlerId, HostRef, HostType, InteractivityConfig,
    Observable, Value, add_context_changed_handler, remove_context_changed_handler,
};
use futures::future::{AbortHandle, abortable};
use futures::task::LocalSpawnExt;
use tracing::{debug, trace, warn};

use crate::attachable::{Attachable, AttachableId};
use crate::error::{AttachError, AttachResult};
use crate::notifier::{ContextReadyNotifier, ReadyCanceller};

/// User-supplied behavior logic. Every hook defaults to a no-op.
///
/// Hooks take `&self`; behaviors keep their own state in cells.
pub trait Behavior: 'static {
    /// The host type this behavior requires.
    fn type_constraint(&self) -> &'static HostType {
        &ELEMENT
    }

    /// Called once per attach, after the context mirror has been requested.
    fn on_attached(&self, _host: &HostRef) {}

    /// Called once per detach, while the host is still recorded.
    fn on_detaching(&self, _host: &HostRef) {}

    /// Called whenever the mirrored context changes while attached.
    fn on_data_context_changed(&self, _old: Option<&Value>, _new: Option<&Value>) {}
}

/// Where a [`BehaviorAttachment`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AttachState {
    #[default]
    Detached,
    Attaching,
    Attached,
    Detaching,
}

struct PendingMirror {
    abort: AbortHandle,
    cancel: ReadyCanceller,
}

impl PendingMirror {
    fn stop(self) {
        self.cancel.cancel();
        self.abort.abort();
    }
}

/// A behavior plus its binding to (at most) one host.
pub struct BehaviorAttachment<B: Behavior> {
    id: AttachableId,
    this: Weak<Self>,
    behavior: B,
    constraint: &'static HostType,
    state: Cell<AttachState>,
    host: RefCell<Option<HostRef>>,
    context: ContextSlot,
    pending: RefCell<Option<PendingMirror>>,
    binding: Cell<Option<HandlerId>>,
    epoch: Cell<u64>,
    associated_changed: EventSource<()>,
}

impl<B: Behavior> BehaviorAttachment<B> {
    /// Wrap `behavior`, constrained to the type it declares.
    pub fn new(behavior: B) -> Rc<Self> {
        let constraint = behavior.type_constraint();
        Self::with_constraint(behavior, constraint)
    }

    /// Wrap `behavior` with an explicit type constraint.
    pub fn with_constraint(behavior: B, constraint: &'static HostType) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            id: AttachableId::next(),
            this: this.clone(),
            behavior,
            constraint,
            state: Cell::new(AttachState::Detached),
            host: RefCell::new(None),
            context: Observable::new(None),
            pending: RefCell::new(None),
            binding: Cell::new(None),
            epoch: Cell::new(0),
            associated_changed: EventSource::new(),
        })
    }

    #[must_use]
    pub fn id(&self) -> AttachableId {
        self.id
    }

    #[must_use]
    pub fn behavior(&self) -> &B {
        &self.behavior
    }

    #[must_use]
    pub fn type_constraint(&self) -> &'static HostType {
        self.constraint
    }

    #[must_use]
    pub fn state(&self) -> AttachState {
        self.state.get()
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.host.borrow().is_some()
    }

    /// The host currently bound, if any.
    #[must_use]
    pub fn associated_host(&self) -> Option<HostRef> {
        self.host.borrow().clone()
    }

    /// The mirrored host context.
    #[must_use]
    pub fn context(&self) -> Option<Value> {
        self.context.get()
    }

    /// The mirror slot itself, for subscribing to changes.
    #[must_use]
    pub fn context_slot(&self) -> &ContextSlot {
        &self.context
    }

    /// Register for "associated object changed", raised after a host is
    /// recorded and after it is cleared.
    pub fn on_associated_object_changed(&self, handler: impl Fn(&()) + 'static) -> HandlerId {
        self.associated_changed.subscribe(handler)
    }

    pub fn remove_associated_object_changed(&self, id: HandlerId) -> bool {
        self.associated_changed.unsubscribe(id)
    }

    fn check_attach(&self, host: &HostRef) -> Result<bool, AttachError> {
        if let Some(current) = self.associated_host() {
            if current.host_id() == host.host_id() {
                return Ok(false);
            }
            return Err(AttachError::AlreadyAttached {
                item: self.id,
                current: Some(current.host_id()),
                requested: Some(host.host_id()),
            });
        }
        let actual = host.host_type();
        if !actual.is_assignable_to(self.constraint) {
            return Err(AttachError::TypeConstraint {
                required: self.constraint.name(),
                actual: actual.name(),
            });
        }
        Ok(true)
    }

    /// Bind to `host`.
    ///
    /// # Errors
    ///
    /// [`AttachError::AlreadyAttached`] if bound to another host,
    /// [`AttachError::TypeConstraint`] if `host` does not satisfy the
    /// constraint. Neither changes any state.
    pub fn attach(&self, host: &HostRef) -> AttachResult {
        if !self.check_attach(host)? {
            return Ok(());
        }

        let epoch = self.advance_epoch();
        self.state.set(AttachState::Attaching);
        *self.host.borrow_mut() = Some(Rc::clone(host));
        debug!(item = %self.id, host = %host.host_id(), "behavior attaching");
        self.associated_changed.raise(&());
        if !self.is_current(epoch) {
            return Ok(());
        }

        self.begin_mirror(host, epoch);
        if self.is_current(epoch) {
            self.state.set(AttachState::Attached);
            self.behavior.on_attached(host);
        }
        Ok(())
    }

    /// Release the current host. Does nothing when detached.
    pub fn detach(&self) {
        let Some(host) = self.associated_host() else {
            return;
        };
        let was = self.state.replace(AttachState::Detaching);
        if was == AttachState::Detaching {
            return;
        }
        self.advance_epoch();
        self.release_host_links(&host);

        // An attach cut short before `on_attached` gets no `on_detaching`.
        if was == AttachState::Attached {
            self.behavior.on_detaching(&host);
        }

        *self.host.borrow_mut() = None;
        self.context.set(None);
        self.state.set(AttachState::Detached);
        debug!(item = %self.id, host = %host.host_id(), "behavior detached");
        self.associated_changed.raise(&());
    }

    fn advance_epoch(&self) -> u64 {
        let next = self.epoch.get().wrapping_add(1);
        self.epoch.set(next);
        next
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.epoch.get() == epoch
    }

    fn release_host_links(&self, host: &HostRef) {
        let pending = self.pending.borrow_mut().take();
        if let Some(pending) = pending {
            pending.stop();
        }
        if let Some(id) = self.binding.take() {
            remove_context_changed_handler(&**host, id);
        }
    }

    fn begin_mirror(&self, host: &HostRef, epoch: u64) {
        let ready = ContextReadyNotifier::new(host).wait_for_context();
        if let Some(value) = ready.peek() {
            self.complete_mirror(epoch, value);
            return;
        }

        let cancel = ready.canceller();
        let (ready, abort) = abortable(ready);
        let weak = self.this.clone();
        let task = async move {
            let Ok(value) = ready.await else {
                return;
            };
            if let Some(this) = weak.upgrade() {
                this.complete_mirror(epoch, value);
            }
        };
        match host.dispatcher().spawn_local(task) {
            Ok(()) => *self.pending.borrow_mut() = Some(PendingMirror { abort, cancel }),
            Err(err) => {
                cancel.cancel();
                warn!(item = %self.id, host = %host.host_id(), error = %err,
                    "dispatcher refused context mirror task");
            }
        }
    }

    fn complete_mirror(&self, epoch: u64, value: Value) {
        if !self.is_current(epoch) {
            trace!(item = %self.id, "stale context mirror dropped");
            return;
        }
        self.pending.borrow_mut().take();
        let Some(host) = self.associated_host() else {
            return;
        };

        self.mirror(Some(value));
        if !self.is_current(epoch) {
            return;
        }

        let weak = self.this.clone();
        let id = add_context_changed_handler(&*host, move |change| {
            if let Some(this) = weak.upgrade() {
                if this.is_current(epoch) {
                    this.mirror(change.new.clone());
                }
            }
        });
        self.binding.set(Some(id));
        // Catch up with anything that changed between resolution and now.
        self.mirror(host.context().get());
    }

    fn mirror(&self, new: Option<Value>) {
        let old = self.context.get();
        if old == new {
            return;
        }
        self.context.set(new.clone());
        self.behavior
            .on_data_context_changed(old.as_ref(), new.as_ref());
    }
}

impl<B: Behavior> Attachable for BehaviorAttachment<B> {
    fn attachable_id(&self) -> AttachableId {
        self.id
    }

    fn attach(&self, host: &HostRef) -> AttachResult {
        BehaviorAttachment::attach(self, host)
    }

    fn detach(&self) {
        BehaviorAttachment::detach(self);
    }

    fn associated_host(&self) -> Option<HostRef> {
        BehaviorAttachment::associated_host(self)
    }

    fn can_attach(&self, host: &HostRef) -> AttachResult {
        self.check_attach(host).map(|_| ())
    }
}

impl<B: Behavior> Drop for BehaviorAttachment<B> {
    fn drop(&mut self) {
        if let Some(host) = self.host.get_mut().take() {
            self.release_host_links(&host);
        }
        if InteractivityConfig::current().trace_teardown {
            debug!(item = %self.id, behavior = std::any::type_name::<B>(), "behavior dropped");
        }
    }
}

impl<B: Behavior> fmt::Debug for BehaviorAttachment<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BehaviorAttachment")
            .field("id", &self.id)
            .field("behavior", &std::any::type_name::<B>())
            .field("constraint", &self.constraint.name())
            .field("state", &self.state.get())
            .field("host", &self.host.borrow().as_ref().map(|h| h.host_id()))
            .finish_non_exhaustive()
    }
}
