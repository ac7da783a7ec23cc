#![forbid(unsafe_code)]

//! Context-changed handler chain kept in a host's property store.
//!
//! The first [`add_context_changed_handler`] on a host creates a chain under
//! a private property key, together with one forwarding subscription on the
//! host's context slot. Every later handler joins that chain. When the last
//! handler is removed the key is cleared, which drops the chain and its
//! forwarding subscription, so an element nobody listens to carries nothing.
//!
//! Handlers receive a [`ContextChange`] with the previous and the new
//! context, in registration order.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::LazyLock;

#[cfg(feature = "tracing")]
use crate::logging::trace;
#[cfg(not(feature = "tracing"))]
use crate::trace;

use crate::event::{EventSource, HandlerId};
use crate::host::Host;
use crate::observable::Subscription;
use crate::property::PropertyKey;
use crate::value::Value;

static CONTEXT_CHANGED_CHAIN: LazyLock<PropertyKey> =
    LazyLock::new(|| PropertyKey::register("ContextChangedHandlers"));

/// A context transition on a host.
#[derive(Debug, Clone)]
pub struct ContextChange {
    pub old: Option<Value>,
    pub new: Option<Value>,
}

struct HandlerChain {
    handlers: EventSource<ContextChange>,
    forward: RefCell<Option<Subscription>>,
}

fn chain_for(host: &dyn Host) -> Option<Rc<HandlerChain>> {
    host.properties()
        .get(*CONTEXT_CHANGED_CHAIN)?
        .downcast_rc::<HandlerChain>()
}

fn install_chain(host: &dyn Host) -> Rc<HandlerChain> {
    let chain = Rc::new(HandlerChain {
        handlers: EventSource::new(),
        forward: RefCell::new(None),
    });
    let weak = Rc::downgrade(&chain);
    let forward = host.context().subscribe(move |old, new| {
        if let Some(chain) = weak.upgrade() {
            chain.handlers.raise(&ContextChange {
                old: old.clone(),
                new: new.clone(),
            });
        }
    });
    *chain.forward.borrow_mut() = Some(forward);
    host.properties()
        .set(*CONTEXT_CHANGED_CHAIN, Value::from_rc(Rc::clone(&chain)));
    trace!(host = %host.host_id(), "context handler chain installed");
    chain
}

/// Register `handler` for every context change on `host`.
pub fn add_context_changed_handler(
    host: &dyn Host,
    handler: impl Fn(&ContextChange) + 'static,
) -> HandlerId {
    let chain = chain_for(host).unwrap_or_else(|| install_chain(host));
    chain.handlers.subscribe(handler)
}

/// Remove a handler added by [`add_context_changed_handler`].
///
/// Returns `false` if `id` is not registered on `host`.
pub fn remove_context_changed_handler(host: &dyn Host, id: HandlerId) -> bool {
    let Some(chain) = chain_for(host) else {
        return false;
    };
    let removed = chain.handlers.unsubscribe(id);
    if chain.handlers.is_empty() {
        host.properties().clear(*CONTEXT_CHANGED_CHAIN);
        let forward = chain.forward.borrow_mut().take();
        drop(forward);
        trace!(host = %host.host_id(), "context handler chain cleared");
    }
    removed
}

/// Number of handlers currently chained on `host`.
#[must_use]
pub fn context_changed_handler_count(host: &dyn Host) -> usize {
    chain_for(host).map_or(0, |chain| chain.handlers.len())
}
