#![forbid(unsafe_code)]

//! Core: the host capability surface that behaviors attach to.
//!
//! # Role in behave
//! `behave-core` defines what a UI element must expose for behaviors to be
//! bound to it without subclassing it. The element type itself is external;
//! this crate only names the narrow interface and ships the building blocks
//! a host embeds to satisfy it.
//!
//! # Primary responsibilities
//! - **Host**: identity, static type lineage, loaded/unloaded events, a
//!   context slot, a generic property store, and the UI dispatcher.
//! - **Observable**: the context slot, with ordered change notification.
//! - **EventSource**: delegate-style handler lists with removal by id.
//! - **PropertyStore**: keyed bookkeeping with change subscriptions.
//! - **context_handlers**: a context-changed handler chain kept in the
//!   host's property store.
//!
//! # How it fits in the system
//! `behave-runtime` builds the attach/detach state machines, collections and
//! lifetime observers on top of these types. Nothing here owns a host; hosts
//! own their events and slots and hand out borrows.

pub mod config;
pub mod context_handlers;
pub mod event;
pub mod host;
pub mod logging;
pub mod observable;
pub mod property;
pub mod value;

#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;

pub use config::InteractivityConfig;
pub use context_handlers::{
    ContextChange, add_context_changed_handler, context_changed_handler_count,
    remove_context_changed_handler,
};
pub use event::{EventSource, HandlerId};
pub use host::{ContextSlot, Dispatcher, ELEMENT, Host, HostId, HostRef, HostType, WeakHostRef};
pub use observable::{Observable, Subscription};
pub use property::{PropertyChange, PropertyKey, PropertyMap, PropertyStore};
pub use value::Value;

// Re-export tracing macros at crate root for ergonomic use.
#[cfg(feature = "tracing")]
pub use logging::{debug, error, info, trace, warn};
