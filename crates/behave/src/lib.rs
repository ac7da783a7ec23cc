#![forbid(unsafe_code)]

//! behave public facade crate.
//!
//! Attach reusable behaviors to host elements without subclassing them.
//! The [`prelude`] brings in the types most callers need.

pub use behave_core as core;
#[cfg(feature = "harness")]
pub use behave_harness as harness;
pub use behave_runtime as runtime;

pub mod prelude {
    pub use behave_core::{
        Dispatcher, ELEMENT, Host, HostId, HostRef, HostType, InteractivityConfig, Value,
    };
    pub use behave_runtime::{
        AttachError, AttachResult, AttachState, Attachable, AttachableCollection, AttachableRef,
        Behavior, BehaviorAttachment, CollectionHooks, ContextReadyNotifier,
        LoadableAttachableCollection,
    };
}
