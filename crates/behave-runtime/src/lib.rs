#![forbid(unsafe_code)]

//! Runtime: lifecycle machinery for behaviors bound to host elements.
//!
//! # Role in behave
//! `behave-runtime` binds reusable behavior objects to hosts described by
//! `behave-core`, and keeps those bindings right while item containers
//! recycle hosts underneath them.
//!
//! # Primary responsibilities
//! - **BehaviorAttachment**: attach/detach state machine for one behavior,
//!   with type-constrained attach and a standing context mirror.
//! - **ContextReadyNotifier**: one-shot future for a host's first context.
//! - **AttachableCollection**: ordered members that attach and detach with
//!   the collection's load state, in sequence order.
//! - **LoadableAttachableCollection**: a collection driven by its host's
//!   loaded/unloaded events through a [`WeakLifetimeObserver`].
//! - **LifetimeRegistry**: generational arena of weak lifetime targets.
//!
//! # Architecture
//!
//! Everything runs on the host's single UI thread. The only suspension point
//! is the first context mirror, which is spawned on the host's dispatcher
//! and resumes on a later turn of the same queue. Continuations are gated by
//! an epoch so a detach before resumption makes them no-ops.
//!
//! # Errors
//!
//! Only [`AttachError`] ever reaches a caller, always synchronously from an
//! attach or membership call.

pub mod attachable;
pub mod behavior;
pub mod collection;
pub mod error;
pub mod lifetime;
pub mod loadable;
pub mod notifier;
pub mod sequence;

pub use attachable::{Attachable, AttachableId, AttachableRef};
pub use behavior::{AttachState, Behavior, BehaviorAttachment};
pub use collection::{AttachableCollection, CollectionHooks};
pub use error::{AttachError, AttachResult};
pub use lifetime::{LifetimeRegistry, LifetimeTarget, TargetHandle, WeakLifetimeObserver};
pub use loadable::LoadableAttachableCollection;
pub use notifier::{ContextReady, ContextReadyNotifier, ReadyCanceller};
pub use sequence::{ObservableSequence, SequenceChange};
