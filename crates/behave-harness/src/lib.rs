#![forbid(unsafe_code)]

//! Harness: reference fixtures and recycling scenarios for behave.
//!
//! # Role in behave
//! `behave-harness` drives `behave-runtime` the way a list control would:
//! it owns containers, recycles them across scroll positions, and records
//! every lifecycle hook into a [`LifecycleLog`] that tests assert on and can
//! export as JSONL.
//!
//! # Modules
//! - [`log`]: ordered event recorder with JSONL export.
//! - [`behaviors`]: recording behaviors, stamp behaviors, recording hooks.
//! - [`panel`]: [`VirtualizingPanel`], a fixed pool of recycled containers.

pub mod behaviors;
pub mod log;
pub mod panel;

pub use behaviors::{
    RecordingBehavior, RecordingHooks, STAMPS, StampBehavior, describe_context, stamps,
};
pub use log::{EventKind, LifecycleEvent, LifecycleLog, read_jsonl};
pub use panel::{PanelConfig, RecycleMode, VirtualizingPanel};
