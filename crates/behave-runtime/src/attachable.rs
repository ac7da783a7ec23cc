#![forbid(unsafe_code)]

//! The attach/detach contract shared by behaviors and collections.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use behave_core::HostRef;

use crate::error::AttachResult;

static NEXT_ATTACHABLE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of an attachable object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttachableId(u64);

impl AttachableId {
    /// Allocate a fresh id.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_ATTACHABLE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AttachableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attachable#{}", self.0)
    }
}

/// Something that can be bound to at most one host at a time.
///
/// # Contract
///
/// - `attach(h)` when already attached to `h` is `Ok(())` and does nothing.
/// - `attach(h)` when attached to another host fails with
///   [`AttachError::AlreadyAttached`](crate::AttachError::AlreadyAttached)
///   and leaves the current binding intact.
/// - `detach()` when not attached does nothing.
pub trait Attachable {
    /// Identity used for membership and "same item" checks.
    fn attachable_id(&self) -> AttachableId;

    /// Bind to `host`.
    fn attach(&self, host: &HostRef) -> AttachResult;

    /// Release the current host, if any.
    fn detach(&self);

    /// The host currently bound, if any.
    fn associated_host(&self) -> Option<HostRef>;

    /// Check whether `attach(host)` would succeed, without side effects.
    fn can_attach(&self, host: &HostRef) -> AttachResult {
        match self.associated_host() {
            Some(current) if current.host_id() != host.host_id() => {
                Err(crate::AttachError::AlreadyAttached {
                    item: self.attachable_id(),
                    current: Some(current.host_id()),
                    requested: Some(host.host_id()),
                })
            }
            _ => Ok(()),
        }
    }
}

/// Shared handle to a heterogeneous attachable item.
pub type AttachableRef = Rc<dyn Attachable>;
