#![forbid(unsafe_code)]

//! Attach-time failures.
//!
//! Only two conditions ever reach a caller, and both are raised
//! synchronously at the attach call site before any state is touched:
//! attaching something that already has a different host, and attaching to
//! a host that does not satisfy the declared type constraint. Everything
//! else (a lifetime target that has gone away, a duplicate or missing
//! unload) is handled where it happens.

use std::fmt;

use behave_core::HostId;

use crate::attachable::AttachableId;

/// Result of an attach or membership operation.
pub type AttachResult = Result<(), AttachError>;

/// Why an attach was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachError {
    /// The item is already bound elsewhere; detach it first.
    ///
    /// `current` is `None` when the item is a member of an unloaded
    /// collection; `requested` is `None` when the collection it is being
    /// added to has no host yet.
    AlreadyAttached {
        item: AttachableId,
        current: Option<HostId>,
        requested: Option<HostId>,
    },
    /// The host's type does not satisfy the item's constraint.
    TypeConstraint {
        required: &'static str,
        actual: &'static str,
    },
}

impl fmt::Display for AttachError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyAttached {
                item,
                current,
                requested,
            } => {
                write!(f, "{item} is already attached")?;
                match current {
                    Some(host) => write!(f, " to {host}")?,
                    None => write!(f, " to this collection")?,
                }
                if let Some(host) = requested {
                    write!(f, "; cannot attach to {host}")?;
                }
                Ok(())
            }
            Self::TypeConstraint { required, actual } => {
                write!(f, "type constraint violated: requires {required}, host is {actual}")
            }
        }
    }
}

impl std::error::Error for AttachError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_already_attached() {
        let err = AttachError::AlreadyAttached {
            item: AttachableId::next(),
            current: Some(HostId::next()),
            requested: Some(HostId::next()),
        };
        let msg = err.to_string();
        assert!(msg.contains("already attached to host#"));
        assert!(msg.contains("cannot attach to host#"));
    }

    #[test]
    fn display_duplicate_membership() {
        let err = AttachError::AlreadyAttached {
            item: AttachableId::next(),
            current: None,
            requested: None,
        };
        assert!(err.to_string().ends_with("already attached to this collection"));
    }

    #[test]
    fn display_type_constraint() {
        let err = AttachError::TypeConstraint {
            required: "Button",
            actual: "Panel",
        };
        assert_eq!(
            err.to_string(),
            "type constraint violated: requires Button, host is Panel"
        );
    }
}
