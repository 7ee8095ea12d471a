//! Error taxonomy for lodestore
//!
//! Three kinds, closed at every boundary:
//! - `IllegalArgument`: malformed caller input, always detected before mutation
//! - `Runtime`: violation of a registered contract (unknown resource, missing
//!   identifying field, unknown adapter)
//! - `Unhandled`: anything else raised while merging, diffing or fetching
//!
//! Synchronous APIs return these directly; `find` carries them through its
//! future. `Runtime` errors are never re-wrapped.

use thiserror::Error;

/// Result alias used across all lodestore crates.
pub type Result<T> = std::result::Result<T, StoreError>;

/// The closed error taxonomy surfaced to callers.
///
/// The enum is `Clone` so errors can flow through shared (fan-out) futures
/// during fetch de-duplication.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Caller input has the wrong shape or type.
    #[error("{message}")]
    IllegalArgument {
        /// What was malformed.
        message: String,
        /// Expected vs. actual, when known.
        detail: Option<String>,
    },

    /// A registered contract was violated.
    #[error("{0}")]
    Runtime(String),

    /// Unexpected failure wrapped to keep the taxonomy closed.
    #[error("unhandled error: {0}")]
    Unhandled(String),
}

impl StoreError {
    /// Malformed caller input.
    pub fn illegal_argument(message: impl Into<String>) -> Self {
        StoreError::IllegalArgument {
            message: message.into(),
            detail: None,
        }
    }

    /// Malformed caller input with an expected/actual description.
    pub fn illegal_argument_with_detail(
        message: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        StoreError::IllegalArgument {
            message: message.into(),
            detail: Some(detail.into()),
        }
    }

    /// Contract violation (unregistered resource, missing identifying
    /// field, unregistered adapter).
    pub fn runtime(message: impl Into<String>) -> Self {
        StoreError::Runtime(message.into())
    }

    /// Wrap an arbitrary failure.
    pub fn unhandled(cause: impl std::fmt::Display) -> Self {
        StoreError::Unhandled(cause.to_string())
    }

    /// The standard error for an unknown resource name.
    pub fn unregistered_resource(name: &str) -> Self {
        StoreError::Runtime(format!("{name} is not a registered resource"))
    }

    /// True for the `Runtime` kind.
    pub fn is_runtime(&self) -> bool {
        matches!(self, StoreError::Runtime(_))
    }

    /// True for the `IllegalArgument` kind.
    pub fn is_illegal_argument(&self) -> bool {
        matches!(self, StoreError::IllegalArgument { .. })
    }

    /// Re-wrap as `Unhandled` unless this is a `Runtime` error.
    ///
    /// Applied at the merge/diff/fetch boundaries: contract violations
    /// propagate unwrapped, everything else becomes `Unhandled`.
    pub fn into_unhandled(self) -> Self {
        match self {
            err @ StoreError::Runtime(_) => err,
            other => StoreError::Unhandled(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_predicates() {
        assert!(StoreError::runtime("nope").is_runtime());
        assert!(StoreError::illegal_argument("bad").is_illegal_argument());
        assert!(!StoreError::unhandled("boom").is_runtime());
    }

    #[test]
    fn test_runtime_is_never_rewrapped() {
        let err = StoreError::runtime("contract violated").into_unhandled();
        assert_eq!(err, StoreError::runtime("contract violated"));
    }

    #[test]
    fn test_other_kinds_wrap_as_unhandled() {
        let err = StoreError::illegal_argument("bad shape").into_unhandled();
        assert!(matches!(err, StoreError::Unhandled(_)));
    }

    #[test]
    fn test_detail_is_preserved() {
        let err = StoreError::illegal_argument_with_detail(
            "attrs: must be an object or an array",
            "expected object|array, actual string",
        );
        match err {
            StoreError::IllegalArgument { detail, .. } => {
                assert_eq!(detail.as_deref(), Some("expected object|array, actual string"));
            }
            _ => panic!("wrong kind"),
        }
    }
}
