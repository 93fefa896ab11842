//! Optimistic concurrency primitives shared by every versioned store.
//!
//! The trips service's seat inventory and the search projection's checkpoint
//! both use the same compare-and-update shape: callers read a `Version`
//! alongside the row, and the write only applies if that version still
//! matches what's in storage. Every way that write can fail to apply -
//! the row no longer exists, another writer already advanced the version,
//! or the update itself would violate a domain constraint - collapses to
//! the single [`OptimisticError::Conflict`] kind. Distinguishing those
//! causes would let callers build logic around a race outcome, which is
//! exactly what optimistic concurrency is supposed to prevent.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A monotonically increasing version tag for compare-and-update writes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(i64);

impl Version {
    /// The version assigned to a row when it is first created.
    pub const INITIAL: Self = Self(0);

    /// Wrap a raw version value loaded from storage.
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// The raw value, e.g. for binding into a query.
    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }

    /// The version a successful write against this one produces.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Version> for i64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

/// The single failure kind produced by a versioned compare-and-update.
///
/// Whether zero rows matched because the entity doesn't exist, the
/// version has moved on, or a `WHERE` clause guarding a business rule
/// (e.g. enough seats remaining) rejected the write, the caller sees the
/// same variant. Retrying means re-reading current state and deciding
/// whether to try again, not branching on why the previous attempt lost.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("inventory conflict: the expected version no longer matches stored state")]
pub struct OptimisticError;

/// Convenience alias for compare-and-update results.
pub type OptimisticResult<T> = Result<T, OptimisticError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_increments_by_one() {
        assert_eq!(Version::INITIAL.next(), Version::new(1));
    }

    #[test]
    fn ordering_reflects_recency() {
        assert!(Version::new(3) > Version::new(2));
    }

    #[test]
    fn conflict_error_has_stable_message() {
        assert_eq!(
            OptimisticError.to_string(),
            "inventory conflict: the expected version no longer matches stored state"
        );
    }
}
