//! Content store and dedupe ledger
//!
//! The content store's key space doubles as the record of processed files:
//! a filename has been "seen" if and only if an object with the same key
//! exists, whatever that object contains. There is no separate ledger. This
//! is also what makes `overwrite` meaningful, since a forced reprocessing
//! simply replaces the object under the same key.

pub mod s3;

pub use s3::S3Store;

use crate::artifact::Artifact;
use crate::error::StoreError;

/// Durable storage for processed files, keyed by remote filename
#[cfg_attr(test, mockall::automock)]
pub trait ContentStore {
    /// Whether `key` exists, i.e. whether the file was processed before
    ///
    /// # Errors
    /// Lookup failures are never reported as "absent".
    fn key_exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Uploads the artifact under `key`, replacing any existing object
    fn store(&self, key: &str, artifact: &Artifact) -> Result<(), StoreError>;

    /// Absolute URL subscribers can use to fetch the object stored at `key`
    fn resource_url_for(&self, key: &str) -> Result<String, StoreError>;
}

/// What to do with a candidate after the dedupe lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupeDecision {
    Process,
    Skip,
}

/// Applies the skip/overwrite policy
///
/// | exists | overwrite | decision |
/// |--------|-----------|----------|
/// | false  | any       | Process  |
/// | true   | false     | Skip     |
/// | true   | true      | Process  |
pub fn dedupe_decision(exists: bool, overwrite: bool) -> DedupeDecision {
    if exists && !overwrite {
        DedupeDecision::Skip
    } else {
        DedupeDecision::Process
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedupe_decision_table() {
        assert_eq!(dedupe_decision(false, false), DedupeDecision::Process);
        assert_eq!(dedupe_decision(false, true), DedupeDecision::Process);
        assert_eq!(dedupe_decision(true, false), DedupeDecision::Skip);
        assert_eq!(dedupe_decision(true, true), DedupeDecision::Process);
    }
}
