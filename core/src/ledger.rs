//! Ledger store contract: per-resource event streams with optimistic
//! concurrency and snapshot support.
//!
//! Each resource owns one append-only stream. The coordinator serializes
//! writers per resource with its own lock; the `expected_version` check
//! here is defense in depth: a mismatch means a writer got past the lock,
//! and the append is refused rather than silently interleaved.
//!
//! Snapshots exist for the quantity ledger: a compaction pass stores the
//! running stock totals (bincode-encoded) at a version so replays start
//! there instead of from the first movement.
//!
//! # Dyn compatibility
//!
//! The trait returns explicit `Pin<Box<dyn Future>>` instead of `async fn`
//! so it can be used as `Arc<dyn LedgerStore>` across the engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

use crate::event::LedgerEvent;
use crate::ids::ResourceId;

/// Ledger position after an event, starting at 1 for the first event.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Version(u64);

impl Version {
    /// The version of an empty stream.
    pub const INITIAL: Self = Self(0);

    /// Create a new `Version` with the given value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the version number.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// The next version (current + 1).
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

/// An event together with the stream position it was appended at.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedEvent {
    /// Stream position of this event (1-based)
    pub version: Version,
    /// The appended event
    pub event: LedgerEvent,
}

/// Snapshot payload: the version it covers and the bincode-encoded state.
pub type SnapshotData = (Version, Vec<u8>);

/// Errors raised by ledger store implementations.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Expected stream version did not match: a writer reached the store
    /// outside the per-resource lock.
    #[error("version conflict on {resource_id}: expected {expected}, found {actual}")]
    VersionConflict {
        /// Stream the conflict occurred on
        resource_id: ResourceId,
        /// Version the writer expected
        expected: Version,
        /// Actual stream version
        actual: Version,
    },

    /// Underlying storage failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Snapshot payload could not be encoded or decoded.
    #[error("snapshot codec error: {0}")]
    Snapshot(String),
}

/// Per-resource, append-only event storage.
pub trait LedgerStore: Send + Sync {
    /// Append events to a resource's stream.
    ///
    /// With `expected_version = Some(v)` the append is refused unless the
    /// stream is currently at `v`; `None` appends unconditionally (used
    /// only by fixtures and replays).
    ///
    /// Returns the stream version after the append.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::VersionConflict`] on an expected-version mismatch
    /// - [`LedgerError::Storage`] when the store itself fails
    fn append(
        &self,
        resource_id: ResourceId,
        expected_version: Option<Version>,
        events: Vec<LedgerEvent>,
    ) -> Pin<Box<dyn Future<Output = Result<Version, LedgerError>> + Send + '_>>;

    /// Load a resource's events ordered by version, optionally starting at
    /// `from_version` (inclusive). An unknown resource yields an empty
    /// vector (not an error, new streams start empty).
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Storage`] when the store itself fails.
    fn load(
        &self,
        resource_id: ResourceId,
        from_version: Option<Version>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<RecordedEvent>, LedgerError>> + Send + '_>>;

    /// Store a snapshot of derived state at `version`, replacing any
    /// earlier snapshot for the resource.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Storage`] when the store itself fails.
    fn save_snapshot(
        &self,
        resource_id: ResourceId,
        version: Version,
        state: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<(), LedgerError>> + Send + '_>>;

    /// Latest snapshot for a resource, if one was ever saved.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Storage`] when the store itself fails.
    fn load_snapshot(
        &self,
        resource_id: ResourceId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<SnapshotData>, LedgerError>> + Send + '_>>;
}
