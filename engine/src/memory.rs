//! In-process ledger store.
//!
//! One append-only stream per resource, guarded by a `tokio::sync::RwLock`.
//! Writer serialization comes from the coordinator's per-resource lock; the
//! expected-version check here refuses any append that somehow reaches the
//! store outside that lock instead of interleaving it.
//!
//! Compaction keeps every event (the stream is the audit trail) and only
//! replaces the snapshot; replays start from the snapshot version.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use innkeep_core::event::LedgerEvent;
use innkeep_core::ids::ResourceId;
use innkeep_core::ledger::{LedgerError, LedgerStore, RecordedEvent, SnapshotData, Version};
use tokio::sync::RwLock;

#[derive(Default)]
struct Stream {
    events: Vec<RecordedEvent>,
    snapshot: Option<SnapshotData>,
}

impl Stream {
    fn version(&self) -> Version {
        self.events.last().map_or(Version::INITIAL, |r| r.version)
    }
}

/// In-memory [`LedgerStore`] keeping one append-only stream per resource.
#[derive(Default)]
pub struct MemoryLedger {
    streams: RwLock<HashMap<ResourceId, Stream>>,
}

impl MemoryLedger {
    /// Creates an empty `MemoryLedger`
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for MemoryLedger {
    fn append(
        &self,
        resource_id: ResourceId,
        expected_version: Option<Version>,
        events: Vec<LedgerEvent>,
    ) -> Pin<Box<dyn Future<Output = Result<Version, LedgerError>> + Send + '_>> {
        Box::pin(async move {
            let mut streams = self.streams.write().await;
            let stream = streams.entry(resource_id).or_default();
            let current = stream.version();

            if let Some(expected) = expected_version {
                if expected != current {
                    return Err(LedgerError::VersionConflict {
                        resource_id,
                        expected,
                        actual: current,
                    });
                }
            }

            let mut version = current;
            for event in events {
                version = version.next();
                stream.events.push(RecordedEvent { version, event });
            }
            Ok(version)
        })
    }

    fn load(
        &self,
        resource_id: ResourceId,
        from_version: Option<Version>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<RecordedEvent>, LedgerError>> + Send + '_>> {
        Box::pin(async move {
            let streams = self.streams.read().await;
            let events = streams.get(&resource_id).map_or_else(Vec::new, |stream| {
                stream
                    .events
                    .iter()
                    .filter(|recorded| from_version.is_none_or(|from| recorded.version >= from))
                    .cloned()
                    .collect()
            });
            Ok(events)
        })
    }

    fn save_snapshot(
        &self,
        resource_id: ResourceId,
        version: Version,
        state: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<(), LedgerError>> + Send + '_>> {
        Box::pin(async move {
            let mut streams = self.streams.write().await;
            let stream = streams.entry(resource_id).or_default();
            stream.snapshot = Some((version, state));
            Ok(())
        })
    }

    fn load_snapshot(
        &self,
        resource_id: ResourceId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<SnapshotData>, LedgerError>> + Send + '_>> {
        Box::pin(async move {
            let streams = self.streams.read().await;
            Ok(streams
                .get(&resource_id)
                .and_then(|stream| stream.snapshot.clone()))
        })
    }
}
