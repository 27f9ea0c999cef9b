//! Remote record synchronization
//!
//! A `RecordSynchronizer` is the only persistence boundary the list store sees:
//! it replaces whole list fields of an identity's record and delivers every
//! resulting record snapshot through a live subscription.
//!
//! Consistency: writes from one caller are observed in issue order because each
//! backend serializes writes per record key. Writers in different processes for
//! the same identity are last-writer-wins on a per-field basis.
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::{
    error::AppResult,
    models::{FieldUpdate, IdentityId, ListKind, MovieEntry, Record},
};

pub mod memory;

pub use memory::MemorySynchronizer;

/// Buffer of pending snapshots per subscription
pub const SUBSCRIPTION_BUFFER: usize = 16;

#[async_trait::async_trait]
pub trait RecordSynchronizer: Send + Sync {
    /// Opens a live subscription on the identity's record
    ///
    /// The current record (if one exists) is delivered first, followed by
    /// one snapshot per subsequent change, whoever caused it.
    async fn subscribe(&self, identity: &IdentityId) -> AppResult<RecordSubscription>;

    /// Replaces several fields of the record in a single transition
    ///
    /// Fails with `PersistFailure`. The new record is delivered through
    /// subscriptions, not returned.
    async fn write_fields(&self, identity: &IdentityId, updates: Vec<FieldUpdate>)
        -> AppResult<()>;

    /// Creates an empty record for the identity unless one already exists
    async fn ensure_record(&self, identity: &IdentityId) -> AppResult<()>;

    /// Replaces one field of the record wholesale
    async fn write_field(
        &self,
        identity: &IdentityId,
        field: ListKind,
        entries: Vec<MovieEntry>,
    ) -> AppResult<()> {
        self.write_fields(identity, vec![FieldUpdate::new(field, entries)])
            .await
    }

    /// Backend name for logging
    fn name(&self) -> &'static str;
}

/// Handle on a live record subscription
///
/// Dropping the handle cancels the subscription and stops its feeder task.
pub struct RecordSubscription {
    updates: mpsc::Receiver<Record>,
    feeder: Option<JoinHandle<()>>,
}

impl RecordSubscription {
    /// Wraps the receiving half fed by `feeder`
    pub fn new(updates: mpsc::Receiver<Record>, feeder: JoinHandle<()>) -> Self {
        Self {
            updates,
            feeder: Some(feeder),
        }
    }

    /// Next record snapshot, or `None` once the subscription has ended
    pub async fn next(&mut self) -> Option<Record> {
        self.updates.recv().await
    }

    /// Stops delivery and releases the backend resources
    pub fn cancel(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.updates.close();
        if let Some(feeder) = self.feeder.take() {
            feeder.abort();
        }
    }
}

impl Drop for RecordSubscription {
    fn drop(&mut self) {
        self.stop();
    }
}
