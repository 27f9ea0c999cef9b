use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use tokio::sync::{mpsc, watch};

use super::{RecordSubscription, RecordSynchronizer, SUBSCRIPTION_BUFFER};
use crate::{
    error::{AppError, AppResult},
    models::{FieldUpdate, IdentityId, ListKind, Record},
};

type RecordChannels = HashMap<IdentityId, watch::Sender<Option<Record>>>;

/// In-process record store
///
/// Each identity's record lives in a `watch` channel, so every write is one
/// transition and subscribers always see the latest snapshot. Used for local
/// development and tests.
///
/// Channels are never evicted: the map grows with every identity seen for
/// the lifetime of the process.
#[derive(Default)]
pub struct MemorySynchronizer {
    records: Mutex<RecordChannels>,
    fail_writes: AtomicBool,
    transitions: Mutex<Vec<Vec<ListKind>>>,
}

impl MemorySynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following write fail with `PersistFailure`
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Ends every live subscription on the identity's record, keeping the record
    ///
    /// Simulates the backend dropping its change feed.
    pub fn disconnect(&self, identity: &IdentityId) {
        let mut channels = self.channels();
        if let Some(closed) = channels.remove(identity) {
            let current = closed.borrow().clone();
            channels.insert(identity.clone(), watch::channel(current).0);
            tracing::warn!(identity = %identity, "Memory change feed disconnected");
        }
    }

    /// Current stored record for the identity
    pub fn record(&self, identity: &IdentityId) -> Option<Record> {
        self.channels()
            .get(identity)
            .and_then(|sender| sender.borrow().clone())
    }

    /// Fields touched by each successful write, in write order
    pub fn transitions(&self) -> Vec<Vec<ListKind>> {
        self.transitions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn channels(&self) -> MutexGuard<'_, RecordChannels> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait::async_trait]
impl RecordSynchronizer for MemorySynchronizer {
    async fn subscribe(&self, identity: &IdentityId) -> AppResult<RecordSubscription> {
        let mut snapshots = self
            .channels()
            .entry(identity.clone())
            .or_insert_with(|| watch::channel(None).0)
            .subscribe();

        let (tx, updates) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let identity = identity.clone();

        let feeder = tokio::spawn(async move {
            let initial = snapshots.borrow_and_update().clone();
            if let Some(record) = initial {
                if tx.send(record).await.is_err() {
                    return;
                }
            }

            while snapshots.changed().await.is_ok() {
                let current = snapshots.borrow_and_update().clone();
                if let Some(record) = current {
                    if tx.send(record).await.is_err() {
                        break;
                    }
                }
            }

            tracing::debug!(identity = %identity, "Memory subscription closed");
        });

        Ok(RecordSubscription::new(updates, feeder))
    }

    async fn write_fields(
        &self,
        identity: &IdentityId,
        updates: Vec<FieldUpdate>,
    ) -> AppResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::PersistFailure(format!(
                "memory store rejected write for {}",
                identity
            )));
        }

        let fields: Vec<ListKind> = updates.iter().map(|u| u.field).collect();

        self.channels()
            .entry(identity.clone())
            .or_insert_with(|| watch::channel(None).0)
            .send_modify(|current| {
                let record = current.get_or_insert_with(Record::default);
                for update in updates {
                    record.apply(update);
                }
            });

        self.transitions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(fields);

        Ok(())
    }

    async fn ensure_record(&self, identity: &IdentityId) -> AppResult<()> {
        self.channels()
            .entry(identity.clone())
            .or_insert_with(|| watch::channel(None).0)
            .send_if_modified(|current| {
                if current.is_some() {
                    return false;
                }
                *current = Some(Record::default());
                true
            });
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MovieEntry, MovieSummary};
    use chrono::Utc;
    use std::time::Duration;

    fn entry(id: u64, list: ListKind) -> MovieEntry {
        let movie = MovieSummary {
            id,
            title: format!("Movie {}", id),
            poster_ref: Some(format!("/poster-{}.jpg", id)),
            overview: Some("overview".to_string()),
            release_date: Some("2001-01-01".to_string()),
            rating: Some(7.5),
        };
        MovieEntry::snapshot(&movie, list, Utc::now())
    }

    async fn next(subscription: &mut RecordSubscription) -> Option<Record> {
        tokio::time::timeout(Duration::from_secs(1), subscription.next())
            .await
            .ok()
            .flatten()
    }

    #[tokio::test]
    async fn test_subscribe_without_record_waits() {
        let sync = MemorySynchronizer::new();
        let mut subscription = sync.subscribe(&IdentityId::from("u1")).await.unwrap();

        let nothing = tokio::time::timeout(Duration::from_millis(50), subscription.next()).await;
        assert!(nothing.is_err());
    }

    #[tokio::test]
    async fn test_ensure_record_delivers_empty_record() {
        let sync = MemorySynchronizer::new();
        let id = IdentityId::from("u1");
        sync.ensure_record(&id).await.unwrap();

        let mut subscription = sync.subscribe(&id).await.unwrap();
        assert_eq!(next(&mut subscription).await, Some(Record::default()));
    }

    #[tokio::test]
    async fn test_ensure_record_keeps_existing() {
        let sync = MemorySynchronizer::new();
        let id = IdentityId::from("u1");
        sync.write_field(&id, ListKind::Favorites, vec![entry(1, ListKind::Favorites)])
            .await
            .unwrap();

        sync.ensure_record(&id).await.unwrap();

        assert_eq!(sync.record(&id).unwrap().favorites.len(), 1);
    }

    #[tokio::test]
    async fn test_write_then_read_back_through_subscription() {
        let sync = MemorySynchronizer::new();
        let id = IdentityId::from("u1");
        sync.ensure_record(&id).await.unwrap();
        let mut subscription = sync.subscribe(&id).await.unwrap();
        assert_eq!(next(&mut subscription).await, Some(Record::default()));

        let written = vec![
            entry(3, ListKind::Watched),
            entry(1, ListKind::Watched),
            entry(2, ListKind::Watched),
        ];
        sync.write_field(&id, ListKind::Watched, written.clone())
            .await
            .unwrap();

        let record = next(&mut subscription).await.unwrap();
        assert_eq!(record.watched, written);
    }

    #[tokio::test]
    async fn test_write_fields_is_one_transition() {
        let sync = MemorySynchronizer::new();
        let id = IdentityId::from("u1");

        sync.write_fields(
            &id,
            vec![
                FieldUpdate::new(ListKind::Watched, vec![entry(7, ListKind::Watched)]),
                FieldUpdate::new(ListKind::Watchlist, vec![]),
            ],
        )
        .await
        .unwrap();

        assert_eq!(
            sync.transitions(),
            vec![vec![ListKind::Watched, ListKind::Watchlist]]
        );
    }

    #[tokio::test]
    async fn test_failed_write_leaves_record() {
        let sync = MemorySynchronizer::new();
        let id = IdentityId::from("u1");
        sync.ensure_record(&id).await.unwrap();
        sync.set_fail_writes(true);

        let result = sync
            .write_field(&id, ListKind::Watchlist, vec![entry(1, ListKind::Watchlist)])
            .await;

        assert!(matches!(result, Err(AppError::PersistFailure(_))));
        assert_eq!(sync.record(&id), Some(Record::default()));
        assert!(sync.transitions().is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_ends_subscription_and_keeps_record() {
        let sync = MemorySynchronizer::new();
        let id = IdentityId::from("u1");
        sync.write_field(&id, ListKind::Watched, vec![entry(4, ListKind::Watched)])
            .await
            .unwrap();
        let mut subscription = sync.subscribe(&id).await.unwrap();
        assert!(next(&mut subscription).await.is_some());

        sync.disconnect(&id);

        let ended = tokio::time::timeout(Duration::from_secs(1), subscription.next())
            .await
            .unwrap();
        assert_eq!(ended, None);
        assert_eq!(sync.record(&id).unwrap().watched.len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_subscription_stops_delivery() {
        let sync = MemorySynchronizer::new();
        let id = IdentityId::from("u1");
        sync.ensure_record(&id).await.unwrap();

        let subscription = sync.subscribe(&id).await.unwrap();
        subscription.cancel();

        // the feeder is gone, so the store has no live receivers left
        tokio::time::sleep(Duration::from_millis(20)).await;
        let receivers = sync.channels().get(&id).unwrap().receiver_count();
        assert_eq!(receivers, 0);
    }
}
