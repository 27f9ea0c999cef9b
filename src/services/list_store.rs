use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::{
    error::{AppError, AppResult},
    models::{
        FieldUpdate, IdentityId, ListKind, ListStats, MovieEntry, MovieId, MovieSummary, Record,
    },
    services::sync::RecordSynchronizer,
};

/// How long a write may take to come back through the subscription
const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Personal lists of the active identity
///
/// Mutations compute the new value of the affected list(s) from the current
/// snapshot and hand it to the synchronizer. They never touch local state:
/// the snapshot only changes when the synchronizer's change notification
/// arrives, so the remote record is the single source of truth.
///
/// Mutations run one at a time and each returns only once its write has come
/// back through the subscription, so the next one starts from a snapshot that
/// already contains it. The busy flag exists for UIs to disable controls.
pub struct ListStore {
    identity: Option<IdentityId>,
    synchronizer: Arc<dyn RecordSynchronizer>,
    snapshot: watch::Receiver<Record>,
    busy: AtomicBool,
    writes: Mutex<()>,
    mirror: Option<JoinHandle<()>>,
}

/// Clears the busy flag when the mutation ends, however it ends
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl ListStore {
    /// Store with no active identity: empty lists, every mutation rejected
    pub fn inactive(synchronizer: Arc<dyn RecordSynchronizer>) -> Self {
        let (_, snapshot) = watch::channel(Record::default());
        Self {
            identity: None,
            synchronizer,
            snapshot,
            busy: AtomicBool::new(false),
            writes: Mutex::new(()),
            mirror: None,
        }
    }

    /// Subscribes to the identity's record and mirrors every snapshot locally
    ///
    /// Lists start empty and fill in when the first notification arrives.
    pub async fn activate(
        identity: IdentityId,
        synchronizer: Arc<dyn RecordSynchronizer>,
    ) -> AppResult<Self> {
        let mut subscription = synchronizer.subscribe(&identity).await?;
        let (tx, snapshot) = watch::channel(Record::default());

        let mirrored = identity.clone();
        let mirror = tokio::spawn(async move {
            while let Some(record) = subscription.next().await {
                tracing::debug!(
                    identity = %mirrored,
                    watchlist = record.watchlist.len(),
                    favorites = record.favorites.len(),
                    watched = record.watched.len(),
                    "Record settled"
                );
                if tx.send(record).is_err() {
                    return;
                }
            }

            // dropping `tx` closes the snapshot channel, which marks the store unsynced
            tracing::error!(
                identity = %mirrored,
                "Record subscription ended, list store is no longer synced"
            );
        });

        tracing::info!(
            identity = %identity,
            backend = synchronizer.name(),
            "List store activated"
        );

        Ok(Self {
            identity: Some(identity),
            synchronizer,
            snapshot,
            busy: AtomicBool::new(false),
            writes: Mutex::new(()),
            mirror: Some(mirror),
        })
    }

    /// Cancels the record subscription; the store keeps its last snapshot
    pub fn deactivate(&mut self) {
        if let Some(mirror) = self.mirror.take() {
            mirror.abort();
            if let Some(identity) = &self.identity {
                tracing::info!(identity = %identity, "List store deactivated");
            }
        }
    }

    pub fn identity(&self) -> Option<&IdentityId> {
        self.identity.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Whether snapshots still arrive from the record store
    ///
    /// False for an inactive store and once the subscription has ended.
    pub fn is_synced(&self) -> bool {
        self.identity.is_some() && self.snapshot.has_changed().is_ok()
    }

    /// Latest settled record
    pub fn snapshot(&self) -> Record {
        self.snapshot.borrow().clone()
    }

    /// Receiver that observes every settled record
    pub fn watch(&self) -> watch::Receiver<Record> {
        self.snapshot.clone()
    }

    pub fn is_in_watchlist(&self, movie_id: MovieId) -> bool {
        self.contains(ListKind::Watchlist, movie_id)
    }

    pub fn is_in_favorites(&self, movie_id: MovieId) -> bool {
        self.contains(ListKind::Favorites, movie_id)
    }

    pub fn is_watched(&self, movie_id: MovieId) -> bool {
        self.contains(ListKind::Watched, movie_id)
    }

    pub fn contains(&self, list: ListKind, movie_id: MovieId) -> bool {
        self.snapshot.borrow().contains(list, movie_id)
    }

    pub fn stats(&self) -> ListStats {
        self.snapshot.borrow().stats()
    }

    pub async fn add_to_watchlist(&self, movie: &MovieSummary) -> AppResult<()> {
        self.add(ListKind::Watchlist, movie).await
    }

    pub async fn remove_from_watchlist(&self, movie_id: MovieId) -> AppResult<()> {
        self.remove(ListKind::Watchlist, movie_id).await
    }

    pub async fn add_to_favorites(&self, movie: &MovieSummary) -> AppResult<()> {
        self.add(ListKind::Favorites, movie).await
    }

    pub async fn remove_from_favorites(&self, movie_id: MovieId) -> AppResult<()> {
        self.remove(ListKind::Favorites, movie_id).await
    }

    /// Marks a movie watched and drops it from the watchlist in the same transition
    pub async fn add_to_watched(&self, movie: &MovieSummary) -> AppResult<()> {
        self.add(ListKind::Watched, movie).await
    }

    /// Removes from watched only; the watchlist is left alone
    pub async fn remove_from_watched(&self, movie_id: MovieId) -> AppResult<()> {
        self.remove(ListKind::Watched, movie_id).await
    }

    /// Appends a snapshot of `movie` to `list`
    pub async fn add(&self, list: ListKind, movie: &MovieSummary) -> AppResult<()> {
        let identity = self.active_identity()?;
        let _turn = self.writes.lock().await;
        let _busy = BusyGuard::raise(&self.busy);
        self.ensure_synced(identity)?;

        let current = self.snapshot();
        if current.contains(list, movie.id) {
            return Err(AppError::DuplicateEntry {
                list,
                movie_id: movie.id,
            });
        }

        let entry = MovieEntry::snapshot(movie, list, Utc::now());
        let mut updates = vec![FieldUpdate::new(list, current.with_appended(list, entry))];

        // a watched movie is no longer "to watch"
        if list == ListKind::Watched {
            updates.push(FieldUpdate::new(
                ListKind::Watchlist,
                current.without(ListKind::Watchlist, movie.id),
            ));
        }

        self.persist(identity, updates).await?;

        tracing::info!(
            identity = %identity,
            list = %list,
            movie_id = movie.id,
            "Movie added"
        );

        Ok(())
    }

    /// Drops every entry for `movie_id` from `list`; absent ids are not an error
    pub async fn remove(&self, list: ListKind, movie_id: MovieId) -> AppResult<()> {
        let identity = self.active_identity()?;
        let _turn = self.writes.lock().await;
        let _busy = BusyGuard::raise(&self.busy);
        self.ensure_synced(identity)?;

        let current = self.snapshot();
        let updates = vec![FieldUpdate::new(list, current.without(list, movie_id))];
        self.persist(identity, updates).await?;

        tracing::info!(
            identity = %identity,
            list = %list,
            movie_id = movie_id,
            "Movie removed"
        );

        Ok(())
    }

    fn active_identity(&self) -> AppResult<&IdentityId> {
        self.identity.as_ref().ok_or(AppError::NotAuthenticated)
    }

    /// Refuses to build a write from a snapshot that can no longer be refreshed
    fn ensure_synced(&self, identity: &IdentityId) -> AppResult<()> {
        if self.is_synced() {
            return Ok(());
        }

        tracing::error!(identity = %identity, "Mutation rejected, record subscription lost");
        Err(AppError::PersistFailure(
            "record subscription lost, lists are no longer synced".to_string(),
        ))
    }

    /// Writes the updates and waits until the subscription echoes them back
    async fn persist(&self, identity: &IdentityId, updates: Vec<FieldUpdate>) -> AppResult<()> {
        let mut settled = self.snapshot.clone();
        let expected: Vec<(ListKind, Vec<MovieId>)> = updates
            .iter()
            .map(|u| (u.field, u.entries.iter().map(|e| e.id).collect()))
            .collect();

        self.synchronizer
            .write_fields(identity, updates)
            .await
            .map_err(|e| match e {
                AppError::PersistFailure(_) => e,
                other => AppError::PersistFailure(other.to_string()),
            })?;

        let echoed = |record: &Record| {
            expected.iter().all(|(field, ids)| {
                record.list(*field).iter().map(|e| e.id).eq(ids.iter().copied())
            })
        };

        let outcome = tokio::time::timeout(SETTLE_TIMEOUT, settled.wait_for(echoed))
            .await
            .map(|settled| settled.map(|_| ()));

        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(AppError::PersistFailure(
                "record subscription ended before the write settled".to_string(),
            )),
            Err(_) => {
                tracing::warn!(identity = %identity, "Write was not echoed back in time");
                Err(AppError::PersistFailure(format!(
                    "write not confirmed within {}s",
                    SETTLE_TIMEOUT.as_secs()
                )))
            }
        }
    }
}

impl Drop for ListStore {
    fn drop(&mut self) {
        self.deactivate();
    }
}
