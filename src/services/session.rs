use std::sync::Arc;

use tokio::sync::{RwLock, RwLockReadGuard};
use tokio::task::JoinHandle;

use crate::{
    error::AppResult,
    models::Identity,
    services::{auth::IdentityProvider, list_store::ListStore, sync::RecordSynchronizer},
};

/// Owns the list store of whichever identity is currently signed in
///
/// A new store is built on every identity transition. Mutations run under the
/// read lock, so a switch waits for the in-flight mutation before tearing the
/// old store down.
pub struct ListSession {
    synchronizer: Arc<dyn RecordSynchronizer>,
    store: RwLock<ListStore>,
}

impl ListSession {
    pub fn new(synchronizer: Arc<dyn RecordSynchronizer>) -> Self {
        let store = ListStore::inactive(synchronizer.clone());
        Self {
            synchronizer,
            store: RwLock::new(store),
        }
    }

    /// Store of the active identity (inactive when nobody is signed in)
    pub async fn store(&self) -> RwLockReadGuard<'_, ListStore> {
        self.store.read().await
    }

    /// Replaces the store for `identity`, or with an inactive one on sign-out
    ///
    /// The lists are cleared before the new subscription delivers anything.
    /// Switching to the identity that is already active does nothing unless
    /// its subscription was lost, in which case it resubscribes.
    pub async fn switch_to(&self, identity: Option<&Identity>) -> AppResult<()> {
        let mut store = self.store.write().await;
        self.replace(&mut store, identity).await
    }

    /// Switches to whatever identity the provider reports once the lock is held,
    /// so racing transitions always settle on the latest one
    pub async fn sync_with(&self, provider: &dyn IdentityProvider) -> AppResult<()> {
        let mut store = self.store.write().await;
        let identity = provider.current_identity();
        self.replace(&mut store, identity.as_ref()).await
    }

    async fn replace(&self, store: &mut ListStore, identity: Option<&Identity>) -> AppResult<()> {
        let unchanged = store.identity() == identity.map(|i| &i.id);
        if unchanged && (identity.is_none() || store.is_synced()) {
            return Ok(());
        }
        if unchanged {
            tracing::warn!("Resubscribing list store after losing its record subscription");
        }

        // dropping the old store cancels its subscription
        *store = ListStore::inactive(self.synchronizer.clone());

        if let Some(identity) = identity {
            self.synchronizer.ensure_record(&identity.id).await?;
            *store = ListStore::activate(identity.id.clone(), self.synchronizer.clone()).await?;
        }

        Ok(())
    }

    /// Follows the provider's identity changes for as long as it exists
    pub fn follow(self: Arc<Self>, provider: Arc<dyn IdentityProvider>) -> JoinHandle<()> {
        let mut changes = provider.on_identity_change();

        tokio::spawn(async move {
            loop {
                changes.borrow_and_update();
                if let Err(e) = self.sync_with(provider.as_ref()).await {
                    tracing::error!(error = %e, "Failed to switch list session");
                }

                if changes.changed().await.is_err() {
                    break;
                }
            }
            tracing::debug!("Identity provider closed, session follower stopped");
        })
    }
}
