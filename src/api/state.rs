use std::sync::Arc;

use crate::services::{CatalogClient, ListSession, RecordSynchronizer, SessionAuth};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<SessionAuth>,
    pub session: Arc<ListSession>,
    pub catalog: Arc<dyn CatalogClient>,
}

impl AppState {
    /// Wires the session to the identity boundary
    ///
    /// Spawns the session follower, so this must run inside a Tokio runtime.
    pub fn new(
        synchronizer: Arc<dyn RecordSynchronizer>,
        catalog: Arc<dyn CatalogClient>,
    ) -> Self {
        let auth = Arc::new(SessionAuth::new());
        let session = Arc::new(ListSession::new(synchronizer));
        session.clone().follow(auth.clone());

        Self {
            auth,
            session,
            catalog,
        }
    }
}
