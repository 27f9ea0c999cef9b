use tokio::sync::watch;

use crate::models::Identity;

/// Boundary to the external authentication provider
///
/// This service never verifies credentials itself; it only learns which
/// identity is active and when that changes.
pub trait IdentityProvider: Send + Sync {
    fn current_identity(&self) -> Option<Identity>;

    /// Receiver that is notified on every sign-in and sign-out
    fn on_identity_change(&self) -> watch::Receiver<Option<Identity>>;
}

/// Holds the identity asserted by the upstream provider
pub struct SessionAuth {
    current: watch::Sender<Option<Identity>>,
}

impl Default for SessionAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionAuth {
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self { current }
    }

    pub fn sign_in(&self, identity: Identity) {
        tracing::info!(identity = %identity.id, "Signed in");
        self.current.send_replace(Some(identity));
    }

    pub fn sign_out(&self) {
        if let Some(previous) = self.current.send_replace(None) {
            tracing::info!(identity = %previous.id, "Signed out");
        }
    }
}

impl IdentityProvider for SessionAuth {
    fn current_identity(&self) -> Option<Identity> {
        self.current.borrow().clone()
    }

    fn on_identity_change(&self) -> watch::Receiver<Option<Identity>> {
        self.current.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IdentityId;

    #[test]
    fn test_sign_in_and_out() {
        let auth = SessionAuth::new();
        assert_eq!(auth.current_identity(), None);

        let identity = Identity::new(IdentityId::from("u1"), None, None);
        auth.sign_in(identity.clone());
        assert_eq!(auth.current_identity(), Some(identity));

        auth.sign_out();
        assert_eq!(auth.current_identity(), None);
    }

    #[tokio::test]
    async fn test_identity_change_notifies() {
        let auth = SessionAuth::new();
        let mut changes = auth.on_identity_change();

        auth.sign_in(Identity::new(IdentityId::from("u1"), None, None));
        changes.changed().await.unwrap();

        let seen = changes.borrow_and_update().clone();
        assert_eq!(seen.map(|i| i.id), Some(IdentityId::from("u1")));
    }
}
