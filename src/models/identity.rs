use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Opaque id of an authenticated user, issued by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityId(pub String);

impl Display for IdentityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for IdentityId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// The signed-in user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: IdentityId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl Identity {
    /// Creates an identity, deriving the display name from the email when none is given
    pub fn new(id: IdentityId, email: Option<String>, display_name: Option<String>) -> Self {
        let display_name = display_name
            .filter(|name| !name.trim().is_empty())
            .or_else(|| {
                email
                    .as_deref()
                    .and_then(|e| e.split('@').next())
                    .filter(|local| !local.is_empty())
                    .map(str::to_string)
            });

        Self {
            id,
            email,
            display_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_from_email() {
        let identity = Identity::new(
            IdentityId::from("uid-1"),
            Some("ada@example.com".to_string()),
            None,
        );
        assert_eq!(identity.display_name, Some("ada".to_string()));
    }

    #[test]
    fn test_explicit_display_name_wins() {
        let identity = Identity::new(
            IdentityId::from("uid-1"),
            Some("ada@example.com".to_string()),
            Some("Ada Lovelace".to_string()),
        );
        assert_eq!(identity.display_name, Some("Ada Lovelace".to_string()));
    }

    #[test]
    fn test_identity_id_serializes_transparently() {
        let json = serde_json::to_string(&IdentityId::from("abc")).unwrap();
        assert_eq!(json, "\"abc\"");
    }
}
