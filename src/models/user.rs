use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use super::task::Task;

/// The user document. `tasks` is embedded; there is no separate task store.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(rename = "password")]
    pub password_hash: String,  // bcrypt hash, never returned to clients
    #[serde(default)]
    pub points: u64,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_verified")]
    pub verified: bool,
    #[serde(default)]
    pub temp_user: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_expires: Option<DateTime<Utc>>,
    // Bumped on every task save; used for optimistic concurrency.
    #[serde(default)]
    pub version: u64,
}

// Documents written before verification existed count as verified.
fn default_verified() -> bool {
    true
}

impl User {
    pub fn new(email: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            email: email.into(),
            password_hash: password_hash.into(),
            points: 0,
            tasks: Vec::new(),
            created_at: Utc::now(),
            verified: true,
            temp_user: false,
            verification_code: None,
            verification_expires: None,
            version: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_document_defaults() {
        let user: User = serde_json::from_str(
            r#"{"id":"u1","email":"a@example.com","password":"$2b$hash"}"#,
        )
        .unwrap();

        assert!(user.verified);
        assert_eq!(user.points, 0);
        assert_eq!(user.version, 0);
        assert!(user.tasks.is_empty());
    }

    #[test]
    fn test_hash_stored_under_password_key() {
        let user = User::new("a@example.com", "$2b$hash");
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["password"], "$2b$hash");
        assert!(json.get("passwordHash").is_none());
    }
}
