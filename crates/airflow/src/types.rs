//! Wire types for the Airflow user endpoints.
//!
//! Field names follow the stable REST API (`/api/v1/users`) so these types
//! serialize straight into request bodies and out of responses.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reference to a role assignment.
///
/// The API always populates `name` in responses; it is optional here only
/// because the schema declares it so.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRef {
    /// Role name, e.g. `Admin` or `Viewer`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl RoleRef {
    /// Create a reference carrying only a role name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }
}

/// A user as returned by the directory (`UserCollectionItem`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Unique e-mail address.
    pub email: String,
    /// Unique username; may be rewritten by an SSO layer.
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_login_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_on: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed_on: Option<String>,
    /// Assigned roles; `None` when the API omits the field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<RoleRef>>,
}

impl UserRecord {
    /// Create a record with identity fields only.
    pub fn new(email: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            username: username.into(),
            first_name: String::new(),
            last_name: String::new(),
            active: None,
            failed_login_count: None,
            login_count: None,
            last_login: None,
            created_on: None,
            changed_on: None,
            roles: None,
        }
    }

    /// Role references, treating an omitted field as empty.
    #[must_use]
    pub fn role_refs(&self) -> &[RoleRef] {
        self.roles.as_deref().unwrap_or_default()
    }
}

/// One page of `GET /users`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPage {
    #[serde(default)]
    pub users: Vec<UserRecord>,
    /// Total number of users in the directory, across all pages.
    #[serde(default)]
    pub total_entries: u64,
}

/// Request body for creating or patching a user (`User`).
#[derive(Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserPayload {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    /// Plaintext password; write-only on the API side.
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<RoleRef>>,
}

impl fmt::Debug for UserPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserPayload")
            .field("email", &self.email)
            .field("username", &self.username)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("password", &"***")
            .field("roles", &self.roles)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_page_deserialize() {
        let json = r#"{
            "users": [{
                "email": "a@x.com",
                "username": "accounts.google.com:123",
                "first_name": "A",
                "last_name": "X",
                "active": true,
                "failed_login_count": 2,
                "login_count": 7,
                "last_login": "2024-03-01T10:00:00+00:00",
                "created_on": "2024-01-01T00:00:00+00:00",
                "changed_on": null,
                "roles": [{"name": "Admin"}, {"name": "Op"}]
            }],
            "total_entries": 1
        }"#;

        let page: UserPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.total_entries, 1);
        let user = &page.users[0];
        assert_eq!(user.username, "accounts.google.com:123");
        assert_eq!(user.active, Some(true));
        assert_eq!(user.failed_login_count, Some(2));
        assert_eq!(user.login_count, Some(7));
        assert_eq!(user.changed_on, None);
        assert_eq!(user.role_refs().len(), 2);
    }

    #[test]
    fn test_user_record_null_counters_and_missing_roles() {
        let json = r#"{"email": "b@x.com", "username": "b", "login_count": null}"#;
        let user: UserRecord = serde_json::from_str(json).unwrap();
        assert_eq!(user.login_count, None);
        assert!(user.role_refs().is_empty());
    }

    #[test]
    fn test_role_ref_without_name() {
        let role: RoleRef = serde_json::from_str("{}").unwrap();
        assert_eq!(role.name, None);
        assert_eq!(serde_json::to_string(&RoleRef::named("Viewer")).unwrap(), r#"{"name":"Viewer"}"#);
    }

    #[test]
    fn test_payload_omits_absent_roles() {
        let payload = UserPayload {
            email: "a@x.com".to_string(),
            username: "a".to_string(),
            password: "p".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("roles").is_none());
        assert_eq!(json["password"], "p");
    }

    #[test]
    fn test_payload_debug_redacts_password() {
        let payload = UserPayload {
            password: "hunter2".to_string(),
            ..Default::default()
        };
        let debug = format!("{payload:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("***"));
    }
}
