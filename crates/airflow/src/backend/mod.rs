//! Directory trait and implementations.
//!
//! [`Directory`] is the contract the reconciler consumes: paginated listing
//! plus create, patch and delete addressed by username. [`http::HttpDirectory`]
//! talks to a real Airflow webserver.
//!
//! # Testing
//!
//! Use [`MockDirectory`] for testing without network access:
//!
//! ```
//! use airflow::backend::{Directory, MockDirectory};
//!
//! let mock = MockDirectory::with_generated_users(3);
//! let page = mock.list_users(100, 0).unwrap();
//! assert_eq!(page.total_entries, 3);
//! assert_eq!(page.users.len(), 3);
//! ```

pub mod http;

use crate::error::{Error, Result};
use crate::types::{UserPage, UserPayload, UserRecord};
use std::sync::{Arc, Mutex};

/// Remote user directory.
///
/// Update and delete are keyed by the *current* username, which is the only
/// key the Airflow API accepts for those calls.
pub trait Directory: Send + Sync {
    /// Fetch one page of users.
    fn list_users(&self, limit: u32, offset: u32) -> Result<UserPage>;

    /// Create a user.
    ///
    /// # Errors
    ///
    /// Returns an HTTP 409 error if the e-mail or username is taken.
    fn create_user(&self, user: &UserPayload) -> Result<UserRecord>;

    /// Patch the user currently named `username`.
    fn patch_user(&self, username: &str, user: &UserPayload) -> Result<UserRecord>;

    /// Delete the user currently named `username`.
    ///
    /// # Errors
    ///
    /// A missing user surfaces as an error whose [`Error::is_not_found`]
    /// is true; callers decide whether that is acceptable.
    fn delete_user(&self, username: &str) -> Result<()>;
}

/// In-memory directory for testing without network access.
///
/// Clones share state, so a test can hand one clone to the code under test
/// and inspect calls through another. Users are paged in insertion order.
#[derive(Debug, Clone, Default)]
pub struct MockDirectory {
    state: Arc<Mutex<MockState>>,
}

#[derive(Debug, Default)]
struct MockState {
    users: Vec<UserRecord>,
    list_calls: Vec<(u32, u32)>,
    patch_targets: Vec<String>,
    delete_targets: Vec<String>,
    reported_total: Option<u64>,
    fail_list_at: Option<(u32, u16)>,
    fail_create: Option<u16>,
    fail_patch: Option<u16>,
    fail_delete: Option<u16>,
}

impl MockDirectory {
    /// Create a new empty mock directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock pre-populated with `count` users named `user{i}`.
    #[must_use]
    pub fn with_generated_users(count: usize) -> Self {
        let mock = Self::new();
        for i in 0..count {
            let mut user = UserRecord::new(format!("user{i}@example.com"), format!("user{i}"));
            user.first_name = format!("User{i}");
            user.last_name = "Example".to_string();
            user.active = Some(true);
            user.login_count = Some(0);
            user.failed_login_count = Some(0);
            user.roles = Some(vec![crate::RoleRef::named("Viewer")]);
            mock.insert(user);
        }
        mock
    }

    /// Add or replace (by e-mail) a user.
    pub fn insert(&self, user: UserRecord) {
        let mut state = self.state.lock().unwrap();
        state.users.retain(|u| u.email != user.email);
        state.users.push(user);
    }

    /// Remove a user out-of-band. Returns whether it existed.
    pub fn remove(&self, email: &str) -> bool {
        let mut state = self.state.lock().unwrap();
        let before = state.users.len();
        state.users.retain(|u| u.email != email);
        state.users.len() < before
    }

    /// Rewrite a user's username out-of-band, as an SSO layer would.
    pub fn rename(&self, email: &str, username: impl Into<String>) -> bool {
        let mut state = self.state.lock().unwrap();
        match state.users.iter_mut().find(|u| u.email == email) {
            Some(user) => {
                user.username = username.into();
                true
            }
            None => false,
        }
    }

    /// Look up a user by e-mail.
    #[must_use]
    pub fn user(&self, email: &str) -> Option<UserRecord> {
        let state = self.state.lock().unwrap();
        state.users.iter().find(|u| u.email == email).cloned()
    }

    /// Number of users in the directory.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().users.len()
    }

    /// Whether the directory is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(limit, offset)` of every list call so far.
    #[must_use]
    pub fn list_calls(&self) -> Vec<(u32, u32)> {
        self.state.lock().unwrap().list_calls.clone()
    }

    /// Usernames addressed by patch calls so far.
    #[must_use]
    pub fn patch_targets(&self) -> Vec<String> {
        self.state.lock().unwrap().patch_targets.clone()
    }

    /// Usernames addressed by delete calls so far.
    #[must_use]
    pub fn delete_targets(&self) -> Vec<String> {
        self.state.lock().unwrap().delete_targets.clone()
    }

    /// Report `total` as `total_entries` instead of the real count.
    pub fn set_reported_total(&self, total: Option<u64>) {
        self.state.lock().unwrap().reported_total = total;
    }

    /// Fail list calls at `offset` with the given HTTP status.
    pub fn fail_list_at(&self, offset: u32, status: u16) {
        self.state.lock().unwrap().fail_list_at = Some((offset, status));
    }

    /// Fail every create call with the given HTTP status.
    pub fn fail_create(&self, status: u16) {
        self.state.lock().unwrap().fail_create = Some(status);
    }

    /// Fail every patch call with the given HTTP status.
    pub fn fail_patch(&self, status: u16) {
        self.state.lock().unwrap().fail_patch = Some(status);
    }

    /// Fail every delete call with the given HTTP status.
    pub fn fail_delete(&self, status: u16) {
        self.state.lock().unwrap().fail_delete = Some(status);
    }
}

fn apply_payload(user: &mut UserRecord, payload: &UserPayload) {
    user.email = payload.email.clone();
    user.username = payload.username.clone();
    user.first_name = payload.first_name.clone();
    user.last_name = payload.last_name.clone();
    if let Some(roles) = &payload.roles {
        user.roles = Some(roles.clone());
    }
}

impl Directory for MockDirectory {
    fn list_users(&self, limit: u32, offset: u32) -> Result<UserPage> {
        let mut state = self.state.lock().unwrap();
        state.list_calls.push((limit, offset));

        if let Some((at, status)) = state.fail_list_at {
            if at == offset {
                return Err(Error::http(format!("HTTP {status}"), Some(status)));
            }
        }

        let users = state
            .users
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect();
        let total_entries = state
            .reported_total
            .unwrap_or(state.users.len() as u64);

        Ok(UserPage {
            users,
            total_entries,
        })
    }

    fn create_user(&self, payload: &UserPayload) -> Result<UserRecord> {
        let mut state = self.state.lock().unwrap();
        if let Some(status) = state.fail_create {
            return Err(Error::http(format!("HTTP {status}"), Some(status)));
        }

        if state
            .users
            .iter()
            .any(|u| u.email == payload.email || u.username == payload.username)
        {
            return Err(Error::http(
                format!("Username `{}` already exists", payload.username),
                Some(409),
            ));
        }

        let mut user = UserRecord::new(&payload.email, &payload.username);
        apply_payload(&mut user, payload);
        user.active = Some(true);
        user.login_count = Some(0);
        user.failed_login_count = Some(0);
        user.created_on = Some("2024-01-01T00:00:00+00:00".to_string());
        state.users.push(user.clone());
        Ok(user)
    }

    fn patch_user(&self, username: &str, payload: &UserPayload) -> Result<UserRecord> {
        let mut state = self.state.lock().unwrap();
        state.patch_targets.push(username.to_string());
        if let Some(status) = state.fail_patch {
            return Err(Error::http(format!("HTTP {status}"), Some(status)));
        }

        let user = state
            .users
            .iter_mut()
            .find(|u| u.username == username)
            .ok_or_else(|| Error::http(format!("User `{username}` not found"), Some(404)))?;
        apply_payload(user, payload);
        Ok(user.clone())
    }

    fn delete_user(&self, username: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.delete_targets.push(username.to_string());
        if let Some(status) = state.fail_delete {
            return Err(Error::http(format!("HTTP {status}"), Some(status)));
        }

        let before = state.users.len();
        state.users.retain(|u| u.username != username);
        if state.users.len() == before {
            return Err(Error::http(format!("User `{username}` not found"), Some(404)));
        }
        Ok(())
    }
}
