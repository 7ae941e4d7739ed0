//! Declared and local user types.
//!
//! [`DeclaredUser`] is what the caller wants to exist. [`UserState`] is the
//! local view of one managed user: its identity (the e-mail) plus whatever the
//! last read observed. Identity and addressing are deliberately separate: the
//! e-mail never changes for a managed user, while the username is refreshed on
//! every read because an SSO layer may rewrite it.

use crate::error::{Error, Result};
use crate::roles;
use airflow::{UserPayload, UserRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A plaintext password that never shows up in debug output.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Password(String);

impl Password {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The plaintext, for building request bodies.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Desired state of one Airflow user.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeclaredUser {
    /// Stable identity. Changing it means replacing the user.
    pub email: String,
    /// Remote addressing key. Changing it means replacing the user.
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: Password,
    pub roles: BTreeSet<String>,
}

impl DeclaredUser {
    /// Check required fields before anything is sent to Airflow.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("email", &self.email),
            ("username", &self.username),
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
        ] {
            if value.trim().is_empty() {
                return Err(Error::invalid(field, "must not be empty"));
            }
        }

        if !self.email.contains('@') {
            return Err(Error::invalid(
                "email",
                format!("`{}` is not an e-mail address", self.email),
            ));
        }
        if self.password.is_empty() {
            return Err(Error::invalid("password", "must not be empty"));
        }
        if self.roles.is_empty() {
            return Err(Error::invalid("roles", "at least one role is required"));
        }
        if self.roles.iter().any(|r| r.trim().is_empty()) {
            return Err(Error::invalid("roles", "role names must not be empty"));
        }

        Ok(())
    }

    /// Identity-forcing fields that differ from `state`.
    ///
    /// A non-empty result means the user cannot be updated in place.
    #[must_use]
    pub fn replacement_fields(&self, state: &UserState) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if state.id().is_some_and(|id| id != self.email) {
            fields.push("email");
        }
        if !state.username.is_empty() && state.username != self.username {
            fields.push("username");
        }
        fields
    }

    /// Request body carrying every declared field.
    pub(crate) fn payload(&self, email: &str) -> UserPayload {
        UserPayload {
            email: email.to_string(),
            username: self.username.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            password: self.password.expose().to_string(),
            roles: roles::encode(&self.roles),
        }
    }
}

/// Local state of one managed user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserState {
    /// Local identity (the e-mail). `None` means the user does not exist.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    /// Whatever the caller last supplied; never read back from Airflow.
    #[serde(skip)]
    pub password: Password,
    #[serde(default)]
    pub roles: BTreeSet<String>,

    // Computed by Airflow.
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
}

impl UserState {
    /// Seed a state from an import key (the e-mail) and nothing else.
    pub fn import(key: impl Into<String>) -> Self {
        Self {
            id: Some(key.into()),
            ..Self::default()
        }
    }

    /// Local identity, if the user exists.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        self.id.is_some()
    }

    pub(crate) fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    pub(crate) fn clear_id(&mut self) {
        self.id = None;
    }

    /// Copy declared inputs in, as planned values ahead of a read.
    pub(crate) fn apply_declared(&mut self, declared: &DeclaredUser) {
        self.email = declared.email.clone();
        self.username = declared.username.clone();
        self.first_name = declared.first_name.clone();
        self.last_name = declared.last_name.clone();
        self.password = declared.password.clone();
        self.roles = declared.roles.clone();
    }

    /// Overwrite everything except the password with what Airflow reports.
    pub(crate) fn apply_remote(&mut self, record: UserRecord, roles: BTreeSet<String>) {
        self.email = record.email;
        self.username = record.username;
        self.first_name = record.first_name;
        self.last_name = record.last_name;
        self.roles = roles;
        self.active = record.active;
        self.failed_login_count = record.failed_login_count;
        self.login_count = record.login_count;
        self.last_login = record.last_login;
        self.created_on = record.created_on;
        self.changed_on = record.changed_on;
    }
}
