//! Declared users file
//!
//! ```toml
//! [[users]]
//! email = "alice@example.com"
//! username = "alice@example.com"
//! first_name = "Alice"
//! last_name = "Example"
//! password = "${ALICE_PASSWORD}"
//! roles = ["Admin"]
//! ```
//!
//! Passwords go through environment-variable expansion so secrets can stay
//! out of the file.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use userkit::{DeclaredUser, Password};

#[derive(Debug, Default, Deserialize)]
pub struct UsersFile {
    #[serde(default)]
    pub users: Vec<DeclaredUser>,
}

impl UsersFile {
    /// Load and check a declared users file, expanding passwords from the environment
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let file = Self::parse(&content, |name| std::env::var(name).ok())
            .with_context(|| format!("Invalid users file {}", path.display()))?;
        log::debug!("Loaded {} declared users from {}", file.users.len(), path.display());
        Ok(file)
    }

    fn parse(content: &str, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut file: Self = toml::from_str(content)?;

        let mut emails = HashSet::new();
        let mut usernames = HashSet::new();
        for user in &mut file.users {
            if !emails.insert(user.email.clone()) {
                bail!("e-mail {} is declared more than once", user.email);
            }
            if !usernames.insert(user.username.clone()) {
                bail!("username {} is declared more than once", user.username);
            }
            user.password = expand_secret(&user.password, &lookup)
                .with_context(|| format!("Could not expand password of {}", user.email))?;
        }

        Ok(file)
    }

    /// The declaration for `email`
    pub fn declared(&self, email: &str) -> Result<&DeclaredUser> {
        self.users
            .iter()
            .find(|u| u.email == email)
            .with_context(|| format!("No user with e-mail {email} is declared"))
    }
}

fn expand_secret(
    password: &Password,
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<Password> {
    let expanded = shellexpand::env_with_context(password.expose(), |name| {
        lookup(name).map(Some).ok_or(std::env::VarError::NotPresent)
    })?;
    Ok(Password::new(expanded.into_owned()))
}
