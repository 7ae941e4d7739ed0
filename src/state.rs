use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use userkit::UserState;

// ============================================================================
// State Structures
// ============================================================================

/// Managed users, keyed by e-mail
///
/// Passwords are never written here; `UserState` skips them.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StateFile {
    /// Last time the state was saved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,

    #[serde(default)]
    pub users: BTreeMap<String, UserState>,

    #[serde(skip)]
    path: PathBuf,
}

// ============================================================================
// StateFile Implementation
// ============================================================================

impl StateFile {
    /// Get the default state file path (~/.local/state/airflow-users/state.toml)
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home
            .join(".local")
            .join("state")
            .join("airflow-users")
            .join("state.toml"))
    }

    /// Load state from disk, or return empty state if the file doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("State file does not exist, using empty state");
            return Ok(Self {
                path: path.to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;

        let mut state: StateFile = toml::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;
        state.path = path.to_path_buf();

        log::debug!(
            "Loaded {} managed users from {}",
            state.users.len(),
            path.display()
        );
        Ok(state)
    }

    /// Save state to disk, updating the timestamp
    pub fn save(&mut self) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        }

        self.last_updated = Some(Utc::now());
        let content = toml::to_string_pretty(&self).context("Failed to serialize state to TOML")?;

        fs::write(&self.path, &content)
            .with_context(|| format!("Failed to write state file: {}", self.path.display()))?;

        log::debug!("Saved state to {}", self.path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// State of a managed user
    pub fn get(&self, email: &str) -> Option<&UserState> {
        self.users.get(email)
    }

    /// Whether a user with this e-mail is managed and still exists
    pub fn is_managed(&self, email: &str) -> bool {
        self.get(email).is_some_and(UserState::exists)
    }

    /// E-mails of every managed user
    pub fn emails(&self) -> Vec<String> {
        self.users.keys().cloned().collect()
    }

    /// Record the outcome of an operation on `email`
    ///
    /// A state without identity means the user is gone and is forgotten.
    pub fn record(&mut self, email: &str, state: UserState) {
        match state.id().map(str::to_owned) {
            Some(id) => {
                if id != email {
                    self.users.remove(email);
                }
                self.users.insert(id, state);
            }
            None => {
                self.forget(email);
            }
        }
    }

    /// Stop managing `email`
    pub fn forget(&mut self, email: &str) -> bool {
        self.users.remove(email).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn state_for(email: &str, username: &str) -> UserState {
        let mut state = UserState::import(email);
        state.email = email.to_string();
        state.username = username.to_string();
        state.first_name = "A".to_string();
        state.last_name = "X".to_string();
        state.roles.insert("Admin".to_string());
        state.active = Some(true);
        state.login_count = Some(3);
        state
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.toml");
        let state = StateFile::load(&path).unwrap();
        assert!(state.users.is_empty());
        assert_eq!(state.path(), path);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state.toml");

        let mut state = StateFile::load(&path).unwrap();
        state.record("a@x.com", state_for("a@x.com", "accounts.google.com:123"));
        state.save().unwrap();

        let reloaded = StateFile::load(&path).unwrap();
        assert!(reloaded.last_updated.is_some());
        let user = reloaded.get("a@x.com").unwrap();
        assert_eq!(user.id(), Some("a@x.com"));
        assert_eq!(user.username, "accounts.google.com:123");
        assert_eq!(user.login_count, Some(3));
        assert!(user.password.is_empty());
    }

    #[test]
    fn test_saved_file_has_no_password() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.toml");

        let mut user = state_for("a@x.com", "a");
        user.password = userkit::Password::new("hunter2");
        let mut state = StateFile::load(&path).unwrap();
        state.record("a@x.com", user);
        state.save().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(!content.contains("hunter2"));
        assert!(!content.contains("password"));
    }

    #[test]
    fn test_record_forgets_cleared_identity() {
        let mut state = StateFile::default();
        state.record("a@x.com", state_for("a@x.com", "a"));
        assert!(state.is_managed("a@x.com"));

        state.record("a@x.com", UserState::default());
        assert!(state.get("a@x.com").is_none());
        assert!(state.emails().is_empty());
    }

    #[test]
    fn test_forget() {
        let mut state = StateFile::default();
        state.record("a@x.com", state_for("a@x.com", "a"));
        assert!(state.forget("a@x.com"));
        assert!(!state.forget("a@x.com"));
    }
}
