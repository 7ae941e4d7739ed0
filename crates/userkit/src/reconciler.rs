//! Create/read/update/delete/import for one declared user.
//!
//! Local identity is the e-mail. Airflow addresses patch and delete by
//! username, which an SSO front-end may rewrite after creation, so those calls
//! use the current username while the identity stays put.

use crate::cache::UserCache;
use crate::error::{Error, Result};
use crate::roles;
use crate::user::{DeclaredUser, UserState};
use airflow::Directory;
use std::sync::Arc;

/// Reconciles declared users against an Airflow directory.
///
/// Share one reconciler (or one [`UserCache`]) between concurrent callers;
/// reads serialize on the cache, everything else runs unlocked.
///
/// # Example
///
/// ```
/// use airflow::MockDirectory;
/// use std::collections::BTreeSet;
/// use userkit::{DeclaredUser, Password, Reconciler};
///
/// let reconciler = Reconciler::new(MockDirectory::new());
/// let declared = DeclaredUser {
///     email: "a@x.com".into(),
///     username: "a@x.com".into(),
///     first_name: "A".into(),
///     last_name: "X".into(),
///     password: Password::new("p"),
///     roles: BTreeSet::from(["Admin".to_string()]),
/// };
///
/// let state = reconciler.create(&declared).unwrap();
/// assert_eq!(state.id(), Some("a@x.com"));
/// assert_eq!(state.active, Some(true));
/// ```
#[derive(Debug)]
pub struct Reconciler<D> {
    directory: D,
    cache: Arc<UserCache>,
}

impl<D: Directory> Reconciler<D> {
    /// Create a reconciler with its own cache.
    pub fn new(directory: D) -> Self {
        Self::with_cache(directory, Arc::new(UserCache::new()))
    }

    /// Create a reconciler sharing `cache` with other reconcilers.
    pub fn with_cache(directory: D, cache: Arc<UserCache>) -> Self {
        Self { directory, cache }
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    pub fn cache(&self) -> &Arc<UserCache> {
        &self.cache
    }

    /// Create the declared user, then read it back.
    ///
    /// If the create call fails nothing exists and no state is returned. If
    /// only the read-back fails, the error is [`Error::ReadBack`] and carries
    /// the state with its identity set.
    pub fn create(&self, declared: &DeclaredUser) -> Result<UserState> {
        declared.validate()?;

        let payload = declared.payload(&declared.email);
        self.directory
            .create_user(&payload)
            .map_err(|source| Error::Create {
                email: declared.email.clone(),
                source,
            })?;
        log::info!("Created Airflow user {}", declared.email);

        // The e-mail outlives username rewrites, so it is the identity.
        let mut state = UserState::default();
        state.apply_declared(declared);
        state.set_id(&declared.email);

        if let Err(source) = self.read(&mut state) {
            return Err(Error::ReadBack {
                email: declared.email.clone(),
                state: Box::new(state),
                source: Box::new(source),
            });
        }
        Ok(state)
    }

    /// Refresh `state` from Airflow.
    ///
    /// A user missing from the directory clears the identity and is not an
    /// error. The password is kept as the caller supplied it.
    pub fn read(&self, state: &mut UserState) -> Result<()> {
        let Some(email) = state.id().map(str::to_owned) else {
            log::debug!("Skipping read of a user without identity");
            return Ok(());
        };

        let Some(record) = self.cache.refresh_and_lookup(&self.directory, &email)? else {
            log::info!("Airflow user {email} no longer exists");
            state.clear_id();
            return Ok(());
        };

        let roles = roles::decode(&email, record.role_refs())?;
        state.apply_remote(record, roles);
        Ok(())
    }

    /// Patch the user to match `declared`, then read it back.
    ///
    /// Addressed by the declared username; the e-mail sent is the identity.
    pub fn update(&self, state: &mut UserState, declared: &DeclaredUser) -> Result<()> {
        declared.validate()?;

        let email = state
            .id()
            .map(str::to_owned)
            .ok_or(Error::MissingIdentity {
                operation: "update",
            })?;
        if declared.email != email {
            return Err(Error::ReplacementRequired {
                email,
                field: "email",
            });
        }

        let payload = declared.payload(&email);
        self.directory
            .patch_user(&declared.username, &payload)
            .map_err(|source| Error::Update {
                email: email.clone(),
                source,
            })?;
        log::info!("Updated Airflow user {email} (username {})", declared.username);

        state.apply_declared(declared);
        self.read(state)
    }

    /// Delete the user addressed by its current username.
    ///
    /// The username comes from `state`, not from a declaration: after a rewrite
    /// the declared username no longer addresses anything, while a fresh read
    /// leaves the live one in `state`. Read first when the state may be stale.
    /// A user already gone from Airflow counts as deleted.
    pub fn delete(&self, state: &mut UserState) -> Result<()> {
        let id = state.id().unwrap_or(&state.email).to_string();
        if state.username.is_empty() {
            return Err(Error::MissingIdentity {
                operation: "delete",
            });
        }

        match self.directory.delete_user(&state.username) {
            Ok(()) => log::info!("Deleted Airflow user {id} (username {})", state.username),
            Err(e) if e.is_not_found() => {
                log::debug!("Airflow user {id} was already deleted");
            }
            Err(source) => return Err(Error::Delete { id, source }),
        }

        state.clear_id();
        Ok(())
    }

    /// Seed a state from an e-mail and read the rest from Airflow.
    ///
    /// The returned state has no identity if no such user exists.
    pub fn import(&self, key: &str) -> Result<UserState> {
        let mut state = UserState::import(key);
        self.read(&mut state)?;
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::Password;
    use airflow::{MockDirectory, RoleRef, UserRecord};
    use std::collections::BTreeSet;
    use std::thread;

    fn declared(email: &str, username: &str) -> DeclaredUser {
        DeclaredUser {
            email: email.to_string(),
            username: username.to_string(),
            first_name: "A".to_string(),
            last_name: "X".to_string(),
            password: Password::new("p"),
            roles: BTreeSet::from(["Admin".to_string()]),
        }
    }

    fn setup() -> (MockDirectory, Reconciler<MockDirectory>) {
        let mock = MockDirectory::new();
        (mock.clone(), Reconciler::new(mock))
    }

    #[test]
    fn test_create_then_read_round_trips() {
        let (mock, reconciler) = setup();
        let mut user = declared("a@x.com", "a@x.com");
        user.roles.insert("Op".to_string());

        let mut state = reconciler.create(&user).unwrap();
        assert_eq!(state.id(), Some("a@x.com"));

        state.password = Password::new("local");
        reconciler.read(&mut state).unwrap();
        assert_eq!(state.email, user.email);
        assert_eq!(state.username, user.username);
        assert_eq!(state.first_name, user.first_name);
        assert_eq!(state.last_name, user.last_name);
        assert_eq!(state.roles, user.roles);
        assert_eq!(state.password.expose(), "local");
        assert!(mock.user("a@x.com").is_some());
    }

    #[test]
    fn test_create_populates_computed_fields() {
        let (mock, reconciler) = setup();
        let state = reconciler.create(&declared("a@x.com", "a@x.com")).unwrap();

        let remote = mock.user("a@x.com").unwrap();
        assert_eq!(state.active, remote.active);
        assert_eq!(state.login_count, remote.login_count);
        assert_eq!(state.failed_login_count, remote.failed_login_count);
        assert_eq!(state.created_on, remote.created_on);
        assert_eq!(state.roles, BTreeSet::from(["Admin".to_string()]));
        assert_eq!(state.password.expose(), "p");
    }

    #[test]
    fn test_create_failure_names_email() {
        let (mock, reconciler) = setup();
        mock.fail_create(409);

        let err = reconciler.create(&declared("a@x.com", "a")).unwrap_err();
        assert!(matches!(err, Error::Create { ref email, .. } if email == "a@x.com"));
        assert!(err.to_string().contains("a@x.com"));
        assert!(mock.list_calls().is_empty());
    }

    #[test]
    fn test_create_keeps_identity_when_read_back_fails() {
        let (mock, reconciler) = setup();
        mock.fail_list_at(0, 503);

        let err = reconciler.create(&declared("a@x.com", "a")).unwrap_err();
        assert!(matches!(err, Error::ReadBack { ref email, .. } if email == "a@x.com"));
        assert!(err.is_retryable());
        assert!(mock.user("a@x.com").is_some());

        let state = err.created_state().unwrap();
        assert_eq!(state.id(), Some("a@x.com"));
        assert_eq!(state.username, "a");
        assert_eq!(state.password.expose(), "p");
    }

    #[test]
    fn test_create_rejects_invalid_before_remote_call() {
        let (mock, reconciler) = setup();
        let mut user = declared("a@x.com", "a");
        user.roles.clear();

        let err = reconciler.create(&user).unwrap_err();
        assert!(matches!(err, Error::Invalid { field: "roles", .. }));
        assert!(mock.is_empty());
    }

    #[test]
    fn test_read_missing_clears_identity() {
        let (_mock, reconciler) = setup();
        let mut state = UserState::import("ghost@x.com");

        reconciler.read(&mut state).unwrap();
        assert_eq!(state.id(), None);
    }

    #[test]
    fn test_read_after_external_delete() {
        let (mock, reconciler) = setup();
        let mut state = reconciler.create(&declared("a@x.com", "a")).unwrap();

        mock.remove("a@x.com");
        reconciler.read(&mut state).unwrap();
        assert!(!state.exists());
    }

    #[test]
    fn test_read_without_identity_is_noop() {
        let (mock, reconciler) = setup();
        let mut state = UserState::default();
        reconciler.read(&mut state).unwrap();
        assert!(mock.list_calls().is_empty());
    }

    #[test]
    fn test_read_unnamed_role_fails() {
        let (mock, reconciler) = setup();
        let mut record = UserRecord::new("a@x.com", "a");
        record.roles = Some(vec![RoleRef::default()]);
        mock.insert(record);

        let mut state = UserState::import("a@x.com");
        let err = reconciler.read(&mut state).unwrap_err();
        assert!(matches!(err, Error::MalformedRole { .. }));
        assert_eq!(state.id(), Some("a@x.com"));
    }

    #[test]
    fn test_read_refresh_failure_propagates() {
        let (mock, reconciler) = setup();
        let mut state = reconciler.create(&declared("a@x.com", "a")).unwrap();
        mock.fail_list_at(0, 500);

        let err = reconciler.read(&mut state).unwrap_err();
        assert!(matches!(err, Error::Refresh(_)));
        assert!(state.exists());
    }

    #[test]
    fn test_update_addresses_rewritten_username() {
        let (mock, reconciler) = setup();
        let mut state = reconciler.create(&declared("a@x.com", "a@x.com")).unwrap();

        // An SSO layer rewrites the username out-of-band.
        mock.rename("a@x.com", "accounts.google.com:123");
        reconciler.read(&mut state).unwrap();
        assert_eq!(state.username, "accounts.google.com:123");
        assert_eq!(state.id(), Some("a@x.com"));

        let mut changed = declared("a@x.com", &state.username);
        changed.first_name = "Alice".to_string();
        reconciler.update(&mut state, &changed).unwrap();

        assert_eq!(mock.patch_targets(), vec!["accounts.google.com:123"]);
        assert_eq!(state.id(), Some("a@x.com"));
        assert_eq!(state.first_name, "Alice");
        assert_eq!(mock.user("a@x.com").unwrap().first_name, "Alice");
    }

    #[test]
    fn test_update_changes_roles_and_echoes_password() {
        let (mock, reconciler) = setup();
        let mut state = reconciler.create(&declared("a@x.com", "a")).unwrap();

        let mut changed = declared("a@x.com", "a");
        changed.roles = BTreeSet::from(["Viewer".to_string(), "Op".to_string()]);
        changed.password = Password::new("rotated");
        reconciler.update(&mut state, &changed).unwrap();

        assert_eq!(state.roles, changed.roles);
        assert_eq!(state.password.expose(), "rotated");
        assert_eq!(mock.user("a@x.com").unwrap().role_refs().len(), 2);
    }

    #[test]
    fn test_update_rejects_email_change() {
        let (mock, reconciler) = setup();
        let mut state = reconciler.create(&declared("a@x.com", "a")).unwrap();

        let err = reconciler
            .update(&mut state, &declared("b@x.com", "a"))
            .unwrap_err();
        assert!(matches!(err, Error::ReplacementRequired { field: "email", .. }));
        assert!(mock.patch_targets().is_empty());
    }

    #[test]
    fn test_update_without_identity() {
        let (_mock, reconciler) = setup();
        let mut state = UserState::default();
        let err = reconciler
            .update(&mut state, &declared("a@x.com", "a"))
            .unwrap_err();
        assert!(matches!(err, Error::MissingIdentity { operation: "update" }));
    }

    #[test]
    fn test_update_failure_names_email() {
        let (mock, reconciler) = setup();
        let mut state = reconciler.create(&declared("a@x.com", "a")).unwrap();
        mock.fail_patch(400);

        let err = reconciler
            .update(&mut state, &declared("a@x.com", "a"))
            .unwrap_err();
        assert!(matches!(err, Error::Update { ref email, .. } if email == "a@x.com"));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let (mock, reconciler) = setup();
        let mut state = reconciler.create(&declared("a@x.com", "a")).unwrap();

        reconciler.delete(&mut state).unwrap();
        assert!(!state.exists());
        assert!(mock.is_empty());

        reconciler.delete(&mut state).unwrap();
        assert_eq!(mock.delete_targets(), vec!["a", "a"]);
    }

    #[test]
    fn test_delete_addresses_current_username() {
        let (mock, reconciler) = setup();
        let mut state = reconciler.create(&declared("a@x.com", "a@x.com")).unwrap();
        mock.rename("a@x.com", "accounts.google.com:123");
        reconciler.read(&mut state).unwrap();

        reconciler.delete(&mut state).unwrap();
        assert_eq!(mock.delete_targets(), vec!["accounts.google.com:123"]);
        assert!(mock.is_empty());
    }

    #[test]
    fn test_delete_failure_names_identity() {
        let (mock, reconciler) = setup();
        let mut state = reconciler.create(&declared("a@x.com", "a")).unwrap();
        mock.fail_delete(500);

        let err = reconciler.delete(&mut state).unwrap_err();
        assert!(matches!(err, Error::Delete { ref id, .. } if id == "a@x.com"));
        assert!(state.exists());
    }

    #[test]
    fn test_delete_without_username() {
        let (mock, reconciler) = setup();
        let mut state = UserState::import("a@x.com");
        let err = reconciler.delete(&mut state).unwrap_err();
        assert!(matches!(err, Error::MissingIdentity { operation: "delete" }));
        assert!(mock.delete_targets().is_empty());
    }

    #[test]
    fn test_import_populates_from_remote() {
        let (mock, reconciler) = setup();
        let mut record = UserRecord::new("a@x.com", "accounts.google.com:123");
        record.first_name = "A".to_string();
        record.login_count = Some(5);
        record.roles = Some(vec![RoleRef::named("Viewer")]);
        mock.insert(record);

        let state = reconciler.import("a@x.com").unwrap();
        assert_eq!(state.id(), Some("a@x.com"));
        assert_eq!(state.username, "accounts.google.com:123");
        assert_eq!(state.login_count, Some(5));
        assert_eq!(state.roles, BTreeSet::from(["Viewer".to_string()]));
        assert!(state.password.is_empty());
    }

    #[test]
    fn test_import_missing_user() {
        let (_mock, reconciler) = setup();
        let state = reconciler.import("ghost@x.com").unwrap();
        assert!(!state.exists());
    }

    #[test]
    fn test_concurrent_reads_share_cache() {
        let mock = MockDirectory::with_generated_users(230);
        let reconciler = Reconciler::new(mock.clone());

        thread::scope(|scope| {
            for i in [0, 115, 229] {
                let reconciler = &reconciler;
                scope.spawn(move || {
                    let mut state = UserState::import(format!("user{i}@example.com"));
                    reconciler.read(&mut state).unwrap();
                    assert_eq!(state.username, format!("user{i}"));
                    assert_eq!(state.roles, BTreeSet::from(["Viewer".to_string()]));
                });
            }
        });

        assert_eq!(reconciler.cache().len(), 230);
        assert_eq!(mock.list_calls().len(), 9);
    }

    #[test]
    fn test_reconcilers_share_injected_cache() {
        let mock = MockDirectory::with_generated_users(5);
        let cache = Arc::new(UserCache::new());
        let first = Reconciler::with_cache(mock.clone(), Arc::clone(&cache));
        let second = Reconciler::with_cache(mock, Arc::clone(&cache));

        first.import("user1@example.com").unwrap();
        assert_eq!(second.cache().len(), 5);
    }
}
