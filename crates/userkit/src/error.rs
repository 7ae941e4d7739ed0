//! Error types for user reconciliation.

use std::fmt;

use crate::user::UserState;

/// Result type alias for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of reconciliation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The directory call failed; see the wrapped error.
    Remote,
    /// The declared user is invalid or cannot be applied in place.
    Invalid,
    /// The directory broke an API guarantee (unnamed role, inconsistent paging).
    Contract,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Remote => "Airflow request failed",
            Self::Invalid => "Invalid user declaration",
            Self::Contract => "Unexpected Airflow response",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while reconciling a user.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Creating the user failed.
    #[error("failed to create user `{email}` in Airflow: {source}")]
    Create {
        email: String,
        #[source]
        source: airflow::Error,
    },

    /// The user was created, but reading it back failed.
    ///
    /// The carried state already has its identity; keep it so the user is
    /// not orphaned in Airflow.
    #[error("created user `{email}` in Airflow but could not read it back: {source}")]
    ReadBack {
        email: String,
        state: Box<UserState>,
        #[source]
        source: Box<Error>,
    },

    /// Walking the user pages failed.
    #[error("failed to get all users from Airflow: {0}")]
    Refresh(#[source] airflow::Error),

    /// Patching the user failed.
    #[error("failed to update user `{email}` in Airflow: {source}")]
    Update {
        email: String,
        #[source]
        source: airflow::Error,
    },

    /// Deleting the user failed for a reason other than it being absent.
    #[error("failed to delete user `{id}` from Airflow: {source}")]
    Delete {
        id: String,
        #[source]
        source: airflow::Error,
    },

    /// The page walk did not converge on the reported total.
    #[error(
        "user listing did not converge: saw {seen} of {total} users after {pages} pages (offset {offset})"
    )]
    Pagination {
        seen: usize,
        total: u64,
        pages: u64,
        offset: u32,
    },

    /// A role reference came back without a name.
    #[error("role reference without a name for user `{email}`")]
    MalformedRole { email: String },

    /// A declared field failed validation.
    #[error("invalid `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },

    /// An identity-forcing field changed, so the user must be recreated.
    #[error("changing `{field}` of user `{email}` requires replacing the user")]
    ReplacementRequired { email: String, field: &'static str },

    /// The operation needs a local identity but the state has none.
    #[error("cannot {operation} a user without an identity; import or create it first")]
    MissingIdentity { operation: &'static str },
}

impl Error {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::ReadBack { source, .. } => source.category(),
            Error::Create { .. }
            | Error::Refresh(_)
            | Error::Update { .. }
            | Error::Delete { .. } => ErrorCategory::Remote,
            Error::Pagination { .. } | Error::MalformedRole { .. } => ErrorCategory::Contract,
            Error::Invalid { .. }
            | Error::ReplacementRequired { .. }
            | Error::MissingIdentity { .. } => ErrorCategory::Invalid,
        }
    }

    /// The directory error behind a remote failure.
    #[must_use]
    pub fn remote(&self) -> Option<&airflow::Error> {
        match self {
            Error::Create { source, .. }
            | Error::Update { source, .. }
            | Error::Delete { source, .. }
            | Error::Refresh(source) => Some(source),
            Error::ReadBack { source, .. } => source.remote(),
            _ => None,
        }
    }

    /// State of a user that exists in Airflow despite the error.
    #[must_use]
    pub fn created_state(&self) -> Option<&UserState> {
        match self {
            Error::ReadBack { state, .. } => Some(state),
            _ => None,
        }
    }

    /// Whether retrying the whole operation may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.remote().is_some_and(airflow::Error::is_retryable)
    }
}
