//! # airflow
//!
//! Blocking client for the user directory of Airflow's stable REST API.
//!
//! This crate provides:
//! - Wire types for users, role references and user pages
//! - The [`Directory`] trait: list (paginated), create, patch, delete
//! - [`HttpDirectory`], an implementation over `ureq` with Basic or Bearer auth
//! - [`MockDirectory`], an in-memory implementation for tests
//!
//! ## Example
//!
//! ```no_run
//! use airflow::{Credentials, Directory, HttpDirectory};
//! use airflow::backend::http::DEFAULT_TIMEOUT;
//!
//! let directory = HttpDirectory::new(
//!     "http://localhost:8080/api/v1",
//!     Credentials::Bearer("token".into()),
//!     DEFAULT_TIMEOUT,
//! ).expect("valid base URL");
//!
//! let page = directory.list_users(100, 0).expect("listing failed");
//! for user in &page.users {
//!     println!("{} ({})", user.email, user.username);
//! }
//! ```
//!
//! ## Addressing
//!
//! The API keys patch and delete on the *current* username. Usernames can be
//! rewritten by SSO front-ends after a user is created, so callers that need a
//! stable identity should key on e-mail and re-read the username before
//! addressing a user.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod error;
#[allow(missing_docs)]
pub mod types;

pub use backend::http::{Credentials, HttpDirectory};
pub use backend::{Directory, MockDirectory};
pub use error::{Error, ErrorCategory, Result};
pub use types::{RoleRef, UserPage, UserPayload, UserRecord};

/// Largest page size the API accepts for `GET /users`.
pub const MAX_PAGE_LIMIT: u32 = 100;
