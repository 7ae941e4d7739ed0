//! # userkit
//!
//! Declarative reconciliation of Airflow users.
//!
//! A [`DeclaredUser`] describes an account that should exist. The
//! [`Reconciler`] turns it into directory calls and keeps a [`UserState`] in
//! step with what Airflow reports.
//!
//! ## Identity
//!
//! Users are identified locally by e-mail, not username. Some deployments
//! (Cloud Composer, other SSO front-ends) rewrite the username after the user
//! is created; keying on e-mail keeps the local identity stable through such
//! rewrites. Patch and delete still address Airflow by the current username,
//! because that is how the API is keyed.
//!
//! ## Reads
//!
//! Airflow cannot look users up by e-mail, so every read refreshes a
//! [`UserCache`] of the whole directory (100 users per page) and looks the
//! e-mail up in it. Refreshes are serialized by a mutex; share one cache
//! between reconcilers that run concurrently.

pub mod cache;
pub mod error;
pub mod reconciler;
pub mod roles;
pub mod user;

pub use cache::UserCache;
pub use error::{Error, ErrorCategory, Result};
pub use reconciler::Reconciler;
pub use user::{DeclaredUser, Password, UserState};
