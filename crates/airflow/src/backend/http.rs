//! HTTP backend for the Airflow stable REST API.
//!
//! Talks to `{base}/users` with either Basic auth (the `basic_auth` API
//! backend) or a Bearer token (Cloud Composer and other OAuth front-ends).

use crate::backend::Directory;
use crate::error::{Error, Result};
use crate::types::{UserPage, UserPayload, UserRecord};
use base64ct::{Base64, Encoding};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use ureq::http::Response;
use url::Url;

/// Default timeout applied to every request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("airflow-users/", env!("CARGO_PKG_VERSION"));

/// How requests authenticate against the API.
#[derive(Clone, Default, PartialEq, Eq)]
pub enum Credentials {
    /// No `Authorization` header.
    #[default]
    Anonymous,
    /// HTTP Basic authentication.
    Basic {
        /// Airflow account name.
        username: String,
        /// Airflow account password.
        password: String,
    },
    /// Bearer token.
    Bearer(String),
}

impl Credentials {
    fn header(&self) -> Option<String> {
        match self {
            Self::Anonymous => None,
            Self::Basic { username, password } => {
                let raw = format!("{username}:{password}");
                Some(format!("Basic {}", Base64::encode_string(raw.as_bytes())))
            }
            Self::Bearer(token) => Some(format!("Bearer {token}")),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => write!(f, "Anonymous"),
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"***")
                .finish(),
            Self::Bearer(_) => write!(f, "Bearer(***)"),
        }
    }
}

/// Airflow user directory over HTTP.
///
/// # Example
///
/// ```no_run
/// use airflow::backend::http::{Credentials, HttpDirectory, DEFAULT_TIMEOUT};
/// use airflow::backend::Directory;
///
/// let directory = HttpDirectory::new(
///     "http://localhost:8080/api/v1",
///     Credentials::Basic { username: "admin".into(), password: "admin".into() },
///     DEFAULT_TIMEOUT,
/// ).unwrap();
/// let page = directory.list_users(100, 0).unwrap();
/// println!("{} users", page.total_entries);
/// ```
pub struct HttpDirectory {
    /// HTTP agent for requests.
    agent: ureq::Agent,
    /// API base, e.g. `http://localhost:8080/api/v1`.
    base: Url,
    authorization: Option<String>,
}

impl HttpDirectory {
    /// Create a directory client for the API rooted at `base_url`.
    pub fn new(base_url: &str, credentials: Credentials, timeout: Duration) -> Result<Self> {
        let base = Url::parse(base_url).map_err(|e| Error::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(Error::InvalidUrl {
                url: base_url.to_string(),
                reason: "URL cannot be used as an API base".to_string(),
            });
        }

        // Non-2xx responses are decoded by `check` to keep the problem detail.
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();

        Ok(Self {
            agent,
            base,
            authorization: credentials.header(),
        })
    }

    /// Get the API base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base.as_str()
    }

    /// Build `{base}/users[/{username}]`, percent-encoding the username.
    fn users_url(&self, username: Option<&str>) -> Result<Url> {
        let mut url = self.base.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| Error::InvalidUrl {
                url: self.base.to_string(),
                reason: "URL cannot be used as an API base".to_string(),
            })?;
            segments.pop_if_empty().push("users");
            if let Some(username) = username {
                segments.push(username);
            }
        }
        Ok(url)
    }

    fn with_auth<B>(&self, request: ureq::RequestBuilder<B>) -> ureq::RequestBuilder<B> {
        let request = request
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT);
        match &self.authorization {
            Some(value) => request.header("Authorization", value),
            None => request,
        }
    }
}

impl fmt::Debug for HttpDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpDirectory")
            .field("base", &self.base.as_str())
            .field("authenticated", &self.authorization.is_some())
            .finish_non_exhaustive()
    }
}

impl Directory for HttpDirectory {
    fn list_users(&self, limit: u32, offset: u32) -> Result<UserPage> {
        let url = self.users_url(None)?;
        log::trace!("GET {url} limit={limit} offset={offset}");

        let response = self
            .with_auth(self.agent.get(url.as_str()))
            .query("limit", limit.to_string())
            .query("offset", offset.to_string())
            .call()?;

        Ok(check(response)?.body_mut().read_json()?)
    }

    fn create_user(&self, user: &UserPayload) -> Result<UserRecord> {
        let url = self.users_url(None)?;
        log::debug!("POST {url} email={}", user.email);

        let response = self
            .with_auth(self.agent.post(url.as_str()))
            .send_json(user)?;

        Ok(check(response)?.body_mut().read_json()?)
    }

    fn patch_user(&self, username: &str, user: &UserPayload) -> Result<UserRecord> {
        let url = self.users_url(Some(username))?;
        log::debug!("PATCH {url} email={}", user.email);

        let response = self
            .with_auth(self.agent.patch(url.as_str()))
            .send_json(user)?;

        Ok(check(response)?.body_mut().read_json()?)
    }

    fn delete_user(&self, username: &str) -> Result<()> {
        let url = self.users_url(Some(username))?;
        log::debug!("DELETE {url}");

        let response = self.with_auth(self.agent.delete(url.as_str())).call()?;
        check(response)?;
        Ok(())
    }
}

/// Problem details returned by the API on errors (RFC 7807).
#[derive(Debug, Deserialize)]
struct Problem {
    title: Option<String>,
    detail: Option<String>,
}

/// Turn a non-2xx response into an [`Error::Http`] carrying the API's detail.
fn check(mut response: Response<ureq::Body>) -> Result<Response<ureq::Body>> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.body_mut().read_to_string().unwrap_or_default();
    let message = problem_message(&body)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
    Err(Error::http(message, Some(status.as_u16())))
}

fn problem_message(body: &str) -> Option<String> {
    let problem: Problem = serde_json::from_str(body).ok()?;
    problem.detail.or(problem.title).filter(|m| !m.is_empty())
}
