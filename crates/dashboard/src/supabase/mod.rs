//! Typed client for the hosted backend (Supabase).
//!
//! # Architecture
//!
//! - The backend is the source of truth - NO local persistence, direct API
//!   calls from every screen
//! - One sub-client per backend surface: [`auth`] (GoTrue), [`postgrest`]
//!   (relational rows), [`storage`] (objects), [`realtime`] (change
//!   notifications over a websocket)
//! - All HTTP goes through a single `reqwest::Client` with an end-to-end
//!   timeout, so a hung backend call surfaces as an error instead of a
//!   stuck loading flag
//!
//! # Example
//!
//! ```rust,ignore
//! use redline_dashboard::supabase::SupabaseClient;
//!
//! let client = SupabaseClient::new(&config)?;
//!
//! // Sign in and read rows as the signed-in user
//! client.auth().sign_in_with_password("fd@shop.example", "secret").await?;
//! let vehicles: Vec<Vehicle> = client
//!     .postgrest()
//!     .from("vehicles")
//!     .select("*")
//!     .order("plate")
//!     .fetch()
//!     .await?;
//! ```

pub mod auth;
pub mod postgrest;
pub mod realtime;
pub mod storage;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::config::SupabaseConfig;

pub use auth::{AuthEvent, AuthSession, GoTrueClient};
pub use postgrest::PostgrestClient;
pub use realtime::{PostgresChange, RealtimeClient, RealtimeSubscription};
pub use storage::StorageClient;

/// End-to-end timeout for every backend round-trip.
///
/// A hung call maps to [`SupabaseError::Http`] rather than leaving the
/// caller suspended indefinitely.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that can occur when talking to the hosted backend.
#[derive(Debug, Error)]
pub enum SupabaseError {
    /// Transport failure (connect, TLS, timeout).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend rejected the request.
    #[error("backend error (HTTP {status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the error body, or the raw body.
        message: String,
    },

    /// The bearer token was missing or expired.
    #[error("unauthorized")]
    Unauthorized,

    /// A `.single()` query matched no row.
    #[error("row not found")]
    NotFound,

    /// Response body did not match the expected shape.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The client was constructed with an invalid backend URL.
    #[error("invalid backend URL: {0}")]
    BadUrl(#[from] url::ParseError),

    /// Realtime websocket failure.
    #[error("realtime error: {0}")]
    Realtime(String),
}

impl SupabaseError {
    /// True when the failure was the transport, not the backend's verdict.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Realtime(_))
    }
}

/// Client for the hosted backend.
///
/// Cheap to clone; the sub-clients share one HTTP connection pool and one
/// in-memory auth session.
#[derive(Clone)]
pub struct SupabaseClient {
    inner: Arc<SupabaseClientInner>,
}

struct SupabaseClientInner {
    auth: GoTrueClient,
    postgrest: PostgrestClient,
    storage: StorageClient,
    realtime: RealtimeClient,
}

impl SupabaseClient {
    /// Create a new backend client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SupabaseError::BadUrl`] when the configured base URL cannot
    /// be joined into the per-surface endpoints, and [`SupabaseError::Http`]
    /// when the HTTP client cannot be constructed.
    pub fn new(config: &SupabaseConfig) -> Result<Self, SupabaseError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let anon_key = config.anon_key_str().to_owned();

        let auth = GoTrueClient::new(
            http.clone(),
            &config.url,
            anon_key.clone(),
            config.session_file.clone(),
        )?;
        let postgrest = PostgrestClient::new(
            http.clone(),
            &config.url,
            anon_key.clone(),
            auth.session_cell(),
        )?;
        let storage = StorageClient::new(http, &config.url, anon_key.clone(), auth.session_cell())?;
        let realtime = RealtimeClient::new(&config.url, anon_key)?;

        Ok(Self {
            inner: Arc::new(SupabaseClientInner {
                auth,
                postgrest,
                storage,
                realtime,
            }),
        })
    }

    /// The GoTrue authentication sub-client.
    #[must_use]
    pub fn auth(&self) -> &GoTrueClient {
        &self.inner.auth
    }

    /// The relational-rows sub-client.
    #[must_use]
    pub fn postgrest(&self) -> &PostgrestClient {
        &self.inner.postgrest
    }

    /// The object-storage sub-client.
    #[must_use]
    pub fn storage(&self) -> &StorageClient {
        &self.inner.storage
    }

    /// The realtime change-notification sub-client.
    #[must_use]
    pub fn realtime(&self) -> &RealtimeClient {
        &self.inner.realtime
    }
}

/// Extract a human-readable message from a backend error body.
///
/// GoTrue uses `error_description`/`msg`, PostgREST uses `message`; fall back
/// to the raw body truncated for logs.
pub(crate) fn extract_error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["error_description", "msg", "message", "error"] {
            if let Some(text) = value.get(key).and_then(|v| v.as_str()) {
                return text.to_owned();
            }
        }
    }
    body.chars().take(200).collect()
}

/// Map a non-success response to a [`SupabaseError`].
pub(crate) async fn error_from_response(response: reqwest::Response) -> SupabaseError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return SupabaseError::Unauthorized;
    }
    SupabaseError::Api {
        status: status.as_u16(),
        message: extract_error_message(&body),
    }
}

/// Join a path onto the backend base URL.
pub(crate) fn join_url(base: &Url, path: &str) -> Result<Url, SupabaseError> {
    // Url::join treats a base without a trailing slash as a file; normalize.
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        base.set_path(&format!("{}/", base.path()));
    }
    Ok(base.join(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_error_message_gotrue_shape() {
        let body = r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#;
        assert_eq!(extract_error_message(body), "Invalid login credentials");
    }

    #[test]
    fn test_extract_error_message_postgrest_shape() {
        let body = r#"{"code":"PGRST116","message":"JSON object requested, multiple (or no) rows returned"}"#;
        assert_eq!(
            extract_error_message(body),
            "JSON object requested, multiple (or no) rows returned"
        );
    }

    #[test]
    fn test_extract_error_message_falls_back_to_body() {
        assert_eq!(extract_error_message("upstream exploded"), "upstream exploded");
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_join_url_with_and_without_trailing_slash() {
        let base: Url = "https://proj.supabase.co".parse().unwrap();
        let joined = join_url(&base, "auth/v1/token").unwrap();
        assert_eq!(joined.as_str(), "https://proj.supabase.co/auth/v1/token");

        let base: Url = "https://proj.supabase.co/".parse().unwrap();
        let joined = join_url(&base, "rest/v1/profiles").unwrap();
        assert_eq!(joined.as_str(), "https://proj.supabase.co/rest/v1/profiles");
    }
}
