//! GoTrue authentication sub-client.
//!
//! Owns the in-memory auth session (access + refresh token) shared with the
//! other sub-clients, optionally persists it to a session file so a restart
//! can restore the signed-in user, and broadcasts auth state changes
//! (signed-in, signed-out, token-refreshed) to subscribers.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, broadcast};
use url::Url;

use redline_core::UserId;

use super::{SupabaseError, error_from_response, join_url};

/// Shared, mutable slot holding the current auth session.
///
/// The PostgREST and storage sub-clients read this to pick their bearer
/// token; only this module writes it.
pub type SessionCell = Arc<RwLock<Option<AuthSession>>>;

/// Capacity of the auth event channel; slow subscribers miss old events
/// rather than blocking sign-in.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Refresh the access token this long before it actually expires.
const EXPIRY_MARGIN_SECS: i64 = 30;

/// Auth state change events, in the order the backend client observes them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// A user signed in; the profile should be (re-)fetched.
    SignedIn {
        /// The backend auth user id (same id as the profile row).
        user_id: UserId,
    },
    /// The access token was silently renewed.
    TokenRefreshed,
    /// The session ended.
    SignedOut,
}

/// The identity part of a token response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    /// Backend auth user id.
    pub id: UserId,
    /// Email the user signed in with, when the backend reports one.
    pub email: Option<String>,
}

/// An authenticated backend session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    /// Bearer token for PostgREST/storage calls.
    pub access_token: String,
    /// Token used to renew `access_token`.
    pub refresh_token: String,
    /// When `access_token` stops being accepted.
    pub expires_at: DateTime<Utc>,
    /// Who this session belongs to.
    pub user: AuthUser,
}

impl AuthSession {
    /// Whether the access token is expired (or about to be).
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at - Duration::seconds(EXPIRY_MARGIN_SECS) <= Utc::now()
    }
}

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    user: AuthUser,
}

impl From<TokenResponse> for AuthSession {
    fn from(token: TokenResponse) -> Self {
        Self {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
            user: token.user,
        }
    }
}

/// GoTrue authentication client.
pub struct GoTrueClient {
    http: reqwest::Client,
    /// `{base}/auth/v1/`.
    endpoint: Url,
    anon_key: String,
    session: SessionCell,
    events: broadcast::Sender<AuthEvent>,
    session_file: Option<PathBuf>,
}

impl GoTrueClient {
    /// Create the auth sub-client.
    ///
    /// # Errors
    ///
    /// Returns [`SupabaseError::BadUrl`] when the base URL cannot be joined.
    pub fn new(
        http: reqwest::Client,
        base: &Url,
        anon_key: String,
        session_file: Option<PathBuf>,
    ) -> Result<Self, SupabaseError> {
        let endpoint = join_url(base, "auth/v1/")?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            http,
            endpoint,
            anon_key,
            session: Arc::new(RwLock::new(None)),
            events,
            session_file,
        })
    }

    /// Handle to the shared session slot, for the sibling sub-clients.
    #[must_use]
    pub fn session_cell(&self) -> SessionCell {
        Arc::clone(&self.session)
    }

    /// Subscribe to auth state changes.
    ///
    /// The receiver sees every event emitted after this call; drop it to
    /// unsubscribe.
    #[must_use]
    pub fn on_auth_state_change(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    /// Sign in with email and password.
    ///
    /// On success the session is stored, persisted, and a
    /// [`AuthEvent::SignedIn`] is broadcast.
    ///
    /// # Errors
    ///
    /// Returns [`SupabaseError::Api`] with the backend's status when the
    /// credentials are rejected, or [`SupabaseError::Http`] on transport
    /// failure.
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, SupabaseError> {
        let url = join_url(&self.endpoint, "token?grant_type=password")?;
        let response = self
            .http
            .post(url)
            .header("apikey", &self.anon_key)
            .json(&PasswordGrant { email, password })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let token: TokenResponse = response.json().await?;
        let session = AuthSession::from(token);
        let user_id = session.user.id;
        self.store_session(Some(session.clone())).await;
        let _ = self.events.send(AuthEvent::SignedIn { user_id });
        tracing::debug!(%user_id, "signed in");
        Ok(session)
    }

    /// Return the current session, restoring or refreshing it if needed.
    ///
    /// Order of preference: a live in-memory session; a refresh of the
    /// expired in-memory session; a refresh of the session file from a
    /// previous run. A refresh rejection clears local state and yields
    /// `Ok(None)` - an absent session is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`SupabaseError::Http`] only on transport failure; backend
    /// rejection of a stale token is reported as `Ok(None)`.
    pub async fn get_session(&self) -> Result<Option<AuthSession>, SupabaseError> {
        let current = self.session.read().await.clone();
        let candidate = match current {
            Some(session) if !session.is_expired() => return Ok(Some(session)),
            Some(session) => Some(session),
            None => self.load_session_file(),
        };

        let Some(stale) = candidate else {
            return Ok(None);
        };

        match self.refresh_with(&stale.refresh_token).await {
            Ok(session) => Ok(Some(session)),
            Err(err) if err.is_transport() => Err(err),
            Err(err) => {
                tracing::debug!(error = %err, "stored session no longer valid");
                self.store_session(None).await;
                Ok(None)
            }
        }
    }

    /// Exchange a refresh token for a fresh session.
    async fn refresh_with(&self, refresh_token: &str) -> Result<AuthSession, SupabaseError> {
        let url = join_url(&self.endpoint, "token?grant_type=refresh_token")?;
        let response = self
            .http
            .post(url)
            .header("apikey", &self.anon_key)
            .json(&RefreshGrant { refresh_token })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let session = AuthSession::from(response.json::<TokenResponse>().await?);
        self.store_session(Some(session.clone())).await;
        let _ = self.events.send(AuthEvent::TokenRefreshed);
        Ok(session)
    }

    /// Sign out.
    ///
    /// The local session is always cleared and [`AuthEvent::SignedOut`]
    /// broadcast; a failure to revoke the token server-side is logged and
    /// swallowed, matching the backend SDK's behavior.
    pub async fn sign_out(&self) {
        let session = self.session.read().await.clone();
        if let Some(session) = session {
            let revoke = async {
                let url = join_url(&self.endpoint, "logout")?;
                let response = self
                    .http
                    .post(url)
                    .header("apikey", &self.anon_key)
                    .bearer_auth(&session.access_token)
                    .send()
                    .await?;
                if !response.status().is_success() {
                    return Err(error_from_response(response).await);
                }
                Ok::<_, SupabaseError>(())
            };
            if let Err(err) = revoke.await {
                tracing::warn!(error = %err, "failed to revoke session server-side");
            }
        }
        self.store_session(None).await;
        let _ = self.events.send(AuthEvent::SignedOut);
    }

    /// Change the signed-in user's password.
    ///
    /// # Errors
    ///
    /// Returns [`SupabaseError::Unauthorized`] when no session is active,
    /// otherwise the mapped backend error.
    pub async fn update_user_password(&self, new_password: &str) -> Result<(), SupabaseError> {
        let session = self
            .session
            .read()
            .await
            .clone()
            .ok_or(SupabaseError::Unauthorized)?;

        #[derive(Serialize)]
        struct UpdateUser<'a> {
            password: &'a str,
        }

        let url = join_url(&self.endpoint, "user")?;
        let response = self
            .http
            .put(url)
            .header("apikey", &self.anon_key)
            .bearer_auth(&session.access_token)
            .json(&UpdateUser {
                password: new_password,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(())
    }

    /// Ask the backend to email a password-reset link.
    ///
    /// `redirect_to` is where the emailed link lands, built from the
    /// application base URL.
    ///
    /// # Errors
    ///
    /// Returns the mapped backend error on rejection or transport failure.
    pub async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), SupabaseError> {
        #[derive(Serialize)]
        struct Recover<'a> {
            email: &'a str,
        }

        let mut url = join_url(&self.endpoint, "recover")?;
        url.query_pairs_mut().append_pair("redirect_to", redirect_to);
        let response = self
            .http
            .post(url)
            .header("apikey", &self.anon_key)
            .json(&Recover { email })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(())
    }

    /// Replace the stored session (memory + file) without emitting events.
    async fn store_session(&self, session: Option<AuthSession>) {
        self.persist_session_file(session.as_ref());
        *self.session.write().await = session;
    }

    /// Best-effort write-through of the session file.
    fn persist_session_file(&self, session: Option<&AuthSession>) {
        let Some(path) = &self.session_file else {
            return;
        };
        let result = match session {
            Some(session) => serde_json::to_vec(session)
                .map_err(std::io::Error::other)
                .and_then(|bytes| std::fs::write(path, bytes)),
            None => match std::fs::remove_file(path) {
                Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err),
                _ => Ok(()),
            },
        };
        if let Err(err) = result {
            tracing::debug!(path = %path.display(), error = %err, "session file not updated");
        }
    }

    /// Best-effort read of the session file from a previous run.
    fn load_session_file(&self) -> Option<AuthSession> {
        let path = self.session_file.as_ref()?;
        let bytes = std::fs::read(path).ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn session(expires_at: DateTime<Utc>) -> AuthSession {
        AuthSession {
            access_token: "at".into(),
            refresh_token: "rt".into(),
            expires_at,
            user: AuthUser {
                id: UserId::random(),
                email: Some("tech@redline.example".into()),
            },
        }
    }

    #[test]
    fn test_session_expiry_includes_margin() {
        assert!(session(Utc::now()).is_expired());
        assert!(session(Utc::now() + Duration::seconds(10)).is_expired());
        assert!(!session(Utc::now() + Duration::seconds(120)).is_expired());
    }

    #[test]
    fn test_token_response_maps_expires_in() {
        let json = format!(
            r#"{{"access_token":"a","refresh_token":"r","expires_in":3600,
                "token_type":"bearer","user":{{"id":"{}","email":null}}}}"#,
            uuid::Uuid::new_v4()
        );
        let token: TokenResponse = serde_json::from_str(&json).unwrap();
        let session = AuthSession::from(token);
        assert!(!session.is_expired());
        assert!(session.expires_at <= Utc::now() + Duration::seconds(3600));
    }
}
