//! Authentication extractors.
//!
//! Route handlers take [`RequireUser`] to demand a signed-in, unlocked
//! session. The session itself is the app-global store in [`AppState`] -
//! this is a shared-terminal application, not a per-browser-cookie one -
//! so the extractors read the store's snapshot.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};

use crate::models::user::User;
use crate::state::AppState;

/// Extractor that requires a signed-in, unlocked user.
///
/// Not signed in: redirect to the login page (HTML) or 401 (API paths).
/// Signed in but locked: redirect to the lock screen so the PIN gate is
/// never bypassable by typing a URL.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireUser(user): RequireUser,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", user.name)
/// }
/// ```
pub struct RequireUser(pub User);

/// Error returned when authentication is required but absent.
pub enum AuthRejection {
    /// Redirect to login page (for HTML requests).
    RedirectToLogin,
    /// Redirect to the lock screen (session present but locked).
    RedirectToLock,
    /// Unauthorized response (for API requests).
    Unauthorized,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to("/login").into_response(),
            Self::RedirectToLock => Redirect::to("/lock").into_response(),
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
        }
    }
}

impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app = AppState::from_ref(state);
        let snapshot = app.session().snapshot();

        let Some(user) = snapshot.user else {
            let is_api = parts.uri.path().starts_with("/api/");
            return Err(if is_api {
                AuthRejection::Unauthorized
            } else {
                AuthRejection::RedirectToLogin
            });
        };

        if snapshot.is_locked {
            return Err(AuthRejection::RedirectToLock);
        }

        Ok(Self(user))
    }
}

/// Extractor that optionally gets the current user.
///
/// Unlike `RequireUser`, this does not reject the request; a locked
/// session still reads as `None` so anonymous screens render.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(
///     OptionalUser(user): OptionalUser,
/// ) -> impl IntoResponse {
///     match user {
///         Some(u) => format!("Hello, {}!", u.name),
///         None => "Hello, guest!".to_string(),
///     }
/// }
/// ```
pub struct OptionalUser(pub Option<User>);

impl<S> FromRequestParts<S> for OptionalUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(_parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app = AppState::from_ref(state);
        let snapshot = app.session().snapshot();
        let user = if snapshot.is_locked {
            None
        } else {
            snapshot.user
        };
        Ok(Self(user))
    }
}
