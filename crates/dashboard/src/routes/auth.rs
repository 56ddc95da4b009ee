//! Auth screens: login (password, PIN quick-switch, manager), lock screen,
//! logout, and password-reset request.
//!
//! Handlers surface session errors as flash banners and redirect; the
//! session store itself guarantees no error escapes unmapped.

use askama::Template;
use axum::{
    Form,
    extract::{Query, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::instrument;

use redline_core::UserId;

use crate::error::{clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::models::user::UserProfileSummary;
use crate::state::AppState;

use super::{FlashQuery, redirect_with_error, redirect_with_notice, render_html};

/// Quick-switch profile view.
#[derive(Debug, Clone)]
pub struct ProfileView {
    pub id: String,
    pub name: String,
    pub role: String,
    pub image: String,
    pub is_manager: bool,
}

impl From<&UserProfileSummary> for ProfileView {
    fn from(profile: &UserProfileSummary) -> Self {
        Self {
            id: profile.id.to_string(),
            name: profile.full_name.clone(),
            role: profile
                .role
                .map_or_else(|| "Unknown".to_owned(), |r| r.to_string()),
            image: profile.image.clone().unwrap_or_default(),
            is_manager: profile.role == Some(redline_core::Role::Manager),
        }
    }
}

/// Login page template.
#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub profiles: Vec<ProfileView>,
    pub backend_configured: bool,
    pub flash_error: String,
    pub flash_notice: String,
}

/// Lock screen template.
#[derive(Template)]
#[template(path = "lock.html")]
pub struct LockTemplate {
    pub user_name: String,
    pub user_image: String,
    pub flash_error: String,
}

/// Password-reset request template.
#[derive(Template)]
#[template(path = "reset.html")]
pub struct ResetTemplate {
    pub backend_configured: bool,
    pub flash_error: String,
    pub flash_notice: String,
}

/// Login page. A signed-in, unlocked session goes straight to the
/// dashboard; a locked one goes to the lock screen.
#[instrument(skip(state))]
pub async fn login_page(
    State(state): State<AppState>,
    Query(flash): Query<FlashQuery>,
) -> Response {
    let snapshot = state.session().snapshot();
    if snapshot.user.is_some() {
        if snapshot.is_locked {
            return Redirect::to("/lock").into_response();
        }
        return Redirect::to("/").into_response();
    }

    let template = LoginTemplate {
        profiles: snapshot.profiles.iter().map(ProfileView::from).collect(),
        backend_configured: state.supabase().is_some(),
        flash_error: flash.error.unwrap_or_default(),
        flash_notice: flash.notice.unwrap_or_default(),
    };
    render_html(&template).into_response()
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Password login.
#[instrument(skip(state, form))]
pub async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Redirect {
    match state.session().login(&form.email, &form.password).await {
        Ok(()) => after_successful_login(&state).await,
        Err(err) => {
            tracing::info!(kind = err.kind.as_str(), "login failed");
            redirect_with_error("/login", &err.message)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PinLoginForm {
    pub user_id: UserId,
    pub pin: String,
}

/// PIN quick-switch login.
#[instrument(skip(state, form))]
pub async fn login_with_pin(
    State(state): State<AppState>,
    Form(form): Form<PinLoginForm>,
) -> Redirect {
    match state.session().login_with_pin(form.user_id, &form.pin).await {
        Ok(()) => after_successful_login(&state).await,
        Err(err) => {
            tracing::info!(kind = err.kind.as_str(), "pin login failed");
            redirect_with_error("/login", &err.message)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ManagerLoginForm {
    pub user_id: UserId,
    pub password: String,
}

/// Manager password login.
#[instrument(skip(state, form))]
pub async fn login_as_manager(
    State(state): State<AppState>,
    Form(form): Form<ManagerLoginForm>,
) -> Redirect {
    match state
        .session()
        .login_as_manager(form.user_id, &form.password)
        .await
    {
        Ok(()) => after_successful_login(&state).await,
        Err(err) => {
            tracing::info!(kind = err.kind.as_str(), "manager login failed");
            redirect_with_error("/login", &err.message)
        }
    }
}

/// The profile lands asynchronously via the auth-state subscription; pull
/// it eagerly so the redirect target sees a populated session, and tag the
/// error-tracking scope with the user.
async fn after_successful_login(state: &AppState) -> Redirect {
    if let Err(err) = state.session().refresh_user_profile().await {
        tracing::warn!(error = %err, "profile fetch after login failed");
    }
    if let Some(user) = state.session().snapshot().user {
        set_sentry_user(user.id, Some(user.email.as_str()));
    }
    Redirect::to("/")
}

/// Lock screen.
#[instrument(skip(state))]
pub async fn lock_page(
    State(state): State<AppState>,
    Query(flash): Query<FlashQuery>,
) -> Response {
    let snapshot = state.session().snapshot();
    let Some(user) = snapshot.user else {
        return Redirect::to("/login").into_response();
    };
    if !snapshot.is_locked {
        return Redirect::to("/").into_response();
    }

    let template = LockTemplate {
        user_name: user.name,
        user_image: user.image.unwrap_or_default(),
        flash_error: flash.error.unwrap_or_default(),
    };
    render_html(&template).into_response()
}

/// Lock the session. Synchronous in the store; no backend call.
#[instrument(skip(state))]
pub async fn lock(State(state): State<AppState>) -> Redirect {
    if state.session().snapshot().user.is_none() {
        return Redirect::to("/login");
    }
    state.session().lock_screen();
    Redirect::to("/lock")
}

#[derive(Debug, Deserialize)]
pub struct UnlockForm {
    pub pin: String,
}

/// Unlock with the current user's PIN.
#[instrument(skip(state, form))]
pub async fn unlock(State(state): State<AppState>, Form(form): Form<UnlockForm>) -> Redirect {
    match state.session().unlock_with_pin(&form.pin).await {
        Ok(()) => Redirect::to("/"),
        Err(err) => {
            tracing::info!(kind = err.kind.as_str(), "unlock failed");
            redirect_with_error("/lock", &err.message)
        }
    }
}

/// Sign out and land on the login screen.
#[instrument(skip(state))]
pub async fn logout(State(state): State<AppState>) -> Redirect {
    if let Err(err) = state.session().logout().await {
        tracing::warn!(error = %err, "logout reported an error");
    }
    clear_sentry_user();
    Redirect::to("/login")
}

/// Password-reset request page.
#[instrument(skip(state))]
pub async fn reset_page(
    State(state): State<AppState>,
    Query(flash): Query<FlashQuery>,
) -> Html<String> {
    let template = ResetTemplate {
        backend_configured: state.supabase().is_some(),
        flash_error: flash.error.unwrap_or_default(),
        flash_notice: flash.notice.unwrap_or_default(),
    };
    render_html(&template)
}

#[derive(Debug, Deserialize)]
pub struct ResetForm {
    pub email: String,
}

/// Ask the backend to email a password-reset link that lands back on this
/// application's base URL.
#[instrument(skip(state, form))]
pub async fn reset(State(state): State<AppState>, Form(form): Form<ResetForm>) -> Redirect {
    let Some(supabase) = state.supabase() else {
        return redirect_with_error(
            "/auth/reset",
            "The backend is not configured. Set SUPABASE_URL and SUPABASE_ANON_KEY.",
        );
    };

    let redirect_to = state.config().password_reset_redirect();
    match supabase
        .auth()
        .reset_password_for_email(&form.email, &redirect_to)
        .await
    {
        Ok(()) => redirect_with_notice(
            "/auth/reset",
            "If that address has an account, a reset link is on its way.",
        ),
        Err(err) => {
            tracing::warn!(error = %err, "password reset request failed");
            redirect_with_error("/auth/reset", "Could not request a reset link. Try again.")
        }
    }
}
