//! Settings screens: own profile (name, theme, avatar, PIN), viewing and
//! editing other users' profiles (self-or-manager), and the manager-only
//! business settings.

use askama::Template;
use axum::{
    Form,
    extract::{Multipart, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use redline_core::{ThemeMode, UserId};

use crate::filters;
use crate::middleware::RequireUser;
use crate::models::user::ProfileRow;
use crate::permissions::{Action, allows, can_edit_profile};
use crate::state::AppState;

use super::{FlashQuery, PageContext, deny, redirect_with_error, redirect_with_notice, render_html};

/// Storage bucket for avatar images.
const AVATAR_BUCKET: &str = "avatars";
/// Cap uploads well below the backend's object limit.
const MAX_AVATAR_BYTES: usize = 2 * 1024 * 1024;

/// Settings page query: managers can open another user's profile.
#[derive(Debug, Default, Deserialize)]
pub struct SettingsQuery {
    pub user: Option<UserId>,
    pub error: Option<String>,
    pub notice: Option<String>,
}

/// Profile settings template.
#[derive(Template)]
#[template(path = "settings/index.html")]
pub struct SettingsTemplate {
    pub ctx: PageContext,
    pub target_id: String,
    pub target_name: String,
    pub target_email: String,
    pub target_role: String,
    pub target_image: String,
    pub theme_mode: String,
    pub theme_color: String,
    pub is_self: bool,
    pub can_manage_business: bool,
    pub load_error: String,
}

/// Profile settings page - own profile, or another user's for managers.
#[instrument(skip(user, state))]
pub async fn index(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Query(query): Query<SettingsQuery>,
) -> Response {
    let target_id = query.user.unwrap_or(user.id);
    if !can_edit_profile(user.role, user.id, target_id) {
        return Redirect::to("/").into_response();
    }

    let flash = FlashQuery {
        error: query.error,
        notice: query.notice,
    };

    // Own profile renders from the session; another user's is fetched.
    let (target, load_error) = if target_id == user.id {
        (
            TargetProfile {
                id: user.id,
                name: user.name.clone(),
                email: user.email.to_string(),
                role: user
                    .role
                    .map_or_else(|| "Unknown".to_owned(), |r| r.to_string()),
                image: user.image.clone().unwrap_or_default(),
                theme_mode: user.theme_mode,
                theme_color: user.theme_color.clone().unwrap_or_default(),
            },
            String::new(),
        )
    } else {
        match fetch_target(&state, target_id).await {
            Ok(target) => (target, String::new()),
            Err(message) => (
                TargetProfile {
                    id: target_id,
                    name: String::new(),
                    email: String::new(),
                    role: "Unknown".to_owned(),
                    image: String::new(),
                    theme_mode: ThemeMode::System,
                    theme_color: String::new(),
                },
                message,
            ),
        }
    };

    let template = SettingsTemplate {
        ctx: PageContext::build(&user, "/settings", &flash),
        target_id: target.id.to_string(),
        target_name: target.name,
        target_email: target.email,
        target_role: target.role,
        target_image: target.image,
        theme_mode: target.theme_mode.to_string(),
        theme_color: target.theme_color,
        is_self: target_id == user.id,
        can_manage_business: allows(user.role, Action::ManageBusinessSettings),
        load_error,
    };
    render_html(&template).into_response()
}

struct TargetProfile {
    id: UserId,
    name: String,
    email: String,
    role: String,
    image: String,
    theme_mode: ThemeMode,
    theme_color: String,
}

async fn fetch_target(state: &AppState, target_id: UserId) -> Result<TargetProfile, String> {
    let Some(supabase) = state.supabase() else {
        return Err("The backend is not configured.".to_owned());
    };
    let profile: ProfileRow = supabase
        .postgrest()
        .from("profiles")
        .select("*")
        .eq("id", target_id)
        .single()
        .fetch()
        .await
        .map_err(|err| {
            tracing::error!(error = %err, %target_id, "failed to fetch profile");
            "Could not load that profile.".to_owned()
        })?;
    Ok(TargetProfile {
        id: profile.id,
        name: profile.full_name.clone().unwrap_or_default(),
        email: profile.email.clone().unwrap_or_default(),
        role: profile
            .role
            .map_or_else(|| "Unknown".to_owned(), |r| r.to_string()),
        image: profile.display_image().unwrap_or_default(),
        theme_mode: profile
            .theme_mode
            .as_deref()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default(),
        theme_color: profile.theme_color.unwrap_or_default(),
    })
}

#[derive(Debug, Deserialize)]
pub struct ProfileForm {
    pub user_id: UserId,
    pub full_name: String,
}

#[derive(Serialize)]
struct ProfilePatch<'a> {
    full_name: &'a str,
}

/// Update a profile's display name (self or manager).
#[instrument(skip(user, state, form))]
pub async fn update_profile(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Form(form): Form<ProfileForm>,
) -> Redirect {
    if !can_edit_profile(user.role, user.id, form.user_id) {
        return deny("/settings");
    }
    let name = form.full_name.trim();
    if name.is_empty() {
        return redirect_with_error("/settings", "The name cannot be empty.");
    }
    let Some(supabase) = state.supabase() else {
        return redirect_with_error("/settings", "The backend is not configured.");
    };

    match supabase
        .postgrest()
        .from("profiles")
        .eq("id", form.user_id)
        .update::<Vec<ProfileRow>>(&ProfilePatch { full_name: name })
        .await
    {
        Ok(_) => {
            refresh_if_self(&state, &user, form.user_id).await;
            redirect_with_notice("/settings", "Profile updated.")
        }
        Err(err) => {
            tracing::error!(error = %err, "failed to update profile");
            redirect_with_error("/settings", "Could not update the profile. Try again.")
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ThemeForm {
    pub user_id: UserId,
    pub theme_mode: String,
    pub theme_color: Option<String>,
}

#[derive(Serialize)]
struct ThemePatch<'a> {
    theme_mode: &'a str,
    theme_color: Option<&'a str>,
}

/// Update a profile's theme preference (self or manager).
#[instrument(skip(user, state, form))]
pub async fn update_theme(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Form(form): Form<ThemeForm>,
) -> Redirect {
    if !can_edit_profile(user.role, user.id, form.user_id) {
        return deny("/settings");
    }
    let Ok(mode) = form.theme_mode.parse::<ThemeMode>() else {
        return redirect_with_error("/settings", "Unknown theme mode.");
    };
    let Some(supabase) = state.supabase() else {
        return redirect_with_error("/settings", "The backend is not configured.");
    };

    let patch = ThemePatch {
        theme_mode: mode.as_str(),
        theme_color: form.theme_color.as_deref().filter(|s| !s.is_empty()),
    };
    match supabase
        .postgrest()
        .from("profiles")
        .eq("id", form.user_id)
        .update::<Vec<ProfileRow>>(&patch)
        .await
    {
        Ok(_) => {
            refresh_if_self(&state, &user, form.user_id).await;
            redirect_with_notice("/settings", "Theme updated.")
        }
        Err(err) => {
            tracing::error!(error = %err, "failed to update theme");
            redirect_with_error("/settings", "Could not update the theme. Try again.")
        }
    }
}

#[derive(Serialize)]
struct ImagePatch<'a> {
    image: &'a str,
}

/// Upload an avatar image for the signed-in user.
///
/// Persists the object, writes the public URL onto the profile row, and
/// only then mirrors the URL into the in-memory session.
#[instrument(skip(user, state, multipart))]
pub async fn upload_avatar(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Redirect {
    let Some(supabase) = state.supabase() else {
        return redirect_with_error("/settings", "The backend is not configured.");
    };

    let mut upload: Option<(Vec<u8>, String)> = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some("avatar") {
            continue;
        }
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_owned();
        match field.bytes().await {
            Ok(bytes) => upload = Some((bytes.to_vec(), content_type)),
            Err(err) => {
                tracing::warn!(error = %err, "avatar upload read failed");
            }
        }
    }

    let Some((bytes, content_type)) = upload else {
        return redirect_with_error("/settings", "No image was selected.");
    };
    if bytes.is_empty() || bytes.len() > MAX_AVATAR_BYTES {
        return redirect_with_error("/settings", "The image must be between 1 byte and 2 MB.");
    }
    let Some(extension) = extension_for(&content_type) else {
        return redirect_with_error("/settings", "Use a PNG, JPEG, or WebP image.");
    };

    let path = format!("{}.{extension}", user.id);
    if let Err(err) = supabase
        .storage()
        .upload(AVATAR_BUCKET, &path, bytes, &content_type)
        .await
    {
        tracing::error!(error = %err, "avatar upload failed");
        return redirect_with_error("/settings", "Could not upload the image. Try again.");
    }

    let url = match supabase.storage().public_url(AVATAR_BUCKET, &path) {
        Ok(url) => url.to_string(),
        Err(err) => {
            tracing::error!(error = %err, "avatar public url failed");
            return redirect_with_error("/settings", "Could not upload the image. Try again.");
        }
    };

    match supabase
        .postgrest()
        .from("profiles")
        .eq("id", user.id)
        .update::<Vec<ProfileRow>>(&ImagePatch { image: &url })
        .await
    {
        Ok(_) => {
            // The row now holds the URL; mirror it locally.
            state.session().update_user_image(Some(url));
            redirect_with_notice("/settings", "Avatar updated.")
        }
        Err(err) => {
            tracing::error!(error = %err, "failed to store avatar url");
            redirect_with_error("/settings", "Could not save the image. Try again.")
        }
    }
}

fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/png" => Some("png"),
        "image/jpeg" => Some("jpg"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
pub struct PasswordForm {
    pub password: String,
    pub password_confirm: String,
}

/// Change the signed-in user's account password.
///
/// Self-only by construction: the backend changes the password behind the
/// session's own bearer token.
#[instrument(skip(user, state, form))]
pub async fn update_password(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Form(form): Form<PasswordForm>,
) -> Redirect {
    if form.password.len() < 8 {
        return redirect_with_error("/settings", "The password must be at least 8 characters.");
    }
    if form.password != form.password_confirm {
        return redirect_with_error("/settings", "The passwords do not match.");
    }
    let Some(supabase) = state.supabase() else {
        return redirect_with_error("/settings", "The backend is not configured.");
    };

    match supabase.auth().update_user_password(&form.password).await {
        Ok(()) => redirect_with_notice("/settings", "Password changed."),
        Err(err) => {
            tracing::error!(error = %err, user_id = %user.id, "failed to change password");
            redirect_with_error("/settings", "Could not change the password. Try again.")
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PinForm {
    pub pin: String,
    pub password: String,
}

#[derive(Serialize)]
struct PinUpsert<'a> {
    user_id: UserId,
    pin: &'a str,
    email: &'a str,
    password: &'a str,
}

/// Set the signed-in user's PIN.
///
/// The row also stores the credentials the PIN quick-switch login derives
/// its sign-in from, so the account password is required here.
#[instrument(skip(user, state, form))]
pub async fn set_pin(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Form(form): Form<PinForm>,
) -> Redirect {
    let pin = form.pin.trim();
    if pin.len() < 4 || pin.len() > 8 || !pin.chars().all(|c| c.is_ascii_digit()) {
        return redirect_with_error("/settings", "The PIN must be 4 to 8 digits.");
    }
    if form.password.is_empty() {
        return redirect_with_error("/settings", "The account password is required.");
    }
    let Some(supabase) = state.supabase() else {
        return redirect_with_error("/settings", "The backend is not configured.");
    };

    let row = PinUpsert {
        user_id: user.id,
        pin,
        email: user.email.as_str(),
        password: &form.password,
    };
    match supabase
        .postgrest()
        .from("user_pins")
        .upsert()
        .insert::<serde_json::Value>(&row)
        .await
    {
        Ok(_) => redirect_with_notice("/settings", "PIN updated."),
        Err(err) => {
            tracing::error!(error = %err, "failed to set pin");
            redirect_with_error("/settings", "Could not set the PIN. Try again.")
        }
    }
}

async fn refresh_if_self(state: &AppState, user: &crate::models::user::User, target: UserId) {
    if target == user.id
        && let Err(err) = state.session().refresh_user_profile().await
    {
        tracing::warn!(error = %err, "session refresh after settings change failed");
    }
}

// =============================================================================
// Business settings (manager only)
// =============================================================================

/// Row in `business_settings` - a single-row table keyed by id 1.
#[derive(Debug, Clone, Deserialize)]
struct BusinessRow {
    #[allow(dead_code)]
    id: i64,
    shop_name: Option<String>,
    phone: Option<String>,
    address: Option<String>,
    /// Sales tax in basis points (825 = 8.25%).
    tax_rate_bps: Option<i64>,
}

/// Business settings template.
#[derive(Template)]
#[template(path = "settings/business.html")]
pub struct BusinessTemplate {
    pub ctx: PageContext,
    pub shop_name: String,
    pub phone: String,
    pub address: String,
    pub tax_rate_bps: i64,
    pub load_error: String,
}

/// Business settings page (manager only).
#[instrument(skip(user, state))]
pub async fn business_page(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Query(flash): Query<FlashQuery>,
) -> Response {
    if !allows(user.role, Action::ManageBusinessSettings) {
        return Redirect::to("/").into_response();
    }

    let (row, load_error) = match state.supabase() {
        None => (None, "The backend is not configured.".to_owned()),
        Some(supabase) => match supabase
            .postgrest()
            .from("business_settings")
            .select("*")
            .eq("id", 1)
            .single()
            .fetch::<BusinessRow>()
            .await
        {
            Ok(row) => (Some(row), String::new()),
            Err(crate::supabase::SupabaseError::NotFound) => (None, String::new()),
            Err(err) => {
                tracing::error!(error = %err, "failed to fetch business settings");
                (None, "Could not load business settings.".to_owned())
            }
        },
    };

    let template = BusinessTemplate {
        ctx: PageContext::build(&user, "/settings/business", &flash),
        shop_name: row
            .as_ref()
            .and_then(|r| r.shop_name.clone())
            .unwrap_or_else(|| "Redline Garage".to_owned()),
        phone: row.as_ref().and_then(|r| r.phone.clone()).unwrap_or_default(),
        address: row
            .as_ref()
            .and_then(|r| r.address.clone())
            .unwrap_or_default(),
        tax_rate_bps: row.as_ref().and_then(|r| r.tax_rate_bps).unwrap_or(0),
        load_error,
    };
    render_html(&template).into_response()
}

#[derive(Debug, Deserialize)]
pub struct BusinessForm {
    pub shop_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub tax_rate_bps: Option<i64>,
}

#[derive(Serialize)]
struct BusinessUpsert<'a> {
    id: i64,
    shop_name: &'a str,
    phone: Option<&'a str>,
    address: Option<&'a str>,
    tax_rate_bps: i64,
}

/// Update business settings (manager only).
#[instrument(skip(user, state, form))]
pub async fn update_business(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Form(form): Form<BusinessForm>,
) -> Redirect {
    if !allows(user.role, Action::ManageBusinessSettings) {
        return deny("/settings/business");
    }
    let Some(supabase) = state.supabase() else {
        return redirect_with_error("/settings/business", "The backend is not configured.");
    };

    let row = BusinessUpsert {
        id: 1,
        shop_name: form.shop_name.trim(),
        phone: form.phone.as_deref().filter(|s| !s.is_empty()),
        address: form.address.as_deref().filter(|s| !s.is_empty()),
        tax_rate_bps: form.tax_rate_bps.unwrap_or(0).clamp(0, 10_000),
    };
    match supabase
        .postgrest()
        .from("business_settings")
        .upsert()
        .insert::<serde_json::Value>(&row)
        .await
    {
        Ok(_) => redirect_with_notice("/settings/business", "Business settings saved."),
        Err(err) => {
            tracing::error!(error = %err, "failed to save business settings");
            redirect_with_error(
                "/settings/business",
                "Could not save business settings. Try again.",
            )
        }
    }
}
