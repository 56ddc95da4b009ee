//! Staff directory, with manager-only role changes.

use askama::Template;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use redline_core::{Role, UserId};

use crate::filters;
use crate::middleware::RequireUser;
use crate::models::user::ProfileRow;
use crate::permissions::{Action, allows};
use crate::state::AppState;

use super::{FlashQuery, PageContext, deny, redirect_with_error, redirect_with_notice, render_html};

/// Staff member view for templates.
#[derive(Debug, Clone)]
pub struct StaffView {
    pub id: String,
    pub name: String,
    pub role: String,
    pub image: String,
}

/// Staff directory template.
#[derive(Template)]
#[template(path = "staff/index.html")]
pub struct StaffTemplate {
    pub ctx: PageContext,
    pub staff: Vec<StaffView>,
    pub can_manage: bool,
    pub roles: Vec<String>,
    pub load_error: String,
}

/// Staff directory page.
///
/// The list is the session store's quick-switch list, refreshed on demand
/// here and on realtime profile changes in the background.
#[instrument(skip(user, state))]
pub async fn index(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Query(flash): Query<FlashQuery>,
) -> Response {
    if !allows(user.role, Action::ReadStaff) {
        return Redirect::to("/").into_response();
    }

    let load_error = match state.session().fetch_user_profiles().await {
        Ok(()) => String::new(),
        Err(err) => {
            tracing::error!(error = %err, "failed to refresh staff list");
            "Could not load the staff list.".to_owned()
        }
    };

    let staff = state
        .session()
        .snapshot()
        .profiles
        .iter()
        .map(|profile| StaffView {
            id: profile.id.to_string(),
            name: profile.full_name.clone(),
            role: profile
                .role
                .map_or_else(|| "Unknown".to_owned(), |r| r.to_string()),
            image: profile.image.clone().unwrap_or_default(),
        })
        .collect();

    let template = StaffTemplate {
        ctx: PageContext::build(&user, "/staff", &flash),
        staff,
        can_manage: allows(user.role, Action::ManageStaff),
        roles: Role::ALL.iter().map(ToString::to_string).collect(),
        load_error,
    };
    render_html(&template).into_response()
}

#[derive(Debug, Deserialize)]
pub struct SetRoleForm {
    pub role: String,
}

#[derive(Serialize)]
struct SetRole {
    role: Role,
}

/// Change a staff member's role (manager only).
#[instrument(skip(user, state, form))]
pub async fn set_role(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Form(form): Form<SetRoleForm>,
) -> Redirect {
    if !allows(user.role, Action::ManageStaff) {
        return deny("/staff");
    }
    let Ok(role) = form.role.parse::<Role>() else {
        return redirect_with_error("/staff", "Unknown role.");
    };
    let Some(supabase) = state.supabase() else {
        return redirect_with_error("/staff", "The backend is not configured.");
    };

    match supabase
        .postgrest()
        .from("profiles")
        .eq("id", id)
        .update::<Vec<ProfileRow>>(&SetRole { role })
        .await
    {
        Ok(_) => {
            // Keep the quick-switch list in step without waiting for the
            // realtime notification.
            if let Err(err) = state.session().fetch_user_profiles().await {
                tracing::warn!(error = %err, "staff list refresh after role change failed");
            }
            redirect_with_notice("/staff", "Role updated.")
        }
        Err(err) => {
            tracing::error!(error = %err, %id, "failed to update role");
            redirect_with_error("/staff", "Could not update the role. Try again.")
        }
    }
}
