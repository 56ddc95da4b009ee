//! Repairs screen: listing, creation, and status changes.

use askama::Template;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use redline_core::{RepairId, RepairStatus, UserId};

use crate::filters;
use crate::middleware::RequireUser;
use crate::models::records::Repair;
use crate::permissions::{Action, allows};
use crate::state::AppState;

use super::{FlashQuery, PageContext, deny, redirect_with_error, redirect_with_notice, render_html};

/// Repair view for templates.
#[derive(Debug, Clone)]
pub struct RepairView {
    pub id: String,
    pub title: String,
    pub notes: String,
    pub status: String,
    pub done: bool,
}

impl From<&Repair> for RepairView {
    fn from(repair: &Repair) -> Self {
        Self {
            id: repair.id.to_string(),
            title: repair.title.clone(),
            notes: repair.notes.clone().unwrap_or_default(),
            status: repair.status.label().to_owned(),
            done: matches!(
                repair.status,
                RepairStatus::Completed | RepairStatus::Delivered
            ),
        }
    }
}

/// Repairs list page template.
#[derive(Template)]
#[template(path = "repairs/index.html")]
pub struct RepairsIndexTemplate {
    pub ctx: PageContext,
    pub repairs: Vec<RepairView>,
    pub can_write: bool,
    pub load_error: String,
}

/// Repairs list page.
#[instrument(skip(user, state))]
pub async fn index(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Query(flash): Query<FlashQuery>,
) -> Response {
    if !allows(user.role, Action::ReadRepairs) {
        return Redirect::to("/").into_response();
    }

    let (repairs, load_error) = match state.supabase() {
        None => (vec![], "The backend is not configured.".to_owned()),
        Some(supabase) => match supabase
            .postgrest()
            .from("repairs")
            .select("id,vehicle_id,diagnostic_id,title,notes,status,assigned_to,created_at")
            .order_desc("created_at")
            .fetch::<Vec<Repair>>()
            .await
        {
            Ok(rows) => (rows.iter().map(RepairView::from).collect(), String::new()),
            Err(err) => {
                tracing::error!(error = %err, "failed to fetch repairs");
                (vec![], "Could not load repairs.".to_owned())
            }
        },
    };

    let template = RepairsIndexTemplate {
        ctx: PageContext::build(&user, "/repairs", &flash),
        repairs,
        can_write: allows(user.role, Action::WriteRepairs),
        load_error,
    };
    render_html(&template).into_response()
}

#[derive(Debug, Deserialize)]
pub struct NewRepairForm {
    pub title: String,
    pub notes: Option<String>,
}

#[derive(Serialize)]
struct NewRepair<'a> {
    title: &'a str,
    notes: Option<&'a str>,
    status: RepairStatus,
    assigned_to: UserId,
}

/// Create a repair order.
#[instrument(skip(user, state, form))]
pub async fn create(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Form(form): Form<NewRepairForm>,
) -> Redirect {
    if !allows(user.role, Action::WriteRepairs) {
        return deny("/repairs");
    }
    let title = form.title.trim();
    if title.is_empty() {
        return redirect_with_error("/repairs", "A title is required.");
    }
    let Some(supabase) = state.supabase() else {
        return redirect_with_error("/repairs", "The backend is not configured.");
    };

    let new_repair = NewRepair {
        title,
        notes: form.notes.as_deref().filter(|s| !s.is_empty()),
        status: RepairStatus::Queued,
        assigned_to: user.id,
    };
    match supabase
        .postgrest()
        .from("repairs")
        .insert::<Vec<Repair>>(&new_repair)
        .await
    {
        Ok(_) => redirect_with_notice("/repairs", "Repair order created."),
        Err(err) => {
            tracing::error!(error = %err, "failed to create repair");
            redirect_with_error("/repairs", "Could not create the repair order. Try again.")
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusForm {
    pub status: String,
}

#[derive(Serialize)]
struct SetStatus {
    status: RepairStatus,
}

/// Update a repair's status.
#[instrument(skip(user, state, form))]
pub async fn set_status(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Path(id): Path<RepairId>,
    Form(form): Form<StatusForm>,
) -> Redirect {
    if !allows(user.role, Action::WriteRepairs) {
        return deny("/repairs");
    }
    let Ok(status) = form.status.parse::<RepairStatus>() else {
        return redirect_with_error("/repairs", "Unknown repair status.");
    };
    let Some(supabase) = state.supabase() else {
        return redirect_with_error("/repairs", "The backend is not configured.");
    };

    match supabase
        .postgrest()
        .from("repairs")
        .eq("id", id)
        .update::<Vec<Repair>>(&SetStatus { status })
        .await
    {
        Ok(_) => redirect_with_notice("/repairs", "Repair updated."),
        Err(err) => {
            tracing::error!(error = %err, %id, "failed to update repair");
            redirect_with_error("/repairs", "Could not update the repair. Try again.")
        }
    }
}
