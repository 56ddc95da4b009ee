//! Diagnostics screen: listing, creation, and approval.

use askama::Template;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use redline_core::{DiagnosticId, DiagnosticStatus, UserId};

use crate::filters;
use crate::middleware::RequireUser;
use crate::models::records::Diagnostic;
use crate::permissions::{Action, allows};
use crate::state::AppState;

use super::{FlashQuery, PageContext, deny, redirect_with_error, redirect_with_notice, render_html};

/// Diagnostic view for templates.
#[derive(Debug, Clone)]
pub struct DiagnosticView {
    pub id: String,
    pub title: String,
    pub notes: String,
    pub status: String,
    pub awaiting_approval: bool,
}

impl From<&Diagnostic> for DiagnosticView {
    fn from(diagnostic: &Diagnostic) -> Self {
        Self {
            id: diagnostic.id.to_string(),
            title: diagnostic.title.clone(),
            notes: diagnostic.notes.clone().unwrap_or_default(),
            status: diagnostic.status.label().to_owned(),
            awaiting_approval: diagnostic.status == DiagnosticStatus::AwaitingApproval,
        }
    }
}

/// Diagnostics list page template.
#[derive(Template)]
#[template(path = "diagnostics/index.html")]
pub struct DiagnosticsIndexTemplate {
    pub ctx: PageContext,
    pub diagnostics: Vec<DiagnosticView>,
    pub can_write: bool,
    pub can_approve: bool,
    pub load_error: String,
}

/// Diagnostics list page.
#[instrument(skip(user, state))]
pub async fn index(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Query(flash): Query<FlashQuery>,
) -> Response {
    if !allows(user.role, Action::ReadDiagnostics) {
        return Redirect::to("/").into_response();
    }

    let (diagnostics, load_error) = match state.supabase() {
        None => (vec![], "The backend is not configured.".to_owned()),
        Some(supabase) => match supabase
            .postgrest()
            .from("diagnostics")
            .select("id,vehicle_id,title,notes,status,technician_id,approved_by,created_at")
            .order_desc("created_at")
            .fetch::<Vec<Diagnostic>>()
            .await
        {
            Ok(rows) => (
                rows.iter().map(DiagnosticView::from).collect(),
                String::new(),
            ),
            Err(err) => {
                tracing::error!(error = %err, "failed to fetch diagnostics");
                (vec![], "Could not load diagnostics.".to_owned())
            }
        },
    };

    let template = DiagnosticsIndexTemplate {
        ctx: PageContext::build(&user, "/diagnostics", &flash),
        diagnostics,
        can_write: allows(user.role, Action::WriteDiagnostics),
        can_approve: allows(user.role, Action::ApproveDiagnostics),
        load_error,
    };
    render_html(&template).into_response()
}

#[derive(Debug, Deserialize)]
pub struct NewDiagnosticForm {
    pub title: String,
    pub notes: Option<String>,
}

#[derive(Serialize)]
struct NewDiagnostic<'a> {
    title: &'a str,
    notes: Option<&'a str>,
    status: DiagnosticStatus,
    technician_id: UserId,
}

/// Create a diagnostic.
#[instrument(skip(user, state, form))]
pub async fn create(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Form(form): Form<NewDiagnosticForm>,
) -> Redirect {
    if !allows(user.role, Action::WriteDiagnostics) {
        return deny("/diagnostics");
    }
    let title = form.title.trim();
    if title.is_empty() {
        return redirect_with_error("/diagnostics", "A title is required.");
    }
    let Some(supabase) = state.supabase() else {
        return redirect_with_error("/diagnostics", "The backend is not configured.");
    };

    let new_diagnostic = NewDiagnostic {
        title,
        notes: form.notes.as_deref().filter(|s| !s.is_empty()),
        status: DiagnosticStatus::Pending,
        technician_id: user.id,
    };
    match supabase
        .postgrest()
        .from("diagnostics")
        .insert::<Vec<Diagnostic>>(&new_diagnostic)
        .await
    {
        Ok(_) => redirect_with_notice("/diagnostics", "Diagnostic created."),
        Err(err) => {
            tracing::error!(error = %err, "failed to create diagnostic");
            redirect_with_error("/diagnostics", "Could not create the diagnostic. Try again.")
        }
    }
}

#[derive(Serialize)]
struct Approval {
    status: DiagnosticStatus,
    approved_by: UserId,
}

/// Approve a diagnostic.
#[instrument(skip(user, state))]
pub async fn approve(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Path(id): Path<DiagnosticId>,
) -> Redirect {
    if !allows(user.role, Action::ApproveDiagnostics) {
        return deny("/diagnostics");
    }
    let Some(supabase) = state.supabase() else {
        return redirect_with_error("/diagnostics", "The backend is not configured.");
    };

    let approval = Approval {
        status: DiagnosticStatus::Approved,
        approved_by: user.id,
    };
    match supabase
        .postgrest()
        .from("diagnostics")
        .eq("id", id)
        .update::<Vec<Diagnostic>>(&approval)
        .await
    {
        Ok(_) => redirect_with_notice("/diagnostics", "Diagnostic approved."),
        Err(err) => {
            tracing::error!(error = %err, %id, "failed to approve diagnostic");
            redirect_with_error("/diagnostics", "Could not approve the diagnostic. Try again.")
        }
    }
}
