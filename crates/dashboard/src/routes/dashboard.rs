//! Dashboard overview: garage activity at a glance.
//!
//! Every role lands here, so the tiles only show data every role may read:
//! diagnostics, repairs, and stock levels.

use askama::Template;
use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse},
};
use tracing::instrument;

use redline_core::{DiagnosticStatus, RepairStatus};

use crate::filters;
use crate::middleware::RequireUser;
use crate::models::records::{Diagnostic, InventoryItem, Repair};
use crate::state::AppState;

use super::{FlashQuery, PageContext, render_html};

/// Dashboard metrics.
#[derive(Debug, Clone, Default)]
pub struct DashboardMetrics {
    pub open_repairs: usize,
    pub pending_diagnostics: usize,
    pub low_stock: usize,
}

/// Recent work item view.
#[derive(Debug, Clone)]
pub struct WorkItemView {
    pub title: String,
    pub status: String,
}

/// Dashboard template.
#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub ctx: PageContext,
    pub metrics: DashboardMetrics,
    pub recent_diagnostics: Vec<WorkItemView>,
    pub recent_repairs: Vec<WorkItemView>,
    pub load_error: String,
}

/// Dashboard page.
#[instrument(skip(user, state))]
pub async fn index(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Query(flash): Query<FlashQuery>,
) -> Html<String> {
    let mut metrics = DashboardMetrics::default();
    let mut recent_diagnostics = Vec::new();
    let mut recent_repairs = Vec::new();
    let mut load_error = String::new();

    match state.supabase() {
        None => load_error = "The backend is not configured.".to_owned(),
        Some(supabase) => {
            match supabase
                .postgrest()
                .from("diagnostics")
                .select("id,vehicle_id,title,notes,status,technician_id,approved_by,created_at")
                .order_desc("created_at")
                .limit(25)
                .fetch::<Vec<Diagnostic>>()
                .await
            {
                Ok(rows) => {
                    metrics.pending_diagnostics = rows
                        .iter()
                        .filter(|d| {
                            matches!(
                                d.status,
                                DiagnosticStatus::Pending | DiagnosticStatus::AwaitingApproval
                            )
                        })
                        .count();
                    recent_diagnostics = rows
                        .iter()
                        .take(5)
                        .map(|d| WorkItemView {
                            title: d.title.clone(),
                            status: d.status.label().to_owned(),
                        })
                        .collect();
                }
                Err(err) => {
                    tracing::error!(error = %err, "dashboard diagnostics fetch failed");
                    load_error = "Some tiles could not be loaded.".to_owned();
                }
            }

            match supabase
                .postgrest()
                .from("repairs")
                .select("id,vehicle_id,diagnostic_id,title,notes,status,assigned_to,created_at")
                .order_desc("created_at")
                .limit(25)
                .fetch::<Vec<Repair>>()
                .await
            {
                Ok(rows) => {
                    metrics.open_repairs = rows
                        .iter()
                        .filter(|r| {
                            !matches!(r.status, RepairStatus::Completed | RepairStatus::Delivered)
                        })
                        .count();
                    recent_repairs = rows
                        .iter()
                        .take(5)
                        .map(|r| WorkItemView {
                            title: r.title.clone(),
                            status: r.status.label().to_owned(),
                        })
                        .collect();
                }
                Err(err) => {
                    tracing::error!(error = %err, "dashboard repairs fetch failed");
                    load_error = "Some tiles could not be loaded.".to_owned();
                }
            }

            match supabase
                .postgrest()
                .from("inventory_items")
                .select("id,name,sku,quantity,min_quantity,unit_price_cents")
                .fetch::<Vec<InventoryItem>>()
                .await
            {
                Ok(rows) => {
                    metrics.low_stock = rows.iter().filter(|i| i.is_low()).count();
                }
                Err(err) => {
                    tracing::error!(error = %err, "dashboard inventory fetch failed");
                    load_error = "Some tiles could not be loaded.".to_owned();
                }
            }
        }
    }

    let template = DashboardTemplate {
        ctx: PageContext::build(&user, "/", &flash),
        metrics,
        recent_diagnostics,
        recent_repairs,
        load_error,
    };
    render_html(&template)
}
