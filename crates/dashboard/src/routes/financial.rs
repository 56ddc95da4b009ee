//! Financial screen: invoice listing, read-only.

use askama::Template;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use tracing::instrument;

use crate::filters;
use crate::middleware::RequireUser;
use crate::models::records::{Invoice, format_cents};
use crate::permissions::{Action, allows};
use crate::state::AppState;

use super::{FlashQuery, PageContext, render_html};

/// Invoice view for templates.
#[derive(Debug, Clone)]
pub struct InvoiceView {
    pub id: String,
    pub total: String,
    pub status: String,
    pub issued: String,
}

impl From<&Invoice> for InvoiceView {
    fn from(invoice: &Invoice) -> Self {
        Self {
            id: invoice.id.to_string(),
            total: format_cents(invoice.total_cents),
            status: invoice.status.label().to_owned(),
            issued: invoice
                .issued_at
                .map(|t| t.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
        }
    }
}

/// Financial page template.
#[derive(Template)]
#[template(path = "financial/index.html")]
pub struct FinancialTemplate {
    pub ctx: PageContext,
    pub invoices: Vec<InvoiceView>,
    pub total_outstanding: String,
    pub load_error: String,
}

/// Financial overview page.
#[instrument(skip(user, state))]
pub async fn index(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Query(flash): Query<FlashQuery>,
) -> Response {
    if !allows(user.role, Action::ReadInvoices) {
        return Redirect::to("/").into_response();
    }

    let (invoices, load_error) = match state.supabase() {
        None => (vec![], "The backend is not configured.".to_owned()),
        Some(supabase) => match supabase
            .postgrest()
            .from("invoices")
            .select("id,customer_id,total_cents,status,issued_at")
            .order_desc("issued_at")
            .fetch::<Vec<Invoice>>()
            .await
        {
            Ok(rows) => (rows, String::new()),
            Err(err) => {
                tracing::error!(error = %err, "failed to fetch invoices");
                (vec![], "Could not load invoices.".to_owned())
            }
        },
    };

    let outstanding: i64 = invoices
        .iter()
        .filter(|i| {
            matches!(
                i.status,
                redline_core::InvoiceStatus::Sent | redline_core::InvoiceStatus::Overdue
            )
        })
        .map(|i| i.total_cents)
        .sum();

    let template = FinancialTemplate {
        ctx: PageContext::build(&user, "/financial", &flash),
        invoices: invoices.iter().map(InvoiceView::from).collect(),
        total_outstanding: format_cents(outstanding),
        load_error,
    };
    render_html(&template).into_response()
}
