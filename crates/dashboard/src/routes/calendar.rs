//! Calendar screen: upcoming appointments, read-only.

use askama::Template;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use tracing::instrument;

use crate::filters;
use crate::middleware::RequireUser;
use crate::models::records::Appointment;
use crate::permissions::{Action, allows};
use crate::state::AppState;

use super::{FlashQuery, PageContext, render_html};

/// Appointment view for templates.
#[derive(Debug, Clone)]
pub struct AppointmentView {
    pub when: String,
    pub status: String,
    pub notes: String,
}

impl From<&Appointment> for AppointmentView {
    fn from(appointment: &Appointment) -> Self {
        Self {
            when: appointment
                .scheduled_at
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "Unscheduled".to_owned()),
            status: appointment.status.label().to_owned(),
            notes: appointment.notes.clone().unwrap_or_default(),
        }
    }
}

/// Calendar page template.
#[derive(Template)]
#[template(path = "calendar/index.html")]
pub struct CalendarTemplate {
    pub ctx: PageContext,
    pub appointments: Vec<AppointmentView>,
    pub load_error: String,
}

/// Calendar page.
#[instrument(skip(user, state))]
pub async fn index(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Query(flash): Query<FlashQuery>,
) -> Response {
    if !allows(user.role, Action::ReadAppointments) {
        return Redirect::to("/").into_response();
    }

    let (appointments, load_error) = match state.supabase() {
        None => (vec![], "The backend is not configured.".to_owned()),
        Some(supabase) => match supabase
            .postgrest()
            .from("appointments")
            .select("id,customer_id,vehicle_id,scheduled_at,status,notes")
            .order("scheduled_at")
            .fetch::<Vec<Appointment>>()
            .await
        {
            Ok(rows) => (
                rows.iter().map(AppointmentView::from).collect(),
                String::new(),
            ),
            Err(err) => {
                tracing::error!(error = %err, "failed to fetch appointments");
                (vec![], "Could not load the calendar.".to_owned())
            }
        },
    };

    let template = CalendarTemplate {
        ctx: PageContext::build(&user, "/calendar", &flash),
        appointments,
        load_error,
    };
    render_html(&template).into_response()
}
