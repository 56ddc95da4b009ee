//! Vehicles screen: listing, creation, and the manager-only disable,
//! CSV export, and CSV import actions.

use askama::Template;
use axum::{
    Form,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, header},
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use redline_core::VehicleId;

use crate::filters;
use crate::middleware::RequireUser;
use crate::models::records::Vehicle;
use crate::permissions::{Action, allows};
use crate::state::AppState;

use super::{FlashQuery, PageContext, deny, redirect_with_error, redirect_with_notice, render_html};

/// Vehicle view for templates.
#[derive(Debug, Clone)]
pub struct VehicleView {
    pub id: String,
    pub plate: String,
    pub description: String,
    pub vin: String,
    pub disabled: bool,
}

impl From<&Vehicle> for VehicleView {
    fn from(vehicle: &Vehicle) -> Self {
        Self {
            id: vehicle.id.to_string(),
            plate: vehicle.plate.clone(),
            description: vehicle.description(),
            vin: vehicle.vin.clone().unwrap_or_default(),
            disabled: vehicle.disabled,
        }
    }
}

/// Vehicles list page template.
#[derive(Template)]
#[template(path = "vehicles/index.html")]
pub struct VehiclesIndexTemplate {
    pub ctx: PageContext,
    pub vehicles: Vec<VehicleView>,
    pub can_write: bool,
    pub can_disable: bool,
    pub load_error: String,
}

async fn fetch_vehicles(state: &AppState) -> Result<Vec<Vehicle>, String> {
    let Some(supabase) = state.supabase() else {
        return Err("The backend is not configured.".to_owned());
    };
    supabase
        .postgrest()
        .from("vehicles")
        .select("id,customer_id,plate,make,model,year,vin,disabled,created_at")
        .order("plate")
        .fetch::<Vec<Vehicle>>()
        .await
        .map_err(|err| {
            tracing::error!(error = %err, "failed to fetch vehicles");
            "Could not load vehicles.".to_owned()
        })
}

/// Vehicles list page.
#[instrument(skip(user, state))]
pub async fn index(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Query(flash): Query<FlashQuery>,
) -> Response {
    if !allows(user.role, Action::ReadVehicles) {
        return Redirect::to("/").into_response();
    }

    let (vehicles, load_error) = match fetch_vehicles(&state).await {
        Ok(rows) => (rows.iter().map(VehicleView::from).collect(), String::new()),
        Err(message) => (vec![], message),
    };

    let template = VehiclesIndexTemplate {
        ctx: PageContext::build(&user, "/vehicles", &flash),
        vehicles,
        can_write: allows(user.role, Action::WriteVehicles),
        can_disable: allows(user.role, Action::DisableVehicles),
        load_error,
    };
    render_html(&template).into_response()
}

#[derive(Debug, Deserialize)]
pub struct NewVehicleForm {
    pub plate: String,
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<String>,
    pub vin: Option<String>,
}

#[derive(Serialize)]
struct NewVehicle<'a> {
    plate: &'a str,
    make: Option<&'a str>,
    model: Option<&'a str>,
    year: Option<i32>,
    vin: Option<&'a str>,
}

/// Create a vehicle.
#[instrument(skip(user, state, form))]
pub async fn create(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Form(form): Form<NewVehicleForm>,
) -> Redirect {
    if !allows(user.role, Action::WriteVehicles) {
        return deny("/vehicles");
    }
    let plate = form.plate.trim();
    if plate.is_empty() {
        return redirect_with_error("/vehicles", "A plate is required.");
    }
    let Some(supabase) = state.supabase() else {
        return redirect_with_error("/vehicles", "The backend is not configured.");
    };

    let new_vehicle = NewVehicle {
        plate,
        make: form.make.as_deref().filter(|s| !s.is_empty()),
        model: form.model.as_deref().filter(|s| !s.is_empty()),
        year: form.year.as_deref().and_then(|y| y.trim().parse().ok()),
        vin: form.vin.as_deref().filter(|s| !s.is_empty()),
    };
    match supabase
        .postgrest()
        .from("vehicles")
        .insert::<Vec<Vehicle>>(&new_vehicle)
        .await
    {
        Ok(_) => redirect_with_notice("/vehicles", "Vehicle added."),
        Err(err) => {
            tracing::error!(error = %err, "failed to create vehicle");
            redirect_with_error("/vehicles", "Could not add the vehicle. Try again.")
        }
    }
}

#[derive(Serialize)]
struct SetDisabled {
    disabled: bool,
}

/// Disable a vehicle (manager only).
#[instrument(skip(user, state))]
pub async fn disable(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Path(id): Path<VehicleId>,
) -> Redirect {
    if !allows(user.role, Action::DisableVehicles) {
        return deny("/vehicles");
    }
    let Some(supabase) = state.supabase() else {
        return redirect_with_error("/vehicles", "The backend is not configured.");
    };

    match supabase
        .postgrest()
        .from("vehicles")
        .eq("id", id)
        .update::<Vec<Vehicle>>(&SetDisabled { disabled: true })
        .await
    {
        Ok(_) => redirect_with_notice("/vehicles", "Vehicle disabled."),
        Err(err) => {
            tracing::error!(error = %err, %id, "failed to disable vehicle");
            redirect_with_error("/vehicles", "Could not disable the vehicle. Try again.")
        }
    }
}

/// CSV export of the vehicle list (manager only).
#[instrument(skip(user, state))]
pub async fn export(RequireUser(user): RequireUser, State(state): State<AppState>) -> Response {
    if !allows(user.role, Action::DisableVehicles) {
        return deny("/vehicles").into_response();
    }

    let vehicles = match fetch_vehicles(&state).await {
        Ok(rows) => rows,
        Err(message) => return redirect_with_error("/vehicles", &message).into_response(),
    };

    let csv = vehicles_to_csv(&vehicles);
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/csv"));
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_static("attachment; filename=\"vehicles.csv\""),
    );
    (headers, csv).into_response()
}

#[derive(Debug, Deserialize)]
pub struct ImportForm {
    /// One `plate,make,model,year,vin` line per vehicle.
    pub csv: String,
}

/// CSV import of vehicles (manager only).
#[instrument(skip(user, state, form))]
pub async fn import(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Form(form): Form<ImportForm>,
) -> Redirect {
    if !allows(user.role, Action::DisableVehicles) {
        return deny("/vehicles");
    }
    let Some(supabase) = state.supabase() else {
        return redirect_with_error("/vehicles", "The backend is not configured.");
    };

    let rows = parse_vehicle_csv(&form.csv);
    if rows.is_empty() {
        return redirect_with_error("/vehicles", "No importable lines found.");
    }

    let mut imported = 0usize;
    let mut failed = 0usize;
    for row in &rows {
        let new_vehicle = NewVehicle {
            plate: &row.plate,
            make: row.make.as_deref(),
            model: row.model.as_deref(),
            year: row.year,
            vin: row.vin.as_deref(),
        };
        match supabase
            .postgrest()
            .from("vehicles")
            .insert::<Vec<Vehicle>>(&new_vehicle)
            .await
        {
            Ok(_) => imported += 1,
            Err(err) => {
                tracing::warn!(error = %err, plate = %row.plate, "vehicle import line failed");
                failed += 1;
            }
        }
    }

    if failed == 0 {
        redirect_with_notice("/vehicles", &format!("Imported {imported} vehicles."))
    } else {
        redirect_with_error(
            "/vehicles",
            &format!("Imported {imported} vehicles, {failed} lines failed."),
        )
    }
}

// =============================================================================
// CSV plumbing
// =============================================================================

#[derive(Debug, PartialEq, Eq)]
struct CsvVehicle {
    plate: String,
    make: Option<String>,
    model: Option<String>,
    year: Option<i32>,
    vin: Option<String>,
}

const CSV_HEADER: &str = "plate,make,model,year,vin,disabled";

fn vehicles_to_csv(vehicles: &[Vehicle]) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for vehicle in vehicles {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            csv_field(&vehicle.plate),
            csv_field(vehicle.make.as_deref().unwrap_or_default()),
            csv_field(vehicle.model.as_deref().unwrap_or_default()),
            vehicle.year.map(|y| y.to_string()).unwrap_or_default(),
            csv_field(vehicle.vin.as_deref().unwrap_or_default()),
            vehicle.disabled,
        ));
    }
    out
}

/// Quote a field when it contains a comma, quote, or newline.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_owned()
    }
}

/// Parse `plate,make,model,year,vin` lines, skipping a header and blanks.
/// Unquoted fields only - this consumes the same shape `export` produces
/// for plain values.
fn parse_vehicle_csv(input: &str) -> Vec<CsvVehicle> {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !line.to_lowercase().starts_with("plate,"))
        .filter_map(|line| {
            let mut fields = line.split(',').map(str::trim);
            let plate = fields.next().unwrap_or_default();
            if plate.is_empty() {
                return None;
            }
            let owned = |s: &str| (!s.is_empty()).then(|| s.to_owned());
            Some(CsvVehicle {
                plate: plate.to_owned(),
                make: fields.next().and_then(owned),
                model: fields.next().and_then(owned),
                year: fields.next().and_then(|y| y.parse().ok()),
                vin: fields.next().and_then(owned),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_field_quoting() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_parse_vehicle_csv_skips_header_and_blanks() {
        let input = "plate,make,model,year,vin\nKX-1042,Toyota,Hilux,2019,VIN123\n\nAB-7,,,,\n";
        let rows = parse_vehicle_csv(input);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].plate, "KX-1042");
        assert_eq!(rows[0].year, Some(2019));
        assert_eq!(rows[1].plate, "AB-7");
        assert_eq!(rows[1].make, None);
    }

    #[test]
    fn test_parse_vehicle_csv_tolerates_short_lines() {
        let rows = parse_vehicle_csv("ZZ-9,Honda");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].make.as_deref(), Some("Honda"));
        assert_eq!(rows[0].model, None);
    }
}
