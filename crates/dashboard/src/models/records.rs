//! Domain row types.
//!
//! Serde mirrors of the hosted tables. The backend owns these rows; the
//! dashboard reads and writes them per screen with no local cache or queue
//! in between. Columns the dashboard never touches are simply not listed -
//! PostgREST `select` keeps the payloads narrow.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use redline_core::{
    AppointmentId, AppointmentStatus, CustomerId, DiagnosticId, DiagnosticStatus, InvoiceId,
    InvoiceStatus, MessageId, RepairId, RepairStatus, UserId, VehicleId,
};

/// Row in `customers`.
#[derive(Debug, Clone, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub disabled: bool,
    pub created_at: Option<DateTime<Utc>>,
}

/// Row in `vehicles`.
#[derive(Debug, Clone, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    pub customer_id: Option<CustomerId>,
    pub plate: String,
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub vin: Option<String>,
    #[serde(default)]
    pub disabled: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl Vehicle {
    /// "2019 Toyota Hilux" or whatever parts are known.
    #[must_use]
    pub fn description(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if let Some(year) = self.year {
            parts.push(year.to_string());
        }
        if let Some(make) = &self.make {
            parts.push(make.clone());
        }
        if let Some(model) = &self.model {
            parts.push(model.clone());
        }
        if parts.is_empty() {
            self.plate.clone()
        } else {
            parts.join(" ")
        }
    }
}

/// Row in `diagnostics`.
#[derive(Debug, Clone, Deserialize)]
pub struct Diagnostic {
    pub id: DiagnosticId,
    pub vehicle_id: Option<VehicleId>,
    pub title: String,
    pub notes: Option<String>,
    #[serde(default)]
    pub status: DiagnosticStatus,
    pub technician_id: Option<UserId>,
    pub approved_by: Option<UserId>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Row in `repairs`.
#[derive(Debug, Clone, Deserialize)]
pub struct Repair {
    pub id: RepairId,
    pub vehicle_id: Option<VehicleId>,
    pub diagnostic_id: Option<DiagnosticId>,
    pub title: String,
    pub notes: Option<String>,
    #[serde(default)]
    pub status: RepairStatus,
    pub assigned_to: Option<UserId>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Row in `appointments`.
#[derive(Debug, Clone, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    pub customer_id: Option<CustomerId>,
    pub vehicle_id: Option<VehicleId>,
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: AppointmentStatus,
    pub notes: Option<String>,
}

/// Row in `inventory_items`.
#[derive(Debug, Clone, Deserialize)]
pub struct InventoryItem {
    pub id: redline_core::InventoryItemId,
    pub name: String,
    pub sku: Option<String>,
    #[serde(default)]
    pub quantity: i64,
    pub min_quantity: Option<i64>,
    /// Money as integer cents; the backend column is `unit_price_cents`.
    pub unit_price_cents: Option<i64>,
}

impl InventoryItem {
    /// Whether the on-hand count has fallen below the reorder threshold.
    #[must_use]
    pub fn is_low(&self) -> bool {
        self.min_quantity
            .is_some_and(|min| self.quantity < min)
    }
}

/// Row in `invoices`.
#[derive(Debug, Clone, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub customer_id: Option<CustomerId>,
    #[serde(default)]
    pub total_cents: i64,
    #[serde(default)]
    pub status: InvoiceStatus,
    pub issued_at: Option<DateTime<Utc>>,
}

/// Row in `messages`.
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender_id: Option<UserId>,
    pub sender_name: Option<String>,
    pub body: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// Format integer cents as a dollar string.
#[must_use]
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.abs();
    format!("{sign}${}.{:02}", cents / 100, cents % 100)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_vehicle_description_falls_back_to_plate() {
        let json = serde_json::json!({
            "id": uuid::Uuid::new_v4(),
            "customer_id": null,
            "plate": "KX-1042",
            "make": null,
            "model": null,
            "year": null,
            "vin": null,
        });
        let vehicle: Vehicle = serde_json::from_value(json).unwrap();
        assert_eq!(vehicle.description(), "KX-1042");
        assert!(!vehicle.disabled);
    }

    #[test]
    fn test_inventory_low_threshold() {
        let json = serde_json::json!({
            "id": uuid::Uuid::new_v4(),
            "name": "Brake pads",
            "sku": "BP-200",
            "quantity": 3,
            "min_quantity": 5,
            "unit_price_cents": 4599,
        });
        let item: InventoryItem = serde_json::from_value(json).unwrap();
        assert!(item.is_low());
        assert_eq!(format_cents(item.unit_price_cents.unwrap()), "$45.99");
    }

    #[test]
    fn test_format_cents() {
        assert_eq!(format_cents(0), "$0.00");
        assert_eq!(format_cents(5), "$0.05");
        assert_eq!(format_cents(123_456), "$1234.56");
        assert_eq!(format_cents(-250), "-$2.50");
    }

    #[test]
    fn test_diagnostic_status_defaults_to_pending() {
        let json = serde_json::json!({
            "id": uuid::Uuid::new_v4(),
            "vehicle_id": null,
            "title": "Check engine light",
            "notes": null,
        });
        let diagnostic: Diagnostic = serde_json::from_value(json).unwrap();
        assert_eq!(diagnostic.status, DiagnosticStatus::Pending);
    }
}
