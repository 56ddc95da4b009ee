//! Status enums for domain entities.
//!
//! These map to the string columns the hosted backend stores; serde uses
//! `snake_case` to match the column values exactly.

use serde::{Deserialize, Serialize};

/// Lifecycle of a diagnostic report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticStatus {
    #[default]
    Pending,
    InProgress,
    /// Finished by a technician, waiting for front-desk or manager sign-off.
    AwaitingApproval,
    Approved,
    Completed,
}

impl DiagnosticStatus {
    /// Human-readable label for screens.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::InProgress => "In progress",
            Self::AwaitingApproval => "Awaiting approval",
            Self::Approved => "Approved",
            Self::Completed => "Completed",
        }
    }
}

/// Lifecycle of a repair order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RepairStatus {
    #[default]
    Queued,
    InProgress,
    /// Blocked on parts or customer approval.
    OnHold,
    Completed,
    /// Vehicle returned to the customer.
    Delivered,
}

impl RepairStatus {
    /// Human-readable label for screens.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Queued => "Queued",
            Self::InProgress => "In progress",
            Self::OnHold => "On hold",
            Self::Completed => "Completed",
            Self::Delivered => "Delivered",
        }
    }
}

impl std::str::FromStr for RepairStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "in_progress" => Ok(Self::InProgress),
            "on_hold" => Ok(Self::OnHold),
            "completed" => Ok(Self::Completed),
            "delivered" => Ok(Self::Delivered),
            other => Err(format!("invalid repair status: {other}")),
        }
    }
}

/// Lifecycle of a calendar appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    #[default]
    Scheduled,
    CheckedIn,
    Completed,
    NoShow,
}

impl AppointmentStatus {
    /// Human-readable label for screens.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Scheduled => "Scheduled",
            Self::CheckedIn => "Checked in",
            Self::Completed => "Completed",
            Self::NoShow => "No-show",
        }
    }
}

/// Lifecycle of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    #[default]
    Draft,
    Sent,
    Paid,
    Overdue,
    Void,
}

impl InvoiceStatus {
    /// Human-readable label for screens.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Sent => "Sent",
            Self::Paid => "Paid",
            Self::Overdue => "Overdue",
            Self::Void => "Void",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_snake_case_column_values() {
        assert_eq!(
            serde_json::to_string(&DiagnosticStatus::AwaitingApproval).unwrap(),
            "\"awaiting_approval\""
        );
        assert_eq!(
            serde_json::to_string(&RepairStatus::OnHold).unwrap(),
            "\"on_hold\""
        );
        assert_eq!(
            serde_json::to_string(&AppointmentStatus::NoShow).unwrap(),
            "\"no_show\""
        );
    }

    #[test]
    fn test_repair_status_parses_form_values() {
        assert_eq!(
            "in_progress".parse::<RepairStatus>(),
            Ok(RepairStatus::InProgress)
        );
        assert!("fixed".parse::<RepairStatus>().is_err());
    }
}
