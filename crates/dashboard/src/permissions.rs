//! The permission policy table.
//!
//! One typed table from role and action to yes/no - there is no
//! inheritance and no wildcard, each action hard-codes its allowed-role
//! set. Adding a role or an action is a one-place change here, not a
//! grep-and-edit across screens.
//!
//! An unrecognized role (`None`) is denied every action. That is
//! deliberately stricter than navigation, which falls back to the Front
//! Desk menu: a menu entry may render, but the screen's own checks still
//! refuse reads and writes.

use redline_core::{Role, UserId};
use redline_core::Role::{FrontDesk, Manager, Technician};

/// Everything a screen can gate on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    ReadCustomers,
    WriteCustomers,
    DisableCustomers,
    ReadVehicles,
    WriteVehicles,
    /// Disable, export, and import are one privilege level.
    DisableVehicles,
    ReadDiagnostics,
    WriteDiagnostics,
    ApproveDiagnostics,
    ReadRepairs,
    WriteRepairs,
    ReadAppointments,
    ReadInventory,
    AdjustInventory,
    ReadInvoices,
    ReadMessages,
    SendMessages,
    ReadStaff,
    ManageStaff,
    ManageBusinessSettings,
}

impl Action {
    /// The exact role set allowed to perform this action.
    #[must_use]
    pub const fn allowed_roles(self) -> &'static [Role] {
        match self {
            Self::ReadVehicles
            | Self::ReadDiagnostics
            | Self::WriteDiagnostics
            | Self::ReadRepairs
            | Self::WriteRepairs
            | Self::ReadInventory => &[Manager, FrontDesk, Technician],

            Self::ReadCustomers
            | Self::WriteCustomers
            | Self::DisableCustomers
            | Self::WriteVehicles
            | Self::ApproveDiagnostics
            | Self::AdjustInventory
            | Self::ReadInvoices
            | Self::ReadMessages
            | Self::SendMessages
            | Self::ReadStaff => &[Manager, FrontDesk],

            Self::ReadAppointments => &[Manager, Technician],

            Self::DisableVehicles | Self::ManageStaff | Self::ManageBusinessSettings => &[Manager],
        }
    }
}

/// Whether `role` may perform `action`.
///
/// `None` (missing or unrecognized role) is always denied.
#[must_use]
pub fn allows(role: Option<Role>, action: Action) -> bool {
    role.is_some_and(|role| action.allowed_roles().contains(&role))
}

/// Whether `viewer` may view or edit the settings profile of `target`.
///
/// Self, or any Manager.
#[must_use]
pub fn can_edit_profile(
    viewer_role: Option<Role>,
    viewer_id: UserId,
    target_id: UserId,
) -> bool {
    viewer_id == target_id || viewer_role == Some(Manager)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every role value a screen can see, the unknown one included.
    const ROLES: [Option<Role>; 4] = [
        Some(Manager),
        Some(FrontDesk),
        Some(Technician),
        None,
    ];

    #[test]
    fn test_vehicle_write_is_manager_or_front_desk() {
        for role in ROLES {
            let expected = matches!(role, Some(Manager | FrontDesk));
            assert_eq!(allows(role, Action::WriteVehicles), expected, "{role:?}");
        }
    }

    #[test]
    fn test_technician_reads_vehicles_but_cannot_disable() {
        assert!(allows(Some(Technician), Action::ReadVehicles));
        assert!(!allows(Some(Technician), Action::DisableVehicles));
    }

    #[test]
    fn test_disable_export_import_is_manager_only() {
        for role in ROLES {
            assert_eq!(
                allows(role, Action::DisableVehicles),
                role == Some(Manager),
                "{role:?}"
            );
        }
    }

    #[test]
    fn test_diagnostics_written_by_all_approved_by_two() {
        for role in [Manager, FrontDesk, Technician] {
            assert!(allows(Some(role), Action::WriteDiagnostics));
        }
        assert!(allows(Some(Manager), Action::ApproveDiagnostics));
        assert!(allows(Some(FrontDesk), Action::ApproveDiagnostics));
        assert!(!allows(Some(Technician), Action::ApproveDiagnostics));
    }

    #[test]
    fn test_customer_write_and_disable_match() {
        for role in ROLES {
            assert_eq!(
                allows(role, Action::WriteCustomers),
                allows(role, Action::DisableCustomers),
                "{role:?}"
            );
        }
        assert!(!allows(Some(Technician), Action::ReadCustomers));
    }

    #[test]
    fn test_unknown_role_is_denied_everything() {
        for action in [
            Action::ReadCustomers,
            Action::WriteCustomers,
            Action::DisableCustomers,
            Action::ReadVehicles,
            Action::WriteVehicles,
            Action::DisableVehicles,
            Action::ReadDiagnostics,
            Action::WriteDiagnostics,
            Action::ApproveDiagnostics,
            Action::ReadRepairs,
            Action::WriteRepairs,
            Action::ReadAppointments,
            Action::ReadInventory,
            Action::AdjustInventory,
            Action::ReadInvoices,
            Action::ReadMessages,
            Action::SendMessages,
            Action::ReadStaff,
            Action::ManageStaff,
            Action::ManageBusinessSettings,
        ] {
            assert!(!allows(None, action), "{action:?} must fail closed");
        }
    }

    #[test]
    fn test_settings_profile_is_self_or_manager() {
        let me = UserId::random();
        let other = UserId::random();
        assert!(can_edit_profile(Some(Technician), me, me));
        assert!(!can_edit_profile(Some(Technician), me, other));
        assert!(can_edit_profile(Some(Manager), me, other));
        // An unknown role may still edit itself, but nobody else.
        assert!(can_edit_profile(None, me, me));
        assert!(!can_edit_profile(None, me, other));
    }
}
