//! Role-based navigation: the static per-role menu trees and the resolver.
//!
//! `resolve_navigation` is a pure function of the role - no I/O, no state,
//! deterministic. The trees are `const` data of depth at most two (a
//! top-level entry plus one optional level of children) and are never
//! mutated at runtime. The role parameter doubles as the override used by
//! the CLI's menu preview, which renders other roles' menus without
//! touching the session.

use serde::Serialize;

use redline_core::Role;

/// The tree an unrecognized or missing role falls back to.
///
/// This is a deliberate, named policy: the menu degrades to the Front Desk
/// tree, while permission checks independently deny everything for an
/// unrecognized role. Changing the fallback means changing this constant,
/// nothing else.
pub const FALLBACK_ROLE: Role = Role::FrontDesk;

/// One sidebar entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NavigationItem {
    /// Label shown in the sidebar.
    pub title: &'static str,
    /// Path the entry links to.
    pub href: &'static str,
    /// Icon name (lucide set).
    pub icon: &'static str,
    /// Accent color for the icon.
    pub color: &'static str,
    /// Child entries; empty for leaf items. Children never have children.
    pub submenu: &'static [NavigationItem],
}

const fn leaf(
    title: &'static str,
    href: &'static str,
    icon: &'static str,
    color: &'static str,
) -> NavigationItem {
    NavigationItem {
        title,
        href,
        icon,
        color,
        submenu: &[],
    }
}

const DASHBOARD: NavigationItem = leaf("Dashboard", "/", "gauge", "#ef4444");
const CUSTOMERS: NavigationItem = leaf("Customers", "/customers", "users", "#3b82f6");
const VEHICLES: NavigationItem = leaf("Vehicles", "/vehicles", "car", "#f59e0b");
const CALENDAR: NavigationItem = leaf("Calendar", "/calendar", "calendar", "#8b5cf6");
const INVENTORY: NavigationItem = leaf("Inventory", "/inventory", "boxes", "#10b981");
const FINANCIAL: NavigationItem = leaf("Financial", "/financial", "receipt", "#0ea5e9");
const MESSAGES: NavigationItem = leaf("Messages", "/messages", "message-square", "#ec4899");
const STAFF: NavigationItem = leaf("Staff", "/staff", "id-card", "#6366f1");

const GARAGE: NavigationItem = NavigationItem {
    title: "Garage",
    href: "/diagnostics",
    icon: "wrench",
    color: "#f97316",
    submenu: &[
        leaf("Diagnostics", "/diagnostics", "stethoscope", "#f97316"),
        leaf("Repairs", "/repairs", "hammer", "#f97316"),
    ],
};

const SETTINGS_FULL: NavigationItem = NavigationItem {
    title: "Settings",
    href: "/settings",
    icon: "settings",
    color: "#64748b",
    submenu: &[
        leaf("Profile", "/settings", "user", "#64748b"),
        leaf("Staff", "/staff", "id-card", "#64748b"),
        leaf("Business", "/settings/business", "store", "#64748b"),
    ],
};

const SETTINGS_PROFILE: NavigationItem = leaf("Settings", "/settings", "settings", "#64748b");

/// Manager: the superset, including staff and business settings.
const MANAGER_NAV: &[NavigationItem] = &[
    DASHBOARD, CUSTOMERS, VEHICLES, GARAGE, CALENDAR, INVENTORY, FINANCIAL, MESSAGES,
    SETTINGS_FULL,
];

/// Front Desk: customer, financial, inventory, and staff screens, but only
/// the profile part of settings.
const FRONT_DESK_NAV: &[NavigationItem] = &[
    DASHBOARD,
    CUSTOMERS,
    VEHICLES,
    FINANCIAL,
    INVENTORY,
    STAFF,
    MESSAGES,
    SETTINGS_PROFILE,
];

/// Technician: garage work, the calendar, and inventory reads.
const TECHNICIAN_NAV: &[NavigationItem] = &[DASHBOARD, GARAGE, CALENDAR, INVENTORY];

/// Resolve the menu tree for a role.
///
/// `None` - a missing or unrecognized role - resolves to the
/// [`FALLBACK_ROLE`] tree.
#[must_use]
pub const fn resolve_navigation(role: Option<Role>) -> &'static [NavigationItem] {
    let role = match role {
        Some(role) => role,
        None => FALLBACK_ROLE,
    };
    match role {
        Role::Manager => MANAGER_NAV,
        Role::FrontDesk => FRONT_DESK_NAV,
        Role::Technician => TECHNICIAN_NAV,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn titles(items: &[NavigationItem]) -> Vec<&'static str> {
        items.iter().map(|i| i.title).collect()
    }

    #[test]
    fn test_resolution_is_deterministic() {
        for role in Role::ALL {
            let first = resolve_navigation(Some(role));
            let second = resolve_navigation(Some(role));
            assert_eq!(first, second);
            assert!(std::ptr::eq(first, second), "trees are static, not built");
        }
    }

    #[test]
    fn test_unrecognized_roles_fall_back_to_front_desk() {
        let front_desk = resolve_navigation(Some(Role::FrontDesk));
        assert_eq!(resolve_navigation(None), front_desk);
        // The lenient parse path: arbitrary strings become None.
        for raw in ["", "Nonexistent", "manager"] {
            let parsed = raw.parse::<Role>().ok();
            assert_eq!(parsed, None);
            assert_eq!(resolve_navigation(parsed), front_desk);
        }
    }

    #[test]
    fn test_manager_gets_the_superset() {
        let manager = titles(resolve_navigation(Some(Role::Manager)));
        for title in ["Customers", "Vehicles", "Garage", "Financial", "Settings"] {
            assert!(manager.contains(&title), "manager menu misses {title}");
        }
        let settings = resolve_navigation(Some(Role::Manager))
            .iter()
            .find(|i| i.title == "Settings")
            .map(|i| titles(i.submenu))
            .unwrap_or_default();
        assert_eq!(settings, ["Profile", "Staff", "Business"]);
    }

    #[test]
    fn test_front_desk_has_no_full_settings() {
        let nav = resolve_navigation(Some(Role::FrontDesk));
        let settings = nav.iter().find(|i| i.title == "Settings");
        assert!(settings.is_some_and(|i| i.submenu.is_empty()));
        let front_desk = titles(nav);
        assert!(front_desk.contains(&"Customers"));
        assert!(front_desk.contains(&"Financial"));
        assert!(front_desk.contains(&"Staff"));
        assert!(!front_desk.contains(&"Garage"));
    }

    #[test]
    fn test_technician_gets_garage_calendar_inventory_only() {
        let technician = titles(resolve_navigation(Some(Role::Technician)));
        assert_eq!(technician, ["Dashboard", "Garage", "Calendar", "Inventory"]);
    }

    #[test]
    fn test_tree_depth_is_at_most_two() {
        for role in Role::ALL {
            for item in resolve_navigation(Some(role)) {
                for child in item.submenu {
                    assert!(
                        child.submenu.is_empty(),
                        "{}/{} exceeds depth two",
                        item.title,
                        child.title
                    );
                }
            }
        }
    }
}
