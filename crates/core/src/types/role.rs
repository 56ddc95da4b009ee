//! Staff role enumeration.
//!
//! The role is the sole axis of access control in the application. The hosted
//! backend stores it as a free-form string on the profile row; this type is
//! the closed enumeration that string must parse into. Parsing is fallible on
//! purpose - callers decide what an unrecognized value means (the dashboard
//! fails closed for permissions and falls back to the Front Desk menu for
//! navigation).

use serde::{Deserialize, Serialize};

/// Error returned when a role string does not name a known role.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0:?}")]
pub struct RoleParseError(pub String);

/// A staff role.
///
/// Stored in the backend `profiles` table as one of the exact strings
/// `"Manager"`, `"Technician"`, or `"Front Desk"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Full access, including staff and business settings.
    Manager,
    /// Garage work: diagnostics, repairs, calendar, inventory reads.
    Technician,
    /// Customer-facing work: customers, vehicles, financials, inventory.
    #[serde(rename = "Front Desk")]
    FrontDesk,
}

impl Role {
    /// All known roles, in display order.
    pub const ALL: [Self; 3] = [Self::Manager, Self::Technician, Self::FrontDesk];

    /// The exact string the backend stores for this role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Manager => "Manager",
            Self::Technician => "Technician",
            Self::FrontDesk => "Front Desk",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Manager" => Ok(Self::Manager),
            "Technician" => Ok(Self::Technician),
            "Front Desk" => Ok(Self::FrontDesk),
            other => Err(RoleParseError(other.to_owned())),
        }
    }
}

/// Deserialize an `Option<Role>` from the backend's free-form role column.
///
/// Unknown or missing strings become `None` rather than an error so that a
/// profile row with a bad role still loads - the caller is expected to fail
/// closed on `None`.
///
/// Usage: `#[serde(deserialize_with = "role::lenient", default)]`.
///
/// # Errors
///
/// Never fails on role content; only on a non-string, non-null value.
pub fn lenient<'de, D>(deserializer: D) -> Result<Option<Role>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.parse().ok()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_all_roles() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn test_front_desk_has_a_space() {
        assert_eq!(Role::FrontDesk.to_string(), "Front Desk");
        assert!("FrontDesk".parse::<Role>().is_err());
        assert!("front desk".parse::<Role>().is_err());
    }

    #[test]
    fn test_unknown_role_is_an_error() {
        let err = "Owner".parse::<Role>().unwrap_err();
        assert_eq!(err, RoleParseError("Owner".to_owned()));
        assert!("".parse::<Role>().is_err());
    }

    #[test]
    fn test_serde_uses_backend_strings() {
        let json = serde_json::to_string(&Role::FrontDesk).unwrap();
        assert_eq!(json, "\"Front Desk\"");
        let role: Role = serde_json::from_str("\"Technician\"").unwrap();
        assert_eq!(role, Role::Technician);
    }

    #[test]
    fn test_lenient_deserializer() {
        #[derive(Deserialize)]
        struct Row {
            #[serde(deserialize_with = "lenient", default)]
            role: Option<Role>,
        }

        let row: Row = serde_json::from_str(r#"{"role":"Manager"}"#).unwrap();
        assert_eq!(row.role, Some(Role::Manager));

        let row: Row = serde_json::from_str(r#"{"role":"Janitor"}"#).unwrap();
        assert_eq!(row.role, None);

        let row: Row = serde_json::from_str(r#"{"role":null}"#).unwrap();
        assert_eq!(row.role, None);

        let row: Row = serde_json::from_str("{}").unwrap();
        assert_eq!(row.role, None);
    }
}
