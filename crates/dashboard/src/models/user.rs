//! User and profile types owned by the session store.
//!
//! These are domain types; [`ProfileRow`] and [`ProfileSummaryRow`] are the
//! raw shapes of the backend `profiles` table and stay private to the
//! conversion points.

use serde::{Deserialize, Serialize};

use redline_core::{Email, Role, ThemeMode, UserId, role};

/// The signed-in user, as held in memory by the session store.
#[derive(Debug, Clone)]
pub struct User {
    /// Backend auth/profile id.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Sign-in email.
    pub email: Email,
    /// Parsed role; `None` when the profile row carries an unrecognized
    /// value. Permission checks fail closed on `None`; navigation falls
    /// back to the Front Desk tree.
    pub role: Option<Role>,
    /// Display image URL, if any.
    pub image: Option<String>,
    /// Stored theme preference, applied when the profile loads.
    pub theme_mode: ThemeMode,
    /// Stored accent color (CSS value), if any.
    pub theme_color: Option<String>,
}

/// Lightweight profile record for the quick-switch list.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfileSummary {
    /// Profile id.
    pub id: UserId,
    /// Display name.
    pub full_name: String,
    /// Parsed role; `None` for unrecognized values.
    pub role: Option<Role>,
    /// Normalized display image: `image ?? avatar_url ?? None`.
    pub image: Option<String>,
}

/// Raw `profiles` row.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileRow {
    pub id: UserId,
    pub full_name: Option<String>,
    pub email: Option<String>,
    #[serde(deserialize_with = "role::lenient", default)]
    pub role: Option<Role>,
    pub image: Option<String>,
    pub avatar_url: Option<String>,
    pub theme_mode: Option<String>,
    pub theme_color: Option<String>,
}

impl ProfileRow {
    /// Display image with the documented fallback: `image ?? avatar_url`.
    #[must_use]
    pub fn display_image(&self) -> Option<String> {
        self.image
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.avatar_url.as_deref().filter(|s| !s.is_empty()))
            .map(ToOwned::to_owned)
    }

    /// Build the in-memory [`User`] from this row.
    ///
    /// The row's email can be absent (profiles created before the column
    /// was backfilled); `fallback_email` is the email the auth session
    /// reports.
    #[must_use]
    pub fn into_user(self, fallback_email: Option<&str>) -> User {
        let email = self
            .email
            .as_deref()
            .or(fallback_email)
            .and_then(|raw| Email::parse(raw).ok())
            .unwrap_or_else(|| Email::parse("unknown@invalid").unwrap_or_else(|_| unreachable!()));
        let theme_mode = self
            .theme_mode
            .as_deref()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default();
        let image = self.display_image();
        User {
            id: self.id,
            name: self.full_name.unwrap_or_else(|| "Unnamed".to_owned()),
            email,
            role: self.role,
            image,
            theme_mode,
            theme_color: self.theme_color,
        }
    }
}

/// Raw `profiles` row for the quick-switch list.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileSummaryRow {
    pub id: UserId,
    pub full_name: Option<String>,
    #[serde(deserialize_with = "role::lenient", default)]
    pub role: Option<Role>,
    pub image: Option<String>,
    pub avatar_url: Option<String>,
}

impl From<ProfileSummaryRow> for UserProfileSummary {
    fn from(row: ProfileSummaryRow) -> Self {
        let image = row
            .image
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(row.avatar_url.as_deref().filter(|s| !s.is_empty()))
            .map(ToOwned::to_owned);
        Self {
            id: row.id,
            full_name: row.full_name.unwrap_or_else(|| "Unnamed".to_owned()),
            role: row.role,
            image,
        }
    }
}

/// Row in `user_pins`, keyed by `(user_id, pin)`.
///
/// Besides verifying a PIN, the row stores the credentials the quick-switch
/// login derives its password sign-in from.
#[derive(Debug, Clone, Deserialize)]
pub struct PinRow {
    pub user_id: UserId,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn row(image: Option<&str>, avatar_url: Option<&str>) -> ProfileRow {
        ProfileRow {
            id: UserId::random(),
            full_name: Some("Sam Ortiz".into()),
            email: Some("sam@redline.example".into()),
            role: Some(Role::Technician),
            image: image.map(Into::into),
            avatar_url: avatar_url.map(Into::into),
            theme_mode: None,
            theme_color: None,
        }
    }

    #[test]
    fn test_display_image_prefers_primary_field() {
        assert_eq!(
            row(Some("http://a"), Some("http://b")).display_image(),
            Some("http://a".to_owned())
        );
    }

    #[test]
    fn test_display_image_falls_back_to_avatar_url() {
        assert_eq!(
            row(None, Some("http://x")).display_image(),
            Some("http://x".to_owned())
        );
        // Empty string counts as absent, same as the backend storing "".
        assert_eq!(
            row(Some(""), Some("http://x")).display_image(),
            Some("http://x".to_owned())
        );
        assert_eq!(row(None, None).display_image(), None);
    }

    #[test]
    fn test_into_user_applies_theme_and_role() {
        let mut profile = row(None, None);
        profile.theme_mode = Some("dark".into());
        let user = profile.into_user(None);
        assert_eq!(user.theme_mode, ThemeMode::Dark);
        assert_eq!(user.role, Some(Role::Technician));
        assert_eq!(user.name, "Sam Ortiz");
    }

    #[test]
    fn test_into_user_survives_unknown_role_and_theme() {
        let json = serde_json::json!({
            "id": uuid::Uuid::new_v4(),
            "full_name": "Pat Doe",
            "email": "pat@redline.example",
            "role": "Janitor",
            "image": null,
            "avatar_url": null,
            "theme_mode": "neon",
            "theme_color": null,
        });
        let profile: ProfileRow = serde_json::from_value(json).unwrap();
        let user = profile.into_user(None);
        assert_eq!(user.role, None);
        assert_eq!(user.theme_mode, ThemeMode::System);
    }

    #[test]
    fn test_summary_normalizes_image() {
        let json = serde_json::json!({
            "id": uuid::Uuid::new_v4(),
            "full_name": "Pat Doe",
            "role": "Front Desk",
            "image": null,
            "avatar_url": "http://x",
        });
        let summary: UserProfileSummary =
            serde_json::from_value::<ProfileSummaryRow>(json).unwrap().into();
        assert_eq!(summary.image, Some("http://x".to_owned()));
        assert_eq!(summary.role, Some(Role::FrontDesk));
    }
}
