//! Session operation error taxonomy.
//!
//! A closed enumeration: every session-mutating operation is a boundary that
//! maps whatever went wrong - backend rejection, transport failure, bad
//! state - into one of these kinds plus a human-readable message. Nothing
//! propagates past an operation unmapped.

use crate::supabase::SupabaseError;

/// What went wrong, as a closed set screens can rely on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthErrorKind {
    /// The PIN did not match.
    InvalidPin,
    /// A PIN row exists but carries no usable stored credentials.
    PinNotFound,
    /// The operation needs an authenticated user and none is present.
    UserNotFound,
    /// The target profile does not have the role the operation requires.
    InvalidRole,
    /// The backend rejected the email/password pair.
    InvalidCredentials,
    /// Transport failure - the backend could not be reached in time.
    Network,
    /// Anything that does not fit the other kinds.
    Unknown,
    /// The backend URL/key are absent from the environment.
    NotConfigured,
}

impl AuthErrorKind {
    /// Stable identifier, for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidPin => "invalid_pin",
            Self::PinNotFound => "pin_not_found",
            Self::UserNotFound => "user_not_found",
            Self::InvalidRole => "invalid_role",
            Self::InvalidCredentials => "invalid_credentials",
            Self::Network => "network_error",
            Self::Unknown => "unknown_error",
            Self::NotConfigured => "backend_not_configured",
        }
    }

    /// Whether "try again" is a sensible affordance for this kind.
    ///
    /// Screens do not otherwise branch on the kind - they surface the
    /// message as-is.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Network)
    }
}

/// Error returned by every session operation.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct AuthError {
    /// The closed error kind.
    pub kind: AuthErrorKind,
    /// Human-readable message, surfaced to the user verbatim.
    pub message: String,
    /// Underlying detail for logs, never shown to the user.
    pub details: Option<String>,
}

impl AuthError {
    /// Build an error with a message and no details.
    #[must_use]
    pub fn new(kind: AuthErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// Attach an underlying detail for the logs.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// The backend is not configured in this environment.
    #[must_use]
    pub fn not_configured() -> Self {
        Self::new(
            AuthErrorKind::NotConfigured,
            "The backend is not configured. Set SUPABASE_URL and SUPABASE_ANON_KEY.",
        )
    }

    /// Default mapping for a backend failure where the call site has no
    /// more specific meaning: transport problems become `Network`,
    /// everything else becomes `Unknown` carrying the backend's message.
    #[must_use]
    pub fn from_backend(err: &SupabaseError) -> Self {
        if err.is_transport() {
            Self::new(
                AuthErrorKind::Network,
                "Could not reach the backend. Check the connection and try again.",
            )
            .with_details(err.to_string())
        } else {
            Self::new(AuthErrorKind::Unknown, err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_network_is_retryable() {
        for kind in [
            AuthErrorKind::InvalidPin,
            AuthErrorKind::PinNotFound,
            AuthErrorKind::UserNotFound,
            AuthErrorKind::InvalidRole,
            AuthErrorKind::InvalidCredentials,
            AuthErrorKind::Unknown,
            AuthErrorKind::NotConfigured,
        ] {
            assert!(!kind.is_retryable(), "{} must not be retryable", kind.as_str());
        }
        assert!(AuthErrorKind::Network.is_retryable());
    }

    #[test]
    fn test_transport_maps_to_network() {
        let err = SupabaseError::Realtime("socket died".into());
        assert_eq!(AuthError::from_backend(&err).kind, AuthErrorKind::Network);
    }

    #[test]
    fn test_backend_verdict_maps_to_unknown_by_default() {
        let err = SupabaseError::Api {
            status: 500,
            message: "oops".into(),
        };
        let mapped = AuthError::from_backend(&err);
        assert_eq!(mapped.kind, AuthErrorKind::Unknown);
        assert!(mapped.message.contains("oops"));
    }
}
