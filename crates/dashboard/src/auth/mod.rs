//! Session store - the authentication state machine.
//!
//! Owns the single source of truth for "who is signed in, and in what
//! state", and exposes the only operations allowed to change it. Screens
//! read [`SessionStore::snapshot`] and never mutate session state directly.
//!
//! States: `Anonymous -> Authenticated -> Locked -> Authenticated -> Anonymous`.
//! The transient `is_loading` flag is raised around every async operation
//! (and dropped again by an RAII guard, whatever the outcome) rather than
//! being a distinct state.
//!
//! Lifecycle: construct, [`init`](SessionStore::init) once at startup
//! (session restore + profile list + the two backend subscriptions), and
//! [`dispose`](SessionStore::dispose) on shutdown to release both
//! subscriptions.

mod error;

pub use error::{AuthError, AuthErrorKind};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use redline_core::{Role, UserId};

use crate::models::user::{PinRow, ProfileRow, ProfileSummaryRow, User, UserProfileSummary};
use crate::supabase::{SupabaseClient, SupabaseError};

/// Read-only view of the session, for screens and extractors.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    /// The signed-in user, if any.
    pub user: Option<User>,
    /// Locked sessions keep their user but require a PIN before anything
    /// else.
    pub is_locked: bool,
    /// An async session operation is in flight.
    pub is_loading: bool,
    /// Quick-switch list of all known profiles, ordered by name.
    pub profiles: Vec<UserProfileSummary>,
}

#[derive(Default)]
struct SessionState {
    user: Option<User>,
    is_locked: bool,
    profiles: Vec<UserProfileSummary>,
}

struct SessionStoreInner {
    /// `None` when the backend env vars are absent; every operation that
    /// needs the backend then fails with `NotConfigured` without touching
    /// the network.
    backend: Option<SupabaseClient>,
    state: std::sync::RwLock<SessionState>,
    is_loading: AtomicBool,
    /// Cancels the subscription tasks spawned by `init`.
    shutdown: CancellationToken,
    tasks: std::sync::Mutex<Vec<JoinHandle<()>>>,
    realtime: std::sync::Mutex<Option<crate::supabase::RealtimeSubscription>>,
}

/// The session store. Cheap to clone; all clones share one state.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<SessionStoreInner>,
}

/// Clears `is_loading` when the operation ends, success or not.
struct LoadingGuard {
    inner: Arc<SessionStoreInner>,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.inner.is_loading.store(false, Ordering::SeqCst);
    }
}

impl SessionStore {
    /// Create a store.
    ///
    /// Pass `None` when the backend is not configured; operations then fail
    /// closed with [`AuthErrorKind::NotConfigured`].
    #[must_use]
    pub fn new(backend: Option<SupabaseClient>) -> Self {
        Self {
            inner: Arc::new(SessionStoreInner {
                backend,
                state: std::sync::RwLock::new(SessionState::default()),
                is_loading: AtomicBool::new(false),
                shutdown: CancellationToken::new(),
                tasks: std::sync::Mutex::new(Vec::new()),
                realtime: std::sync::Mutex::new(None),
            }),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Initialize the store: restore a persisted backend session if one
    /// exists (populating the user and applying their theme), fetch the
    /// profile list, and take out the two backend subscriptions
    /// (auth-state changes and realtime profile-table changes).
    ///
    /// Runs once at startup. Partial failures - an unreachable backend, a
    /// missing profile row - are logged and leave the store anonymous;
    /// they do not abort startup.
    pub async fn init(&self) {
        let Some(backend) = self.inner.backend.clone() else {
            tracing::warn!("backend not configured; running with sign-in disabled");
            return;
        };

        // Restore the persisted session, if any.
        match backend.auth().get_session().await {
            Ok(Some(session)) => {
                let email = session.user.email.clone();
                if let Err(err) = self.load_profile(session.user.id, email.as_deref()).await {
                    tracing::warn!(error = %err, "session restored but profile fetch failed");
                }
            }
            Ok(None) => {}
            Err(err) => tracing::warn!(error = %err, "could not restore backend session"),
        }

        // The quick-switch list is useful even when anonymous (PIN login).
        if let Err(err) = self.fetch_user_profiles().await {
            tracing::warn!(error = %err, "initial profile list fetch failed");
        }

        self.spawn_auth_listener(&backend);
        self.spawn_realtime_listener(&backend);
    }

    /// Release both backend subscriptions and stop the listener tasks.
    pub async fn dispose(&self) {
        self.inner.shutdown.cancel();

        let subscription = self
            .inner
            .realtime
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(subscription) = subscription {
            subscription.unsubscribe().await;
        }

        let tasks = std::mem::take(
            &mut *self
                .inner
                .tasks
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner),
        );
        for task in tasks {
            let _ = task.await;
        }
        tracing::debug!("session store disposed");
    }

    /// Forward auth-state changes into session state: signed-in re-fetches
    /// the profile (and re-applies the theme), signed-out clears the user.
    fn spawn_auth_listener(&self, backend: &SupabaseClient) {
        let store = self.clone();
        let mut events = backend.auth().on_auth_state_change();
        let shutdown = self.inner.shutdown.clone();
        let task = tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    () = shutdown.cancelled() => return,
                    event = events.recv() => event,
                };
                match event {
                    Ok(crate::supabase::AuthEvent::SignedIn { user_id }) => {
                        if let Err(err) = store.load_profile(user_id, None).await {
                            tracing::warn!(%user_id, error = %err, "profile fetch after sign-in failed");
                        }
                    }
                    Ok(crate::supabase::AuthEvent::SignedOut) => {
                        store.write_state(|state| {
                            state.user = None;
                        });
                    }
                    Ok(crate::supabase::AuthEvent::TokenRefreshed) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::debug!(missed, "auth event listener lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
                }
            }
        });
        self.inner
            .tasks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(task);
    }

    /// Re-fetch the whole profile list on any `profiles` row change. The
    /// notification is only a hint that something changed - deltas are
    /// never merged.
    fn spawn_realtime_listener(&self, backend: &SupabaseClient) {
        let subscription = backend
            .realtime()
            .channel("profiles-changes")
            .on_postgres_changes("*", "public", "profiles")
            .subscribe();
        let mut events = subscription.events();
        *self
            .inner
            .realtime
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(subscription);

        let store = self.clone();
        let shutdown = self.inner.shutdown.clone();
        let task = tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    () = shutdown.cancelled() => return,
                    event = events.recv() => event,
                };
                match event {
                    Ok(_) => {
                        if let Err(err) = store.fetch_user_profiles().await {
                            tracing::warn!(error = %err, "profile list refresh failed");
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
                }
            }
        });
        self.inner
            .tasks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(task);
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Current session state, cloned.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self
            .inner
            .state
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        SessionSnapshot {
            user: state.user.clone(),
            is_locked: state.is_locked,
            is_loading: self.inner.is_loading.load(Ordering::SeqCst),
            profiles: state.profiles.clone(),
        }
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Sign in with email and password.
    ///
    /// The user profile is populated asynchronously by the auth-state
    /// subscription; callers should not assume it is present the instant
    /// this returns.
    ///
    /// # Errors
    ///
    /// `NotConfigured` without a backend (no network call is made),
    /// `InvalidCredentials` when the backend rejects the pair, `Network` on
    /// transport failure.
    pub async fn login(&self, email: &str, password: &str) -> Result<(), AuthError> {
        let backend = self.require_backend()?;
        let _loading = self.begin_loading();

        backend
            .auth()
            .sign_in_with_password(email, password)
            .await
            .map_err(map_sign_in_error)?;
        Ok(())
    }

    /// Sign in from the quick-switch list with a PIN.
    ///
    /// Looks up the stored credentials keyed by `(user_id, pin)` and signs
    /// in with them. On success the lock flag is cleared.
    ///
    /// # Errors
    ///
    /// `InvalidPin` when no row matches, `PinNotFound` when the row has no
    /// stored credentials, `InvalidCredentials` when the derived sign-in is
    /// rejected.
    pub async fn login_with_pin(&self, user_id: UserId, pin: &str) -> Result<(), AuthError> {
        let backend = self.require_backend()?;
        let _loading = self.begin_loading();

        let row: PinRow = backend
            .postgrest()
            .from("user_pins")
            .select("user_id,email,password")
            .eq("user_id", user_id)
            .eq("pin", pin)
            .single()
            .fetch()
            .await
            .map_err(map_pin_lookup_error)?;

        let (Some(email), Some(password)) = (row.email, row.password) else {
            return Err(AuthError::new(
                AuthErrorKind::PinNotFound,
                "No stored credentials behind this PIN. Sign in with email and password.",
            ));
        };

        backend
            .auth()
            .sign_in_with_password(&email, &password)
            .await
            .map_err(map_sign_in_error)?;

        self.write_state(|state| {
            state.is_locked = false;
        });
        Ok(())
    }

    /// Sign in as a manager by profile id and password.
    ///
    /// # Errors
    ///
    /// `UserNotFound` when the profile does not exist, `InvalidRole` when
    /// its role is not Manager (no credential sign-in is attempted),
    /// `InvalidCredentials` when the backend rejects the password.
    pub async fn login_as_manager(&self, user_id: UserId, password: &str) -> Result<(), AuthError> {
        let backend = self.require_backend()?;
        let _loading = self.begin_loading();

        let profile: ProfileRow = backend
            .postgrest()
            .from("profiles")
            .select("*")
            .eq("id", user_id)
            .single()
            .fetch()
            .await
            .map_err(|err| match err {
                SupabaseError::NotFound => AuthError::new(
                    AuthErrorKind::UserNotFound,
                    "No profile exists for that user.",
                ),
                other => AuthError::from_backend(&other),
            })?;

        if profile.role != Some(Role::Manager) {
            return Err(AuthError::new(
                AuthErrorKind::InvalidRole,
                "That account is not a manager. Use a different login method.",
            ));
        }

        let Some(email) = profile.email else {
            return Err(AuthError::new(
                AuthErrorKind::Unknown,
                "The manager profile has no sign-in email.",
            ));
        };

        backend
            .auth()
            .sign_in_with_password(&email, password)
            .await
            .map_err(map_sign_in_error)?;

        self.write_state(|state| {
            state.is_locked = false;
        });
        Ok(())
    }

    /// Unlock a locked session by verifying the current user's PIN.
    ///
    /// The user is unchanged whether this succeeds or fails.
    ///
    /// # Errors
    ///
    /// `UserNotFound` when no user is signed in - regardless of the PIN -
    /// and `InvalidPin` when the PIN does not match.
    pub async fn unlock_with_pin(&self, pin: &str) -> Result<(), AuthError> {
        let user_id = self
            .read_state(|state| state.user.as_ref().map(|u| u.id))
            .ok_or_else(|| {
                AuthError::new(AuthErrorKind::UserNotFound, "No user is signed in.")
            })?;

        let backend = self.require_backend()?;
        let _loading = self.begin_loading();

        let _row: PinRow = backend
            .postgrest()
            .from("user_pins")
            .select("user_id")
            .eq("user_id", user_id)
            .eq("pin", pin)
            .single()
            .fetch()
            .await
            .map_err(map_pin_lookup_error)?;

        self.write_state(|state| {
            state.is_locked = false;
        });
        Ok(())
    }

    /// Lock the session. Synchronous; no backend call.
    pub fn lock_screen(&self) {
        self.write_state(|state| {
            state.is_locked = true;
        });
    }

    /// Sign out: revoke the backend session and clear the user and the
    /// lock flag. The route layer redirects to the login screen.
    ///
    /// # Errors
    ///
    /// `NotConfigured` without a backend. Local state is cleared even when
    /// the backend revocation fails.
    pub async fn logout(&self) -> Result<(), AuthError> {
        let _loading = self.begin_loading();

        if let Some(backend) = &self.inner.backend {
            backend.auth().sign_out().await;
        }
        self.write_state(|state| {
            state.user = None;
            state.is_locked = false;
        });
        Ok(())
    }

    /// Re-fetch the current user's profile row and overwrite the in-memory
    /// fields (including the `image ?? avatar_url` fallback).
    ///
    /// No-op when there is no current user id - neither a loaded user nor
    /// an authenticated backend session.
    ///
    /// # Errors
    ///
    /// The mapped backend error when the re-fetch fails.
    pub async fn refresh_user_profile(&self) -> Result<(), AuthError> {
        let Some(backend) = self.inner.backend.clone() else {
            return Ok(());
        };

        let known = self.read_state(|state| state.user.as_ref().map(|u| u.id));
        let (user_id, email) = match known {
            Some(id) => (id, None),
            None => {
                // A just-signed-in session may not have its profile loaded yet.
                match backend.auth().get_session().await {
                    Ok(Some(session)) => (session.user.id, session.user.email),
                    _ => return Ok(()),
                }
            }
        };

        let _loading = self.begin_loading();
        self.load_profile(user_id, email.as_deref()).await
    }

    /// Replace the in-memory user's display image.
    ///
    /// Local mutation only - the caller is expected to have already
    /// persisted the change to the backend.
    pub fn update_user_image(&self, image: Option<String>) {
        self.write_state(|state| {
            if let Some(user) = state.user.as_mut() {
                user.image = image;
            }
        });
    }

    /// Refresh the quick-switch list: all profile rows ordered by name,
    /// display image normalized to `image ?? avatar_url ?? None`.
    ///
    /// # Errors
    ///
    /// `NotConfigured` without a backend, otherwise the mapped backend
    /// error.
    pub async fn fetch_user_profiles(&self) -> Result<(), AuthError> {
        let backend = self.require_backend()?;

        let rows: Vec<ProfileSummaryRow> = backend
            .postgrest()
            .from("profiles")
            .select("id,full_name,role,image,avatar_url")
            .order("full_name")
            .fetch()
            .await
            .map_err(|err| AuthError::from_backend(&err))?;

        let profiles: Vec<UserProfileSummary> =
            rows.into_iter().map(UserProfileSummary::from).collect();
        self.write_state(|state| {
            state.profiles = profiles;
        });
        Ok(())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Fetch a profile row and install it as the current user, applying the
    /// stored theme preference.
    async fn load_profile(&self, user_id: UserId, email: Option<&str>) -> Result<(), AuthError> {
        let backend = self.require_backend()?;
        let profile: ProfileRow = backend
            .postgrest()
            .from("profiles")
            .select("*")
            .eq("id", user_id)
            .single()
            .fetch()
            .await
            .map_err(|err| match err {
                SupabaseError::NotFound => AuthError::new(
                    AuthErrorKind::UserNotFound,
                    "The signed-in account has no profile row.",
                ),
                other => AuthError::from_backend(&other),
            })?;

        let user = profile.into_user(email);
        tracing::info!(
            user_id = %user.id,
            role = user.role.map_or("unknown", Role::as_str),
            theme = %user.theme_mode,
            "profile loaded"
        );
        self.write_state(|state| {
            state.user = Some(user);
        });
        Ok(())
    }

    fn require_backend(&self) -> Result<SupabaseClient, AuthError> {
        self.inner
            .backend
            .clone()
            .ok_or_else(AuthError::not_configured)
    }

    fn begin_loading(&self) -> LoadingGuard {
        self.inner.is_loading.store(true, Ordering::SeqCst);
        LoadingGuard {
            inner: Arc::clone(&self.inner),
        }
    }

    fn read_state<T>(&self, f: impl FnOnce(&SessionState) -> T) -> T {
        let state = self
            .inner
            .state
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&state)
    }

    fn write_state(&self, f: impl FnOnce(&mut SessionState)) {
        let mut state = self
            .inner
            .state
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut state);
    }
}

/// Credential sign-in rejection vs transport failure.
fn map_sign_in_error(err: SupabaseError) -> AuthError {
    match err {
        SupabaseError::Api { status, .. } if status == 400 || status == 401 || status == 422 => {
            AuthError::new(
                AuthErrorKind::InvalidCredentials,
                "Invalid email or password.",
            )
        }
        SupabaseError::Unauthorized => AuthError::new(
            AuthErrorKind::InvalidCredentials,
            "Invalid email or password.",
        ),
        other => AuthError::from_backend(&other),
    }
}

/// A missed `(user_id, pin)` lookup means the PIN is wrong.
fn map_pin_lookup_error(err: SupabaseError) -> AuthError {
    match err {
        SupabaseError::NotFound => {
            AuthError::new(AuthErrorKind::InvalidPin, "That PIN is not correct.")
        }
        other => AuthError::from_backend(&other),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use redline_core::{Email, ThemeMode};

    fn store() -> SessionStore {
        SessionStore::new(None)
    }

    fn seeded_store() -> SessionStore {
        let store = store();
        store.write_state(|state| {
            state.user = Some(User {
                id: UserId::random(),
                name: "Alex Reyes".into(),
                email: Email::parse("alex@redline.example").unwrap(),
                role: Some(Role::Manager),
                image: None,
                theme_mode: ThemeMode::System,
                theme_color: None,
            });
        });
        store
    }

    #[tokio::test]
    async fn test_login_without_backend_is_not_configured() {
        let err = store().login("a@b.c", "pw").await.unwrap_err();
        assert_eq!(err.kind, AuthErrorKind::NotConfigured);
    }

    #[tokio::test]
    async fn test_unlock_without_user_is_user_not_found() {
        // The user check comes before everything else, PIN value included.
        let err = store().unlock_with_pin("0000").await.unwrap_err();
        assert_eq!(err.kind, AuthErrorKind::UserNotFound);
        let err = store().unlock_with_pin("").await.unwrap_err();
        assert_eq!(err.kind, AuthErrorKind::UserNotFound);
    }

    #[tokio::test]
    async fn test_lock_screen_keeps_user() {
        let store = seeded_store();
        store.lock_screen();
        let snapshot = store.snapshot();
        assert!(snapshot.is_locked);
        assert!(snapshot.user.is_some());
    }

    #[tokio::test]
    async fn test_logout_clears_user_and_lock() {
        let store = seeded_store();
        store.lock_screen();
        store.logout().await.unwrap();
        let snapshot = store.snapshot();
        assert!(snapshot.user.is_none());
        assert!(!snapshot.is_locked);
    }

    #[tokio::test]
    async fn test_update_user_image_is_local_only() {
        let store = seeded_store();
        store.update_user_image(Some("http://img".into()));
        assert_eq!(
            store.snapshot().user.unwrap().image,
            Some("http://img".to_owned())
        );
        store.update_user_image(None);
        assert_eq!(store.snapshot().user.unwrap().image, None);

        // Without a user it is a no-op, not a panic.
        let anonymous = self::store();
        anonymous.update_user_image(Some("http://img".into()));
        assert!(anonymous.snapshot().user.is_none());
    }

    #[tokio::test]
    async fn test_refresh_profile_without_user_is_noop() {
        assert!(store().refresh_user_profile().await.is_ok());
    }

    #[tokio::test]
    async fn test_loading_flag_clears_after_failed_op() {
        let store = store();
        let _ = store.login("a@b.c", "pw").await;
        assert!(!store.snapshot().is_loading);
    }

    #[tokio::test]
    async fn test_init_and_dispose_without_backend() {
        let store = store();
        store.init().await;
        store.dispose().await;
        assert!(store.snapshot().user.is_none());
    }

    #[test]
    fn test_sign_in_error_mapping() {
        let rejected = SupabaseError::Api {
            status: 400,
            message: "Invalid login credentials".into(),
        };
        assert_eq!(
            map_sign_in_error(rejected).kind,
            AuthErrorKind::InvalidCredentials
        );

        let upstream = SupabaseError::Api {
            status: 503,
            message: "unavailable".into(),
        };
        assert_eq!(map_sign_in_error(upstream).kind, AuthErrorKind::Unknown);
    }

    #[test]
    fn test_pin_lookup_error_mapping() {
        assert_eq!(
            map_pin_lookup_error(SupabaseError::NotFound).kind,
            AuthErrorKind::InvalidPin
        );
    }
}
