//! End-to-end tests of the session state machine against the mock backend.

use std::time::Duration;

use redline_core::{Role, UserId};
use redline_dashboard::auth::{AuthErrorKind, SessionStore};
use redline_dashboard::supabase::SupabaseClient;
use redline_integration_tests::{MockBackend, SeedUser};

fn store_for(mock: &MockBackend) -> SessionStore {
    let client = SupabaseClient::new(&mock.config()).expect("client for mock backend");
    SessionStore::new(Some(client))
}

fn manager() -> SeedUser {
    SeedUser::new("mara@redline.example", "s3cret-m", "Mara Vidal", "Manager").with_pin("4321")
}

fn technician() -> SeedUser {
    SeedUser::new("tom@redline.example", "s3cret-t", "Tom Iwu", "Technician").with_pin("1111")
}

// ============================================================================
// Password login
// ============================================================================

#[tokio::test]
async fn test_login_then_profile_refresh_populates_user() {
    let mock = MockBackend::spawn(vec![manager(), technician()]).await;
    let store = store_for(&mock);

    store
        .login("mara@redline.example", "s3cret-m")
        .await
        .expect("login should succeed");
    store
        .refresh_user_profile()
        .await
        .expect("profile refresh should succeed");

    let user = store.snapshot().user.expect("user should be loaded");
    assert_eq!(user.name, "Mara Vidal");
    assert_eq!(user.role, Some(Role::Manager));
    assert!(!store.snapshot().is_loading);
}

#[tokio::test]
async fn test_login_with_wrong_password_is_invalid_credentials() {
    let mock = MockBackend::spawn(vec![manager()]).await;
    let store = store_for(&mock);

    let err = store
        .login("mara@redline.example", "wrong")
        .await
        .expect_err("login must fail");
    assert_eq!(err.kind, AuthErrorKind::InvalidCredentials);
    assert!(store.snapshot().user.is_none());
    assert!(!store.snapshot().is_loading);
}

#[tokio::test]
async fn test_login_without_backend_makes_no_network_call() {
    // A store with no backend client: the error is immediate and local.
    let store = SessionStore::new(None);
    let err = store.login("a@b.c", "pw").await.expect_err("must fail");
    assert_eq!(err.kind, AuthErrorKind::NotConfigured);
}

// ============================================================================
// PIN login
// ============================================================================

#[tokio::test]
async fn test_pin_login_signs_in_with_stored_credentials() {
    let mock = MockBackend::spawn(vec![manager(), technician()]).await;
    let store = store_for(&mock);
    let tom = mock.state.users[1].clone();

    store
        .login_with_pin(UserId::new(tom.id), "1111")
        .await
        .expect("pin login should succeed");
    store
        .refresh_user_profile()
        .await
        .expect("profile refresh should succeed");

    let snapshot = store.snapshot();
    assert!(!snapshot.is_locked);
    assert_eq!(
        snapshot.user.expect("user loaded").role,
        Some(Role::Technician)
    );
}

#[tokio::test]
async fn test_pin_login_with_wrong_pin_is_invalid_pin() {
    let mock = MockBackend::spawn(vec![technician()]).await;
    let store = store_for(&mock);
    let tom = mock.state.users[0].clone();

    let err = store
        .login_with_pin(UserId::new(tom.id), "9999")
        .await
        .expect_err("must fail");
    assert_eq!(err.kind, AuthErrorKind::InvalidPin);
}

#[tokio::test]
async fn test_pin_row_without_credentials_is_pin_not_found() {
    let mut user = technician();
    user.pin_has_credentials = false;
    let mock = MockBackend::spawn(vec![user]).await;
    let store = store_for(&mock);
    let tom = mock.state.users[0].clone();

    let err = store
        .login_with_pin(UserId::new(tom.id), "1111")
        .await
        .expect_err("must fail");
    assert_eq!(err.kind, AuthErrorKind::PinNotFound);
}

// ============================================================================
// Manager login
// ============================================================================

#[tokio::test]
async fn test_manager_login_rejects_non_manager_without_sign_in() {
    let mock = MockBackend::spawn(vec![manager(), technician()]).await;
    let store = store_for(&mock);
    let tom = mock.state.users[1].clone();

    let err = store
        .login_as_manager(UserId::new(tom.id), "s3cret-t")
        .await
        .expect_err("must fail");
    assert_eq!(err.kind, AuthErrorKind::InvalidRole);
    // The role check short-circuits before any credential sign-in.
    assert_eq!(mock.token_requests(), 0);
}

#[tokio::test]
async fn test_manager_login_unknown_profile_is_user_not_found() {
    let mock = MockBackend::spawn(vec![manager()]).await;
    let store = store_for(&mock);

    let err = store
        .login_as_manager(UserId::random(), "whatever")
        .await
        .expect_err("must fail");
    assert_eq!(err.kind, AuthErrorKind::UserNotFound);
}

#[tokio::test]
async fn test_manager_login_succeeds_and_clears_lock() {
    let mock = MockBackend::spawn(vec![manager()]).await;
    let store = store_for(&mock);
    let mara = mock.state.users[0].clone();

    store
        .login_as_manager(UserId::new(mara.id), "s3cret-m")
        .await
        .expect("manager login should succeed");
    assert!(!store.snapshot().is_locked);
}

// ============================================================================
// Lock / unlock
// ============================================================================

#[tokio::test]
async fn test_unlock_without_user_is_user_not_found_for_any_pin() {
    let mock = MockBackend::spawn(vec![manager()]).await;
    let store = store_for(&mock);

    for pin in ["4321", "", "0"] {
        let err = store.unlock_with_pin(pin).await.expect_err("must fail");
        assert_eq!(err.kind, AuthErrorKind::UserNotFound);
    }
}

#[tokio::test]
async fn test_lock_then_unlock_round_trip_keeps_user() {
    let mock = MockBackend::spawn(vec![manager()]).await;
    let store = store_for(&mock);
    let mara = mock.state.users[0].clone();

    store
        .login_with_pin(UserId::new(mara.id), "4321")
        .await
        .expect("pin login should succeed");
    store
        .refresh_user_profile()
        .await
        .expect("profile refresh should succeed");

    store.lock_screen();
    let locked = store.snapshot();
    assert!(locked.is_locked);
    let user_before = locked.user.expect("user stays loaded while locked");

    // Wrong PIN: still locked, user unchanged.
    let err = store.unlock_with_pin("0000").await.expect_err("must fail");
    assert_eq!(err.kind, AuthErrorKind::InvalidPin);
    assert!(store.snapshot().is_locked);

    // Right PIN: unlocked, user unchanged.
    store
        .unlock_with_pin("4321")
        .await
        .expect("unlock should succeed");
    let unlocked = store.snapshot();
    assert!(!unlocked.is_locked);
    assert_eq!(
        unlocked.user.expect("user still loaded").id,
        user_before.id
    );
}

#[tokio::test]
async fn test_logout_clears_user_and_lock() {
    let mock = MockBackend::spawn(vec![manager()]).await;
    let store = store_for(&mock);
    let mara = mock.state.users[0].clone();

    store
        .login_with_pin(UserId::new(mara.id), "4321")
        .await
        .expect("pin login should succeed");
    store.lock_screen();
    store.logout().await.expect("logout should succeed");

    let snapshot = store.snapshot();
    assert!(snapshot.user.is_none());
    assert!(!snapshot.is_locked);
}

// ============================================================================
// Profile list
// ============================================================================

#[tokio::test]
async fn test_fetch_user_profiles_normalizes_and_orders() {
    let mut anna = SeedUser::new("anna@redline.example", "pw-anna", "Anna Petit", "Front Desk");
    anna.image = None;
    anna.avatar_url = Some("http://x".to_owned());
    let mut zed = SeedUser::new("zed@redline.example", "pw-zed", "Zed Kwan", "Janitor");
    zed.image = Some(String::new());
    zed.avatar_url = None;

    let mock = MockBackend::spawn(vec![zed, anna]).await;
    let store = store_for(&mock);

    store
        .fetch_user_profiles()
        .await
        .expect("profile list fetch should succeed");

    let profiles = store.snapshot().profiles;
    assert_eq!(profiles.len(), 2);
    // Ordered by full name regardless of seed order.
    assert_eq!(profiles[0].full_name, "Anna Petit");
    // image null falls back to avatar_url.
    assert_eq!(profiles[0].image.as_deref(), Some("http://x"));
    assert_eq!(profiles[0].role, Some(Role::FrontDesk));
    // Unknown role fails closed to None; empty image stays absent.
    assert_eq!(profiles[1].role, None);
    assert_eq!(profiles[1].image, None);
}

// ============================================================================
// Init / subscriptions
// ============================================================================

#[tokio::test]
async fn test_init_subscription_populates_profile_after_login() {
    let mock = MockBackend::spawn(vec![manager()]).await;
    let store = store_for(&mock);

    store.init().await;
    assert!(store.snapshot().user.is_none());
    assert!(!store.snapshot().profiles.is_empty(), "init fetches the list");

    // No explicit refresh here: the auth-state subscription is the only
    // thing loading the profile.
    store
        .login("mara@redline.example", "s3cret-m")
        .await
        .expect("login should succeed");

    let mut user = None;
    for _ in 0..50 {
        user = store.snapshot().user;
        if user.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    let user = user.expect("subscription should load the profile");
    assert_eq!(user.role, Some(Role::Manager));

    store.dispose().await;
    mock.shutdown();
}
