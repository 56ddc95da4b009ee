//! Screen-level permission gating, driven through the real router.
//!
//! Read predicates redirect away from the screen; write predicates reject
//! the mutation with a visible denial banner even when the request is
//! forged directly (the form controls are hidden on top of this).

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use tower::util::ServiceExt;

use redline_dashboard::config::DashboardConfig;
use redline_dashboard::routes;
use redline_dashboard::state::AppState;
use redline_integration_tests::{MockBackend, SeedUser};

fn config_for(mock: &MockBackend) -> DashboardConfig {
    DashboardConfig {
        host: "127.0.0.1".parse().expect("ip"),
        port: 0,
        base_url: "http://localhost:3000".to_owned(),
        supabase: Some(mock.config()),
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.1,
    }
}

/// Build the app with the given seed signed in.
async fn app_signed_in_as(mock: &MockBackend, email: &str, password: &str) -> (Router, AppState) {
    let state = AppState::new(config_for(mock)).expect("app state");
    state
        .session()
        .login(email, password)
        .await
        .expect("login should succeed");
    state
        .session()
        .refresh_user_profile()
        .await
        .expect("profile refresh should succeed");
    let router = routes::routes().with_state(state.clone());
    (router, state)
}

fn location(response: &axum::http::Response<Body>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned()
}

fn form_post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_owned()))
        .expect("request")
}

#[tokio::test]
async fn test_anonymous_requests_redirect_to_login() {
    let mock = MockBackend::spawn(vec![]).await;
    let state = AppState::new(config_for(&mock)).expect("app state");
    let router = routes::routes().with_state(state);

    let response = router
        .oneshot(Request::get("/vehicles").body(Body::empty()).expect("req"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
}

#[tokio::test]
async fn test_locked_session_redirects_to_lock_screen() {
    let seed = SeedUser::new("mara@redline.example", "pw-mara", "Mara Vidal", "Manager");
    let mock = MockBackend::spawn(vec![seed]).await;
    let (router, state) = app_signed_in_as(&mock, "mara@redline.example", "pw-mara").await;

    state.session().lock_screen();
    let response = router
        .oneshot(Request::get("/vehicles").body(Body::empty()).expect("req"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/lock");
}

#[tokio::test]
async fn test_technician_reads_vehicles_but_cannot_disable() {
    let seed = SeedUser::new("tom@redline.example", "pw-tom", "Tom Iwu", "Technician");
    let mock = MockBackend::spawn(vec![seed]).await;
    let (router, _state) = app_signed_in_as(&mock, "tom@redline.example", "pw-tom").await;

    // Vehicle read is permitted.
    let response = router
        .clone()
        .oneshot(Request::get("/vehicles").body(Body::empty()).expect("req"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    // The disable action on the same screen is rejected with a visible
    // denial, not executed.
    let id = uuid::Uuid::new_v4();
    let response = router
        .clone()
        .oneshot(form_post(&format!("/vehicles/{id}/disable"), ""))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(location(&response).contains("error="));

    // So is a forged create, even though the form is hidden client-side.
    let response = router
        .clone()
        .oneshot(form_post("/vehicles", "plate=ZZ-99"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(location(&response).contains("error="));

    // And the export, which shares the disable privilege level.
    let response = router
        .oneshot(
            Request::get("/vehicles/export")
                .body(Body::empty())
                .expect("req"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(location(&response).contains("error="));
}

#[tokio::test]
async fn test_technician_is_redirected_away_from_customers() {
    let seed = SeedUser::new("tom@redline.example", "pw-tom", "Tom Iwu", "Technician");
    let mock = MockBackend::spawn(vec![seed]).await;
    let (router, _state) = app_signed_in_as(&mock, "tom@redline.example", "pw-tom").await;

    let response = router
        .oneshot(Request::get("/customers").body(Body::empty()).expect("req"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn test_front_desk_can_create_customers_but_not_export_vehicles() {
    let seed = SeedUser::new("fay@redline.example", "pw-fay", "Fay Moss", "Front Desk");
    let mock = MockBackend::spawn(vec![seed]).await;
    let (router, _state) = app_signed_in_as(&mock, "fay@redline.example", "pw-fay").await;

    let response = router
        .clone()
        .oneshot(form_post("/customers", "full_name=New%20Customer"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(location(&response).contains("notice="));

    let response = router
        .oneshot(
            Request::get("/vehicles/export")
                .body(Body::empty())
                .expect("req"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(location(&response).contains("error="));
}

#[tokio::test]
async fn test_unknown_role_keeps_menu_but_denies_writes() {
    // A profile row with a role the app does not recognize: the user can
    // sign in and sees the fallback navigation, but every write predicate
    // fails closed.
    let seed = SeedUser::new("pat@redline.example", "pw-pat", "Pat Doe", "Janitor");
    let mock = MockBackend::spawn(vec![seed]).await;
    let (router, state) = app_signed_in_as(&mock, "pat@redline.example", "pw-pat").await;

    let user = state.session().snapshot().user.expect("user loaded");
    assert_eq!(user.role, None);

    // The menu falls back to the Front Desk tree, but the screen's own
    // read predicate still fails closed and redirects away.
    let response = router
        .clone()
        .oneshot(Request::get("/vehicles").body(Body::empty()).expect("req"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");

    // A forged write is denied the same way.
    let response = router
        .oneshot(form_post("/vehicles", "plate=ZZ-99"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(location(&response).contains("error="));
}
