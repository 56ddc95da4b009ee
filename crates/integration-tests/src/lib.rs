//! Test fixtures for the integration suite.
//!
//! [`MockBackend`] is an in-process stand-in for the hosted backend: the
//! handful of GoTrue and PostgREST endpoints the dashboard consumes,
//! served by the same axum stack the app itself uses. Tests seed it with
//! users, point a real `SupabaseClient` at it, and drive the session
//! state machine end-to-end.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use secrecy::SecretString;
use serde_json::{Value, json};
use uuid::Uuid;

use redline_dashboard::config::SupabaseConfig;

/// A user seeded into the mock backend.
#[derive(Debug, Clone)]
pub struct SeedUser {
    pub id: Uuid,
    pub email: String,
    pub password: String,
    pub full_name: String,
    /// Raw role string, exactly as the backend column would hold it -
    /// including unknown values.
    pub role: Option<String>,
    pub image: Option<String>,
    pub avatar_url: Option<String>,
    /// PIN for quick-switch and unlock, if set.
    pub pin: Option<String>,
    /// Whether the PIN row also stores the sign-in credentials.
    pub pin_has_credentials: bool,
}

impl SeedUser {
    /// A user with sensible defaults; customize fields after.
    #[must_use]
    pub fn new(email: &str, password: &str, full_name: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.to_owned(),
            password: password.to_owned(),
            full_name: full_name.to_owned(),
            role: Some(role.to_owned()),
            image: None,
            avatar_url: None,
            pin: None,
            pin_has_credentials: false,
        }
    }

    /// Attach a PIN with stored credentials (the quick-switch shape).
    #[must_use]
    pub fn with_pin(mut self, pin: &str) -> Self {
        self.pin = Some(pin.to_owned());
        self.pin_has_credentials = true;
        self
    }
}

/// Shared mock state, visible to tests for assertions.
pub struct MockState {
    pub users: Vec<SeedUser>,
    /// Number of password/refresh token grants attempted.
    pub token_requests: AtomicUsize,
}

/// The running mock backend.
pub struct MockBackend {
    pub state: Arc<MockState>,
    addr: SocketAddr,
    task: tokio::task::JoinHandle<()>,
}

impl MockBackend {
    /// Spawn the mock on an ephemeral port.
    ///
    /// # Panics
    ///
    /// Panics when the listener cannot bind (test environment failure).
    pub async fn spawn(users: Vec<SeedUser>) -> Self {
        let state = Arc::new(MockState {
            users,
            token_requests: AtomicUsize::new(0),
        });

        let app = Router::new()
            .route("/auth/v1/token", post(token))
            .route("/auth/v1/logout", post(logout))
            .route("/auth/v1/recover", post(recover))
            .route("/rest/v1/{table}", get(rest_get).post(rest_post).patch(rest_patch))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock backend");
        let addr = listener.local_addr().expect("mock backend addr");
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { state, addr, task }
    }

    /// A `SupabaseConfig` pointing at this mock.
    ///
    /// # Panics
    ///
    /// Panics when the mock address does not form a URL.
    #[must_use]
    pub fn config(&self) -> SupabaseConfig {
        SupabaseConfig {
            url: format!("http://{}", self.addr)
                .parse()
                .expect("mock backend url"),
            anon_key: SecretString::from("test-anon-key"),
            session_file: None,
        }
    }

    /// How many credential sign-ins the mock has seen.
    #[must_use]
    pub fn token_requests(&self) -> usize {
        self.state.token_requests.load(Ordering::SeqCst)
    }

    /// Stop the server task.
    pub fn shutdown(&self) {
        self.task.abort();
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// =============================================================================
// GoTrue endpoints
// =============================================================================

async fn token(
    State(state): State<Arc<MockState>>,
    Query(query): Query<Vec<(String, String)>>,
    Json(body): Json<Value>,
) -> Response {
    state.token_requests.fetch_add(1, Ordering::SeqCst);
    let grant_type = query
        .iter()
        .find(|(k, _)| k == "grant_type")
        .map(|(_, v)| v.as_str())
        .unwrap_or_default();

    let user = match grant_type {
        "password" => {
            let email = body.get("email").and_then(Value::as_str).unwrap_or_default();
            let password = body
                .get("password")
                .and_then(Value::as_str)
                .unwrap_or_default();
            state
                .users
                .iter()
                .find(|u| u.email == email && u.password == password)
        }
        "refresh_token" => {
            let token = body
                .get("refresh_token")
                .and_then(Value::as_str)
                .unwrap_or_default();
            state
                .users
                .iter()
                .find(|u| format!("refresh-{}", u.id) == token)
        }
        _ => None,
    };

    match user {
        Some(user) => Json(json!({
            "access_token": format!("access-{}", user.id),
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": format!("refresh-{}", user.id),
            "user": { "id": user.id, "email": user.email },
        }))
        .into_response(),
        None => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid login credentials",
            })),
        )
            .into_response(),
    }
}

async fn logout() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn recover() -> Json<Value> {
    Json(json!({}))
}

// =============================================================================
// PostgREST endpoints
// =============================================================================

fn wants_single_object(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("vnd.pgrst.object"))
}

/// `column=eq.value` filters from the query string.
fn eq_filters(query: &[(String, String)]) -> Vec<(String, String)> {
    query
        .iter()
        .filter_map(|(key, value)| {
            value
                .strip_prefix("eq.")
                .map(|v| (key.clone(), v.to_owned()))
        })
        .collect()
}

fn respond(rows: Vec<Value>, single: bool) -> Response {
    if single {
        return match <[Value; 1]>::try_from(rows) {
            Ok([row]) => Json(row).into_response(),
            Err(_) => (
                StatusCode::NOT_ACCEPTABLE,
                Json(json!({
                    "code": "PGRST116",
                    "message": "JSON object requested, multiple (or no) rows returned",
                })),
            )
                .into_response(),
        };
    }
    Json(Value::Array(rows)).into_response()
}

async fn rest_get(
    State(state): State<Arc<MockState>>,
    Path(table): Path<String>,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Response {
    let filters = eq_filters(&query);
    let matches = |candidates: &[(&str, String)]| {
        filters.iter().all(|(key, expected)| {
            candidates
                .iter()
                .any(|(k, v)| k == key && v == expected)
        })
    };

    let rows: Vec<Value> = match table.as_str() {
        "profiles" => {
            let mut users: Vec<&SeedUser> = state
                .users
                .iter()
                .filter(|u| matches(&[("id", u.id.to_string())]))
                .collect();
            users.sort_by(|a, b| a.full_name.cmp(&b.full_name));
            users
                .iter()
                .map(|u| {
                    json!({
                        "id": u.id,
                        "full_name": u.full_name,
                        "email": u.email,
                        "role": u.role,
                        "image": u.image,
                        "avatar_url": u.avatar_url,
                        "theme_mode": null,
                        "theme_color": null,
                    })
                })
                .collect()
        }
        "user_pins" => state
            .users
            .iter()
            .filter(|u| u.pin.is_some())
            .filter(|u| {
                matches(&[
                    ("user_id", u.id.to_string()),
                    ("pin", u.pin.clone().unwrap_or_default()),
                ])
            })
            .map(|u| {
                json!({
                    "user_id": u.id,
                    "email": u.pin_has_credentials.then(|| u.email.clone()),
                    "password": u.pin_has_credentials.then(|| u.password.clone()),
                })
            })
            .collect(),
        _ => Vec::new(),
    };

    respond(rows, wants_single_object(&headers))
}

async fn rest_post(
    Path(_table): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    // Echo the inserted representation with a fresh id and defaults.
    let mut row = body;
    if let Some(map) = row.as_object_mut() {
        map.entry("id").or_insert_with(|| json!(Uuid::new_v4()));
        map.entry("disabled").or_insert(json!(false));
    }
    respond(vec![row], wants_single_object(&headers))
}

async fn rest_patch(headers: HeaderMap) -> Response {
    respond(Vec::new(), wants_single_object(&headers))
}
