#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use tower::ServiceExt;

use lifedash::auth::jwt::TokenClaims;
use lifedash::auth::JwtProvider;
use lifedash::core::config::{AppConfig, DatabaseConfig};
use lifedash::core::shared::state::AppState;
use lifedash::core::shared::utils::{create_conn, create_lazy_conn, run_migrations, DbPool};
use lifedash::main_module::build_router;

pub const TEST_SECRET: &str = "lifedash-test-secret";
pub const TEST_DATABASE_VAR: &str = "LIFEDASH_TEST_DATABASE_URL";

static COUNTER: AtomicUsize = AtomicUsize::new(0);
static MIGRATED: OnceLock<Mutex<bool>> = OnceLock::new();

pub fn token(user_id: &str) -> String {
    let claims = TokenClaims {
        sub: user_id.to_string(),
        exp: chrono::Utc::now().timestamp() + 3600,
        email: Some(format!("{user_id}@example.com")),
        picture: None,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(TEST_SECRET.as_bytes())).unwrap()
}

/// A user id no other test run has used.
pub fn unique_user(prefix: &str) -> String {
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let n = COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("{prefix}-{nanos}-{n}")
}

pub fn app_with_pool(pool: DbPool) -> Router {
    let state = AppState::new(pool, Arc::new(JwtProvider::new(TEST_SECRET)), AppConfig::default());
    build_router(Arc::new(state))
}

/// Router over a pool that never connects.
pub fn offline_app() -> Router {
    app_with_pool(create_lazy_conn("postgres://lifedash@127.0.0.1:1/unreachable"))
}

/// Router over the test database, or `None` when it is not configured or reachable.
pub fn db_app() -> Option<Router> {
    let url = match std::env::var(TEST_DATABASE_VAR) {
        Ok(url) => url,
        Err(_) => {
            println!("Skipping test - {TEST_DATABASE_VAR} not set");
            return None;
        }
    };
    let config = DatabaseConfig {
        url,
        max_connections: 4,
        run_migrations: true,
    };
    let pool = match create_conn(&config) {
        Ok(pool) => pool,
        Err(e) => {
            println!("Skipping test - cannot connect to database: {e}");
            return None;
        }
    };

    let mut migrated = MIGRATED.get_or_init(|| Mutex::new(false)).lock().unwrap();
    if !*migrated {
        run_migrations(&pool).unwrap();
        *migrated = true;
    }
    drop(migrated);

    Some(app_with_pool(pool))
}

pub async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    user: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    match body {
        Some(body) => send(app, method, uri, user, Some(("application/json", body.to_string()))).await,
        None => send(app, method, uri, user, None).await,
    }
}

/// Sends a non-JSON body such as `text/calendar`.
pub async fn call_raw(
    app: &Router,
    method: Method,
    uri: &str,
    user: Option<&str>,
    content_type: &str,
    body: String,
) -> (StatusCode, Value) {
    send(app, method, uri, user, Some((content_type, body))).await
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    user: Option<&str>,
    body: Option<(&str, String)>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        request = request.header(header::AUTHORIZATION, format!("Bearer {}", token(user)));
    }
    let request = match body {
        Some((content_type, body)) => request
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}
