mod common;

use axum::http::{Method, StatusCode};
use common::{call, offline_app};

#[tokio::test]
async fn test_api_requires_bearer_token() {
    let app = offline_app();
    for uri in ["/api/boards", "/api/habits", "/api/budget/summary", "/api/user/me"] {
        let (status, body) = call(&app, Method::GET, uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(body["error"], "unauthenticated");
    }
}

#[tokio::test]
async fn test_invalid_token_is_rejected() {
    let app = offline_app();
    let request = axum::http::Request::builder()
        .uri("/api/boards")
        .header("authorization", "Bearer not-a-jwt")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(app, request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()["www-authenticate"], "Bearer");
}

#[tokio::test]
async fn test_current_user_profile() {
    let app = offline_app();
    let (status, body) = call(&app, Method::GET, "/api/user/me", Some("user-42"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "user-42");
    assert_eq!(body["email"], "user-42@example.com");
}

#[tokio::test]
async fn test_health_is_public_and_reports_database() {
    let app = offline_app();
    let (status, body) = call(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["service"], "lifedash");
    assert_eq!(body["database"], "disconnected");
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = offline_app();
    let (status, _) = call(&app, Method::GET, "/api/nowhere", Some("u"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_goal_handlers_report_unreachable_database() {
    let app = offline_app();
    let attempts = [
        (Method::GET, "/api/goals"),
        (Method::GET, "/api/goals/1"),
        (Method::DELETE, "/api/goals/1"),
    ];
    for (method, uri) in attempts {
        let (status, body) = call(&app, method.clone(), uri, Some("user-42"), None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{method} {uri}");
        assert_eq!(body["error"], "internal");
        assert_eq!(body["message"], "internal error");
    }
}
