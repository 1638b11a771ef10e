//! Back-office router tests.
//!
//! Every business route sits behind the admin gate; none of these requests
//! carries a session, so none reaches the database.

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use synclune_integration_tests::{admin_app, json_body, send};

fn request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .expect("valid request")
}

#[tokio::test]
async fn test_health_carries_security_headers() {
    let response = send(admin_app(), request(Method::GET, "/health")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers["x-frame-options"], "DENY");
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["cache-control"], "no-store");
    assert!(headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_back_office_routes_require_admin_session() {
    let routes = [
        (Method::GET, "/auth/me"),
        (Method::GET, "/orders"),
        (Method::GET, "/orders/42"),
        (Method::POST, "/orders/42/ship"),
        (Method::POST, "/orders/42/deliver"),
        (Method::POST, "/orders/42/cancel"),
        (Method::POST, "/orders/42/refunds"),
        (Method::GET, "/refunds/7"),
        (Method::POST, "/refunds/7/process"),
        (Method::POST, "/refunds/7/cancel"),
        (Method::GET, "/discounts"),
        (Method::POST, "/discounts"),
        (Method::PUT, "/discounts/3"),
        (Method::DELETE, "/discounts/3"),
        (Method::POST, "/discounts/3/toggle"),
        (Method::GET, "/inventory"),
        (Method::PUT, "/inventory/12"),
        (Method::POST, "/inventory/12/toggle"),
        (Method::GET, "/webhook-events"),
    ];

    for (method, uri) in routes {
        let response = send(admin_app(), request(method.clone(), uri)).await;
        let (status, body) = json_body(response).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
        assert_eq!(body["status"], "error", "{method} {uri}");
        assert_eq!(body["message"], "Vous devez être connecté.");
    }
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let response = send(admin_app(), request(Method::GET, "/customers")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_logout_without_session_succeeds() {
    let response = send(admin_app(), request(Method::POST, "/auth/logout")).await;
    let (status, body) = json_body(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
}
