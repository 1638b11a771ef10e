//! Storefront router tests for the guards that answer before any query.

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use secrecy::SecretString;
use synclune_integration_tests::{CRON_SECRET, WEBHOOK_SECRET, json_body, send, storefront_app};
use synclune_storefront::services::stripe::signature::sign;

fn webhook(body: &'static str, signature: Option<String>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/api/webhooks/stripe")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(signature) = signature {
        builder = builder.header("stripe-signature", signature);
    }
    builder.body(Body::from(body)).expect("valid request")
}

fn cron(job: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(format!("/api/cron/{job}"));
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("valid request")
}

fn signed(body: &str) -> String {
    let timestamp = chrono::Utc::now().timestamp().to_string();
    let secret = SecretString::from(WEBHOOK_SECRET);
    let v1 = sign(&secret, &timestamp, body.as_bytes()).expect("hmac accepts any key");
    format!("t={timestamp},v1={v1}")
}

#[tokio::test]
async fn test_health() {
    let response = send(
        storefront_app(None),
        Request::get("/health").body(Body::empty()).expect("valid request"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_account_routes_require_login() {
    for uri in ["/account/orders", "/account/export"] {
        let response = send(
            storefront_app(None),
            Request::get(uri).body(Body::empty()).expect("valid request"),
        )
        .await;
        let (status, body) = json_body(response).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(body["status"], "error");
    }
}

#[tokio::test]
async fn test_checkout_with_malformed_body_answers_action_state() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/checkout")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", "203.0.113.7")
        .body(Body::from(r#"{"items":[{"sku_id":1,"quantity":"two"}]}"#))
        .expect("valid request");

    let (status, body) = json_body(send(storefront_app(None), request).await).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
    assert!(body["data"].is_null());
}

#[tokio::test]
async fn test_cart_without_json_content_type_answers_action_state() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/cart/items")
        .body(Body::from(r#"{"sku_id":1,"quantity":1}"#))
        .expect("valid request");

    let (status, body) = json_body(send(storefront_app(None), request).await).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn test_webhook_without_configured_secret_is_refused() {
    let response = send(storefront_app(None), webhook("{}", Some(signed("{}")))).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_webhook_signature_is_required() {
    let response = send(storefront_app(Some(WEBHOOK_SECRET)), webhook("{}", None)).await;
    let (status, body) = json_body(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "missing signature");
}

#[tokio::test]
async fn test_webhook_signature_must_match_body() {
    let signature = signed(r#"{"id":"evt_other"}"#);
    let response = send(
        storefront_app(Some(WEBHOOK_SECRET)),
        webhook(r#"{"id":"evt_1"}"#, Some(signature)),
    )
    .await;
    let (status, body) = json_body(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid signature");
}

#[tokio::test]
async fn test_webhook_with_valid_signature_but_bad_payload() {
    let body = "not json";
    let response = send(
        storefront_app(Some(WEBHOOK_SECRET)),
        webhook(body, Some(signed(body))),
    )
    .await;
    let (status, body) = json_body(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid payload");
}

#[tokio::test]
async fn test_cron_requires_bearer_secret() {
    for token in [None, Some("wrong-secret")] {
        let response = send(storefront_app(None), cron("cleanup-expired-carts", token)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn test_cron_unknown_job_is_not_found() {
    let response = send(storefront_app(None), cron("vacuum", Some(CRON_SECRET))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
