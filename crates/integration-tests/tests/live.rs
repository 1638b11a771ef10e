//! Full flows against running servers.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database with a published product (`synclune-cli migrate`)
//! - The storefront (`synclune-storefront`) and back-office (`synclune-admin`) running
//! - `ADMIN_TEST_EMAIL` / `ADMIN_TEST_PASSWORD` for an account promoted with
//!   `synclune-cli admin promote`
//!
//! Run with: cargo test -p synclune-integration-tests -- --ignored

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use synclune_integration_tests::live_url;

fn storefront_url() -> String {
    live_url("STOREFRONT_BASE_URL", "http://localhost:3000")
}

fn admin_url() -> String {
    live_url("ADMIN_BASE_URL", "http://localhost:3001")
}

fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to create HTTP client")
}

async fn admin_client() -> Client {
    let client = client();
    let email = std::env::var("ADMIN_TEST_EMAIL").expect("ADMIN_TEST_EMAIL not set");
    let password = std::env::var("ADMIN_TEST_PASSWORD").expect("ADMIN_TEST_PASSWORD not set");

    let resp = client
        .post(format!("{}/auth/login", admin_url()))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Failed to log in");
    assert_eq!(resp.status(), StatusCode::OK);
    client
}

#[tokio::test]
#[ignore = "Requires running storefront and a seeded catalog"]
async fn test_anonymous_cart_flow() {
    let client = client();
    let base = storefront_url();

    let page: Value = client
        .get(format!("{base}/products?per_page=1"))
        .send()
        .await
        .expect("Failed to list products")
        .json()
        .await
        .expect("Invalid product page");
    let slug = page["items"][0]["slug"].as_str().expect("No published product");

    let detail: Value = client
        .get(format!("{base}/products/{slug}"))
        .send()
        .await
        .expect("Failed to load product")
        .json()
        .await
        .expect("Invalid product detail");
    let sku_id = detail["skus"][0]["id"].as_i64().expect("Product without SKU");

    let resp = client
        .post(format!("{base}/cart/items"))
        .json(&json!({ "sku_id": sku_id, "quantity": 1 }))
        .send()
        .await
        .expect("Failed to add to cart");
    assert_eq!(resp.status(), StatusCode::OK);

    let count: Value = client
        .get(format!("{base}/cart/count"))
        .send()
        .await
        .expect("Failed to count cart")
        .json()
        .await
        .expect("Invalid cart count");
    assert_eq!(count["count"], 1);
}

#[tokio::test]
#[ignore = "Requires running back-office and an admin account"]
async fn test_admin_session() {
    let client = admin_client().await;
    let base = admin_url();

    let me: Value = client
        .get(format!("{base}/auth/me"))
        .send()
        .await
        .expect("Failed to get session user")
        .json()
        .await
        .expect("Invalid session user");
    assert_eq!(me["role"], "admin");

    let resp = client
        .get(format!("{base}/orders?per_page=5"))
        .send()
        .await
        .expect("Failed to list orders");
    assert_eq!(resp.status(), StatusCode::OK);
    let page: Value = resp.json().await.expect("Invalid order page");
    assert_eq!(page["per_page"], 5);

    let resp = client
        .post(format!("{base}/auth/logout"))
        .send()
        .await
        .expect("Failed to log out");
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .get(format!("{base}/orders"))
        .send()
        .await
        .expect("Failed to reach orders");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running back-office and an admin account"]
async fn test_discount_lifecycle() {
    let client = admin_client().await;
    let base = admin_url();
    let code = format!("ITEST{}", chrono::Utc::now().timestamp() % 100_000);

    let created: Value = client
        .post(format!("{base}/discounts"))
        .json(&json!({ "code": code, "discount_type": "percentage", "value": 15 }))
        .send()
        .await
        .expect("Failed to create discount")
        .json()
        .await
        .expect("Invalid discount");
    assert_eq!(created["status"], "success");
    let id = created["data"]["id"].as_i64().expect("Discount without id");

    // The same code cannot be created twice.
    let resp = client
        .post(format!("{base}/discounts"))
        .json(&json!({ "code": code, "discount_type": "fixed_amount", "value": 500 }))
        .send()
        .await
        .expect("Failed to post duplicate");
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let toggled: Value = client
        .post(format!("{base}/discounts/{id}/toggle"))
        .send()
        .await
        .expect("Failed to toggle")
        .json()
        .await
        .expect("Invalid discount");
    assert_eq!(toggled["data"]["is_active"], false);

    let resp = client
        .delete(format!("{base}/discounts/{id}"))
        .send()
        .await
        .expect("Failed to delete");
    assert_eq!(resp.status(), StatusCode::OK);
}
