//! A token rejected by the payments API signs the browser out.

#![allow(clippy::unwrap_used)]

use rackz_integration_tests::{TestContext, location};
use serde_json::Value;

#[tokio::test]
async fn test_rejected_token_forces_signout() {
    let ctx = TestContext::new().await;
    ctx.sign_up("dana@example.com").await;
    ctx.api.state().stripe_connected = true;
    ctx.api.state().revoked = true;

    let response = ctx.get("/integrations").await;
    assert_eq!(response.status(), 303);
    assert_eq!(location(&response), Some("/signin?expired=1"));

    let session: Value = ctx.get("/api/session").await.json().await.unwrap();
    assert_eq!(session["authenticated"], false);

    let response = ctx.get("/dashboard").await;
    assert_eq!(response.status(), 303);
    assert!(location(&response).unwrap().starts_with("/signin"));
}

#[tokio::test]
async fn test_rejected_token_on_panel_fragment_uses_hx_redirect() {
    let ctx = TestContext::new().await;
    ctx.sign_up("dana@example.com").await;
    ctx.api.state().revoked = true;

    let response = ctx
        .client
        .get(ctx.url("/dashboard/panels/overview?package=starter"))
        .header("hx-request", "true")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
    assert_eq!(
        response.headers().get("hx-redirect").and_then(|v| v.to_str().ok()),
        Some("/signin?expired=1")
    );

    let response = ctx.get("/api/dashboard").await;
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn test_signin_page_shows_expiry_notice() {
    let ctx = TestContext::new().await;
    let response = ctx.get("/signin?expired=1").await;
    assert_eq!(response.status(), 200);
    assert!(response.text().await.unwrap().contains("session has expired"));
}
