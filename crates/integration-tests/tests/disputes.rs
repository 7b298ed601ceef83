//! Dispute buckets over the JSON API.

#![allow(clippy::unwrap_used)]

use rackz_integration_tests::{TestContext, disputed_charge};
use serde_json::Value;

async fn pro_context() -> TestContext {
    let ctx = TestContext::new().await;
    {
        let mut api = ctx.api.state();
        api.stripe_connected = true;
        api.charges = vec![
            disputed_charge("ch_won", "won", 1_760_000_000),
            disputed_charge("ch_lost", "lost", 1_760_100_000),
            disputed_charge("ch_open", "needs_response", 1_760_200_000),
        ];
    }
    ctx.sign_up("dana@example.com").await;
    ctx.get("/payment/success?package=pro&billing=monthly").await;
    ctx
}

#[tokio::test]
async fn test_won_filter_returns_only_won_disputes() {
    let ctx = pro_context().await;

    let response = ctx.get("/api/disputes?status=won").await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "loaded");

    let disputes = body["data"]["disputes"].as_array().unwrap();
    assert_eq!(disputes.len(), 1);
    assert_eq!(disputes[0]["charge_id"], "ch_won");
    assert_eq!(disputes[0]["status"], "won");
}

#[tokio::test]
async fn test_unknown_filter_is_rejected() {
    let ctx = pro_context().await;
    let response = ctx.get("/api/disputes?status=pending").await;
    assert_eq!(response.status(), 400);

    let response = ctx
        .get("/dashboard/panels/disputes?package=pro&status=pending")
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_disputes_need_pro_plan() {
    let ctx = pro_context().await;
    let response = ctx.get("/api/disputes?package=starter").await;
    assert_eq!(response.status(), 403);
}
