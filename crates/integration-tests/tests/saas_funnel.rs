//! Sign-up with a chosen plan through to the plan dashboard.

#![allow(clippy::unwrap_used)]

use rackz_core::{BillingCycle, SaasPackage, UserId};
use rackz_integration_tests::{TestContext, location};
use serde_json::Value;

#[tokio::test]
async fn test_signup_with_plan_lands_on_payment_page() {
    let ctx = TestContext::new().await;

    let response = ctx
        .post_form(
            "/signup",
            &[
                ("name", "Dana Reyes"),
                ("email", "dana@example.com"),
                ("password", "correct horse"),
                ("company", "Reyes Goods"),
                ("package", "pro"),
                ("billing", "yearly"),
            ],
        )
        .await;
    assert_eq!(response.status(), 303);
    assert_eq!(
        location(&response),
        Some("/payment?package=pro&billing=yearly")
    );

    let account = ctx.accounts.load(&UserId::from("usr_1")).await.unwrap();
    assert_eq!(account.package, Some(SaasPackage::Pro));
    assert_eq!(account.billing, Some(BillingCycle::Yearly));

    let page = ctx.get("/payment").await;
    assert_eq!(page.status(), 200);
    let body = page.text().await.unwrap();
    assert!(body.contains("Pro plan"));
    assert!(body.contains("$626"));
}

#[tokio::test]
async fn test_payment_success_routes_dashboard_to_paid_plan() {
    let ctx = TestContext::new().await;
    ctx.sign_up("dana@example.com").await;

    let response = ctx.get("/payment/success?package=scale&billing=monthly").await;
    assert_eq!(response.status(), 303);
    assert_eq!(location(&response), Some("/dashboard?package=scale"));

    let session: Value = ctx.get("/api/session").await.json().await.unwrap();
    assert_eq!(session["authenticated"], true);
    assert_eq!(session["dashboard_href"], "/dashboard?package=scale");

    let dashboard = ctx.get("/dashboard").await;
    assert_eq!(dashboard.status(), 200);
    let body = dashboard.text().await.unwrap();
    assert!(body.contains("/dashboard/panels/overview"));
}

#[tokio::test]
async fn test_duplicate_signup_rerenders_form() {
    let ctx = TestContext::new().await;
    ctx.sign_up("dana@example.com").await;
    ctx.post_form("/signout", &[]).await;

    let response = ctx.sign_up("dana@example.com").await;
    assert_eq!(response.status(), 200);
    let body = response.text().await.unwrap();
    assert!(body.contains("already exists"));
}

#[tokio::test]
async fn test_signin_with_wrong_password() {
    let ctx = TestContext::new().await;
    ctx.sign_up("dana@example.com").await;
    ctx.post_form("/signout", &[]).await;

    let response = ctx
        .post_form(
            "/signin",
            &[("email", "dana@example.com"), ("password", "wrong password")],
        )
        .await;
    assert_eq!(response.status(), 200);
    assert!(response.text().await.unwrap().contains("Invalid email or password."));

    let response = ctx
        .post_form(
            "/signin",
            &[("email", "dana@example.com"), ("password", "correct horse")],
        )
        .await;
    assert_eq!(response.status(), 303);
}
