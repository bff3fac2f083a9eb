mod common;

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{Value, json};

use campaign_dispatch::domain::entities::{CampaignStatus, NewRecipient, TargetingSpec};
use campaign_dispatch::routes::app_router_unlimited;

/// Build a test server over the full router and return it with a bearer token.
async fn make_server() -> (TestServer, String, common::TestContext) {
    let ctx = common::create_test_context();
    let token = common::create_api_token(&ctx.store, "marketing-bot").await;
    let server = TestServer::new(app_router_unlimited(ctx.state.clone())).unwrap();
    (server, format!("Bearer {token}"), ctx)
}

fn campaign_body() -> Value {
    json!({
        "name": "Spring sale",
        "subject": "Everything 20% off",
        "html_content": "<h1>Spring</h1>",
    })
}

// ─── AUTH ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let (server, _, _ctx) = make_server().await;

    let response = server.get("/api/campaigns").await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    let json = response.json::<Value>();
    assert_eq!(json["error"]["code"], "unauthorized");
}

#[tokio::test]
async fn test_unknown_token_is_unauthorized() {
    let (server, _, _ctx) = make_server().await;

    let response = server
        .get("/api/campaigns")
        .add_header("Authorization", "Bearer not-a-real-token")
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

// ─── CREATE / READ ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_create_campaign_records_author() {
    let (server, auth, _ctx) = make_server().await;

    let response = server
        .post("/api/campaigns")
        .add_header("Authorization", auth)
        .json(&campaign_body())
        .await;

    response.assert_status(StatusCode::CREATED);
    let json = response.json::<Value>();
    assert_eq!(json["status"], "draft");
    assert_eq!(json["created_by"], "marketing-bot");
    assert_eq!(json["targeting"]["type"], "all_opted_in");
    assert_eq!(json["total_recipients"], 0);
    assert!(json.get("outcome").is_none());
}

#[tokio::test]
async fn test_create_campaign_rejects_blank_subject() {
    let (server, auth, _ctx) = make_server().await;

    let response = server
        .post("/api/campaigns")
        .add_header("Authorization", auth)
        .json(&json!({
            "name": "Spring sale",
            "subject": "",
            "html_content": "<h1>Spring</h1>",
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"]["code"], "validation_error");
}

#[tokio::test]
async fn test_create_campaign_rejects_empty_tier_list() {
    let (server, auth, _ctx) = make_server().await;

    let mut body = campaign_body();
    body["targeting"] = json!({ "type": "membership_tier", "tiers": [] });

    let response = server
        .post("/api/campaigns")
        .add_header("Authorization", auth)
        .json(&body)
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_campaign_not_found() {
    let (server, auth, _ctx) = make_server().await;

    let response = server
        .get("/api/campaigns/999")
        .add_header("Authorization", auth)
        .await;

    response.assert_status_not_found();
}

#[tokio::test]
async fn test_list_campaigns_paginates_and_filters() {
    let (server, auth, ctx) = make_server().await;
    common::seed_opted_in(&ctx.store, &["a@example.com"]).await;
    for _ in 0..3 {
        common::create_draft(&ctx.store, TargetingSpec::AllOptedIn).await;
    }
    let dispatched = common::create_draft(&ctx.store, TargetingSpec::AllOptedIn).await;
    ctx.state
        .dispatch_service
        .dispatch(dispatched.id)
        .await
        .unwrap();

    let response = server
        .get("/api/campaigns?page=1&page_size=2")
        .add_header("Authorization", auth.clone())
        .await;
    response.assert_status_ok();
    let json = response.json::<Value>();
    assert_eq!(json["total"], 4);
    assert_eq!(json["items"].as_array().unwrap().len(), 2);
    assert_eq!(json["has_more"], true);

    let response = server
        .get("/api/campaigns?status=draft")
        .add_header("Authorization", auth.clone())
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["total"], 3);

    let response = server
        .get("/api/campaigns?status=bogus")
        .add_header("Authorization", auth)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_campaigns_rejects_oversized_page() {
    let (server, auth, _ctx) = make_server().await;

    let response = server
        .get("/api/campaigns?page_size=500")
        .add_header("Authorization", auth)
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

// ─── UPDATE / DELETE ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_patch_draft_updates_and_clears_text() {
    let (server, auth, ctx) = make_server().await;
    let draft = common::create_draft(&ctx.store, TargetingSpec::AllOptedIn).await;

    let response = server
        .patch(&format!("/api/campaigns/{}", draft.id))
        .add_header("Authorization", auth.clone())
        .json(&json!({ "text_content": "Plain version" }))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["text_content"], "Plain version");

    let response = server
        .patch(&format!("/api/campaigns/{}", draft.id))
        .add_header("Authorization", auth)
        .json(&json!({ "subject": "Last chance", "text_content": null }))
        .await;
    response.assert_status_ok();
    let json = response.json::<Value>();
    assert_eq!(json["subject"], "Last chance");
    assert!(json["text_content"].is_null());
    assert_eq!(json["name"], draft.name);
}

#[tokio::test]
async fn test_patch_after_dispatch_is_locked() {
    let (server, auth, ctx) = make_server().await;
    let draft = common::create_draft(&ctx.store, TargetingSpec::AllOptedIn).await;
    ctx.state.dispatch_service.dispatch(draft.id).await.unwrap();

    let response = server
        .patch(&format!("/api/campaigns/{}", draft.id))
        .add_header("Authorization", auth)
        .json(&json!({ "subject": "Too late" }))
        .await;

    response.assert_status(StatusCode::CONFLICT);
    assert_eq!(response.json::<Value>()["error"]["code"], "campaign_locked");
}

#[tokio::test]
async fn test_delete_campaign() {
    let (server, auth, ctx) = make_server().await;
    let draft = common::create_draft(&ctx.store, TargetingSpec::AllOptedIn).await;

    server
        .delete(&format!("/api/campaigns/{}", draft.id))
        .add_header("Authorization", auth.clone())
        .await
        .assert_status(StatusCode::NO_CONTENT);

    server
        .delete(&format!("/api/campaigns/{}", draft.id))
        .add_header("Authorization", auth)
        .await
        .assert_status_not_found();
}

// ─── DISPATCH ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_dispatch_accepts_then_rejects_repeat() {
    let (server, auth, ctx) = make_server().await;
    common::seed_opted_in(&ctx.store, &["a@example.com", "b@example.com"]).await;
    let draft = common::create_draft(&ctx.store, TargetingSpec::AllOptedIn).await;

    let response = server
        .post(&format!("/api/campaigns/{}/dispatch", draft.id))
        .add_header("Authorization", auth.clone())
        .await;
    response.assert_status(StatusCode::ACCEPTED);
    let json = response.json::<Value>();
    assert_eq!(json["status"], "sending");
    assert_eq!(json["total_recipients"], 2);

    let response = server
        .post(&format!("/api/campaigns/{}/dispatch", draft.id))
        .add_header("Authorization", auth.clone())
        .await;
    response.assert_status(StatusCode::CONFLICT);
    assert_eq!(response.json::<Value>()["error"]["code"], "already_dispatched");

    common::wait_for_status(&ctx.store, draft.id, CampaignStatus::Sent).await;

    let response = server
        .get(&format!("/api/campaigns/{}", draft.id))
        .add_header("Authorization", auth)
        .await;
    let json = response.json::<Value>();
    assert_eq!(json["status"], "sent");
    assert_eq!(json["success_count"], 2);
    assert_eq!(json["outcome"], "delivered");
}

#[tokio::test]
async fn test_dispatch_empty_audience_is_sent_immediately() {
    let (server, auth, ctx) = make_server().await;
    let draft = common::create_draft(&ctx.store, TargetingSpec::AllOptedIn).await;

    let response = server
        .post(&format!("/api/campaigns/{}/dispatch", draft.id))
        .add_header("Authorization", auth)
        .await;

    response.assert_status(StatusCode::ACCEPTED);
    let json = response.json::<Value>();
    assert_eq!(json["status"], "sent");
    assert_eq!(json["outcome"], "empty");
}

#[tokio::test]
async fn test_dispatch_unknown_campaign() {
    let (server, auth, _ctx) = make_server().await;

    server
        .post("/api/campaigns/999/dispatch")
        .add_header("Authorization", auth)
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn test_pause_and_resume_require_sending() {
    let (server, auth, ctx) = make_server().await;
    let draft = common::create_draft(&ctx.store, TargetingSpec::AllOptedIn).await;

    for action in ["pause", "resume"] {
        let response = server
            .post(&format!("/api/campaigns/{}/{action}", draft.id))
            .add_header("Authorization", auth.clone())
            .await;
        response.assert_status(StatusCode::CONFLICT);
        assert_eq!(
            response.json::<Value>()["error"]["code"],
            "campaign_not_sending"
        );
    }
}

// ─── TEST SEND ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_send_test_message() {
    let (server, auth, ctx) = make_server().await;
    let draft = common::create_draft(&ctx.store, TargetingSpec::AllOptedIn).await;

    let response = server
        .post(&format!("/api/campaigns/{}/test", draft.id))
        .add_header("Authorization", auth)
        .json(&json!({ "address": "qa@example.com" }))
        .await;

    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["sent"], true);
    assert_eq!(ctx.transport.recipients(), vec!["qa@example.com"]);
    assert_eq!(ctx.store.delivery_row_count().await, 0);
    assert_eq!(
        ctx.store.campaign(draft.id).await.unwrap().status,
        CampaignStatus::Draft
    );
}

#[tokio::test]
async fn test_send_test_rejects_bad_address() {
    let (server, auth, ctx) = make_server().await;
    let draft = common::create_draft(&ctx.store, TargetingSpec::AllOptedIn).await;

    let response = server
        .post(&format!("/api/campaigns/{}/test", draft.id))
        .add_header("Authorization", auth)
        .json(&json!({ "address": "nobody" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(ctx.transport.messages().is_empty());
}

#[tokio::test]
async fn test_send_test_gateway_rejection_is_bad_gateway() {
    let (server, auth, ctx) = make_server().await;
    ctx.transport.fail_for("qa@example.com");
    let draft = common::create_draft(&ctx.store, TargetingSpec::AllOptedIn).await;

    let response = server
        .post(&format!("/api/campaigns/{}/test", draft.id))
        .add_header("Authorization", auth)
        .json(&json!({ "address": "qa@example.com" }))
        .await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    assert_eq!(response.json::<Value>()["error"]["code"], "transport_error");
    assert_eq!(ctx.store.delivery_row_count().await, 0);
}

// ─── DELIVERIES / STATS ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_deliveries_and_stats_after_send() {
    let (server, auth, ctx) = make_server().await;
    common::seed_opted_in(
        &ctx.store,
        &["a@example.com", "b@example.com", "c@example.com"],
    )
    .await;
    ctx.transport.fail_for("b@example.com");
    let draft = common::create_draft(&ctx.store, TargetingSpec::AllOptedIn).await;
    let handle = ctx
        .state
        .dispatch_service
        .dispatch_with_handle(draft.id)
        .await
        .unwrap()
        .handle
        .unwrap();
    handle.await.unwrap();

    let response = server
        .get(&format!("/api/campaigns/{}/stats", draft.id))
        .add_header("Authorization", auth.clone())
        .await;
    response.assert_status_ok();
    let json = response.json::<Value>();
    assert_eq!(json["campaign_id"], draft.id);
    assert_eq!(json["pending"], 0);
    assert_eq!(json["sent"], 2);
    assert_eq!(json["failed"], 1);
    assert_eq!(json["total"], 3);

    let response = server
        .get(&format!("/api/campaigns/{}/deliveries?status=failed", draft.id))
        .add_header("Authorization", auth.clone())
        .await;
    response.assert_status_ok();
    let json = response.json::<Value>();
    assert_eq!(json["total"], 1);
    let item = &json["items"][0];
    assert_eq!(item["email"], "b@example.com");
    assert_eq!(item["status"], "failed");
    assert!(item["error_message"].as_str().unwrap().contains("550"));
    assert!(item.get("unsubscribe_token").is_none());

    let response = server
        .get(&format!("/api/campaigns/{}/deliveries", draft.id))
        .add_header("Authorization", auth)
        .await;
    let json = response.json::<Value>();
    let emails: Vec<&str> = json["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["email"].as_str().unwrap())
        .collect();
    assert_eq!(emails, vec!["a@example.com", "b@example.com", "c@example.com"]);
}

#[tokio::test]
async fn test_stats_for_unknown_campaign() {
    let (server, auth, _ctx) = make_server().await;

    server
        .get("/api/campaigns/999/stats")
        .add_header("Authorization", auth)
        .await
        .assert_status_not_found();
}

// ─── AUDIENCE PREVIEW ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_audience_preview_counts() {
    let (server, auth, ctx) = make_server().await;
    common::seed_opted_in(&ctx.store, &["a@example.com", "b@example.com"]).await;
    ctx.store
        .insert_recipient(NewRecipient {
            opted_in: false,
            ..NewRecipient::opted_in("c@example.com")
        })
        .await;

    let response = server
        .post("/api/audience/preview")
        .add_header("Authorization", auth.clone())
        .json(&json!({}))
        .await;
    response.assert_status_ok();
    let json = response.json::<Value>();
    assert_eq!(json["total_eligible"], 3);
    assert_eq!(json["total_opted_in"], 2);

    let response = server
        .post("/api/audience/preview")
        .add_header("Authorization", auth)
        .json(&json!({ "targeting": { "type": "spend_range" } }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}
