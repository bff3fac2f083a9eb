mod common;

use axum::http::StatusCode;
use axum_test::TestServer;
use campaign_dispatch::routes::app_router_unlimited;

#[tokio::test]
async fn test_health_endpoint_success() {
    let ctx = common::create_test_context();
    let server = TestServer::new(app_router_unlimited(ctx.state)).unwrap();

    let response = server.get("/health").await;

    response.assert_status_ok();

    let json = response.json::<serde_json::Value>();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["checks"]["database"]["status"], "ok");
    assert_eq!(json["checks"]["mail_transport"]["status"], "ok");
}

#[tokio::test]
async fn test_health_endpoint_structure() {
    let ctx = common::create_test_context();
    let server = TestServer::new(app_router_unlimited(ctx.state)).unwrap();

    let response = server.get("/health").await;

    let json = response.json::<serde_json::Value>();

    assert!(json.get("status").is_some());
    assert!(json.get("version").is_some());
    assert!(json.get("checks").is_some());
    assert!(json["checks"].get("database").is_some());
    assert!(json["checks"].get("mail_transport").is_some());
}

#[tokio::test]
async fn test_health_degraded_when_gateway_down() {
    let ctx = common::create_test_context();
    ctx.transport.set_unhealthy();
    let server = TestServer::new(app_router_unlimited(ctx.state)).unwrap();

    let response = server.get("/health").await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let json = response.json::<serde_json::Value>();
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["checks"]["database"]["status"], "ok");
    assert_eq!(json["checks"]["mail_transport"]["status"], "error");
}
