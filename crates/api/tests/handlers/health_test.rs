use serde_json::Value;

use crate::test_utils::TestContext;

#[tokio::test]
async fn health_reports_presence_state() {
    let ctx = TestContext::new().await;
    let server = ctx.server();

    let response = server.get("/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["presence_connected"], false);
}

#[tokio::test]
async fn version_matches_package() {
    let ctx = TestContext::new().await;
    let body: Value = ctx.server().get("/version").await.json();
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}
