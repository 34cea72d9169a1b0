//! Anthropic client tests against a local HTTP mock.

use serde_json::json;

use trunkline::domain::models::PlannerConfig;
use trunkline::domain::ports::Planner;
use trunkline::infrastructure::anthropic::AnthropicClient;

fn config() -> PlannerConfig {
    PlannerConfig {
        api_key: Some("test-key".to_string()),
        max_retries: 1,
        ..PlannerConfig::default()
    }
}

fn plan_body() -> String {
    let plan = json!({
        "plan": "Scaffold first, then features",
        "suggested_tasks": [
            {"title": "Scaffold", "description": "Set up the repo", "priority": 1},
            {"title": "Header", "dependencies": ["Scaffold"], "priority": 3}
        ]
    });
    json!({
        "content": [{"type": "text", "text": plan.to_string()}]
    })
    .to_string()
}

#[tokio::test]
async fn synthesize_plan_parses_model_output() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/messages")
        .match_header("x-api-key", "test-key")
        .match_header("anthropic-version", "2023-06-01")
        .with_status(200)
        .with_body(plan_body())
        .create_async()
        .await;

    let client = AnthropicClient::new(&config())
        .unwrap()
        .with_base_url(server.url());

    let outline = client
        .synthesize_plan("A demo site", "Build a landing page")
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(outline.plan, "Scaffold first, then features");
    assert_eq!(outline.suggested_tasks.len(), 2);
    assert_eq!(outline.suggested_tasks[1].dependencies, vec!["Scaffold"]);
}

#[tokio::test]
async fn transient_server_error_is_retried_then_surfaced() {
    let mut server = mockito::Server::new_async().await;
    // With max_retries = 1 the client calls twice before giving up
    let mock = server
        .mock("POST", "/v1/messages")
        .with_status(503)
        .with_body("overloaded")
        .expect(2)
        .create_async()
        .await;

    let client = AnthropicClient::new(&config())
        .unwrap()
        .with_base_url(server.url());

    let err = client.synthesize_plan("overview", "prompt").await.unwrap_err();
    mock.assert_async().await;
    assert!(err.to_string().contains("503"));
}

#[tokio::test]
async fn client_error_fails_without_retry() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/messages")
        .with_status(401)
        .with_body(r#"{"error": "unauthorized"}"#)
        .expect(1)
        .create_async()
        .await;

    let client = AnthropicClient::new(&config())
        .unwrap()
        .with_base_url(server.url());

    let err = client.synthesize_plan("overview", "prompt").await.unwrap_err();
    mock.assert_async().await;
    assert!(err.to_string().contains("401"));
}
