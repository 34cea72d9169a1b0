//! Protocol-level tests driving the coordination tools the way a spawned
//! agent would, asserting the response envelopes and the store laws.

use serde_json::json;
use std::sync::Arc;

use trunkline::infrastructure::rpc::handlers::dispatch_tool;
use trunkline::infrastructure::rpc::ToolEnvelope;
use trunkline::services::CoordinationStore;

async fn call(
    store: &Arc<CoordinationStore>,
    tool: &str,
    args: serde_json::Value,
) -> ToolEnvelope {
    dispatch_tool(store, tool, args).await
}

fn session_args(session: &str) -> serde_json::Value {
    json!({"project_id": "demo", "session_name": session})
}

#[tokio::test]
async fn full_agent_lifecycle() {
    let store = Arc::new(CoordinationStore::new());

    // Register, as the preamble instructs
    let envelope = call(
        &store,
        "register_agent",
        json!({
            "project_id": "demo",
            "session_name": "1-demo",
            "task_id": "1-demo",
            "branch": "task-1",
            "description": "Build the header"
        }),
    )
    .await;
    assert_eq!(envelope.status, "success");

    // Plan via todos
    let envelope = call(
        &store,
        "add_todo",
        json!({
            "project_id": "demo",
            "session_name": "1-demo",
            "task": "sketch the layout",
            "priority": 1
        }),
    )
    .await;
    let todo_id = envelope.data["todo_id"].as_str().unwrap().to_string();

    let envelope = call(
        &store,
        "update_todo",
        json!({
            "project_id": "demo",
            "session_name": "1-demo",
            "todo_id": todo_id,
            "status": "completed"
        }),
    )
    .await;
    assert_eq!(envelope.status, "success");

    let envelope = call(&store, "get_my_todos", session_args("1-demo")).await;
    assert_eq!(envelope.data["todos"].as_array().unwrap().len(), 1);

    // Lock, work, release
    let envelope = call(
        &store,
        "announce_file_change",
        json!({
            "project_id": "demo",
            "session_name": "1-demo",
            "file_path": "src/header.tsx",
            "operation": "create"
        }),
    )
    .await;
    assert_eq!(envelope.status, "success");

    let envelope = call(
        &store,
        "release_file_lock",
        json!({
            "project_id": "demo",
            "session_name": "1-demo",
            "file_path": "src/header.tsx"
        }),
    )
    .await;
    assert_eq!(envelope.status, "success");

    // Heartbeat and completion
    let envelope = call(&store, "heartbeat", session_args("1-demo")).await;
    assert_eq!(envelope.status, "success");

    let envelope = call(
        &store,
        "mark_task_completed",
        json!({
            "project_id": "demo",
            "session_name": "1-demo",
            "task_id": "1-demo"
        }),
    )
    .await;
    assert_eq!(envelope.status, "success");
    assert!(store.take_completion("demo", "1-demo").await.is_some());

    // Unregister cleans up everything the session owned
    let envelope = call(&store, "unregister_agent", session_args("1-demo")).await;
    assert_eq!(envelope.status, "success");
    let envelope = call(&store, "get_my_todos", session_args("1-demo")).await;
    assert_eq!(envelope.data["todos"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn lock_release_restores_prior_state() {
    let store = Arc::new(CoordinationStore::new());
    let lock_args = json!({
        "project_id": "demo",
        "session_name": "1-demo",
        "file_path": "src/app.ts",
        "operation": "modify"
    });

    call(&store, "announce_file_change", lock_args.clone()).await;
    call(
        &store,
        "release_file_lock",
        json!({
            "project_id": "demo",
            "session_name": "1-demo",
            "file_path": "src/app.ts"
        }),
    )
    .await;

    // The path is acquirable again by anyone, as if never locked
    let envelope = call(
        &store,
        "announce_file_change",
        json!({
            "project_id": "demo",
            "session_name": "2-demo",
            "file_path": "src/app.ts",
            "operation": "modify"
        }),
    )
    .await;
    assert_eq!(envelope.status, "success");
}

#[tokio::test]
async fn interface_registration_is_idempotent_and_guarded() {
    let store = Arc::new(CoordinationStore::new());
    let definition = "interface User { id: string; email: string }";

    for _ in 0..2 {
        let envelope = call(
            &store,
            "register_interface",
            json!({
                "project_id": "demo",
                "session_name": "1-demo",
                "name": "User",
                "definition": definition
            }),
        )
        .await;
        assert_eq!(envelope.status, "success", "author re-registration is idempotent");
    }

    // A different session is rejected and receives the existing definition
    let envelope = call(
        &store,
        "register_interface",
        json!({
            "project_id": "demo",
            "session_name": "2-demo",
            "name": "User",
            "definition": "interface User { id: number }"
        }),
    )
    .await;
    assert_eq!(envelope.status, "error");
    assert_eq!(envelope.data["interface"]["definition"], definition);

    let envelope = call(
        &store,
        "query_interface",
        json!({"project_id": "demo", "name": "User"}),
    )
    .await;
    assert_eq!(envelope.data["interface"]["registered_by"], "1-demo");
}

#[tokio::test]
async fn query_respond_round_trip_through_tools() {
    let store = Arc::new(CoordinationStore::new());
    for session in ["1-demo", "2-demo"] {
        call(
            &store,
            "register_agent",
            json!({
                "project_id": "demo",
                "session_name": session,
                "task_id": session,
                "branch": format!("task-{}", &session[..1]),
                "description": "work"
            }),
        )
        .await;
    }

    // Asker sends and waits; responder polls and answers concurrently
    let responder_store = store.clone();
    let responder = tokio::spawn(async move {
        loop {
            let messages = responder_store.check_messages("demo", "2-demo").await;
            if let Some(message) = messages.first() {
                responder_store
                    .respond_to_query("demo", "2-demo", &message.id, "using REST, go ahead")
                    .await
                    .unwrap();
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
    });

    let envelope = call(
        &store,
        "query_agent",
        json!({
            "project_id": "demo",
            "session_name": "1-demo",
            "target_session": "2-demo",
            "query": "REST or GraphQL?",
            "wait_for_response": true,
            "timeout": 5
        }),
    )
    .await;
    responder.await.unwrap();

    assert_eq!(envelope.status, "success");
    assert!(envelope.data["response"]
        .as_str()
        .unwrap()
        .contains("REST"));
}

#[tokio::test]
async fn broadcast_reaches_every_other_agent() {
    let store = Arc::new(CoordinationStore::new());
    for session in ["1-demo", "2-demo", "3-demo"] {
        call(
            &store,
            "register_agent",
            json!({
                "project_id": "demo",
                "session_name": session,
                "task_id": session,
                "branch": "task-x",
                "description": "work"
            }),
        )
        .await;
    }

    let envelope = call(
        &store,
        "broadcast_message",
        json!({
            "project_id": "demo",
            "session_name": "1-demo",
            "message": "starting auth refactor, avoid auth files"
        }),
    )
    .await;
    assert_eq!(envelope.data["recipients"], 2);

    let envelope = call(&store, "check_messages", session_args("2-demo")).await;
    assert_eq!(envelope.data["messages"].as_array().unwrap().len(), 1);
    let envelope = call(&store, "check_messages", session_args("1-demo")).await;
    assert_eq!(envelope.data["messages"].as_array().unwrap().len(), 0);
}
