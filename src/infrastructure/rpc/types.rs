//! Wire types for the coordination RPC surface.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC 2.0 request.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    #[allow(dead_code)]
    pub jsonrpc: Option<String>,
    pub id: Option<Value>,
    pub method: String,
    pub params: Option<Value>,
}

/// JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<Value>, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// Tool response envelope: every coordination tool answers with
/// `{status, message, data}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolEnvelope {
    pub status: String,
    pub message: String,
    pub data: Value,
}

impl ToolEnvelope {
    pub fn success(message: impl Into<String>, data: Value) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            data,
        }
    }

    pub fn error(message: impl Into<String>, data: Value) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            data,
        }
    }
}

// ---------------------------------------------------------------------
// Tool argument shapes
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterAgentArgs {
    pub project_id: String,
    pub session_name: String,
    pub task_id: String,
    pub branch: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct SessionScopedArgs {
    pub project_id: String,
    pub session_name: String,
}

#[derive(Debug, Deserialize)]
pub struct ProjectScopedArgs {
    pub project_id: String,
}

#[derive(Debug, Deserialize)]
pub struct AddTodoArgs {
    pub project_id: String,
    pub session_name: String,
    pub task: String,
    #[serde(default = "default_todo_priority")]
    pub priority: i64,
}

fn default_todo_priority() -> i64 {
    5
}

#[derive(Debug, Deserialize)]
pub struct UpdateTodoArgs {
    pub project_id: String,
    pub session_name: String,
    pub todo_id: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct AnnounceFileChangeArgs {
    pub project_id: String,
    pub session_name: String,
    pub file_path: String,
    pub operation: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReleaseFileLockArgs {
    pub project_id: String,
    pub session_name: String,
    pub file_path: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterInterfaceArgs {
    pub project_id: String,
    pub session_name: String,
    pub name: String,
    pub definition: String,
}

#[derive(Debug, Deserialize)]
pub struct QueryInterfaceArgs {
    pub project_id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct QueryAgentArgs {
    pub project_id: String,
    pub session_name: String,
    pub target_session: String,
    pub query: String,
    #[serde(default)]
    pub wait_for_response: bool,
    /// Seconds; clamped to the server-side bound.
    #[serde(default = "default_query_timeout")]
    pub timeout: u64,
}

fn default_query_timeout() -> u64 {
    10
}

#[derive(Debug, Deserialize)]
pub struct RespondToQueryArgs {
    pub project_id: String,
    pub session_name: String,
    pub query_id: String,
    pub response: String,
}

#[derive(Debug, Deserialize)]
pub struct BroadcastArgs {
    pub project_id: String,
    pub session_name: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct MarkTaskCompletedArgs {
    pub project_id: String,
    pub session_name: String,
    pub task_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_shape() {
        let envelope = ToolEnvelope::success("ok", json!({"x": 1}));
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["message"], "ok");
        assert_eq!(value["data"]["x"], 1);
    }

    #[test]
    fn test_request_parses_without_jsonrpc_field() {
        let raw = json!({"method": "tools/list", "id": 1});
        let request: JsonRpcRequest = serde_json::from_value(raw).unwrap();
        assert_eq!(request.method, "tools/list");
    }

    #[test]
    fn test_query_agent_defaults() {
        let raw = json!({
            "project_id": "demo",
            "session_name": "1-demo",
            "target_session": "2-demo",
            "query": "status?"
        });
        let args: QueryAgentArgs = serde_json::from_value(raw).unwrap();
        assert!(!args.wait_for_response);
        assert_eq!(args.timeout, 10);
    }
}
