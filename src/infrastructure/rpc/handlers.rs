//! Coordination tool dispatch.
//!
//! Every tool takes a `project_id` that isolates the keyspace and answers
//! with the `{status, message, data}` envelope. Unknown tools get an
//! explicit "Tool not implemented" error envelope.

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::domain::errors::DomainError;
use crate::domain::models::{FileOperation, TodoStatus};
use crate::services::coordination::CoordinationStore;

use super::types::*;

/// Hard server-side bound on a synchronous query wait.
const MAX_QUERY_WAIT_SECS: u64 = 10;

fn invalid_args(e: impl std::fmt::Display) -> ToolEnvelope {
    ToolEnvelope::error(format!("Invalid arguments: {}", e), json!({}))
}

/// Dispatch one tool call against the store.
pub async fn dispatch_tool(
    store: &Arc<CoordinationStore>,
    name: &str,
    arguments: Value,
) -> ToolEnvelope {
    debug!(tool = name, "coordination tool call");
    match name {
        "register_agent" => {
            let args: RegisterAgentArgs = match serde_json::from_value(arguments) {
                Ok(args) => args,
                Err(e) => return invalid_args(e),
            };
            match store
                .register_agent(
                    &args.project_id,
                    &args.session_name,
                    &args.task_id,
                    &args.branch,
                    &args.description,
                )
                .await
            {
                Ok(()) => ToolEnvelope::success(
                    format!("Agent {} registered successfully", args.session_name),
                    json!({
                        "agent_id": args.session_name,
                        "project_id": args.project_id,
                    }),
                ),
                Err(e) => ToolEnvelope::error(e.to_string(), json!({})),
            }
        }

        "unregister_agent" => {
            let args: SessionScopedArgs = match serde_json::from_value(arguments) {
                Ok(args) => args,
                Err(e) => return invalid_args(e),
            };
            let _ = store
                .unregister_agent(&args.project_id, &args.session_name)
                .await;
            ToolEnvelope::success(
                format!("Agent {} unregistered successfully", args.session_name),
                json!({}),
            )
        }

        "heartbeat" => {
            let args: SessionScopedArgs = match serde_json::from_value(arguments) {
                Ok(args) => args,
                Err(e) => return invalid_args(e),
            };
            store.heartbeat(&args.project_id, &args.session_name).await;
            ToolEnvelope::success("Heartbeat recorded", json!({}))
        }

        "list_active_agents" => {
            let args: ProjectScopedArgs = match serde_json::from_value(arguments) {
                Ok(args) => args,
                Err(e) => return invalid_args(e),
            };
            let agents = store.list_active_agents(&args.project_id).await;
            ToolEnvelope::success(
                format!("Found {} active agents", agents.len()),
                json!({ "agents": agents }),
            )
        }

        "add_todo" => {
            let args: AddTodoArgs = match serde_json::from_value(arguments) {
                Ok(args) => args,
                Err(e) => return invalid_args(e),
            };
            let todo = store
                .add_todo(&args.project_id, &args.session_name, &args.task, args.priority)
                .await;
            ToolEnvelope::success("Todo added successfully", json!({ "todo_id": todo.id }))
        }

        "update_todo" => {
            let args: UpdateTodoArgs = match serde_json::from_value(arguments) {
                Ok(args) => args,
                Err(e) => return invalid_args(e),
            };
            let Some(status) = TodoStatus::from_str(&args.status) else {
                return ToolEnvelope::error(
                    format!("Unknown todo status: {}", args.status),
                    json!({}),
                );
            };
            match store
                .update_todo(&args.project_id, &args.session_name, &args.todo_id, status)
                .await
            {
                Ok(_) => ToolEnvelope::success(
                    format!("Todo {} updated to {}", args.todo_id, status.as_str()),
                    json!({}),
                ),
                Err(e) => ToolEnvelope::error(e.to_string(), json!({})),
            }
        }

        "get_my_todos" => {
            let args: SessionScopedArgs = match serde_json::from_value(arguments) {
                Ok(args) => args,
                Err(e) => return invalid_args(e),
            };
            let todos = store.get_todos(&args.project_id, &args.session_name).await;
            ToolEnvelope::success(
                format!("Retrieved {} todos", todos.len()),
                json!({ "todos": todos }),
            )
        }

        "announce_file_change" => {
            let args: AnnounceFileChangeArgs = match serde_json::from_value(arguments) {
                Ok(args) => args,
                Err(e) => return invalid_args(e),
            };
            let Some(operation) = FileOperation::from_str(&args.operation) else {
                return ToolEnvelope::error(
                    format!("Unknown operation: {}", args.operation),
                    json!({}),
                );
            };
            match store
                .announce_file_change(
                    &args.project_id,
                    &args.session_name,
                    &args.file_path,
                    operation,
                    args.description,
                )
                .await
            {
                Ok(lock) => ToolEnvelope::success(
                    format!("Lock acquired on {}", args.file_path),
                    json!({ "lock": lock }),
                ),
                Err(DomainError::LockHeld { path, holder }) => ToolEnvelope::error(
                    format!("File {} is locked by {}", path, holder),
                    json!({ "locked_by": holder }),
                ),
                Err(e) => ToolEnvelope::error(e.to_string(), json!({})),
            }
        }

        "release_file_lock" => {
            let args: ReleaseFileLockArgs = match serde_json::from_value(arguments) {
                Ok(args) => args,
                Err(e) => return invalid_args(e),
            };
            store
                .release_file_lock(&args.project_id, &args.session_name, &args.file_path)
                .await;
            ToolEnvelope::success(format!("Lock released on {}", args.file_path), json!({}))
        }

        "register_interface" => {
            let args: RegisterInterfaceArgs = match serde_json::from_value(arguments) {
                Ok(args) => args,
                Err(e) => return invalid_args(e),
            };
            match store
                .register_interface(
                    &args.project_id,
                    &args.session_name,
                    &args.name,
                    &args.definition,
                )
                .await
            {
                Ok(def) => ToolEnvelope::success(
                    format!("Interface {} registered", args.name),
                    json!({ "interface": def }),
                ),
                Err(existing) => ToolEnvelope::error(
                    format!(
                        "Interface {} already registered by {}",
                        args.name, existing.registered_by
                    ),
                    json!({ "interface": existing }),
                ),
            }
        }

        "query_interface" => {
            let args: QueryInterfaceArgs = match serde_json::from_value(arguments) {
                Ok(args) => args,
                Err(e) => return invalid_args(e),
            };
            match store.query_interface(&args.project_id, &args.name).await {
                Some(def) => ToolEnvelope::success(
                    format!("Interface {} found", args.name),
                    json!({ "interface": def }),
                ),
                None => ToolEnvelope::error(
                    format!("Interface {} not found", args.name),
                    json!({}),
                ),
            }
        }

        "list_interfaces" => {
            let args: ProjectScopedArgs = match serde_json::from_value(arguments) {
                Ok(args) => args,
                Err(e) => return invalid_args(e),
            };
            let interfaces = store.list_interfaces(&args.project_id).await;
            ToolEnvelope::success(
                format!("Found {} interfaces", interfaces.len()),
                json!({ "interfaces": interfaces }),
            )
        }

        "query_agent" => {
            let args: QueryAgentArgs = match serde_json::from_value(arguments) {
                Ok(args) => args,
                Err(e) => return invalid_args(e),
            };
            let query_id = store
                .send_query(
                    &args.project_id,
                    &args.session_name,
                    &args.target_session,
                    &args.query,
                )
                .await;

            if !args.wait_for_response {
                return ToolEnvelope::success(
                    format!("Query sent to {}", args.target_session),
                    json!({ "query_id": query_id }),
                );
            }

            let wait = Duration::from_secs(args.timeout.min(MAX_QUERY_WAIT_SECS));
            match store
                .wait_for_response(&args.project_id, &args.session_name, &query_id, wait)
                .await
            {
                Some(reply) => ToolEnvelope::success(
                    "Response received",
                    json!({ "query_id": query_id, "response": reply.body }),
                ),
                None => ToolEnvelope::error(
                    format!("No response from {} within timeout", args.target_session),
                    json!({ "query_id": query_id }),
                ),
            }
        }

        "check_messages" => {
            let args: SessionScopedArgs = match serde_json::from_value(arguments) {
                Ok(args) => args,
                Err(e) => return invalid_args(e),
            };
            let messages = store
                .check_messages(&args.project_id, &args.session_name)
                .await;
            ToolEnvelope::success(
                format!("Retrieved {} messages", messages.len()),
                json!({ "messages": messages }),
            )
        }

        "respond_to_query" => {
            let args: RespondToQueryArgs = match serde_json::from_value(arguments) {
                Ok(args) => args,
                Err(e) => return invalid_args(e),
            };
            match store
                .respond_to_query(
                    &args.project_id,
                    &args.session_name,
                    &args.query_id,
                    &args.response,
                )
                .await
            {
                Ok(()) => ToolEnvelope::success("Response delivered", json!({})),
                Err(e) => ToolEnvelope::error(e.to_string(), json!({})),
            }
        }

        "broadcast_message" => {
            let args: BroadcastArgs = match serde_json::from_value(arguments) {
                Ok(args) => args,
                Err(e) => return invalid_args(e),
            };
            let delivered = store
                .broadcast(&args.project_id, &args.session_name, &args.message)
                .await;
            ToolEnvelope::success(
                format!("Broadcast delivered to {} agents", delivered),
                json!({ "recipients": delivered }),
            )
        }

        "mark_task_completed" => {
            let args: MarkTaskCompletedArgs = match serde_json::from_value(arguments) {
                Ok(args) => args,
                Err(e) => return invalid_args(e),
            };
            store
                .mark_task_completed(&args.project_id, &args.session_name, &args.task_id)
                .await;
            ToolEnvelope::success(
                format!("Task {} marked as completed", args.task_id),
                json!({}),
            )
        }

        _ => ToolEnvelope::error("Tool not implemented", json!({ "tool": name })),
    }
}

/// Names and input schemas advertised by `tools/list`.
pub fn tool_listing() -> Value {
    fn session_scoped() -> Value {
        json!({
            "type": "object",
            "properties": {
                "project_id": {"type": "string"},
                "session_name": {"type": "string"}
            },
            "required": ["project_id", "session_name"]
        })
    }

    json!({
        "tools": [
            {
                "name": "register_agent",
                "description": "Register an agent for a specific project",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "project_id": {"type": "string"},
                        "session_name": {"type": "string"},
                        "task_id": {"type": "string"},
                        "branch": {"type": "string"},
                        "description": {"type": "string"}
                    },
                    "required": ["project_id", "session_name", "task_id", "branch", "description"]
                }
            },
            {
                "name": "unregister_agent",
                "description": "Unregister an agent and clean up its state",
                "inputSchema": session_scoped()
            },
            {
                "name": "heartbeat",
                "description": "Send a periodic liveness heartbeat",
                "inputSchema": session_scoped()
            },
            {
                "name": "list_active_agents",
                "description": "List all active agents in a project",
                "inputSchema": {
                    "type": "object",
                    "properties": {"project_id": {"type": "string"}},
                    "required": ["project_id"]
                }
            },
            {
                "name": "add_todo",
                "description": "Add a todo item to this agent's shared list",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "project_id": {"type": "string"},
                        "session_name": {"type": "string"},
                        "task": {"type": "string"},
                        "priority": {"type": "integer", "default": 5}
                    },
                    "required": ["project_id", "session_name", "task"]
                }
            },
            {
                "name": "update_todo",
                "description": "Update a todo's status",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "project_id": {"type": "string"},
                        "session_name": {"type": "string"},
                        "todo_id": {"type": "string"},
                        "status": {"type": "string", "enum": ["pending", "in_progress", "completed", "cancelled"]}
                    },
                    "required": ["project_id", "session_name", "todo_id", "status"]
                }
            },
            {
                "name": "get_my_todos",
                "description": "Get this agent's todo list",
                "inputSchema": session_scoped()
            },
            {
                "name": "announce_file_change",
                "description": "Lock a file before editing it",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "project_id": {"type": "string"},
                        "session_name": {"type": "string"},
                        "file_path": {"type": "string"},
                        "operation": {"type": "string", "enum": ["create", "modify", "delete"]},
                        "description": {"type": "string"}
                    },
                    "required": ["project_id", "session_name", "file_path", "operation"]
                }
            },
            {
                "name": "release_file_lock",
                "description": "Release a file lock after editing",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "project_id": {"type": "string"},
                        "session_name": {"type": "string"},
                        "file_path": {"type": "string"}
                    },
                    "required": ["project_id", "session_name", "file_path"]
                }
            },
            {
                "name": "register_interface",
                "description": "Share a type or interface definition",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "project_id": {"type": "string"},
                        "session_name": {"type": "string"},
                        "name": {"type": "string"},
                        "definition": {"type": "string"}
                    },
                    "required": ["project_id", "session_name", "name", "definition"]
                }
            },
            {
                "name": "query_interface",
                "description": "Get a shared interface definition",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "project_id": {"type": "string"},
                        "name": {"type": "string"}
                    },
                    "required": ["project_id", "name"]
                }
            },
            {
                "name": "list_interfaces",
                "description": "List all shared interface definitions",
                "inputSchema": {
                    "type": "object",
                    "properties": {"project_id": {"type": "string"}},
                    "required": ["project_id"]
                }
            },
            {
                "name": "query_agent",
                "description": "Send a query to another agent, optionally waiting for its reply",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "project_id": {"type": "string"},
                        "session_name": {"type": "string"},
                        "target_session": {"type": "string"},
                        "query": {"type": "string"},
                        "wait_for_response": {"type": "boolean", "default": false},
                        "timeout": {"type": "integer", "default": 10}
                    },
                    "required": ["project_id", "session_name", "target_session", "query"]
                }
            },
            {
                "name": "check_messages",
                "description": "Drain this agent's message inbox",
                "inputSchema": session_scoped()
            },
            {
                "name": "respond_to_query",
                "description": "Respond to a query from another agent",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "project_id": {"type": "string"},
                        "session_name": {"type": "string"},
                        "query_id": {"type": "string"},
                        "response": {"type": "string"}
                    },
                    "required": ["project_id", "session_name", "query_id", "response"]
                }
            },
            {
                "name": "broadcast_message",
                "description": "Broadcast a message to every other agent in the project",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "project_id": {"type": "string"},
                        "session_name": {"type": "string"},
                        "message": {"type": "string"}
                    },
                    "required": ["project_id", "session_name", "message"]
                }
            },
            {
                "name": "mark_task_completed",
                "description": "Mark this agent's task as completed",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "project_id": {"type": "string"},
                        "session_name": {"type": "string"},
                        "task_id": {"type": "string"}
                    },
                    "required": ["project_id", "session_name", "task_id"]
                }
            }
        ]
    })
}
