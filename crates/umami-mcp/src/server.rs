use std::sync::Arc;

use serde_json::Value;

use umami_core::UmamiClient;

use crate::protocol::{
    InitializeResult, JsonRpcRequest, JsonRpcResponse, ServerCapabilities, ServerInfo,
    ToolCallResult, ToolsCapability, INTERNAL_ERROR, METHOD_NOT_FOUND, PROTOCOL_VERSION,
};
use crate::tools::{self, ToolState};

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

pub struct McpServer {
    state: Arc<ToolState>,
}

impl McpServer {
    pub fn new(client: UmamiClient) -> Self {
        Self {
            state: Arc::new(ToolState { client }),
        }
    }

    /// Dispatch an incoming JSON-RPC message and return an optional response.
    ///
    /// Returns `None` for notifications (messages without an `id`): they are
    /// never answered, whatever the method, and are not executed.
    pub async fn handle_request(&self, req: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let id = match req.id {
            Some(id) => id,
            None => {
                tracing::debug!(method = %req.method, "notification received");
                return None;
            }
        };

        let result = match req.method.as_str() {
            "initialize" => self.handle_initialize(req.params),
            "ping" => Ok(Value::Object(Default::default())),
            "tools/list" => self.handle_tools_list(),
            "tools/call" => self.handle_tools_call(req.params).await,
            other => Err((METHOD_NOT_FOUND, format!("Method not found: {other}"))),
        };

        Some(match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err((code, msg)) => JsonRpcResponse::error(id, code, msg),
        })
    }

    // -----------------------------------------------------------------------
    // Method handlers
    // -----------------------------------------------------------------------

    fn handle_initialize(&self, _params: Option<Value>) -> Result<Value, (i32, String)> {
        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {}),
            },
            server_info: ServerInfo {
                name: "umami-mcp".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };
        serde_json::to_value(result).map_err(|e| (INTERNAL_ERROR, e.to_string()))
    }

    fn handle_tools_list(&self) -> Result<Value, (i32, String)> {
        let tool_defs = tools::all_tool_definitions();
        serde_json::to_value(serde_json::json!({ "tools": tool_defs }))
            .map_err(|e| (INTERNAL_ERROR, e.to_string()))
    }

    /// Tool failures, including an unknown or missing tool name, are
    /// reported inside the result with `isError`, never as JSON-RPC errors.
    async fn handle_tools_call(&self, params: Option<Value>) -> Result<Value, (i32, String)> {
        let params = params.unwrap_or(Value::Null);

        let name = params
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        let arguments = match params.get("arguments") {
            None | Some(Value::Null) => Value::Object(Default::default()),
            Some(args) => args.clone(),
        };

        tracing::info!(tool = %name, "calling tool");

        let tool_result: ToolCallResult =
            tools::dispatch_tool(&name, arguments, &self.state).await;

        serde_json::to_value(tool_result).map_err(|e| (INTERNAL_ERROR, e.to_string()))
    }
}
