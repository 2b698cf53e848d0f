//! MCP (Model Context Protocol) server over stdio.
//!
//! Messages are JSON-RPC 2.0 objects, one per line. Each request is handled
//! on its own task so a long video poll does not hold up unrelated calls;
//! responses funnel through a channel to a single writer.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::logging;
use crate::tools::ToolRegistry;

pub const SERVER_NAME: &str = "mcp-server-doubao";
pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;

// === Protocol Types ===

#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    #[serde(default)]
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Option<Value>,
}

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

fn success_response(id: Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

fn error_response(id: Value, error: &RpcError) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "error": error })
}

// === Server ===

/// Stateless MCP front end over a tool registry.
#[derive(Clone)]
pub struct McpServer {
    registry: Arc<ToolRegistry>,
}

impl McpServer {
    #[must_use]
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    /// Serve line-delimited JSON-RPC until `reader` reaches EOF and every
    /// in-flight request has been answered.
    pub async fn serve<R, W>(&self, reader: R, writer: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<Value>();

        let read_loop = async move {
            let mut lines = reader.lines();
            while let Some(line) = lines
                .next_line()
                .await
                .context("Failed to read MCP input")?
            {
                if line.trim().is_empty() {
                    continue;
                }
                let server = self.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    if let Some(response) = server.handle_line(&line).await {
                        // The receiver only closes after a write failure.
                        let _ = tx.send(response);
                    }
                });
            }
            Ok::<(), anyhow::Error>(())
        };

        let write_loop = async {
            while let Some(response) = rx.recv().await {
                let mut line = serde_json::to_string(&response)?;
                line.push('\n');
                writer
                    .write_all(line.as_bytes())
                    .await
                    .context("Failed to write MCP response")?;
                writer.flush().await?;
            }
            Ok::<(), anyhow::Error>(())
        };

        let (read_result, write_result) = tokio::join!(read_loop, write_loop);
        read_result?;
        write_result
    }

    /// Handle one input line. Returns `None` for notifications.
    pub async fn handle_line(&self, line: &str) -> Option<Value> {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                logging::warn(format!("Unparseable MCP message: {e}"));
                return Some(error_response(
                    Value::Null,
                    &RpcError::new(PARSE_ERROR, format!("Parse error: {e}")),
                ));
            }
        };

        let id = value.get("id").cloned();
        let request: JsonRpcRequest = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(e) => {
                return Some(error_response(
                    id.unwrap_or(Value::Null),
                    &RpcError::new(INVALID_REQUEST, format!("Invalid request: {e}")),
                ));
            }
        };

        logging::info(format!("MCP {}", request.method));
        let outcome = self.dispatch(&request.method, request.params).await;

        // Requests without an id are notifications and never answered.
        let id = request.id?;
        Some(match outcome {
            Ok(result) => success_response(id, result),
            Err(error) => error_response(id, &error),
        })
    }

    async fn dispatch(&self, method: &str, params: Option<Value>) -> Result<Value, RpcError> {
        match method {
            "initialize" => Ok(self.initialize(params.as_ref())),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": self.registry.descriptors() })),
            "tools/call" => self.call_tool(params).await,
            m if m.starts_with("notifications/") => Ok(Value::Null),
            other => Err(RpcError::new(
                METHOD_NOT_FOUND,
                format!("Method not found: {other}"),
            )),
        }
    }

    fn initialize(&self, params: Option<&Value>) -> Value {
        let protocol_version = params
            .and_then(|p| p.get("protocolVersion"))
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_PROTOCOL_VERSION);
        json!({
            "protocolVersion": protocol_version,
            "capabilities": { "tools": {} },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION")
            }
        })
    }

    async fn call_tool(&self, params: Option<Value>) -> Result<Value, RpcError> {
        let params = params.unwrap_or(Value::Null);
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::new(INVALID_PARAMS, "Missing tool name"))?;
        let arguments = match params.get("arguments") {
            None | Some(Value::Null) => {
                return Err(RpcError::new(INVALID_PARAMS, "No arguments provided"));
            }
            Some(arguments) => arguments.clone(),
        };
        if !self.registry.contains(name) {
            return Err(RpcError::new(INVALID_PARAMS, format!("Unknown tool: {name}")));
        }

        let result = self.registry.call(name, arguments).await;
        Ok(json!({
            "content": [{ "type": "text", "text": result.to_text() }]
        }))
    }
}

// === Unit Tests ===
