//! MCP server over newline-delimited JSON-RPC.
//!
//! Each inbound line is handled on its own task, so a slow inference does
//! not hold up other requests. Responses may therefore be written out of
//! request order; clients match them by id.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Value, json};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt},
    sync::mpsc,
};
use tracing::{debug, info, warn};

use crate::{
    model::ModelRegistry,
    protocol::{JsonRpcId, JsonRpcRequest, JsonRpcResponse, error_codes},
    tools,
};

const PROTOCOL_VERSION: &str = "2024-11-05";

#[derive(Debug, Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

pub struct McpServer {
    registry: Arc<ModelRegistry>,
}

impl McpServer {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }

    /// Serves requests from stdin until it is closed.
    pub async fn run_stdio(self: Arc<Self>) -> anyhow::Result<()> {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        let mut stdout = tokio::io::stdout();
        info!("MCP server ready on stdio");
        self.serve(stdin, &mut stdout).await
    }

    pub async fn serve<R, W>(self: Arc<Self>, reader: R, writer: &mut W) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<JsonRpcResponse>();

        let read_loop = async move {
            let mut lines = reader.lines();
            while let Some(line) = lines.next_line().await? {
                if line.trim().is_empty() {
                    continue;
                }
                let server = Arc::clone(&self);
                let tx = tx.clone();
                tokio::spawn(async move {
                    if let Some(response) = server.handle_line(&line).await {
                        let _ = tx.send(response);
                    }
                });
            }
            debug!("input closed");
            Ok::<_, anyhow::Error>(())
        };

        let write_loop = async {
            while let Some(response) = rx.recv().await {
                let encoded = serde_json::to_string(&response)?;
                writer.write_all(encoded.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
            Ok::<_, anyhow::Error>(())
        };

        let (read, write) = tokio::join!(read_loop, write_loop);
        read?;
        write?;
        info!("MCP server shutting down");
        Ok(())
    }

    /// Handles one JSON-RPC message. Notifications produce no response.
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let request: JsonRpcRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "unparseable request");
                return Some(JsonRpcResponse::error(
                    None,
                    error_codes::PARSE_ERROR,
                    format!("Parse error: {e}"),
                ));
            }
        };

        if request.jsonrpc != "2.0" {
            return Some(JsonRpcResponse::error(
                request.id,
                error_codes::INVALID_REQUEST,
                "Invalid JSON-RPC version",
            ));
        }

        let Some(id) = request.id else {
            debug!(method = %request.method, "notification");
            return None;
        };

        Some(self.dispatch(id, &request.method, request.params).await)
    }

    async fn dispatch(&self, id: JsonRpcId, method: &str, params: Option<Value>) -> JsonRpcResponse {
        let id = Some(id);
        match method {
            "initialize" => JsonRpcResponse::success(
                id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": { "tools": {} },
                    "serverInfo": {
                        "name": "gline-mcp",
                        "version": env!("CARGO_PKG_VERSION"),
                    }
                }),
            ),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => JsonRpcResponse::success(
                id,
                json!({ "tools": tools::tool_definitions() }),
            ),
            "tools/call" => {
                let params: ToolCallParams = match params.map(serde_json::from_value) {
                    Some(Ok(params)) => params,
                    Some(Err(e)) => {
                        return JsonRpcResponse::error(
                            id,
                            error_codes::INVALID_PARAMS,
                            format!("Invalid params: {e}"),
                        );
                    }
                    None => {
                        return JsonRpcResponse::error(
                            id,
                            error_codes::INVALID_PARAMS,
                            "Missing params",
                        );
                    }
                };
                if params.name != tools::EXTRACT_ENTITIES {
                    return JsonRpcResponse::error(
                        id,
                        error_codes::INVALID_PARAMS,
                        format!("Unknown tool: {}", params.name),
                    );
                }
                let outcome = tools::extract_entities(&self.registry, params.arguments).await;
                JsonRpcResponse::success(id, outcome.into_call_result())
            }
            other => JsonRpcResponse::error(
                id,
                error_codes::METHOD_NOT_FOUND,
                format!("Method not found: {other}"),
            ),
        }
    }
}
