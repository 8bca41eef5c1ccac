//! Backend session abstraction.
//!
//! A session presents exactly two protocol operations — `list_tools` and
//! `call_tool` — regardless of whether the real transport is a long-lived
//! stdio subprocess (rmcp) or an HTTP JSON-RPC exchange
//! ([`HttpSession`](crate::http::HttpSession)). The catalog and dispatcher
//! depend only on the trait, never on which variant they hold.

use anyhow::Context;
use async_trait::async_trait;
use rmcp::handler::client::ClientHandler;
use rmcp::model::{
    CallToolRequestParams, ClientCapabilities, Implementation, InitializeRequestParams,
};
use rmcp::service::{self, RoleClient, RunningService};
use rmcp::transport::child_process::TokioChildProcess;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::config::LaunchSpec;
use crate::error::{Result, RouterError};
use crate::http::HttpSession;
use crate::loader::interpolate_env_vars;

/// One tool as advertised by a backend, before any normalization.
#[derive(Debug, Clone)]
pub struct RawTool {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: Option<Value>,
}

/// The un-normalized outcome of a `tools/call`: the backend's content items
/// as raw JSON plus its error flag. Dispatch turns this into the canonical
/// [`DispatchResult`](crate::dispatch::DispatchResult) shape.
#[derive(Debug, Clone)]
pub struct RawToolResult {
    pub content: Vec<Value>,
    pub is_error: bool,
}

#[async_trait]
pub trait BackendSession: Send + Sync {
    /// List the tools the backend advertises. Degrades gracefully: any
    /// handshake or transport failure yields an empty listing with the
    /// cause logged, never an error.
    async fn list_tools(&self) -> Vec<RawTool>;

    async fn call_tool(&self, raw_name: &str, arguments: Value) -> Result<RawToolResult>;

    /// Release the underlying transport (terminate the subprocess, drop the
    /// HTTP client). Called exactly once, at conversation end.
    async fn shutdown(self: Box<Self>);
}

/// Open a session for the given launch configuration. Connection failures
/// surface here and degrade only this backend.
pub async fn connect(backend_id: &str, launch: &LaunchSpec) -> anyhow::Result<Box<dyn BackendSession>> {
    match launch {
        LaunchSpec::Stdio {
            command,
            args,
            cwd,
            env,
        } => {
            let mut cmd = Command::new(command);
            cmd.args(args);
            if let Some(cwd) = cwd {
                cmd.current_dir(cwd);
            }
            for (key, value) in env {
                cmd.env(key, interpolate_env_vars(value));
            }
            let session = StdioSession::spawn(backend_id, cmd).await?;
            Ok(Box::new(session))
        }
        LaunchSpec::Http { url } => Ok(Box::new(HttpSession::new(url.clone()))),
    }
}

#[derive(Clone)]
struct SessionHandler;

impl ClientHandler for SessionHandler {
    fn get_info(&self) -> InitializeRequestParams {
        InitializeRequestParams {
            meta: None,
            protocol_version: Default::default(),
            capabilities: ClientCapabilities::default(),
            client_info: Implementation {
                name: "futbot".to_string(),
                title: None,
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },
        }
    }
}

/// A persistent duplexed stdio subprocess session. The initialize handshake
/// runs once at spawn; the same channel serves every subsequent call until
/// shutdown kills the subprocess.
pub struct StdioSession {
    backend_id: String,
    service: RunningService<RoleClient, SessionHandler>,
}

impl StdioSession {
    async fn spawn(backend_id: &str, cmd: Command) -> anyhow::Result<Self> {
        let (transport, stderr) = TokioChildProcess::builder(cmd)
            .stderr(std::process::Stdio::piped())
            .spawn()
            .context("Failed to spawn MCP child process")?;

        // Drain child stderr so the pipe never fills; surface it for debugging.
        if let Some(stderr) = stderr {
            let name = backend_id.to_string();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(backend = %name, "[mcp:{}] {}", name, line);
                }
            });
        }

        let service = service::serve_client(SessionHandler, transport)
            .await
            .context("MCP initialize handshake failed")?;

        Ok(Self {
            backend_id: backend_id.to_string(),
            service,
        })
    }
}

#[async_trait]
impl BackendSession for StdioSession {
    async fn list_tools(&self) -> Vec<RawTool> {
        let tools = match self.service.list_all_tools().await {
            Ok(tools) => tools,
            Err(e) => {
                tracing::warn!(backend = %self.backend_id, "tools/list failed: {}", e);
                return Vec::new();
            }
        };

        tools
            .into_iter()
            .map(|tool| RawTool {
                name: tool.name.to_string(),
                description: tool.description.map(|d| d.to_string()),
                input_schema: serde_json::to_value(tool.input_schema).ok(),
            })
            .collect()
    }

    async fn call_tool(&self, raw_name: &str, arguments: Value) -> Result<RawToolResult> {
        let args = arguments.as_object().cloned().unwrap_or_default();
        let params = CallToolRequestParams {
            meta: None,
            name: raw_name.to_string().into(),
            arguments: Some(args),
            task: None,
        };

        let result = self
            .service
            .call_tool(params)
            .await
            .map_err(|e| RouterError::Invocation(e.to_string()))?;

        let content = result
            .content
            .into_iter()
            .map(|item| serde_json::to_value(&item).unwrap_or(Value::Null))
            .collect();

        Ok(RawToolResult {
            content,
            is_error: result.is_error.unwrap_or(false),
        })
    }

    async fn shutdown(self: Box<Self>) {
        let StdioSession {
            backend_id,
            service,
        } = *self;
        if let Err(e) = service.cancel().await {
            tracing::debug!(backend = %backend_id, "error cancelling MCP service: {}", e);
        }
    }
}
