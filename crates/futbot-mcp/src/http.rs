//! HTTP flavor of the tool protocol.
//!
//! A stateless request/response exchange with server-side session affinity:
//! the first outbound request carries no session identity, the server
//! assigns one via the `mcp-session-id` response header, and every
//! subsequent request (including the `notifications/initialized` message)
//! must carry it. Responses arrive either as plain JSON bodies or as a
//! `text/event-stream`; for streams, each `data:` line is a candidate
//! payload and the first parseable one wins.

use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::{Result, RouterError};
use crate::session::{BackendSession, RawTool, RawToolResult};

const SESSION_HEADER: &str = "mcp-session-id";
const PROTOCOL_VERSION: &str = "2024-11-05";

enum HandshakeState {
    Pending,
    Ready(String),
    Failed,
}

/// An HTTP JSON-RPC session against a single base URL.
///
/// The handshake (session open, `initialize`, `notifications/initialized`)
/// runs lazily before the first `list_tools`/`call_tool` and at most once
/// per session lifetime: a failure latches, and later calls fail fast
/// without touching the network again.
pub struct HttpSession {
    base_url: String,
    client: reqwest::Client,
    state: Mutex<HandshakeState>,
}

impl HttpSession {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            client: reqwest::Client::new(),
            state: Mutex::new(HandshakeState::Pending),
        }
    }

    /// Return the negotiated session id, performing the handshake if this
    /// is the first call.
    async fn ensure_session(&self) -> Result<String> {
        let mut state = self.state.lock().await;
        match &*state {
            HandshakeState::Ready(id) => return Ok(id.clone()),
            HandshakeState::Failed => {
                return Err(RouterError::Connection {
                    backend: self.base_url.clone(),
                    message: "handshake previously failed".to_string(),
                })
            }
            HandshakeState::Pending => {}
        }

        match self.handshake().await {
            Ok(id) => {
                *state = HandshakeState::Ready(id.clone());
                Ok(id)
            }
            Err(e) => {
                *state = HandshakeState::Failed;
                Err(e)
            }
        }
    }

    async fn handshake(&self) -> Result<String> {
        // Session open: empty JSON body, no session identity yet. The
        // server assigns one via the response header.
        let response = self
            .client
            .post(&self.base_url)
            .json(&serde_json::json!({}))
            .send()
            .await?;

        let session_id = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string())
            .ok_or_else(|| {
                RouterError::MalformedResponse(format!(
                    "server at {} did not return a {} header",
                    self.base_url, SESSION_HEADER
                ))
            })?;

        let init = serde_json::json!({
            "jsonrpc": "2.0",
            "id": "init-1",
            "method": "initialize",
            "params": {
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": {} },
                "clientInfo": { "name": "futbot", "version": "1.0.0" }
            }
        });
        self.post_rpc(&session_id, &init).await?;

        let initialized = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "notifications/initialized"
        });
        let response = self
            .client
            .post(&self.base_url)
            .header(SESSION_HEADER, &session_id)
            .json(&initialized)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(RouterError::MalformedResponse(format!(
                "initialized notification rejected with status {}",
                response.status()
            )));
        }

        Ok(session_id)
    }

    /// Send one JSON-RPC request and return its `result` payload.
    async fn post_rpc(&self, session_id: &str, body: &Value) -> Result<Value> {
        let response = self
            .client
            .post(&self.base_url)
            .header(SESSION_HEADER, session_id)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RouterError::MalformedResponse(format!(
                "server returned status {status}"
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let payload = if content_type.starts_with("text/event-stream") {
            let text = response.text().await?;
            first_sse_payload(&text).ok_or_else(|| {
                RouterError::MalformedResponse(
                    "event stream contained no parseable JSON payload".to_string(),
                )
            })?
        } else {
            response
                .json::<Value>()
                .await
                .map_err(|e| RouterError::MalformedResponse(format!("unparseable body: {e}")))?
        };

        if let Some(error) = payload.get("error") {
            return Err(RouterError::Invocation(
                error
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("unspecified JSON-RPC error")
                    .to_string(),
            ));
        }

        Ok(payload.get("result").cloned().unwrap_or(Value::Null))
    }
}

#[async_trait::async_trait]
impl BackendSession for HttpSession {
    async fn list_tools(&self) -> Vec<RawTool> {
        let session_id = match self.ensure_session().await {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(url = %self.base_url, "MCP handshake failed: {}", e);
                return Vec::new();
            }
        };

        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": "tools-1",
            "method": "tools/list",
            "params": {}
        });

        let result = match self.post_rpc(&session_id, &request).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(url = %self.base_url, "tools/list failed: {}", e);
                return Vec::new();
            }
        };

        result
            .get("tools")
            .and_then(|t| t.as_array())
            .map(|tools| {
                tools
                    .iter()
                    .filter_map(|tool| {
                        Some(RawTool {
                            name: tool.get("name")?.as_str()?.to_string(),
                            description: tool
                                .get("description")
                                .and_then(|d| d.as_str())
                                .map(|d| d.to_string()),
                            input_schema: tool.get("inputSchema").cloned(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    async fn call_tool(&self, raw_name: &str, arguments: Value) -> Result<RawToolResult> {
        let session_id = self.ensure_session().await?;

        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": format!("call-{raw_name}"),
            "method": "tools/call",
            "params": { "name": raw_name, "arguments": arguments }
        });

        let result = self.post_rpc(&session_id, &request).await?;

        let content = result
            .get("content")
            .and_then(|c| c.as_array())
            .cloned()
            .unwrap_or_default();
        let is_error = result
            .get("isError")
            .and_then(|e| e.as_bool())
            .unwrap_or(false);

        Ok(RawToolResult { content, is_error })
    }

    async fn shutdown(self: Box<Self>) {
        // Nothing to release beyond the HTTP client itself.
    }
}

/// Scan an event stream body for the first `data:` line holding valid JSON.
fn first_sse_payload(body: &str) -> Option<Value> {
    body.lines()
        .filter_map(|line| line.trim().strip_prefix("data:"))
        .find_map(|data| serde_json::from_str::<Value>(data.trim()).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn sse_payload_takes_first_parseable_line() {
        let body = "event: message\ndata: not json\ndata: {\"jsonrpc\":\"2.0\",\"result\":{}}\ndata: {\"later\":true}\n\n";
        let payload = first_sse_payload(body).unwrap();
        assert_eq!(payload["jsonrpc"], "2.0");
    }

    #[test]
    fn sse_payload_none_when_no_data_lines_parse() {
        assert!(first_sse_payload("event: ping\n\n").is_none());
        assert!(first_sse_payload("data: still not json\n").is_none());
    }

    /// Serve the same canned HTTP response to every request.
    async fn spawn_canned_server(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                tokio::spawn(async move {
                    let mut buf = [0u8; 8192];
                    let _ = socket.read(&mut buf).await;
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        format!("http://{addr}")
    }

    fn http_response(extra_headers: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n{}Connection: close\r\n\r\n{}",
            body.len(),
            extra_headers,
            body
        )
    }

    #[tokio::test]
    async fn missing_session_header_degrades_to_empty_listing() {
        let response = http_response("", r#"{"jsonrpc":"2.0","id":"x","result":{}}"#);
        let response: &'static str = Box::leak(response.into_boxed_str());
        let url = spawn_canned_server(response).await;

        let session = HttpSession::new(url);
        assert!(session.list_tools().await.is_empty());
    }

    #[tokio::test]
    async fn failed_handshake_latches_for_session_lifetime() {
        let response = http_response("", r#"{"jsonrpc":"2.0","id":"x","result":{}}"#);
        let response: &'static str = Box::leak(response.into_boxed_str());
        let url = spawn_canned_server(response).await;

        let session = HttpSession::new(url);
        assert!(session.list_tools().await.is_empty());

        // The second attempt fails fast instead of redoing the handshake.
        let err = session
            .call_tool("anything", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("handshake previously failed"));
    }

    #[tokio::test]
    async fn lists_tools_once_session_is_negotiated() {
        let body = r#"{"jsonrpc":"2.0","id":"tools-1","result":{"tools":[{"name":"get_competitions","description":"ligas","inputSchema":{"type":"object"}}]}}"#;
        let response = http_response("mcp-session-id: abc123\r\n", body);
        let response: &'static str = Box::leak(response.into_boxed_str());
        let url = spawn_canned_server(response).await;

        let session = HttpSession::new(url);
        let tools = session.list_tools().await;

        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "get_competitions");
        assert_eq!(tools[0].description.as_deref(), Some("ligas"));
    }

    #[tokio::test]
    async fn parses_event_stream_bodies() {
        let body = "event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":\"x\",\"result\":{\"tools\":[{\"name\":\"ping\"}]}}\n\n";
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nContent-Length: {}\r\nmcp-session-id: s1\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        let response: &'static str = Box::leak(response.into_boxed_str());
        let url = spawn_canned_server(response).await;

        let session = HttpSession::new(url);
        let tools = session.list_tools().await;

        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "ping");
    }
}
