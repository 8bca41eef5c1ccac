//! OpenAI-compatible chat-completions client.
//!
//! The model endpoint is consumed as a stateless capability: messages plus
//! the current tool catalog in, one assistant message out, optionally
//! carrying tool-call requests.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use futbot_mcp::ToolDescriptor;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::text("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text("user", content)
    }

    /// The `role: "tool"` reply that folds a dispatch result back into the
    /// conversation.
    pub fn tool(tool_call_id: String, name: String, content: String) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(content),
            tool_calls: None,
            tool_call_id: Some(tool_call_id),
            name: Some(name),
        }
    }

    fn text(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded argument object, as the API delivers it.
    pub arguments: String,
}

pub struct ChatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl ChatClient {
    /// Build a client from the environment: `OPENAI_API_KEY` (required),
    /// `OPENAI_BASE_URL` and `OPENAI_MODEL` (optional), with an explicit
    /// model override winning over both.
    pub fn from_env(model_override: Option<String>) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .context("OPENAI_API_KEY is not set (add it to .env or the environment)")?;
        let base_url = std::env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let model = model_override
            .or_else(|| std::env::var("OPENAI_MODEL").ok())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
            model,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// One chat completion. When tools are passed, `tool_choice` is left to
    /// the model (`auto`); the follow-up call after tool execution passes
    /// none.
    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[Value]>,
    ) -> Result<ChatMessage> {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
        });
        if let Some(tools) = tools {
            body["tools"] = Value::Array(tools.to_vec());
            body["tool_choice"] = Value::String("auto".to_string());
        }

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("chat completion request failed")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            bail!("chat endpoint returned {status}: {detail}");
        }

        let payload: Value = response
            .json()
            .await
            .context("unparseable chat completion response")?;
        let message = payload
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .cloned()
            .context("chat completion response had no choices")?;

        serde_json::from_value(message).context("malformed assistant message")
    }
}

/// Export a catalog entry in the function-tool format the chat API expects.
pub fn tool_definition(descriptor: &ToolDescriptor) -> Value {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": descriptor.qualified_name,
            "description": descriptor.description,
            "parameters": descriptor.parameter_schema,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_definition_exports_function_format() {
        let descriptor = ToolDescriptor {
            qualified_name: "git_status".to_string(),
            backend_id: "git".to_string(),
            raw_name: "status".to_string(),
            description: "tool of git: status".to_string(),
            parameter_schema: serde_json::json!({"type": "object", "properties": {}}),
        };

        let def = tool_definition(&descriptor);
        assert_eq!(def["type"], "function");
        assert_eq!(def["function"]["name"], "git_status");
        assert_eq!(def["function"]["description"], "tool of git: status");
        assert_eq!(def["function"]["parameters"]["type"], "object");
    }

    #[test]
    fn assistant_message_with_tool_calls_deserializes() {
        let raw = serde_json::json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": "call_abc",
                "type": "function",
                "function": {
                    "name": "get_teams_competitions",
                    "arguments": "{\"competition_id\":\"PL\"}"
                }
            }]
        });

        let message: ChatMessage = serde_json::from_value(raw).unwrap();
        assert_eq!(message.role, "assistant");
        assert!(message.content.is_none());
        let calls = message.tool_calls.unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.name, "get_teams_competitions");
    }

    #[test]
    fn serialized_messages_omit_absent_fields() {
        let value = serde_json::to_value(ChatMessage::user("hola")).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 2);
        assert_eq!(object["role"], "user");
        assert_eq!(object["content"], "hola");
    }

    #[test]
    fn tool_reply_carries_call_id_and_name() {
        let reply = ChatMessage::tool(
            "call_abc".to_string(),
            "get_competitions".to_string(),
            "{\"count\":3}".to_string(),
        );
        let value = serde_json::to_value(reply).unwrap();
        assert_eq!(value["role"], "tool");
        assert_eq!(value["tool_call_id"], "call_abc");
        assert_eq!(value["name"], "get_competitions");
    }
}
