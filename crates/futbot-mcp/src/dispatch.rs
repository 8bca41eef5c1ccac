//! Tool dispatch.
//!
//! `dispatch` routes a model-issued tool call to its owning backend and
//! normalizes whatever comes back into the one canonical result shape.
//! Nothing here ever returns `Err` to the conversation loop: unknown names,
//! unavailable backends and mid-call failures all become error-flagged
//! results, and every attempt leaves exactly one call record behind.

use std::time::Instant;

use serde_json::Value;

use crate::catalog::ToolCatalog;
use crate::recorder::CallRecorder;

/// The canonical outcome every backend is normalized into.
#[derive(Debug, Clone)]
pub struct DispatchResult {
    pub content: Value,
    pub is_error: bool,
    pub elapsed_ms: u64,
}

impl DispatchResult {
    fn error(content: Value, elapsed_ms: u64) -> Self {
        Self {
            content,
            is_error: true,
            elapsed_ms,
        }
    }
}

/// Routes calls against a built catalog. Sessions stay owned by the
/// catalog; the dispatcher only borrows them for the duration of one call.
pub struct Dispatcher<'a> {
    catalog: &'a ToolCatalog,
    recorder: &'a CallRecorder,
}

impl<'a> Dispatcher<'a> {
    pub fn new(catalog: &'a ToolCatalog, recorder: &'a CallRecorder) -> Self {
        Self { catalog, recorder }
    }

    pub async fn dispatch(&self, qualified_name: &str, arguments: Value) -> DispatchResult {
        let (handle, raw_name) = match self.catalog.resolve(qualified_name) {
            Ok(resolved) => resolved,
            Err(e) => {
                let content = serde_json::json!({
                    "error": e.to_string(),
                    "tool_name": qualified_name,
                    "args": arguments,
                });
                let result = DispatchResult::error(content, 0);
                self.record(qualified_name, &arguments, &result);
                return result;
            }
        };

        // Unavailable backends fail immediately, without a network or
        // process round-trip and without any implicit retry.
        let Some(session) = handle.session() else {
            let content = serde_json::json!({
                "error": format!("backend '{}' is not available", handle.backend_id),
                "tool_name": qualified_name,
                "args": arguments,
            });
            let result = DispatchResult::error(content, 0);
            self.record(qualified_name, &arguments, &result);
            return result;
        };

        tracing::info!(
            backend = %handle.backend_id,
            tool = %raw_name,
            "dispatching tool call"
        );

        // Wall time is measured around exactly the backend call.
        let started = Instant::now();
        let outcome = session.call_tool(raw_name, arguments.clone()).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let result = match outcome {
            Ok(raw) => DispatchResult {
                content: normalize_content(raw.content),
                is_error: raw.is_error,
                elapsed_ms,
            },
            Err(e) => {
                tracing::warn!(tool = %qualified_name, "tool call failed: {}", e);
                let content = serde_json::json!({
                    "error": format!("error invoking tool '{qualified_name}': {e}"),
                    "tool_name": qualified_name,
                    "args": arguments,
                });
                DispatchResult::error(content, elapsed_ms)
            }
        };

        self.record(qualified_name, &arguments, &result);
        result
    }

    fn record(&self, tool: &str, arguments: &Value, result: &DispatchResult) {
        self.recorder
            .record(tool, arguments, &result.content, Some(result.elapsed_ms));
    }
}

/// Collapse a backend's content items into the canonical representation.
///
/// Per item, its `text` field wins, then its `data` field, then the raw
/// item. A single-element list collapses to that element, parsing textual
/// values that are syntactically JSON; a multi-element list stays a list of
/// the extracted values.
fn normalize_content(items: Vec<Value>) -> Value {
    let mut extracted: Vec<Value> = items
        .into_iter()
        .map(|item| {
            item.get("text")
                .or_else(|| item.get("data"))
                .cloned()
                .unwrap_or(item)
        })
        .collect();

    if extracted.len() == 1 {
        let only = extracted.remove(0);
        return match only {
            Value::String(text) => match serde_json::from_str::<Value>(&text) {
                Ok(parsed) => parsed,
                Err(_) => Value::String(text),
            },
            other => other,
        };
    }

    Value::Array(extracted)
}
