use serde_json::Value;

use crate::session::RawTool;

/// A catalog entry: one tool as exposed to the language model, with enough
/// bookkeeping to route a call back to the backend that owns it.
///
/// `qualified_name` is unique across the whole catalog; `raw_name` is the
/// name the backend itself understands and is unique only per backend.
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub qualified_name: String,
    pub backend_id: String,
    pub raw_name: String,
    pub description: String,
    pub parameter_schema: Value,
}

/// A hand-written catalog entry for the allow-list policy, used when the
/// backend's self-description is trusted less than a curated one.
#[derive(Debug, Clone)]
pub struct CuratedTool {
    pub raw_name: String,
    pub description: String,
    pub parameter_schema: Value,
}

impl CuratedTool {
    pub fn new(raw_name: &str, description: &str, parameter_schema: Value) -> Self {
        Self {
            raw_name: raw_name.to_string(),
            description: description.to_string(),
            parameter_schema,
        }
    }
}

/// How one backend's raw tool listing is translated into descriptors.
#[derive(Debug, Clone)]
pub enum DescriptorPolicy {
    /// Only raw names present in the table are translated, each with its
    /// curated description and schema. Everything else is silently dropped.
    Curated(Vec<CuratedTool>),
    /// Every advertised tool is translated verbatim, with generated
    /// fallbacks where the backend omits description or schema.
    PassThrough,
}

impl DescriptorPolicy {
    /// Translate a backend's raw listing into catalog descriptors,
    /// qualifying each name with the backend's namespace prefix.
    pub fn normalize(
        &self,
        backend_id: &str,
        prefix: &str,
        raw_tools: Vec<RawTool>,
    ) -> Vec<ToolDescriptor> {
        match self {
            DescriptorPolicy::Curated(table) => raw_tools
                .into_iter()
                .filter_map(|raw| {
                    let curated = table.iter().find(|c| c.raw_name == raw.name)?;
                    Some(ToolDescriptor {
                        qualified_name: format!("{prefix}{}", raw.name),
                        backend_id: backend_id.to_string(),
                        raw_name: raw.name,
                        description: curated.description.clone(),
                        parameter_schema: curated.parameter_schema.clone(),
                    })
                })
                .collect(),
            DescriptorPolicy::PassThrough => raw_tools
                .into_iter()
                .map(|raw| ToolDescriptor {
                    qualified_name: format!("{prefix}{}", raw.name),
                    backend_id: backend_id.to_string(),
                    description: raw
                        .description
                        .clone()
                        .filter(|d| !d.is_empty())
                        .unwrap_or_else(|| format!("tool of {backend_id}: {}", raw.name)),
                    parameter_schema: raw
                        .input_schema
                        .clone()
                        .filter(|s| !s.is_null())
                        .unwrap_or_else(empty_parameter_schema),
                    raw_name: raw.name,
                })
                .collect(),
        }
    }
}

/// Schema for a tool that takes no arguments.
pub fn empty_parameter_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {},
        "required": []
    })
}
