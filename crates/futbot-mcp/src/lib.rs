//! Multi-backend MCP tool routing for futbot.
//!
//! This crate provides:
//! - backend launch-config resolution (env settings, shared config file)
//! - backend sessions over stdio subprocesses (rmcp) and HTTP JSON-RPC
//! - tool normalization and namespacing into one flat catalog
//! - dispatch with a canonical result shape and per-call audit records

pub mod catalog;
pub mod config;
pub mod descriptor;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod loader;
pub mod recorder;
pub mod session;

pub use catalog::{availability_summary, BackendHandle, CatalogBuild, CatalogBuilder, ToolCatalog};
pub use config::{BackendSpec, LaunchSpec};
pub use descriptor::{empty_parameter_schema, CuratedTool, DescriptorPolicy, ToolDescriptor};
pub use dispatch::{DispatchResult, Dispatcher};
pub use error::RouterError;
pub use http::HttpSession;
pub use loader::{interpolate_env_vars, launch_from_env, launch_from_shared_config, resolve_launch};
pub use recorder::{
    CallRecorder, DEFAULT_LOG_PATH, EVENT_CHAT_ERROR, EVENT_CONNECTION, EVENT_CONNECTION_ERROR,
    EVENT_SESSION_END, EVENT_USER_QUESTION,
};
pub use session::{BackendSession, RawTool, RawToolResult, StdioSession};
