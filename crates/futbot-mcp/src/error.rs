use thiserror::Error;

/// Errors produced by the tool-routing layer.
///
/// Connection-class errors degrade a single backend and are never fatal to
/// the catalog build; dispatch converts everything it sees into an
/// error-flagged [`DispatchResult`](crate::dispatch::DispatchResult) rather
/// than returning `Err` to the conversation loop.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("no launch configuration found for backend '{0}'")]
    MissingLaunchConfig(String),

    #[error("failed to connect to backend '{backend}': {message}")]
    Connection { backend: String, message: String },

    #[error("no backend owns tool '{0}'")]
    ToolNotFound(String),

    #[error("tool call failed: {0}")]
    Invocation(String),

    #[error("malformed server response: {0}")]
    MalformedResponse(String),

    #[error("invalid backend prefix configuration: {0}")]
    PrefixConfig(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RouterError>;
