use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::descriptor::DescriptorPolicy;

/// How a backend's tool server is reached.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "lowercase")]
pub enum LaunchSpec {
    /// Long-lived duplexed subprocess speaking MCP over stdio.
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cwd: Option<PathBuf>,
        /// Environment variables for the child (supports $VAR and ${VAR}).
        #[serde(default)]
        env: HashMap<String, String>,
    },
    /// Stateless HTTP JSON-RPC exchange with server-side session affinity.
    Http { url: String },
}

/// One configured backend: identity, namespace prefix, translation policy
/// and (if any source provided one) the launch configuration.
///
/// The prefix is an explicit choice, not inferred from ordering: the empty
/// prefix marks the single primary backend whose tools keep their historical
/// unprefixed names. Prefix validity is checked at catalog build.
#[derive(Debug, Clone)]
pub struct BackendSpec {
    pub id: String,
    pub prefix: String,
    pub policy: DescriptorPolicy,
    pub enabled: bool,
    /// `None` means no configuration source had an entry for this backend;
    /// the catalog records it as unavailable and moves on.
    pub launch: Option<LaunchSpec>,
}

impl BackendSpec {
    pub fn new(id: impl Into<String>, prefix: impl Into<String>, policy: DescriptorPolicy) -> Self {
        Self {
            id: id.into(),
            prefix: prefix.into(),
            policy,
            enabled: true,
            launch: None,
        }
    }

    pub fn with_launch(mut self, launch: LaunchSpec) -> Self {
        self.launch = Some(launch);
        self
    }
}
