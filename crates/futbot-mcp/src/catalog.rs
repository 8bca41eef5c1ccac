//! Tool catalog and backend namespacer.
//!
//! The catalog owns every [`ToolDescriptor`] and every backend session for
//! the lifetime of one conversation. Building it walks the configured
//! backends in declaration order; each connection attempt is isolated, so a
//! backend that fails to come up is degraded to unavailable without
//! touching the tools the others contribute.

use std::collections::HashSet;

use crate::config::BackendSpec;
use crate::descriptor::ToolDescriptor;
use crate::error::{Result, RouterError};
use crate::recorder::{CallRecorder, EVENT_CONNECTION, EVENT_CONNECTION_ERROR};
use crate::session::{self, BackendSession};

/// One configured backend and (if it connected) its live session.
pub struct BackendHandle {
    pub backend_id: String,
    pub prefix: String,
    session: Option<Box<dyn BackendSession>>,
}

impl std::fmt::Debug for BackendHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendHandle")
            .field("backend_id", &self.backend_id)
            .field("prefix", &self.prefix)
            .field("session", &self.session.as_ref().map(|_| "..."))
            .finish()
    }
}

impl BackendHandle {
    pub fn is_available(&self) -> bool {
        self.session.is_some()
    }

    pub(crate) fn session(&self) -> Option<&dyn BackendSession> {
        self.session.as_deref()
    }
}

/// The merged, flat tool catalog for one conversation.
pub struct ToolCatalog {
    descriptors: Vec<ToolDescriptor>,
    backends: Vec<BackendHandle>,
}

impl ToolCatalog {
    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }

    /// True when no backend contributed any tool at all, which is distinct
    /// from "some backends degraded": the caller decides whether a partial
    /// catalog is enough to start the conversation.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn backends(&self) -> &[BackendHandle] {
        &self.backends
    }

    pub fn backend(&self, backend_id: &str) -> Option<&BackendHandle> {
        self.backends.iter().find(|b| b.backend_id == backend_id)
    }

    /// Map a qualified name back to its owning backend and raw name.
    ///
    /// The longest matching non-empty prefix wins; prefixes are validated
    /// to be mutually non-prefixing at build time, so ties cannot happen.
    /// The empty-prefix primary backend absorbs anything left over.
    pub fn resolve<'a>(&'a self, qualified_name: &'a str) -> Result<(&'a BackendHandle, &'a str)> {
        let mut best: Option<&BackendHandle> = None;
        for handle in &self.backends {
            if handle.prefix.is_empty() || !qualified_name.starts_with(handle.prefix.as_str()) {
                continue;
            }
            if best.is_none_or(|b| handle.prefix.len() > b.prefix.len()) {
                best = Some(handle);
            }
        }

        if let Some(handle) = best {
            return Ok((handle, &qualified_name[handle.prefix.len()..]));
        }
        if let Some(primary) = self.backends.iter().find(|h| h.prefix.is_empty()) {
            return Ok((primary, qualified_name));
        }
        Err(RouterError::ToolNotFound(qualified_name.to_string()))
    }

    /// Release every live session. Called once at conversation end,
    /// whatever way the loop exited.
    pub async fn shutdown(&mut self) {
        for handle in &mut self.backends {
            if let Some(session) = handle.session.take() {
                session.shutdown().await;
                tracing::debug!(backend = %handle.backend_id, "backend session released");
            }
        }
    }
}

/// Outcome of a catalog build: the catalog itself plus the ids of backends
/// that were configured but could not contribute.
pub struct CatalogBuild {
    pub catalog: ToolCatalog,
    pub degraded: Vec<String>,
}

/// Incrementally assembles a [`ToolCatalog`], validating namespacing as
/// backends are added.
pub struct CatalogBuilder<'a> {
    recorder: &'a CallRecorder,
    catalog: ToolCatalog,
    degraded: Vec<String>,
}

impl<'a> CatalogBuilder<'a> {
    pub fn new(recorder: &'a CallRecorder) -> Self {
        Self {
            recorder,
            catalog: ToolCatalog {
                descriptors: Vec::new(),
                backends: Vec::new(),
            },
            degraded: Vec::new(),
        }
    }

    /// Connect every enabled backend in declaration order and collect the
    /// merged catalog. Only prefix misconfiguration aborts the build;
    /// unreachable backends degrade individually.
    pub async fn connect_all(mut self, specs: &[BackendSpec]) -> Result<CatalogBuild> {
        validate_prefixes(specs)?;

        for spec in specs.iter().filter(|s| s.enabled) {
            let Some(launch) = &spec.launch else {
                let err = RouterError::MissingLaunchConfig(spec.id.clone());
                tracing::error!(backend = %spec.id, "{}", err);
                self.record_connection_error(&err.to_string());
                self.add_unavailable(spec);
                continue;
            };

            match session::connect(&spec.id, launch).await {
                Ok(session) => self.add_session(spec, session).await?,
                Err(e) => {
                    tracing::warn!(backend = %spec.id, "connection failed: {:#}", e);
                    self.record_connection_error(&format!(
                        "failed to connect to backend '{}': {:#}",
                        spec.id, e
                    ));
                    self.add_unavailable(spec);
                }
            }
        }

        Ok(self.finish())
    }

    /// Register an already-open session for a backend: list its tools,
    /// translate them under the backend's policy, and reject duplicate
    /// qualified names.
    pub async fn add_session(
        &mut self,
        spec: &BackendSpec,
        session: Box<dyn BackendSession>,
    ) -> Result<()> {
        let raw_tools = session.list_tools().await;
        let descriptors = spec.policy.normalize(&spec.id, &spec.prefix, raw_tools);

        let known: HashSet<&str> = self
            .catalog
            .descriptors
            .iter()
            .map(|d| d.qualified_name.as_str())
            .collect();
        for descriptor in &descriptors {
            if known.contains(descriptor.qualified_name.as_str()) {
                return Err(RouterError::PrefixConfig(format!(
                    "duplicate qualified tool name '{}' (backend '{}')",
                    descriptor.qualified_name, spec.id
                )));
            }
        }

        let names: Vec<&str> = descriptors
            .iter()
            .map(|d| d.qualified_name.as_str())
            .collect();
        tracing::info!(
            backend = %spec.id,
            "connected, {} tool(s) in catalog",
            descriptors.len()
        );
        self.recorder.record_event(
            EVENT_CONNECTION,
            serde_json::json!({"backend": spec.id, "action": "list_tools"}),
            serde_json::json!({"tools_count": descriptors.len(), "tools": names}),
        );

        self.catalog.descriptors.extend(descriptors);
        self.catalog.backends.push(BackendHandle {
            backend_id: spec.id.clone(),
            prefix: spec.prefix.clone(),
            session: Some(session),
        });
        Ok(())
    }

    /// Register a backend that failed to connect. It keeps its place in the
    /// catalog so dispatches against its prefix fail with a clear message
    /// instead of falling through to the primary.
    pub fn add_unavailable(&mut self, spec: &BackendSpec) {
        self.catalog.backends.push(BackendHandle {
            backend_id: spec.id.clone(),
            prefix: spec.prefix.clone(),
            session: None,
        });
        self.degraded.push(spec.id.clone());
    }

    pub fn finish(self) -> CatalogBuild {
        CatalogBuild {
            catalog: self.catalog,
            degraded: self.degraded,
        }
    }

    fn record_connection_error(&self, message: &str) {
        self.recorder.record_event(
            EVENT_CONNECTION_ERROR,
            serde_json::json!({}),
            serde_json::json!({"error": message}),
        );
    }
}

/// Prefix rules, enforced before any connection is attempted: backend ids
/// unique, at most one empty prefix (the primary), no duplicate prefixes,
/// and no prefix that is a prefix of another.
fn validate_prefixes(specs: &[BackendSpec]) -> Result<()> {
    let mut ids = HashSet::new();
    for spec in specs {
        if !ids.insert(spec.id.as_str()) {
            return Err(RouterError::PrefixConfig(format!(
                "duplicate backend id '{}'",
                spec.id
            )));
        }
    }

    let empty_count = specs.iter().filter(|s| s.prefix.is_empty()).count();
    if empty_count > 1 {
        return Err(RouterError::PrefixConfig(
            "more than one backend claims the empty (primary) prefix".to_string(),
        ));
    }

    for (i, a) in specs.iter().enumerate() {
        if a.prefix.is_empty() {
            continue;
        }
        for b in specs.iter().skip(i + 1) {
            if b.prefix.is_empty() {
                continue;
            }
            if a.prefix == b.prefix {
                return Err(RouterError::PrefixConfig(format!(
                    "backends '{}' and '{}' share the prefix '{}'",
                    a.id, b.id, a.prefix
                )));
            }
            if a.prefix.starts_with(b.prefix.as_str()) || b.prefix.starts_with(a.prefix.as_str()) {
                return Err(RouterError::PrefixConfig(format!(
                    "prefixes '{}' and '{}' are mutually prefixing",
                    a.prefix, b.prefix
                )));
            }
        }
    }

    Ok(())
}

/// Per-backend availability, in declaration order.
pub fn availability_summary(catalog: &ToolCatalog) -> Vec<(String, bool)> {
    catalog
        .backends
        .iter()
        .map(|b| (b.backend_id.clone(), b.is_available()))
        .collect()
}
