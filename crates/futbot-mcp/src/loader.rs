//! Backend launch-configuration resolution.
//!
//! Sources, in precedence order for each backend key:
//! 1. environment-style settings: `<KEY>_MCP_URL` for the HTTP flavor, or
//!    `<KEY>_MCP_COMMAND` / `<KEY>_MCP_ARGS` (pipe-separated) /
//!    `<KEY>_MCP_CWD` for the stdio flavor;
//! 2. the shared Claude Desktop config (`claude_desktop_config.json`), whose
//!    `mcpServers` map is keyed by backend name.
//!
//! Absence of both sources is fatal only for that backend: the catalog
//! records it as unavailable and the others proceed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::config::LaunchSpec;

#[derive(Debug, Deserialize)]
struct SharedConfigFile {
    #[serde(default, rename = "mcpServers")]
    mcp_servers: HashMap<String, SharedServerEntry>,
}

#[derive(Debug, Deserialize)]
struct SharedServerEntry {
    command: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    cwd: Option<PathBuf>,
    #[serde(default)]
    env: HashMap<String, String>,
}

/// Resolve a backend's launch configuration: env settings first, then the
/// shared config file.
pub fn resolve_launch(env_key: &str, shared_key: &str) -> Option<LaunchSpec> {
    if let Some(launch) = launch_from_env(env_key) {
        return Some(launch);
    }
    let path = shared_config_path()?;
    launch_from_shared_config(&path, shared_key)
}

/// Build a launch spec from `<KEY>_MCP_*` environment variables.
pub fn launch_from_env(env_key: &str) -> Option<LaunchSpec> {
    if let Ok(url) = std::env::var(format!("{env_key}_MCP_URL")) {
        if !url.is_empty() {
            return Some(LaunchSpec::Http { url });
        }
    }

    let command = std::env::var(format!("{env_key}_MCP_COMMAND")).ok()?;
    if command.is_empty() {
        return None;
    }

    let args = std::env::var(format!("{env_key}_MCP_ARGS"))
        .ok()
        .filter(|raw| !raw.is_empty())
        .map(|raw| raw.split('|').map(|a| a.trim().to_string()).collect())
        .unwrap_or_default();
    let cwd = std::env::var(format!("{env_key}_MCP_CWD"))
        .ok()
        .filter(|c| !c.is_empty())
        .map(PathBuf::from);

    Some(LaunchSpec::Stdio {
        command,
        args,
        cwd,
        env: HashMap::new(),
    })
}

/// Look a backend key up in a shared config file.
pub fn launch_from_shared_config(path: &Path, key: &str) -> Option<LaunchSpec> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(_) => return None,
    };
    let config: SharedConfigFile = match serde_json::from_str(&contents) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("ignoring unparseable config at {}: {}", path.display(), e);
            return None;
        }
    };

    config.mcp_servers.get(key).map(|entry| LaunchSpec::Stdio {
        command: entry.command.clone(),
        args: entry.args.clone(),
        cwd: entry.cwd.clone(),
        env: entry.env.clone(),
    })
}

/// Location of the shared Claude Desktop config for this platform.
fn shared_config_path() -> Option<PathBuf> {
    let base = match std::env::var("APPDATA") {
        Ok(appdata) if !appdata.is_empty() => PathBuf::from(appdata),
        _ => dirs::config_dir()?,
    };
    Some(base.join("Claude").join("claude_desktop_config.json"))
}

/// Expand `$VAR` and `${VAR}` references against the process environment.
/// Unset variables expand to the empty string.
pub fn interpolate_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(idx) = rest.find('$') {
        out.push_str(&rest[..idx]);
        rest = &rest[idx + 1..];

        if let Some(braced) = rest.strip_prefix('{') {
            match braced.find('}') {
                Some(end) if end > 0 => {
                    if let Ok(v) = std::env::var(&braced[..end]) {
                        out.push_str(&v);
                    }
                    rest = &braced[end + 1..];
                }
                _ => {
                    // Empty or unterminated braces stay literal.
                    out.push_str("${");
                    rest = braced;
                }
            }
        } else if rest
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        {
            let end = rest
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(rest.len());
            if let Ok(v) = std::env::var(&rest[..end]) {
                out.push_str(&v);
            }
            rest = &rest[end..];
        } else {
            out.push('$');
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::TempDir;

    #[test]
    fn env_launch_stdio_with_pipe_separated_args() {
        env::set_var("FBT_A_MCP_COMMAND", "npx");
        env::set_var("FBT_A_MCP_ARGS", "-y|@modelcontextprotocol/server-git|.");
        env::set_var("FBT_A_MCP_CWD", "/tmp/repo");

        let launch = launch_from_env("FBT_A").unwrap();
        match launch {
            LaunchSpec::Stdio {
                command, args, cwd, ..
            } => {
                assert_eq!(command, "npx");
                assert_eq!(args, vec!["-y", "@modelcontextprotocol/server-git", "."]);
                assert_eq!(cwd.unwrap(), PathBuf::from("/tmp/repo"));
            }
            LaunchSpec::Http { .. } => panic!("expected stdio launch"),
        }

        env::remove_var("FBT_A_MCP_COMMAND");
        env::remove_var("FBT_A_MCP_ARGS");
        env::remove_var("FBT_A_MCP_CWD");
    }

    #[test]
    fn env_launch_url_wins_over_command() {
        env::set_var("FBT_B_MCP_URL", "http://127.0.0.1:9000/mcp");
        env::set_var("FBT_B_MCP_COMMAND", "ignored");

        match launch_from_env("FBT_B").unwrap() {
            LaunchSpec::Http { url } => assert_eq!(url, "http://127.0.0.1:9000/mcp"),
            LaunchSpec::Stdio { .. } => panic!("expected http launch"),
        }

        env::remove_var("FBT_B_MCP_URL");
        env::remove_var("FBT_B_MCP_COMMAND");
    }

    #[test]
    fn env_launch_missing_key_is_none() {
        assert!(launch_from_env("FBT_DOES_NOT_EXIST").is_none());
    }

    #[test]
    fn shared_config_lookup_by_key() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("claude_desktop_config.json");
        std::fs::write(
            &path,
            r#"{
                "mcpServers": {
                    "soccer-mcp": {
                        "command": "uv",
                        "args": ["run", "soccer_server.py"],
                        "cwd": "/srv/soccer"
                    }
                }
            }"#,
        )
        .unwrap();

        let launch = launch_from_shared_config(&path, "soccer-mcp").unwrap();
        match launch {
            LaunchSpec::Stdio { command, args, .. } => {
                assert_eq!(command, "uv");
                assert_eq!(args, vec!["run", "soccer_server.py"]);
            }
            LaunchSpec::Http { .. } => panic!("expected stdio launch"),
        }

        assert!(launch_from_shared_config(&path, "missing-key").is_none());
    }

    #[test]
    fn shared_config_unparseable_is_none() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("claude_desktop_config.json");
        std::fs::write(&path, "{ not json }").unwrap();
        assert!(launch_from_shared_config(&path, "any").is_none());
    }

    #[test]
    fn env_settings_take_precedence_over_shared_config() {
        env::set_var("FBT_C_MCP_COMMAND", "from-env");
        let launch = resolve_launch("FBT_C", "whatever").unwrap();
        match launch {
            LaunchSpec::Stdio { command, .. } => assert_eq!(command, "from-env"),
            LaunchSpec::Http { .. } => panic!("expected stdio launch"),
        }
        env::remove_var("FBT_C_MCP_COMMAND");
    }

    #[test]
    fn interpolate_simple_and_braced() {
        env::set_var("FBT_INTERP_ONE", "hello");
        assert_eq!(interpolate_env_vars("$FBT_INTERP_ONE"), "hello");
        assert_eq!(interpolate_env_vars("${FBT_INTERP_ONE}!"), "hello!");
        assert_eq!(
            interpolate_env_vars("a-${FBT_INTERP_ONE}-b"),
            "a-hello-b"
        );
        env::remove_var("FBT_INTERP_ONE");
    }

    #[test]
    fn interpolate_missing_var_becomes_empty() {
        assert_eq!(interpolate_env_vars("${FBT_NO_SUCH_VAR_123}"), "");
        assert_eq!(interpolate_env_vars("x$FBT_NO_SUCH_VAR_123"), "x");
    }

    #[test]
    fn interpolate_literals_stay_literal() {
        assert_eq!(interpolate_env_vars("no variables"), "no variables");
        assert_eq!(interpolate_env_vars("$"), "$");
        assert_eq!(interpolate_env_vars("$1"), "$1");
        assert_eq!(interpolate_env_vars("${}"), "${}");
    }
}
