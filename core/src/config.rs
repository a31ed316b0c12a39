//! Runtime configuration, deserializable from TOML.
//!
//! Every field has a default so an empty config is a valid (and safe:
//! read-only, on-request) configuration.

use std::path::PathBuf;

use gantry_protocol::ApprovalPolicy;
use gantry_protocol::Policy;
use gantry_protocol::SandboxMode;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolExecConfig {
    #[serde(default)]
    pub sandbox_mode: SandboxMode,
    #[serde(default)]
    pub approval_policy: ApprovalPolicy,
    /// Working directory tool calls resolve relative paths against.
    /// Defaults to the process working directory.
    #[serde(default)]
    pub workdir: Option<PathBuf>,
    /// Filesystem roots the sandbox allows writes under. Empty means the
    /// workdir itself is the only root.
    #[serde(default)]
    pub writable_roots: Vec<PathBuf>,
}

impl ToolExecConfig {
    pub fn new(sandbox_mode: SandboxMode, approval_policy: ApprovalPolicy) -> Self {
        Self {
            sandbox_mode,
            approval_policy,
            ..Self::default()
        }
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn policy(&self) -> Policy {
        Policy {
            sandbox_mode: self.sandbox_mode,
            approval_policy: self.approval_policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_config_is_safe_by_default() {
        let config = ToolExecConfig::from_toml("").expect("parse");
        assert_eq!(config.sandbox_mode, SandboxMode::ReadOnly);
        assert_eq!(config.approval_policy, ApprovalPolicy::OnRequest);
        assert!(config.writable_roots.is_empty());
    }

    #[test]
    fn kebab_case_knobs_parse() {
        let config = ToolExecConfig::from_toml(
            r#"
            sandbox_mode = "workspace-write"
            approval_policy = "on-failure"
            workdir = "/tmp/project"
            writable_roots = ["/tmp/project", "/tmp/cache"]
            "#,
        )
        .expect("parse");
        assert_eq!(config.sandbox_mode, SandboxMode::WorkspaceWrite);
        assert_eq!(config.approval_policy, ApprovalPolicy::OnFailure);
        assert_eq!(config.workdir, Some(PathBuf::from("/tmp/project")));
        assert_eq!(config.writable_roots.len(), 2);
    }
}
