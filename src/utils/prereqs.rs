//! Prerequisite checking system for required tools

use anyhow::{Result, anyhow};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PrereqError {
    #[error("Tool '{name}' not found")]
    NotFound { name: String, hint: String },
}

/// Trait for checking prerequisites
pub trait Prerequisite {
    /// Name of the prerequisite tool
    fn name(&self) -> &str;

    /// Check if the tool is available
    fn check(&self) -> Result<(), PrereqError>;

    /// Installation hint for the user
    fn install_hint(&self) -> &str;
}

/// Basic prerequisite that checks if a command exists
#[derive(Debug, Clone)]
pub struct CommandPrereq {
    pub name: String,
    pub hint: String,
}

impl CommandPrereq {
    pub fn new(name: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hint: hint.into(),
        }
    }
}

impl Prerequisite for CommandPrereq {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self) -> Result<(), PrereqError> {
        which::which(&self.name).map_err(|_| PrereqError::NotFound {
            name: self.name.clone(),
            hint: self.hint.clone(),
        })?;
        Ok(())
    }

    fn install_hint(&self) -> &str {
        &self.hint
    }
}

/// Tools the deploy pipeline shells out to
pub struct CommonPrereqs;

impl CommonPrereqs {
    /// AWS CLI (ECR login, EKS kubeconfig)
    pub fn aws() -> CommandPrereq {
        CommandPrereq::new(
            "aws",
            "Install from: https://docs.aws.amazon.com/cli/latest/userguide/getting-started-install.html",
        )
    }

    /// eksctl (IAM service accounts)
    pub fn eksctl() -> CommandPrereq {
        CommandPrereq::new("eksctl", "Install from: https://eksctl.io/installation/")
    }

    /// kubectl (manifests, rollouts)
    pub fn kubectl() -> CommandPrereq {
        CommandPrereq::new(
            "kubectl",
            "Install from: https://kubernetes.io/docs/tasks/tools/",
        )
    }

    /// Prerequisite for a tool name used in a plan
    pub fn for_tool(name: &str) -> CommandPrereq {
        match name {
            "aws" => Self::aws(),
            "eksctl" => Self::eksctl(),
            "kubectl" => Self::kubectl(),
            "docker" => CommandPrereq::new("docker", "Install from: https://docs.docker.com/get-docker/"),
            "podman" => CommandPrereq::new(
                "podman",
                "Install from: https://podman.io/getting-started/installation",
            ),
            other => CommandPrereq::new(other, "Ensure the tool is in your PATH"),
        }
    }

    /// Check all prerequisites and return detailed results
    /// Returns (found_tools, missing_tools)
    pub fn check_all(prereqs: &[&dyn Prerequisite]) -> (Vec<String>, Vec<(String, String)>) {
        let mut found = Vec::new();
        let mut missing = Vec::new();

        for prereq in prereqs {
            match prereq.check() {
                Ok(_) => {
                    found.push(prereq.name().to_string());
                }
                Err(PrereqError::NotFound { name, hint }) => {
                    missing.push((name, hint));
                }
            }
        }

        (found, missing)
    }

    /// Fail with one message naming every missing tool
    pub fn require(tools: &[String]) -> Result<()> {
        let prereqs: Vec<CommandPrereq> = tools.iter().map(|t| Self::for_tool(t)).collect();
        let refs: Vec<&dyn Prerequisite> = prereqs.iter().map(|p| p as &dyn Prerequisite).collect();

        let (_, missing) = Self::check_all(&refs);
        if missing.is_empty() {
            return Ok(());
        }

        let lines: Vec<String> = missing
            .iter()
            .map(|(name, hint)| format!("  - {}: {}", name, hint))
            .collect();
        Err(anyhow!("Missing required tools:\n{}", lines.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prereq_trait() {
        let prereq = CommandPrereq::new("sh", "Should always exist");
        assert_eq!(prereq.name(), "sh");
        assert!(prereq.check().is_ok());
    }

    #[test]
    fn test_missing_prereq() {
        let prereq = CommandPrereq::new("nonexistent-tool-xyz", "Test hint");
        assert!(prereq.check().is_err());
        assert_eq!(prereq.install_hint(), "Test hint");
    }

    #[test]
    fn test_check_all_splits_found_and_missing() {
        let sh = CommandPrereq::new("sh", "");
        let missing = CommandPrereq::new("nonexistent-tool-xyz", "hint");
        let (found, missing) = CommonPrereqs::check_all(&[&sh, &missing]);
        assert_eq!(found, vec!["sh"]);
        assert_eq!(missing, vec![("nonexistent-tool-xyz".to_string(), "hint".to_string())]);
    }

    #[test]
    fn test_require_lists_missing_tools() {
        let err = CommonPrereqs::require(&[
            "nonexistent-tool-a".to_string(),
            "nonexistent-tool-b".to_string(),
        ])
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("nonexistent-tool-a"));
        assert!(msg.contains("nonexistent-tool-b"));
    }

    #[test]
    fn test_for_tool_hints() {
        assert!(CommonPrereqs::for_tool("eksctl").hint.contains("eksctl.io"));
        assert_eq!(CommonPrereqs::for_tool("kubectl").name, "kubectl");
    }
}
