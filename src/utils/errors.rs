//! Error types with actionable suggestions

use colored::Colorize;
use std::path::PathBuf;
use thiserror::Error;

/// Failures raised by the deploy pipeline
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("Missing required environment: {}", .vars.join(", "))]
    MissingEnv { vars: Vec<String> },

    #[error("Invalid value for {var} ('{value}'): {reason}")]
    InvalidEnv {
        var: String,
        value: String,
        reason: String,
    },

    #[error("`{command}` failed{}", exit_suffix(.code))]
    ToolFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Failed to start '{program}': {source}")]
    ToolSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid manifest {}: {reason}", .path.display())]
    Manifest { path: PathBuf, reason: String },

    #[error("Invalid Dockerfile {}: {reason}", .path.display())]
    Dockerfile { path: PathBuf, reason: String },

    #[error("Invalid settings file {}: {reason}", .path.display())]
    Settings { path: PathBuf, reason: String },

    #[error("Aborted by user")]
    Aborted,
}

fn exit_suffix(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!(" with exit status {}", code),
        None => " (terminated by signal)".to_string(),
    }
}

impl DeployError {
    /// Process exit status for this error.
    ///
    /// A failing tool's own status is passed through unchanged.
    pub fn exit_code(&self) -> i32 {
        match self {
            DeployError::ToolFailed {
                code: Some(code), ..
            } if *code != 0 => *code,
            DeployError::ToolSpawn { source, .. }
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                127
            }
            DeployError::Aborted => 130,
            _ => 1,
        }
    }
}

/// Error with suggestions, shown to the user at the top level
#[derive(Debug)]
pub struct Diagnostic {
    pub message: String,
    pub details: Option<String>,
    pub suggestions: Vec<String>,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: None,
            suggestions: Vec::new(),
        }
    }

    /// Add a suggestion
    pub fn suggest(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Attach captured tool output
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        let details = details.into();
        if !details.trim().is_empty() {
            self.details = Some(details);
        }
        self
    }

    /// Display the error with suggestions
    pub fn display(&self) {
        crate::log_error!("{}", self.message);

        if let Some(details) = &self.details {
            eprintln!();
            for line in details.trim_end().lines() {
                eprintln!("  {}", line.dimmed());
            }
        }

        if !self.suggestions.is_empty() {
            eprintln!();
            eprintln!("{}", "Suggestions:".yellow().bold());
            for suggestion in &self.suggestions {
                eprintln!("  {} {}", "→".blue(), suggestion);
            }
        }
    }
}

/// Turn an error chain into a diagnostic and the exit status to use
pub fn diagnose(err: &anyhow::Error) -> (Diagnostic, i32) {
    let deploy_err = err.chain().find_map(|e| e.downcast_ref::<DeployError>());

    let message = format!("{:#}", err);
    let Some(deploy_err) = deploy_err else {
        return (
            Diagnostic::new(message).suggest("Run with -v for more details"),
            1,
        );
    };

    let diagnostic = match deploy_err {
        DeployError::MissingEnv { vars } => Diagnostic::new(message)
            .suggest(format!("Export the variables: {}", vars.join(" ")))
            .suggest("Or pass them as flags, see: sifthub-deploy --help"),
        DeployError::InvalidEnv { var, .. } => {
            Diagnostic::new(message).suggest(format!("Check the value of {}", var))
        }
        DeployError::ToolFailed {
            command, stderr, ..
        } => enhance_tool_failure(
            Diagnostic::new(message).with_details(stderr.clone()),
            command,
            stderr,
        ),
        DeployError::ToolSpawn { program, .. } => Diagnostic::new(message)
            .suggest(format!("Ensure '{}' is installed and in your PATH", program))
            .suggest("Run 'sifthub-deploy check' to see all prerequisites"),
        DeployError::Manifest { .. } => Diagnostic::new(message)
            .suggest("Preview the rendered manifests with: sifthub-deploy render"),
        DeployError::Dockerfile { .. } => Diagnostic::new(message).suggest(
            "Point [defaults].dockerfile in .sifthub-deploy.toml at the image definition",
        ),
        DeployError::Settings { .. } => Diagnostic::new(message)
            .suggest("Generate a fresh file with: sifthub-deploy config init"),
        DeployError::Aborted => Diagnostic::new(message),
    };

    (diagnostic, deploy_err.exit_code())
}

/// Pattern match common tool failures
fn enhance_tool_failure(diagnostic: Diagnostic, command: &str, stderr: &str) -> Diagnostic {
    let stderr = stderr.to_lowercase();

    if stderr.contains("no basic auth credentials") || stderr.contains("denied") {
        return diagnostic
            .suggest("Registry login may have expired; rerun the push stage")
            .suggest("Verify AWS_ACCOUNT_ID and REGION point at the right registry");
    }

    if stderr.contains("repositorynotfound") || stderr.contains("does not exist in the registry") {
        return diagnostic.suggest("Create the ECR repository named by REPO_NAME first");
    }

    if stderr.contains("unable to locate credentials") || stderr.contains("expiredtoken") {
        return diagnostic.suggest("Refresh your AWS credentials (aws sso login / aws configure)");
    }

    if stderr.contains("forbidden") || stderr.contains("unauthorized") {
        return diagnostic.suggest("Verify your IAM identity is mapped into the cluster");
    }

    if command.starts_with("kubectl") {
        return diagnostic
            .suggest("Refresh the kubeconfig: aws eks update-kubeconfig --name $CLUSTER_NAME")
            .suggest("Check the cluster: kubectl get pods");
    }

    diagnostic.suggest("Review the tool output above")
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    fn tool_failed(code: Option<i32>, stderr: &str) -> DeployError {
        DeployError::ToolFailed {
            command: "docker push repo:1".to_string(),
            code,
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn test_tool_exit_code_passes_through() {
        assert_eq!(tool_failed(Some(3), "").exit_code(), 3);
        assert_eq!(tool_failed(None, "").exit_code(), 1);
    }

    #[test]
    fn test_spawn_not_found_exit_code() {
        let err = DeployError::ToolSpawn {
            program: "eksctl".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert_eq!(err.exit_code(), 127);

        let err = DeployError::ToolSpawn {
            program: "eksctl".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_missing_env_message_lists_all() {
        let err = DeployError::MissingEnv {
            vars: vec!["REPO_NAME".to_string(), "VERSION".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Missing required environment: REPO_NAME, VERSION"
        );
    }

    #[test]
    fn test_diagnose_finds_error_behind_context() {
        let err = Err::<(), _>(tool_failed(Some(42), "denied: not authorized"))
            .context("Push stage failed")
            .unwrap_err();

        let (diagnostic, code) = diagnose(&err);
        assert_eq!(code, 42);
        assert!(diagnostic.message.contains("Push stage failed"));
        assert!(diagnostic.details.is_some());
        assert!(diagnostic.suggestions[0].contains("login"));
    }

    #[test]
    fn test_diagnose_plain_error() {
        let err = anyhow::anyhow!("something odd");
        let (diagnostic, code) = diagnose(&err);
        assert_eq!(code, 1);
        assert_eq!(diagnostic.suggestions.len(), 1);
    }
}
