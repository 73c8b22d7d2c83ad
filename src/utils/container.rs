//! Container runtime detection and image commands (Docker/Podman)

use crate::utils::exec::Invocation;
use anyhow::{Result, anyhow};
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerRuntime {
    Docker,
    Podman,
}

impl ContainerRuntime {
    /// Detect which container runtime is available
    pub fn detect() -> Result<Self> {
        // Check for docker first
        if which::which("docker").is_ok() {
            crate::log_debug!("Using container runtime: docker");
            return Ok(ContainerRuntime::Docker);
        }

        // Fall back to podman
        if which::which("podman").is_ok() {
            crate::log_debug!("Using container runtime: podman");
            return Ok(ContainerRuntime::Podman);
        }

        Err(anyhow!(
            "Neither docker nor podman found. Please install one of them:\n  \
             - Docker: https://docs.docker.com/get-docker/\n  \
             - Podman: https://podman.io/getting-started/installation"
        ))
    }

    /// Detect, or fall back to docker when nothing will actually run
    pub fn detect_or_default(dry_run: bool) -> Result<Self> {
        match Self::detect() {
            Ok(runtime) => Ok(runtime),
            Err(_) if dry_run => Ok(ContainerRuntime::Docker),
            Err(e) => Err(e),
        }
    }

    /// Get the command name for this runtime
    pub fn command(&self) -> &'static str {
        match self {
            ContainerRuntime::Docker => "docker",
            ContainerRuntime::Podman => "podman",
        }
    }

    /// Build an image from a Dockerfile
    pub fn build(&self, spec: &BuildSpec<'_>) -> Invocation {
        let mut inv = Invocation::new(self.command())
            .arg("build")
            .args(["-t", spec.tag])
            .arg("-f")
            .arg(spec.dockerfile.display().to_string());

        if let Some(platform) = spec.platform {
            inv = inv.arg(format!("--platform={}", platform));
        }

        if spec.pull {
            inv = inv.arg("--pull");
        }

        for (key, value) in spec.build_args {
            inv = inv.arg("--build-arg").arg(format!("{}={}", key, value));
        }

        inv.arg(spec.context.display().to_string())
    }

    /// Add a second name to a local image
    pub fn tag(&self, source: &str, target: &str) -> Invocation {
        Invocation::new(self.command()).args(["tag", source, target])
    }

    /// Push an image
    pub fn push(&self, image: &str) -> Invocation {
        Invocation::new(self.command()).args(["push", image])
    }

    /// Log in to a registry with the password read from stdin
    pub fn login_password_stdin(&self, username: &str, registry: &str) -> Invocation {
        Invocation::new(self.command()).args([
            "login",
            "--username",
            username,
            "--password-stdin",
            registry,
        ])
    }
}

impl FromStr for ContainerRuntime {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "docker" => Ok(ContainerRuntime::Docker),
            "podman" => Ok(ContainerRuntime::Podman),
            _ => Err(anyhow!(
                "Invalid container runtime: {}. Must be 'docker' or 'podman'",
                s
            )),
        }
    }
}

impl std::fmt::Display for ContainerRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.command())
    }
}

/// Inputs of an image build
#[derive(Debug, Clone)]
pub struct BuildSpec<'a> {
    pub dockerfile: &'a Path,
    pub context: &'a Path,
    pub tag: &'a str,
    pub platform: Option<&'a str>,
    pub build_args: &'a [(String, String)],
    pub pull: bool,
}
