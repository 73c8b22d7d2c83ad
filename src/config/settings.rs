//! Configuration file support for sifthub-deploy

use crate::utils::errors::DeployError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the per-project settings file
pub const LOCAL_CONFIG_FILE: &str = ".sifthub-deploy.toml";

const CONFIG_HEADER: &str = "# sifthub-deploy configuration file\n\
                             # Place this file at ~/.config/sifthub-deploy/config.toml or .sifthub-deploy.toml in your project\n\
                             # ENV, REPO_NAME, VERSION, AWS_ACCOUNT_ID, REGION, SERVICE_ACCOUNT_POLICY,\n\
                             # SERVICE_ACCOUNT_NAME and CLUSTER_NAME are read from the environment.\n\n";

/// Main configuration structure
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub build: BuildSettings,

    #[serde(default)]
    pub deploy: DeploySettings,

    #[serde(default)]
    pub behavior: Behavior,

    /// Per-environment overrides keyed by ENV
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environments: BTreeMap<String, EnvironmentOverrides>,
}

/// Default locations and names
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Defaults {
    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default = "default_manifests_dir")]
    pub manifests_dir: String,

    #[serde(default = "default_dockerfile")]
    pub dockerfile: String,

    #[serde(default = "default_build_context")]
    pub build_context: String,
}

/// Image build settings
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct BuildSettings {
    /// Target platform, e.g. "linux/amd64" for x86 node groups
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,

    /// Always pull a newer base image
    #[serde(default)]
    pub pull: bool,

    #[serde(default)]
    pub build_args: BTreeMap<String, String>,
}

/// Cluster deployment settings
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DeploySettings {
    #[serde(default)]
    pub wait_for_rollout: bool,

    #[serde(default = "default_rollout_timeout")]
    pub rollout_timeout: String,

    #[serde(default = "default_true")]
    pub substitute_variables: bool,

    #[serde(default = "default_true")]
    pub override_existing_service_accounts: bool,
}

/// Behavior settings
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Behavior {
    #[serde(default = "default_true")]
    pub confirm_production: bool,

    #[serde(default = "default_production_environments")]
    pub production_environments: Vec<String>,

    /// Capture tool output and show spinners instead of streaming
    #[serde(default)]
    pub capture_tool_output: bool,
}

/// Settings that differ per ENV
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifests_dir: Option<String>,
}

// Default value functions
fn default_namespace() -> String {
    "default".to_string()
}

fn default_manifests_dir() -> String {
    "deployment".to_string()
}

fn default_dockerfile() -> String {
    "Dockerfile".to_string()
}

fn default_build_context() -> String {
    ".".to_string()
}

fn default_rollout_timeout() -> String {
    "300s".to_string()
}

fn default_true() -> bool {
    true
}

fn default_production_environments() -> Vec<String> {
    vec!["prod".to_string(), "production".to_string()]
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            manifests_dir: default_manifests_dir(),
            dockerfile: default_dockerfile(),
            build_context: default_build_context(),
        }
    }
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            wait_for_rollout: false,
            rollout_timeout: default_rollout_timeout(),
            substitute_variables: default_true(),
            override_existing_service_accounts: default_true(),
        }
    }
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            confirm_production: default_true(),
            production_environments: default_production_environments(),
            capture_tool_output: false,
        }
    }
}

impl Settings {
    /// Load settings from the explicit path, or from the standard locations.
    ///
    /// An explicit file must parse; a discovered one that doesn't is skipped with a warning.
    pub fn load(explicit: Option<&Path>) -> Result<Self, DeployError> {
        if let Some(path) = explicit {
            return Self::load_from_file(path);
        }

        match Self::find_config_file() {
            Some(path) => match Self::load_from_file(&path) {
                Ok(settings) => {
                    crate::log_debug!("Loaded settings from {}", path.display());
                    Ok(settings)
                }
                Err(e) => {
                    crate::log_warn!("{}; using defaults", e);
                    Ok(Self::default())
                }
            },
            None => Ok(Self::default()),
        }
    }

    /// Load settings from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self, DeployError> {
        let contents = fs::read_to_string(path).map_err(|e| DeployError::Settings {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        toml::from_str(&contents).map_err(|e| DeployError::Settings {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Find config file in standard locations
    /// Priority:
    /// 1. .sifthub-deploy.toml in current directory
    /// 2. ~/.config/sifthub-deploy/config.toml (XDG config directory)
    fn find_config_file() -> Option<PathBuf> {
        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Some(local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let xdg_config = config_dir.join("sifthub-deploy").join("config.toml");
            if xdg_config.exists() {
                return Some(xdg_config);
            }
        }

        None
    }

    /// Save settings to file, with the usual header comment
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        use anyhow::Context;

        let contents = self.to_file_contents().context("Failed to serialize settings")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    fn to_file_contents(&self) -> Result<String, toml::ser::Error> {
        Ok(format!("{}{}", CONFIG_HEADER, toml::to_string_pretty(self)?))
    }

    fn overrides(&self, env: Option<&str>) -> Option<&EnvironmentOverrides> {
        env.and_then(|e| self.environments.get(e))
    }

    /// Namespace for an environment, falling back to the default
    pub fn namespace_for(&self, env: Option<&str>) -> &str {
        self.overrides(env)
            .and_then(|o| o.namespace.as_deref())
            .unwrap_or(&self.defaults.namespace)
    }

    /// Manifest directory for an environment, falling back to the default
    pub fn manifests_dir_for(&self, env: Option<&str>) -> &str {
        self.overrides(env)
            .and_then(|o| o.manifests_dir.as_deref())
            .unwrap_or(&self.defaults.manifests_dir)
    }

    /// Whether deployments to this environment need confirmation
    pub fn is_production(&self, env: Option<&str>) -> bool {
        env.is_some_and(|e| {
            self.behavior
                .production_environments
                .iter()
                .any(|p| p.eq_ignore_ascii_case(e))
        })
    }

    /// Build args in a stable order
    pub fn build_args(&self) -> Vec<(String, String)> {
        self.build
            .build_args
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Defaults plus a sample production override
    pub fn example() -> Self {
        let mut example = Settings::default();
        example.environments.insert(
            "prod".to_string(),
            EnvironmentOverrides {
                namespace: Some("reporting".to_string()),
                manifests_dir: None,
            },
        );
        example
    }

    /// Generate example config file content
    pub fn example_config() -> String {
        match Self::example().to_file_contents() {
            Ok(config) => config,
            Err(_) => format!("{}[defaults]\nnamespace = \"default\"\n", CONFIG_HEADER),
        }
    }
}
