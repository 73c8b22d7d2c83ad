//! Kubernetes manifests shipped with the service
//!
//! The deployment directory holds up to four files that are applied in a fixed
//! order. Any of them may be absent.

use crate::utils::errors::DeployError;
use crate::utils::template::{self, Rendered};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Known manifest files, in apply order
pub const MANIFEST_FILES: [&str; 4] = [
    "role.yaml",
    "rolebinding.yaml",
    "deployment.yaml",
    "service.yaml",
];

#[derive(Debug, Clone)]
pub struct Manifest {
    pub path: PathBuf,
    pub contents: String,
}

/// Identity of a resource declared in a manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub kind: String,
    pub name: String,
    pub namespace: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResourceHeader {
    kind: Option<String>,
    #[serde(default)]
    metadata: Metadata,
}

#[derive(Debug, Default, Deserialize)]
struct Metadata {
    name: Option<String>,
    namespace: Option<String>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self, DeployError> {
        let contents = fs::read_to_string(path).map_err(|e| DeployError::Manifest {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            contents,
        })
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Substitute `$NAME` / `${NAME}` placeholders
    pub fn render(&self, vars: &BTreeMap<String, String>) -> Rendered {
        template::substitute(&self.contents, vars)
    }

    /// Text to apply: rendered with `vars`, or as written when substitution is off
    pub fn prepare(&self, vars: &BTreeMap<String, String>, substitute: bool) -> Rendered {
        if substitute {
            self.render(vars)
        } else {
            Rendered {
                text: self.contents.clone(),
                unresolved: Default::default(),
            }
        }
    }

    /// `Deployment` resources declared in `text`
    pub fn deployments(&self, text: &str) -> Result<Vec<Resource>, DeployError> {
        Ok(self
            .resources(text)?
            .into_iter()
            .filter(|r| r.kind == "Deployment")
            .collect())
    }

    /// Resources declared in `text` (usually the rendered manifest)
    pub fn resources(&self, text: &str) -> Result<Vec<Resource>, DeployError> {
        let mut resources = Vec::new();

        for document in serde_yaml::Deserializer::from_str(text) {
            let value = serde_yaml::Value::deserialize(document).map_err(|e| {
                DeployError::Manifest {
                    path: self.path.clone(),
                    reason: e.to_string(),
                }
            })?;

            // Empty documents between `---` separators
            if value.is_null() {
                continue;
            }

            let header: ResourceHeader =
                serde_yaml::from_value(value).map_err(|e| DeployError::Manifest {
                    path: self.path.clone(),
                    reason: e.to_string(),
                })?;

            let Some(kind) = header.kind else {
                return Err(DeployError::Manifest {
                    path: self.path.clone(),
                    reason: "document without a kind".to_string(),
                });
            };

            resources.push(Resource {
                kind,
                name: header.metadata.name.unwrap_or_default(),
                namespace: header.metadata.namespace,
            });
        }

        Ok(resources)
    }
}

/// Manifests present in a deployment directory
#[derive(Debug, Clone, Default)]
pub struct ManifestSet {
    pub dir: PathBuf,
    pub manifests: Vec<Manifest>,
    /// Known file names that were not found
    pub skipped: Vec<String>,
}

impl ManifestSet {
    pub fn discover(dir: &Path) -> Result<Self, DeployError> {
        let mut set = Self {
            dir: dir.to_path_buf(),
            ..Self::default()
        };

        if !dir.is_dir() {
            crate::log_warn!(
                "Manifest directory {} not found, nothing to apply",
                dir.display()
            );
            set.skipped = MANIFEST_FILES.iter().map(|f| f.to_string()).collect();
            return Ok(set);
        }

        for name in MANIFEST_FILES {
            let path = dir.join(name);
            if path.is_file() {
                set.manifests.push(Manifest::load(&path)?);
            } else {
                crate::log_debug!("Skipping {}: not present", path.display());
                set.skipped.push(name.to_string());
            }
        }

        Ok(set)
    }

    pub fn is_empty(&self) -> bool {
        self.manifests.is_empty()
    }

    /// Deployment resources across all manifests, rendered with `vars`
    pub fn deployments(
        &self,
        vars: &BTreeMap<String, String>,
        substitute: bool,
    ) -> Result<Vec<Resource>, DeployError> {
        let mut out = Vec::new();
        for manifest in &self.manifests {
            let rendered = manifest.prepare(vars, substitute);
            out.extend(manifest.deployments(&rendered.text)?);
        }
        Ok(out)
    }
}
