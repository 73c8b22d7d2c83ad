//! Local and registry image names

use crate::config::env::{DeployEnv, EnvVar};
use crate::utils::errors::DeployError;

/// `REPO_NAME:VERSION`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub repository: String,
    pub tag: String,
}

impl ImageRef {
    pub fn new(repository: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            tag: tag.into(),
        }
    }

    pub fn from_env(env: &DeployEnv) -> Result<Self, DeployError> {
        env.require(&[EnvVar::RepoName, EnvVar::Version])?;
        Ok(Self::new(
            env.value(EnvVar::RepoName)?,
            env.value(EnvVar::Version)?,
        ))
    }

    /// Name of the locally built image
    pub fn local(&self) -> String {
        format!("{}:{}", self.repository, self.tag)
    }
}

/// Private ECR registry of an account/region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry {
    pub account_id: String,
    pub region: String,
}

impl Registry {
    pub fn new(account_id: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            region: region.into(),
        }
    }

    pub fn from_env(env: &DeployEnv) -> Result<Self, DeployError> {
        env.require(&[EnvVar::AwsAccountId, EnvVar::Region])?;
        Ok(Self::new(
            env.value(EnvVar::AwsAccountId)?,
            env.value(EnvVar::Region)?,
        ))
    }

    pub fn host(&self) -> String {
        format!("{}.dkr.ecr.{}.amazonaws.com", self.account_id, self.region)
    }

    /// Fully qualified name of `image` in this registry
    pub fn remote(&self, image: &ImageRef) -> String {
        format!("{}/{}", self.host(), image.local())
    }
}
