//! Deployment environment: the variables the deploy script consumed

use crate::utils::errors::DeployError;
use clap::Args;
use std::collections::BTreeMap;

/// One of the environment variables driving a deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EnvVar {
    Env,
    RepoName,
    Version,
    AwsAccountId,
    Region,
    ServiceAccountPolicy,
    ServiceAccountName,
    ClusterName,
}

impl EnvVar {
    pub const ALL: [EnvVar; 8] = [
        EnvVar::Env,
        EnvVar::RepoName,
        EnvVar::Version,
        EnvVar::AwsAccountId,
        EnvVar::Region,
        EnvVar::ServiceAccountPolicy,
        EnvVar::ServiceAccountName,
        EnvVar::ClusterName,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EnvVar::Env => "ENV",
            EnvVar::RepoName => "REPO_NAME",
            EnvVar::Version => "VERSION",
            EnvVar::AwsAccountId => "AWS_ACCOUNT_ID",
            EnvVar::Region => "REGION",
            EnvVar::ServiceAccountPolicy => "SERVICE_ACCOUNT_POLICY",
            EnvVar::ServiceAccountName => "SERVICE_ACCOUNT_NAME",
            EnvVar::ClusterName => "CLUSTER_NAME",
        }
    }
}

impl std::fmt::Display for EnvVar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Values for a deployment, from flags or the environment
#[derive(Args, Debug, Clone, Default)]
pub struct DeployEnv {
    /// Target environment (e.g. dev, staging, prod)
    #[arg(long = "env", env = "ENV", global = true)]
    pub env: Option<String>,

    /// Image repository name (local image and ECR repository)
    #[arg(long, env = "REPO_NAME", global = true)]
    pub repo_name: Option<String>,

    /// Image tag
    #[arg(long = "version-tag", env = "VERSION", global = true)]
    pub image_version: Option<String>,

    /// AWS account hosting the ECR registry
    #[arg(long, env = "AWS_ACCOUNT_ID", global = true)]
    pub aws_account_id: Option<String>,

    /// AWS region of the registry and cluster
    #[arg(long, env = "REGION", global = true)]
    pub region: Option<String>,

    /// IAM policy ARN attached to the service account
    #[arg(long, env = "SERVICE_ACCOUNT_POLICY", global = true)]
    pub service_account_policy: Option<String>,

    /// Kubernetes service account bound to the IAM role
    #[arg(long, env = "SERVICE_ACCOUNT_NAME", global = true)]
    pub service_account_name: Option<String>,

    /// EKS cluster name
    #[arg(long, env = "CLUSTER_NAME", global = true)]
    pub cluster_name: Option<String>,
}

impl DeployEnv {
    /// Raw value, blank treated as unset
    pub fn get(&self, var: EnvVar) -> Option<&str> {
        let value = match var {
            EnvVar::Env => &self.env,
            EnvVar::RepoName => &self.repo_name,
            EnvVar::Version => &self.image_version,
            EnvVar::AwsAccountId => &self.aws_account_id,
            EnvVar::Region => &self.region,
            EnvVar::ServiceAccountPolicy => &self.service_account_policy,
            EnvVar::ServiceAccountName => &self.service_account_name,
            EnvVar::ClusterName => &self.cluster_name,
        };
        value.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }

    /// Value of a variable that `require` has already checked
    pub fn value(&self, var: EnvVar) -> Result<&str, DeployError> {
        self.get(var).ok_or_else(|| DeployError::MissingEnv {
            vars: vec![var.name().to_string()],
        })
    }

    /// Fail listing every missing variable at once
    pub fn require(&self, vars: &[EnvVar]) -> Result<(), DeployError> {
        let mut missing: Vec<EnvVar> = vars
            .iter()
            .copied()
            .filter(|v| self.get(*v).is_none())
            .collect();
        missing.sort();
        missing.dedup();

        if missing.is_empty() {
            return Ok(());
        }

        Err(DeployError::MissingEnv {
            vars: missing.iter().map(|v| v.name().to_string()).collect(),
        })
    }

    /// Validate the format of every present value
    pub fn validate(&self) -> Result<(), DeployError> {
        for var in EnvVar::ALL {
            if let Some(value) = self.get(var) {
                if let Err(reason) = check_format(var, value) {
                    return Err(DeployError::InvalidEnv {
                        var: var.name().to_string(),
                        value: value.to_string(),
                        reason,
                    });
                }
            }
        }
        Ok(())
    }

    /// Present variables by name, for manifest substitution
    pub fn variables(&self) -> BTreeMap<String, String> {
        EnvVar::ALL
            .iter()
            .filter_map(|var| {
                self.get(*var)
                    .map(|value| (var.name().to_string(), value.to_string()))
            })
            .collect()
    }
}

fn check_format(var: EnvVar, value: &str) -> Result<(), String> {
    match var {
        EnvVar::AwsAccountId => {
            if value.len() == 12 && value.chars().all(|c| c.is_ascii_digit()) {
                Ok(())
            } else {
                Err("expected a 12 digit AWS account id".to_string())
            }
        }
        EnvVar::ServiceAccountPolicy => {
            if value.starts_with("arn:") {
                Ok(())
            } else {
                Err("expected an IAM policy ARN (arn:aws:iam::...)".to_string())
            }
        }
        EnvVar::RepoName => {
            let valid_chars = value
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "._/-".contains(c));
            let starts_ok = value
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
            if valid_chars && starts_ok && !value.ends_with('/') {
                Ok(())
            } else {
                Err("repository names use lowercase letters, digits and . _ / -".to_string())
            }
        }
        EnvVar::Version => {
            let starts_ok = value
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_');
            let valid_chars = value
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "_.-".contains(c));
            if starts_ok && valid_chars && value.len() <= 128 {
                Ok(())
            } else {
                Err("image tags use letters, digits, _ . - (max 128, no leading . or -)".to_string())
            }
        }
        EnvVar::Env
        | EnvVar::Region
        | EnvVar::ServiceAccountName
        | EnvVar::ClusterName => {
            if value.chars().any(char::is_whitespace) {
                Err("must not contain whitespace".to_string())
            } else {
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_env() -> DeployEnv {
        DeployEnv {
            env: Some("dev".to_string()),
            repo_name: Some("sifthub-reporting".to_string()),
            image_version: Some("1.4.0".to_string()),
            aws_account_id: Some("123456789012".to_string()),
            region: Some("us-east-2".to_string()),
            service_account_policy: Some(
                "arn:aws:iam::123456789012:policy/reporting".to_string(),
            ),
            service_account_name: Some("reporting-sa".to_string()),
            cluster_name: Some("sifthub-dev".to_string()),
        }
    }

    #[test]
    fn test_require_reports_all_missing_in_order() {
        let env = DeployEnv {
            repo_name: Some("  ".to_string()),
            ..DeployEnv::default()
        };

        let err = env
            .require(&[EnvVar::Region, EnvVar::RepoName, EnvVar::Version, EnvVar::Region])
            .unwrap_err();
        match err {
            DeployError::MissingEnv { vars } => {
                assert_eq!(vars, vec!["REPO_NAME", "VERSION", "REGION"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_require_ok_when_present() {
        assert!(full_env().require(&EnvVar::ALL).is_ok());
    }

    #[test]
    fn test_validate_accepts_good_values() {
        assert!(full_env().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_account() {
        let env = DeployEnv {
            aws_account_id: Some("12345".to_string()),
            ..full_env()
        };
        let err = env.validate().unwrap_err();
        assert!(err.to_string().contains("AWS_ACCOUNT_ID"));
    }

    #[test]
    fn test_validate_rejects_bad_tag_and_repo() {
        let env = DeployEnv {
            image_version: Some("-rc1".to_string()),
            ..full_env()
        };
        assert!(env.validate().is_err());

        let env = DeployEnv {
            repo_name: Some("Sifthub".to_string()),
            ..full_env()
        };
        assert!(env.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_arn_policy() {
        let env = DeployEnv {
            service_account_policy: Some("reporting-policy".to_string()),
            ..full_env()
        };
        assert!(env.validate().is_err());
    }

    #[test]
    fn test_variables_skip_unset() {
        let env = DeployEnv {
            env: Some("prod".to_string()),
            image_version: Some("2.0.0".to_string()),
            ..DeployEnv::default()
        };
        let vars = env.variables();
        assert_eq!(vars.len(), 2);
        assert_eq!(vars["ENV"], "prod");
        assert_eq!(vars["VERSION"], "2.0.0");
    }

    #[test]
    fn test_values_are_trimmed() {
        let env = DeployEnv {
            region: Some(" us-east-2 ".to_string()),
            ..DeployEnv::default()
        };
        assert_eq!(env.get(EnvVar::Region), Some("us-east-2"));
    }
}
