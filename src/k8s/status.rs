//! Live rollout state of the deployed workloads

use anyhow::{Context, Result};
use k8s_openapi::api::apps::v1::Deployment;
use kube::{Api, Client};
use serde::Serialize;

/// Deployment to look up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTarget {
    pub name: String,
    /// `None` uses the kubeconfig's current namespace
    pub namespace: Option<String>,
}

/// Replica counts and images of one deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RolloutSummary {
    pub name: String,
    pub namespace: Option<String>,
    pub desired: i32,
    pub updated: i32,
    pub ready: i32,
    pub available: i32,
    pub images: Vec<String>,
    /// Whether a container runs the image this release pushed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub running_expected: Option<bool>,
}

impl RolloutSummary {
    /// All desired replicas are updated and available
    pub fn is_complete(&self) -> bool {
        self.updated >= self.desired && self.available >= self.desired
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum DeploymentState {
    Found(RolloutSummary),
    Missing {
        name: String,
        namespace: Option<String>,
    },
}

/// Summarize a deployment fetched from the cluster
pub fn summarize(deployment: &Deployment, expected_image: Option<&str>) -> RolloutSummary {
    let spec = deployment.spec.as_ref();
    let status = deployment.status.as_ref();

    let images: Vec<String> = spec
        .and_then(|s| s.template.spec.as_ref())
        .map(|pod| {
            pod.containers
                .iter()
                .filter_map(|c| c.image.clone())
                .collect()
        })
        .unwrap_or_default();

    let running_expected = expected_image.map(|expected| images.iter().any(|i| i == expected));

    RolloutSummary {
        name: deployment.metadata.name.clone().unwrap_or_default(),
        namespace: deployment.metadata.namespace.clone(),
        // The API server defaults replicas to 1
        desired: spec.and_then(|s| s.replicas).unwrap_or(1),
        updated: status.and_then(|s| s.updated_replicas).unwrap_or(0),
        ready: status.and_then(|s| s.ready_replicas).unwrap_or(0),
        available: status.and_then(|s| s.available_replicas).unwrap_or(0),
        images,
        running_expected,
    }
}

/// Fetch every target from the cluster in the current kubeconfig context
pub async fn fetch(
    targets: &[StatusTarget],
    expected_image: Option<&str>,
) -> Result<Vec<DeploymentState>> {
    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client from kubeconfig")?;

    let mut states = Vec::with_capacity(targets.len());
    for target in targets {
        let api: Api<Deployment> = match &target.namespace {
            Some(ns) => Api::namespaced(client.clone(), ns),
            None => Api::default_namespaced(client.clone()),
        };

        let found = api
            .get_opt(&target.name)
            .await
            .with_context(|| format!("Failed to get deployment {}", target.name))?;

        states.push(match found {
            Some(deployment) => DeploymentState::Found(summarize(&deployment, expected_image)),
            None => {
                crate::log_warn!("Deployment {} not found in the cluster", target.name);
                DeploymentState::Missing {
                    name: target.name.clone(),
                    namespace: target.namespace.clone(),
                }
            }
        });
    }

    Ok(states)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn deployment(replicas: Option<i32>, status: serde_json::Value) -> Deployment {
        let mut value = json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": { "name": "reporting-worker", "namespace": "reporting" },
            "spec": {
                "selector": { "matchLabels": { "app": "reporting" } },
                "template": {
                    "spec": {
                        "containers": [
                            { "name": "worker", "image": "123456789012.dkr.ecr.us-east-2.amazonaws.com/reporting:1.4.0" },
                            { "name": "sidecar", "image": "fluent-bit:2" }
                        ]
                    }
                }
            },
            "status": status
        });
        if let Some(r) = replicas {
            value["spec"]["replicas"] = json!(r);
        }
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_summarize_complete_rollout() {
        let d = deployment(
            Some(2),
            json!({ "replicas": 2, "updatedReplicas": 2, "readyReplicas": 2, "availableReplicas": 2 }),
        );
        let summary = summarize(
            &d,
            Some("123456789012.dkr.ecr.us-east-2.amazonaws.com/reporting:1.4.0"),
        );

        assert_eq!(summary.name, "reporting-worker");
        assert_eq!(summary.namespace.as_deref(), Some("reporting"));
        assert_eq!(summary.desired, 2);
        assert_eq!(summary.images.len(), 2);
        assert_eq!(summary.running_expected, Some(true));
        assert!(summary.is_complete());
    }

    #[test]
    fn test_summarize_in_progress_with_old_image() {
        let d = deployment(None, json!({ "updatedReplicas": 0 }));
        let summary = summarize(&d, Some("123456789012.dkr.ecr.us-east-2.amazonaws.com/reporting:2.0.0"));

        assert_eq!(summary.desired, 1);
        assert_eq!(summary.available, 0);
        assert_eq!(summary.running_expected, Some(false));
        assert!(!summary.is_complete());
    }

    #[test]
    fn test_state_serializes_with_tag() {
        let state = DeploymentState::Missing {
            name: "reporting-worker".to_string(),
            namespace: None,
        };
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["state"], "missing");
        assert_eq!(value["name"], "reporting-worker");
    }
}
