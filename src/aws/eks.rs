//! EKS cluster access and IAM service accounts

use crate::utils::exec::Invocation;

/// Write cluster credentials into the local kubeconfig
pub fn update_kubeconfig(cluster: &str, region: &str) -> Invocation {
    Invocation::new("aws").args([
        "eks",
        "update-kubeconfig",
        "--name",
        cluster,
        "--region",
        region,
    ])
}

/// IAM role bound to a Kubernetes service account
#[derive(Debug, Clone)]
pub struct ServiceAccountSpec<'a> {
    pub name: &'a str,
    pub namespace: &'a str,
    pub cluster: &'a str,
    pub region: &'a str,
    pub policy_arn: &'a str,
    /// Take over a service account that already exists in the cluster
    pub override_existing: bool,
}

pub fn create_iam_service_account(spec: &ServiceAccountSpec<'_>) -> Invocation {
    let inv = Invocation::new("eksctl").args([
        "create",
        "iamserviceaccount",
        "--name",
        spec.name,
        "--namespace",
        spec.namespace,
        "--cluster",
        spec.cluster,
        "--region",
        spec.region,
        "--attach-policy-arn",
        spec.policy_arn,
        "--approve",
    ]);

    if spec.override_existing {
        inv.arg("--override-existing-serviceaccounts")
    } else {
        inv
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_kubeconfig() {
        assert_eq!(
            update_kubeconfig("sifthub-dev", "us-east-2").command_line(),
            "aws eks update-kubeconfig --name sifthub-dev --region us-east-2"
        );
    }

    #[test]
    fn test_create_iam_service_account() {
        let mut spec = ServiceAccountSpec {
            name: "reporting-sa",
            namespace: "default",
            cluster: "sifthub-dev",
            region: "us-east-2",
            policy_arn: "arn:aws:iam::123456789012:policy/reporting",
            override_existing: true,
        };

        let inv = create_iam_service_account(&spec);
        assert_eq!(inv.program, "eksctl");
        assert_eq!(
            inv.args,
            vec![
                "create",
                "iamserviceaccount",
                "--name",
                "reporting-sa",
                "--namespace",
                "default",
                "--cluster",
                "sifthub-dev",
                "--region",
                "us-east-2",
                "--attach-policy-arn",
                "arn:aws:iam::123456789012:policy/reporting",
                "--approve",
                "--override-existing-serviceaccounts",
            ]
        );

        spec.override_existing = false;
        let inv = create_iam_service_account(&spec);
        assert_eq!(inv.args.last().map(String::as_str), Some("--approve"));
    }
}
