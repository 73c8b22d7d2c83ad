//! Show the live rollout state of the deployed workloads

use anyhow::{Context, Result};
use colored::Colorize;

use super::Session;
use crate::config::EnvVar;
use crate::k8s::status::{self, DeploymentState, RolloutSummary, StatusTarget};
use crate::manifests::ManifestSet;

/// Deployments named in the manifests, looked up in the cluster
pub fn status(session: &Session, json: bool) -> Result<()> {
    let dir = session
        .root
        .join(session.settings.manifests_dir_for(session.env.get(EnvVar::Env)));
    let set = ManifestSet::discover(&dir)?;

    let vars = session.manifest_variables();
    let targets: Vec<StatusTarget> = set
        .deployments(&vars, session.settings.deploy.substitute_variables)?
        .into_iter()
        .map(|d| StatusTarget {
            name: d.name,
            namespace: d.namespace,
        })
        .collect();

    if targets.is_empty() {
        crate::log_warn!("No Deployment found in {}", dir.display());
        return Ok(());
    }

    let expected = session.remote_image();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let states = runtime.block_on(status::fetch(&targets, expected.as_deref()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&states)?);
        return Ok(());
    }

    for state in &states {
        match state {
            DeploymentState::Found(summary) => print_summary(summary),
            DeploymentState::Missing { name, namespace } => println!(
                "{} {} {}",
                "✗".red(),
                qualified(name, namespace.as_deref()),
                "not found".red()
            ),
        }
    }

    Ok(())
}

fn qualified(name: &str, namespace: Option<&str>) -> String {
    match namespace {
        Some(ns) => format!("{}/{}", ns, name),
        None => name.to_string(),
    }
}

fn print_summary(summary: &RolloutSummary) {
    let marker = if summary.is_complete() {
        "✓".green()
    } else {
        "…".yellow()
    };

    println!(
        "{} {}  ready {}/{}  updated {}  available {}",
        marker,
        qualified(&summary.name, summary.namespace.as_deref()).bold(),
        summary.ready,
        summary.desired,
        summary.updated,
        summary.available
    );

    for image in &summary.images {
        println!("    image: {}", image);
    }

    if summary.running_expected == Some(false) {
        println!("    {}", "expected image is not running yet".yellow());
    }
}
