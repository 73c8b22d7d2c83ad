//! Kubectl command builders

use crate::utils::exec::Invocation;

/// Apply a YAML manifest from string
pub fn apply_stdin(yaml: impl Into<String>) -> Invocation {
    Invocation::new("kubectl")
        .args(["apply", "-f", "-"])
        .stdin_text(yaml)
}

/// Wait for a deployment rollout to finish
pub fn rollout_status(deployment: &str, namespace: Option<&str>, timeout: &str) -> Invocation {
    let mut args = vec![
        "rollout".to_string(),
        "status".to_string(),
        format!("deployment/{}", deployment),
    ];

    if let Some(ns) = namespace {
        args.push("-n".to_string());
        args.push(ns.to_string());
    }

    args.push("--timeout".to_string());
    args.push(timeout.to_string());

    Invocation::new("kubectl").args(args)
}
