//! Deploy and release commands

use anyhow::Result;

use super::{Session, run_stages};
use crate::pipeline::{Plan, ReleaseOptions, StageSelection};
use crate::utils::CommonPrereqs;
use crate::utils::prereqs::Prerequisite;

/// Service account, kubeconfig and manifests, optionally waiting for the rollout
pub fn deploy(session: &Session, wait: bool) -> Result<()> {
    let wait = wait || session.settings.deploy.wait_for_rollout;
    run_stages(session, &StageSelection::deploy(wait), "Deploy")
}

/// The whole build, push and deploy sequence
pub fn release(session: &Session, options: ReleaseOptions) -> Result<()> {
    let selection = StageSelection::release(effective(session, options));
    run_stages(session, &selection, "Release")
}

/// Print what `release` would run, without running or prompting
pub fn plan(session: &Session, options: ReleaseOptions, json: bool) -> Result<()> {
    let selection = StageSelection::release(effective(session, options));
    let runtime = session.runtime()?;
    let plan = Plan::new(&session.context(runtime), &selection)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan.to_json())?);
        return Ok(());
    }

    if let Some(entrypoint) = &plan.entrypoint {
        println!("Entry point: {}", entrypoint);
    }
    if let Some(base) = &plan.base_image {
        println!("Base image:  {}", base);
    }
    println!();
    println!("{}", plan.display());
    println!();

    let prereqs: Vec<_> = plan
        .required_tools()
        .iter()
        .map(|t| CommonPrereqs::for_tool(t))
        .collect();
    let refs: Vec<&dyn Prerequisite> = prereqs.iter().map(|p| p as &dyn Prerequisite).collect();
    let (_, missing) = CommonPrereqs::check_all(&refs);
    for (name, _) in missing {
        crate::log_warn!("'{}' is not installed; the run would fail at its first step", name);
    }

    Ok(())
}

fn effective(session: &Session, mut options: ReleaseOptions) -> ReleaseOptions {
    options.wait = options.wait || session.settings.deploy.wait_for_rollout;
    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DeployEnv, Settings};

    #[test]
    fn test_settings_can_enable_rollout_wait() {
        let mut settings = Settings::default();
        settings.deploy.wait_for_rollout = true;
        let session = Session::new(DeployEnv::default(), settings);

        let options = effective(&session, ReleaseOptions::default());
        assert!(options.wait);
    }

    #[test]
    fn test_plan_reports_missing_variables() {
        let mut session = Session::new(DeployEnv::default(), Settings::default());
        session.dry_run = true;

        let err = plan(&session, ReleaseOptions::default(), false).unwrap_err();
        assert!(err.to_string().starts_with("Missing required environment"));
    }
}
