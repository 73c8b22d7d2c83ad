//! Command implementations for the sifthub-deploy CLI

pub mod build;
pub mod check;
pub mod config;
pub mod deploy;
pub mod render;
pub mod status;

use anyhow::{Context, Result, anyhow};
use colored::Colorize;
use std::path::PathBuf;

use crate::config::{DeployEnv, EnvVar, Settings};
use crate::pipeline::{self, DeployContext, Plan, StageSelection};
use crate::utils::errors::DeployError;
use crate::utils::exec::{CommandRunner, DryRunRunner, ProcessRunner};
use crate::utils::progress::{ProgressMode, StepProgress};
use crate::utils::{CommonPrereqs, ContainerRuntime, dryrun, prompt};

/// Everything a command needs: resolved values, settings and global flags
pub struct Session {
    pub env: DeployEnv,
    pub settings: Settings,
    pub dry_run: bool,
    pub assume_yes: bool,
    pub quiet: bool,
    /// Forced container runtime; detected when unset
    pub runtime: Option<ContainerRuntime>,
    pub root: PathBuf,
}

impl Session {
    pub fn new(env: DeployEnv, settings: Settings) -> Self {
        Self {
            env,
            settings,
            dry_run: false,
            assume_yes: false,
            quiet: false,
            runtime: None,
            root: PathBuf::from("."),
        }
    }

    pub fn runtime(&self) -> Result<ContainerRuntime> {
        match self.runtime {
            Some(runtime) => Ok(runtime),
            None => ContainerRuntime::detect_or_default(self.dry_run),
        }
    }

    pub fn context(&self, runtime: ContainerRuntime) -> DeployContext<'_> {
        DeployContext {
            env: &self.env,
            settings: &self.settings,
            runtime,
            root: self.root.clone(),
        }
    }

    pub fn runner(&self) -> Box<dyn CommandRunner> {
        if self.dry_run {
            Box::new(DryRunRunner)
        } else {
            Box::new(ProcessRunner::new(
                self.settings.behavior.capture_tool_output,
            ))
        }
    }

    pub fn progress_mode(&self) -> ProgressMode {
        if self.dry_run || self.quiet {
            ProgressMode::Silent
        } else if self.settings.behavior.capture_tool_output {
            ProgressMode::Spinner
        } else {
            ProgressMode::Banner
        }
    }

    /// Variables for manifest rendering, `IMAGE` included when it can be derived
    pub fn manifest_variables(&self) -> std::collections::BTreeMap<String, String> {
        let mut vars = self.env.variables();
        if let Some(remote) = self.remote_image() {
            vars.insert("IMAGE".to_string(), remote);
        }
        vars
    }

    /// Registry image name, when every variable it needs is set
    pub fn remote_image(&self) -> Option<String> {
        pipeline::remote_image(&self.env)
    }

    /// Whether running `selection` has to be confirmed first
    pub fn needs_confirmation(&self, selection: &StageSelection) -> bool {
        selection.touches_cluster()
            && !self.dry_run
            && !self.assume_yes
            && self.settings.behavior.confirm_production
            && self.settings.is_production(self.env.get(EnvVar::Env))
    }

    /// Ask before changing a production cluster
    pub fn confirm_production(&self, selection: &StageSelection) -> Result<()> {
        if !self.needs_confirmation(selection) {
            return Ok(());
        }

        let env = self.env.get(EnvVar::Env).unwrap_or_default();
        if !prompt::is_interactive() {
            return Err(anyhow!(
                "ENV={} is a production environment; pass --yes to deploy without a prompt",
                env
            ));
        }

        let cluster = self.env.get(EnvVar::ClusterName).unwrap_or("the cluster");
        let question = format!("Deploy to production environment '{}' on {}?", env, cluster);
        if !prompt::confirm(&question)? {
            return Err(DeployError::Aborted.into());
        }
        Ok(())
    }
}

/// Plan `selection`, then run it step by step
pub fn run_stages(session: &Session, selection: &StageSelection, title: &str) -> Result<()> {
    let runtime = session.runtime()?;
    let ctx = session.context(runtime);
    let plan = Plan::new(&ctx, selection)?;

    if plan.is_empty() {
        crate::log_warn!("Nothing to do");
        return Ok(());
    }

    if session.dry_run {
        crate::log_info!("DRY RUN MODE: no changes will be made");
    } else {
        CommonPrereqs::require(&plan.required_tools())
            .context("Install the missing tools or run with --dry-run")?;
    }

    session.confirm_production(selection)?;

    crate::log_info!("{} ({} steps, runtime: {})", title, plan.steps.len(), runtime);
    if let Some(image) = &plan.image {
        crate::log_info!("Image: {}", image.local());
    }
    if let Some(entrypoint) = &plan.entrypoint {
        crate::log_info!("Entry point: {}", entrypoint);
    }
    for skipped in &plan.skipped_manifests {
        crate::log_debug!("No {} in {}, skipping", skipped, ctx.manifests_dir().display());
    }

    let runner = session.runner();
    let progress = StepProgress::new(session.progress_mode(), plan.steps.len());
    let report = pipeline::execute(&plan, runner.as_ref(), &progress)?;

    if runner.is_dry_run() {
        dryrun::log_summary(report.completed.len());
        return Ok(());
    }

    crate::log_info!("");
    crate::log_info!("==========================================");
    crate::log_info!(
        "{} {} completed in {:.1}s",
        "✓".green(),
        title,
        report.elapsed.as_secs_f64()
    );
    crate::log_info!("==========================================");
    if let Some(remote) = &plan.remote_image {
        if report.completed.contains(&pipeline::Stage::Push) {
            crate::log_info!("Pushed: {}", remote);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Stage;

    fn session(env: &str) -> Session {
        Session::new(
            DeployEnv {
                env: Some(env.to_string()),
                ..DeployEnv::default()
            },
            Settings::default(),
        )
    }

    #[test]
    fn test_production_guard_only_for_cluster_stages() {
        let session = session("prod");
        assert!(session.needs_confirmation(&StageSelection::deploy(false)));
        assert!(!session.needs_confirmation(&StageSelection::build(false)));
    }

    #[test]
    fn test_production_guard_bypasses() {
        let mut s = session("prod");
        s.assume_yes = true;
        assert!(!s.needs_confirmation(&StageSelection::deploy(false)));

        let mut s = session("production");
        s.dry_run = true;
        assert!(!s.needs_confirmation(&StageSelection::deploy(false)));

        let mut s = session("prod");
        s.settings.behavior.confirm_production = false;
        assert!(!s.needs_confirmation(&StageSelection::deploy(false)));

        let s = session("dev");
        assert!(!s.needs_confirmation(&StageSelection::of(&[Stage::Apply])));
    }

    #[test]
    fn test_runner_and_progress_follow_flags() {
        let mut s = session("dev");
        assert!(!s.runner().is_dry_run());
        assert_eq!(s.progress_mode(), ProgressMode::Banner);

        s.settings.behavior.capture_tool_output = true;
        assert_eq!(s.progress_mode(), ProgressMode::Spinner);

        s.dry_run = true;
        assert!(s.runner().is_dry_run());
        assert_eq!(s.progress_mode(), ProgressMode::Silent);
    }

    #[test]
    fn test_forced_runtime_wins() {
        let mut s = session("dev");
        s.runtime = Some(ContainerRuntime::Podman);
        assert_eq!(s.runtime().unwrap(), ContainerRuntime::Podman);
    }

    #[test]
    fn test_manifest_variables_include_image_when_known() {
        let mut s = session("dev");
        assert!(!s.manifest_variables().contains_key("IMAGE"));

        s.env.repo_name = Some("reporting".to_string());
        s.env.image_version = Some("1.4.0".to_string());
        s.env.aws_account_id = Some("123456789012".to_string());
        s.env.region = Some("us-east-2".to_string());
        assert_eq!(
            s.manifest_variables()["IMAGE"],
            "123456789012.dkr.ecr.us-east-2.amazonaws.com/reporting:1.4.0"
        );
    }
}
