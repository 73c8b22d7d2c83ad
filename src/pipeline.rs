//! Ordered build, push and deploy stages
//!
//! A [`Plan`] is computed up front from the environment, the settings file, the
//! Dockerfile and the manifests. It is a plain list of [`Invocation`]s, so it can
//! be printed, dry-run or executed. Execution stops at the first failing tool.

use crate::aws::{ecr, eks};
use crate::config::{DeployEnv, EnvVar, ImageRef, Registry, Settings};
use crate::dockerfile::Dockerfile;
use crate::k8s::kubectl;
use crate::manifests::ManifestSet;
use crate::utils::container::{BuildSpec, ContainerRuntime};
use crate::utils::errors::DeployError;
use crate::utils::exec::{CommandRunner, Invocation, StdinSource};
use crate::utils::progress::StepProgress;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Build,
    Tag,
    Login,
    Push,
    ServiceAccount,
    Kubeconfig,
    Apply,
    Rollout,
}

const IMAGE_VARS: [EnvVar; 2] = [EnvVar::RepoName, EnvVar::Version];
const REMOTE_IMAGE_VARS: [EnvVar; 4] = [
    EnvVar::RepoName,
    EnvVar::Version,
    EnvVar::AwsAccountId,
    EnvVar::Region,
];
const REGISTRY_VARS: [EnvVar; 2] = [EnvVar::AwsAccountId, EnvVar::Region];
const SERVICE_ACCOUNT_VARS: [EnvVar; 4] = [
    EnvVar::ServiceAccountName,
    EnvVar::ServiceAccountPolicy,
    EnvVar::ClusterName,
    EnvVar::Region,
];
const CLUSTER_VARS: [EnvVar; 2] = [EnvVar::ClusterName, EnvVar::Region];

impl Stage {
    pub const ALL: [Stage; 8] = [
        Stage::Build,
        Stage::Tag,
        Stage::Login,
        Stage::Push,
        Stage::ServiceAccount,
        Stage::Kubeconfig,
        Stage::Apply,
        Stage::Rollout,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Build => "build",
            Stage::Tag => "tag",
            Stage::Login => "login",
            Stage::Push => "push",
            Stage::ServiceAccount => "service-account",
            Stage::Kubeconfig => "kubeconfig",
            Stage::Apply => "apply",
            Stage::Rollout => "rollout",
        }
    }

    /// Variables this stage cannot run without
    pub fn required_vars(&self) -> &'static [EnvVar] {
        match self {
            Stage::Build => &IMAGE_VARS,
            Stage::Tag | Stage::Push => &REMOTE_IMAGE_VARS,
            Stage::Login => &REGISTRY_VARS,
            Stage::ServiceAccount => &SERVICE_ACCOUNT_VARS,
            Stage::Kubeconfig => &CLUSTER_VARS,
            Stage::Apply | Stage::Rollout => &[],
        }
    }

    /// External programs this stage runs
    pub fn tools(&self, runtime: ContainerRuntime) -> Vec<&'static str> {
        match self {
            Stage::Build | Stage::Tag | Stage::Push => vec![runtime.command()],
            Stage::Login => vec!["aws", runtime.command()],
            Stage::ServiceAccount => vec!["eksctl"],
            Stage::Kubeconfig => vec!["aws"],
            Stage::Apply | Stage::Rollout => vec!["kubectl"],
        }
    }

    /// Stages that change the cluster
    pub fn touches_cluster(&self) -> bool {
        matches!(
            self,
            Stage::ServiceAccount | Stage::Kubeconfig | Stage::Apply | Stage::Rollout
        )
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Flags of the `release` command
#[derive(Debug, Clone, Copy, Default)]
pub struct ReleaseOptions {
    pub skip_build: bool,
    pub skip_push: bool,
    pub skip_service_account: bool,
    pub wait: bool,
}

/// The set of stages a command runs; always executed in [`Stage`] order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageSelection {
    stages: BTreeSet<Stage>,
}

impl StageSelection {
    pub fn of(stages: &[Stage]) -> Self {
        Self {
            stages: stages.iter().copied().collect(),
        }
    }

    pub fn build(no_tag: bool) -> Self {
        let selection = Self::of(&[Stage::Build, Stage::Tag]);
        if no_tag {
            selection.without(Stage::Tag)
        } else {
            selection
        }
    }

    pub fn push(skip_build: bool) -> Self {
        let selection = Self::of(&[Stage::Build, Stage::Tag, Stage::Login, Stage::Push]);
        if skip_build {
            selection.without(Stage::Build)
        } else {
            selection
        }
    }

    pub fn deploy(wait: bool) -> Self {
        let selection = Self::of(&[Stage::ServiceAccount, Stage::Kubeconfig, Stage::Apply]);
        if wait {
            selection.with(Stage::Rollout)
        } else {
            selection
        }
    }

    /// Everything the shell script did, in its order
    pub fn release(options: ReleaseOptions) -> Self {
        let mut selection = Self::of(&Stage::ALL[..7]);
        if options.wait {
            selection = selection.with(Stage::Rollout);
        }
        if options.skip_build {
            selection = selection.without(Stage::Build);
        }
        if options.skip_push {
            selection = selection.without(Stage::Login).without(Stage::Push);
        }
        if options.skip_service_account {
            selection = selection.without(Stage::ServiceAccount);
        }
        selection
    }

    pub fn with(mut self, stage: Stage) -> Self {
        self.stages.insert(stage);
        self
    }

    pub fn without(mut self, stage: Stage) -> Self {
        self.stages.remove(&stage);
        self
    }

    pub fn contains(&self, stage: Stage) -> bool {
        self.stages.contains(&stage)
    }

    pub fn stages(&self) -> impl Iterator<Item = Stage> + '_ {
        self.stages.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Union of the variables every selected stage needs
    pub fn required_vars(&self) -> Vec<EnvVar> {
        let vars: BTreeSet<EnvVar> = self
            .stages()
            .flat_map(|s| s.required_vars().iter().copied())
            .collect();
        vars.into_iter().collect()
    }

    pub fn touches_cluster(&self) -> bool {
        self.stages().any(|s| s.touches_cluster())
    }
}

/// Everything a plan is computed from
pub struct DeployContext<'a> {
    pub env: &'a DeployEnv,
    pub settings: &'a Settings,
    pub runtime: ContainerRuntime,
    /// Directory the Dockerfile, build context and manifest paths are relative to
    pub root: PathBuf,
}

impl DeployContext<'_> {
    pub fn manifests_dir(&self) -> PathBuf {
        self.root
            .join(self.settings.manifests_dir_for(self.env.get(EnvVar::Env)))
    }

    pub fn dockerfile_path(&self) -> PathBuf {
        self.root.join(&self.settings.defaults.dockerfile)
    }
}

#[derive(Debug, Clone)]
pub struct Step {
    pub stage: Stage,
    pub description: String,
    pub invocation: Invocation,
}

#[derive(Debug, Clone)]
pub struct Plan {
    pub steps: Vec<Step>,
    pub image: Option<ImageRef>,
    pub remote_image: Option<String>,
    pub base_image: Option<String>,
    /// Handler the image starts, as declared in the Dockerfile
    pub entrypoint: Option<String>,
    /// Known manifest files that were not found
    pub skipped_manifests: Vec<String>,
    /// Placeholders left unresolved, per manifest file
    pub unresolved: Vec<(String, Vec<String>)>,
}

impl Plan {
    pub fn new(ctx: &DeployContext<'_>, selection: &StageSelection) -> Result<Self, DeployError> {
        ctx.env.require(&selection.required_vars())?;
        ctx.env.validate()?;

        let mut plan = Plan {
            steps: Vec::new(),
            image: None,
            remote_image: None,
            base_image: None,
            entrypoint: None,
            skipped_manifests: Vec::new(),
            unresolved: Vec::new(),
        };

        let image = if selection.stages().any(|s| s.required_vars().contains(&EnvVar::RepoName)) {
            Some(ImageRef::from_env(ctx.env)?)
        } else {
            None
        };
        let registry = if selection
            .stages()
            .any(|s| s.required_vars().contains(&EnvVar::AwsAccountId))
        {
            Some(Registry::from_env(ctx.env)?)
        } else {
            None
        };
        // Manifests get `$IMAGE` whenever it can be derived, whatever the selection
        plan.remote_image = remote_image(ctx.env);

        for stage in selection.stages() {
            match stage {
                Stage::Build => {
                    let image = required(&image, EnvVar::RepoName)?;
                    plan.add_build(ctx, image)?;
                }
                Stage::Tag => {
                    let image = required(&image, EnvVar::RepoName)?;
                    let remote = required(&plan.remote_image, EnvVar::AwsAccountId)?.clone();
                    plan.push_step(
                        stage,
                        format!("Tag image as {}", remote),
                        ctx.runtime.tag(&image.local(), &remote),
                    );
                }
                Stage::Login => {
                    let registry = required(&registry, EnvVar::AwsAccountId)?;
                    plan.push_step(
                        stage,
                        format!("Log in to {}", registry.host()),
                        ecr::login(registry, ctx.runtime),
                    );
                }
                Stage::Push => {
                    let remote = required(&plan.remote_image, EnvVar::AwsAccountId)?.clone();
                    plan.push_step(stage, format!("Push {}", remote), ctx.runtime.push(&remote));
                }
                Stage::ServiceAccount => plan.add_service_account(ctx)?,
                Stage::Kubeconfig => {
                    let cluster = ctx.env.value(EnvVar::ClusterName)?;
                    let region = ctx.env.value(EnvVar::Region)?;
                    plan.push_step(
                        stage,
                        format!("Update kubeconfig for cluster {}", cluster),
                        eks::update_kubeconfig(cluster, region),
                    );
                }
                // Both handled together once the manifests are read
                Stage::Apply | Stage::Rollout => {}
            }
        }

        if selection.contains(Stage::Apply) || selection.contains(Stage::Rollout) {
            plan.add_manifests(ctx, selection)?;
        }

        plan.image = image;
        Ok(plan)
    }

    fn push_step(&mut self, stage: Stage, description: String, invocation: Invocation) {
        self.steps.push(Step {
            stage,
            description,
            invocation,
        });
    }

    fn add_build(&mut self, ctx: &DeployContext<'_>, image: &ImageRef) -> Result<(), DeployError> {
        let dockerfile_path = ctx.dockerfile_path();
        let dockerfile = Dockerfile::load(&dockerfile_path)?;
        dockerfile.validate()?;

        self.base_image = dockerfile.base_image();
        self.entrypoint = dockerfile.entrypoint();
        if let Some(entrypoint) = &self.entrypoint {
            crate::log_debug!("Image entry point: {}", entrypoint);
        }

        let build_args = ctx.settings.build_args();
        let context = ctx.root.join(&ctx.settings.defaults.build_context);
        let tag = image.local();
        let spec = BuildSpec {
            dockerfile: &dockerfile_path,
            context: &context,
            tag: &tag,
            platform: ctx.settings.build.platform.as_deref(),
            build_args: &build_args,
            pull: ctx.settings.build.pull,
        };

        self.push_step(
            Stage::Build,
            format!("Build image {}", tag),
            ctx.runtime.build(&spec),
        );
        Ok(())
    }

    fn add_service_account(&mut self, ctx: &DeployContext<'_>) -> Result<(), DeployError> {
        let name = ctx.env.value(EnvVar::ServiceAccountName)?;
        let namespace = ctx.settings.namespace_for(ctx.env.get(EnvVar::Env));
        let spec = eks::ServiceAccountSpec {
            name,
            namespace,
            cluster: ctx.env.value(EnvVar::ClusterName)?,
            region: ctx.env.value(EnvVar::Region)?,
            policy_arn: ctx.env.value(EnvVar::ServiceAccountPolicy)?,
            override_existing: ctx.settings.deploy.override_existing_service_accounts,
        };

        self.push_step(
            Stage::ServiceAccount,
            format!("Create IAM service account {}/{}", namespace, name),
            eks::create_iam_service_account(&spec),
        );
        Ok(())
    }

    fn add_manifests(
        &mut self,
        ctx: &DeployContext<'_>,
        selection: &StageSelection,
    ) -> Result<(), DeployError> {
        let set = ManifestSet::discover(&ctx.manifests_dir())?;
        self.skipped_manifests = set.skipped.clone();

        let mut vars = ctx.env.variables();
        if let Some(remote) = &self.remote_image {
            vars.insert("IMAGE".to_string(), remote.clone());
        }
        let substitute = ctx.settings.deploy.substitute_variables;

        let mut deployments = Vec::new();
        for manifest in &set.manifests {
            let rendered = manifest.prepare(&vars, substitute);
            if !rendered.unresolved.is_empty() {
                let names: Vec<String> = rendered.unresolved.iter().cloned().collect();
                crate::log_warn!(
                    "{}: no value for {}, left as written",
                    manifest.file_name(),
                    names.join(", ")
                );
                self.unresolved.push((manifest.file_name(), names));
            }

            deployments.extend(manifest.deployments(&rendered.text)?);

            if selection.contains(Stage::Apply) {
                self.push_step(
                    Stage::Apply,
                    format!("Apply {}", manifest.file_name()),
                    kubectl::apply_stdin(rendered.text),
                );
            }
        }

        if selection.contains(Stage::Rollout) {
            if deployments.is_empty() {
                crate::log_warn!("No Deployment found in the manifests, nothing to wait for");
            }
            for deployment in deployments {
                self.push_step(
                    Stage::Rollout,
                    format!("Wait for rollout of {}", deployment.name),
                    kubectl::rollout_status(
                        &deployment.name,
                        deployment.namespace.as_deref(),
                        &ctx.settings.deploy.rollout_timeout,
                    ),
                );
            }
        }

        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Programs the plan runs, including pipe producers, in first-use order
    pub fn required_tools(&self) -> Vec<String> {
        let mut tools: Vec<String> = Vec::new();
        for step in &self.steps {
            let mut programs = Vec::new();
            if let Some(StdinSource::Pipe(producer)) = &step.invocation.stdin {
                programs.push(producer.program.clone());
            }
            programs.push(step.invocation.program.clone());

            for program in programs {
                if !tools.contains(&program) {
                    tools.push(program);
                }
            }
        }
        tools
    }

    /// Numbered, human readable listing
    pub fn display(&self) -> String {
        self.steps
            .iter()
            .enumerate()
            .map(|(i, step)| {
                format!(
                    "{:>3}. [{}] {}\n       {}",
                    i + 1,
                    step.stage,
                    step.description,
                    step.invocation.display()
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Machine readable listing for `plan --json`
    pub fn to_json(&self) -> serde_json::Value {
        let steps: Vec<serde_json::Value> = self
            .steps
            .iter()
            .map(|step| {
                serde_json::json!({
                    "stage": step.stage,
                    "description": step.description,
                    "command": step.invocation.display(),
                })
            })
            .collect();

        serde_json::json!({
            "image": self.image.as_ref().map(ImageRef::local),
            "remote_image": self.remote_image,
            "base_image": self.base_image,
            "entrypoint": self.entrypoint,
            "skipped_manifests": self.skipped_manifests,
            "tools": self.required_tools(),
            "steps": steps,
        })
    }
}

/// Registry image name, when every variable it needs is set
pub fn remote_image(env: &DeployEnv) -> Option<String> {
    let image = ImageRef::from_env(env).ok()?;
    let registry = Registry::from_env(env).ok()?;
    Some(registry.remote(&image))
}

fn required<T>(value: &Option<T>, var: EnvVar) -> Result<&T, DeployError> {
    value.as_ref().ok_or_else(|| DeployError::MissingEnv {
        vars: vec![var.name().to_string()],
    })
}

/// Outcome of a fully successful run
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub completed: Vec<Stage>,
    pub elapsed: Duration,
}

/// Run every step in order; the first failure ends the run
pub fn execute(
    plan: &Plan,
    runner: &dyn CommandRunner,
    progress: &StepProgress,
) -> Result<ExecutionReport, DeployError> {
    let start = Instant::now();
    let mut completed = Vec::with_capacity(plan.steps.len());

    for (index, step) in plan.steps.iter().enumerate() {
        progress.run(index, &step.description, || runner.run(&step.invocation))?;
        completed.push(step.stage);
    }

    Ok(ExecutionReport {
        completed,
        elapsed: start.elapsed(),
    })
}
