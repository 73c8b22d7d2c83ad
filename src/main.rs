//! sifthub-deploy CLI - build, push and deploy the reporting service to EKS

use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use sifthub_deploy::commands::{self, Session};
use sifthub_deploy::config::settings::{LOCAL_CONFIG_FILE, Settings};
use sifthub_deploy::config::DeployEnv;
use sifthub_deploy::pipeline::{ReleaseOptions, StageSelection};
use sifthub_deploy::utils::errors::diagnose;
use sifthub_deploy::utils::{ContainerRuntime, logger};
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sifthub-deploy")]
#[command(author, version, about = "Build, push and deploy the sifthub reporting service", long_about = None)]
struct Cli {
    /// Verbose output (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only show warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Dry-run mode: show what would be done without making changes
    #[arg(long, global = true)]
    dry_run: bool,

    /// Settings file (default: .sifthub-deploy.toml, then ~/.config/sifthub-deploy/config.toml)
    #[arg(long, global = true, env = "SIFTHUB_DEPLOY_CONFIG")]
    config: Option<PathBuf>,

    /// Answer yes to the production confirmation
    #[arg(short, long, global = true)]
    yes: bool,

    /// Container runtime to use instead of detecting one
    #[arg(long, global = true, env = "CONTAINER_RUNTIME")]
    runtime: Option<ContainerRuntime>,

    #[command(flatten)]
    env: DeployEnv,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the image and tag it for ECR
    Build {
        /// Only build REPO_NAME:VERSION, no registry tag
        #[arg(long)]
        no_tag: bool,
    },

    /// Build, tag and push the image to ECR
    Push {
        /// Push an image built earlier
        #[arg(long)]
        skip_build: bool,
    },

    /// Create the service account and apply the manifests
    Deploy {
        /// Wait for every Deployment to roll out
        #[arg(long)]
        wait: bool,
    },

    /// Build, push and deploy in one go
    Release(ReleaseArgs),

    /// Show the release steps without running them
    Plan {
        #[command(flatten)]
        release: ReleaseArgs,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the manifests with variables substituted
    Render {
        /// Write the rendered files to this directory instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Show rollout status of the deployed workloads
    Status {
        /// Print the status as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check prerequisites
    Check {
        /// Which command to check for
        #[arg(value_enum, default_value = "release")]
        target: CheckTarget,
    },

    /// Manage the settings file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completion scripts
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Show version information
    Version,
}

#[derive(Args, Clone, Copy)]
struct ReleaseArgs {
    /// Reuse an image built earlier
    #[arg(long)]
    skip_build: bool,

    /// Do not log in to or push to ECR
    #[arg(long)]
    skip_push: bool,

    /// Leave the IAM service account as it is
    #[arg(long)]
    skip_service_account: bool,

    /// Wait for every Deployment to roll out
    #[arg(long)]
    wait: bool,
}

impl From<ReleaseArgs> for ReleaseOptions {
    fn from(args: ReleaseArgs) -> Self {
        ReleaseOptions {
            skip_build: args.skip_build,
            skip_push: args.skip_push,
            skip_service_account: args.skip_service_account,
            wait: args.wait,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum CheckTarget {
    Build,
    Push,
    Deploy,
    Release,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write an example settings file
    Init {
        /// Where to write it
        #[arg(default_value = LOCAL_CONFIG_FILE)]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the effective settings
    Show,
}

fn main() {
    let cli = Cli::parse();

    logger::init(cli.verbose, cli.quiet);

    if let Err(err) = run(cli) {
        let (diagnostic, code) = diagnose(&err);
        diagnostic.display();
        std::process::exit(code);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Completion { shell } => return handle_completion_command(shell),
        Commands::Version => return handle_version_command(),
        Commands::Config {
            command: ConfigCommands::Init { ref path, force },
        } => return commands::config::init(path, force),
        _ => {}
    }

    let settings = Settings::load(cli.config.as_deref())?;
    let mut session = Session::new(cli.env, settings);
    session.dry_run = cli.dry_run;
    session.assume_yes = cli.yes;
    session.quiet = cli.quiet;
    session.runtime = cli.runtime;

    match cli.command {
        Commands::Build { no_tag } => commands::build::build(&session, no_tag),
        Commands::Push { skip_build } => commands::build::push(&session, skip_build),
        Commands::Deploy { wait } => commands::deploy::deploy(&session, wait),
        Commands::Release(args) => commands::deploy::release(&session, args.into()),
        Commands::Plan { release, json } => {
            commands::deploy::plan(&session, release.into(), json)
        }
        Commands::Render { out } => commands::render::render(&session, out.as_deref()),
        Commands::Status { json } => commands::status::status(&session, json),
        Commands::Check { target } => {
            let selection = match target {
                CheckTarget::Build => StageSelection::build(false),
                CheckTarget::Push => StageSelection::push(false),
                CheckTarget::Deploy => StageSelection::deploy(false),
                CheckTarget::Release => StageSelection::release(ReleaseOptions::default()),
            };
            commands::check::check(&session, &selection)
        }
        Commands::Config {
            command: ConfigCommands::Show,
        } => commands::config::show(&session),
        Commands::Config {
            command: ConfigCommands::Init { .. },
        }
        | Commands::Completion { .. }
        | Commands::Version => Ok(()),
    }
}

fn handle_completion_command(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "sifthub-deploy", &mut io::stdout());
    Ok(())
}

fn handle_version_command() -> Result<()> {
    println!("sifthub-deploy {}", env!("CARGO_PKG_VERSION"));
    println!("Build, push and deploy CLI for the sifthub reporting service");
    Ok(())
}
