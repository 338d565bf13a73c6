//! Command implementations for the hubstack CLI.
//!
//! Each submodule implements a group of related commands.

mod catalog;
mod config;
mod plan;
mod synth;

pub use catalog::{instance_types, zone};
pub use config::{config_path, config_show};
pub use plan::plan;
pub use synth::synth;

use crate::cli::{ClusterArgs, Commands, ConfigCommands};
use crate::config::{self as settings, Config, Environment, Resolved};
use crate::error::Result;
use crate::output::Output;

/// Execution context for CLI commands.
///
/// Holds the loaded config files, the environment snapshot and the output
/// settings; cluster parameters are resolved per command from its flags.
#[derive(Debug)]
pub struct Context {
    /// Loaded configuration files.
    pub config: Config,

    /// Profile selected with `--profile` or `@name`.
    pub profile_name: Option<String>,

    /// Environment captured at startup.
    pub env: Environment,

    /// Output configuration.
    pub output: Output,
}

impl Context {
    /// Create a new context from CLI options.
    pub fn new(
        profile_name: Option<String>,
        output_format: &str,
        color: &str,
        quiet: bool,
    ) -> Result<Self> {
        let config = Config::load()?;
        let output = Output::from_cli(output_format, color, quiet)?;

        Ok(Self { config, profile_name, env: Environment::capture(), output })
    }

    /// Resolve the cluster parameters of one command.
    pub fn resolve(&self, cluster: ClusterArgs) -> Result<Resolved> {
        settings::resolve(
            &self.config,
            self.profile_name.as_deref(),
            cluster.into_profile(),
            &self.env,
        )
    }
}

/// Execute a CLI command.
pub async fn execute(ctx: &Context, command: Commands) -> Result<()> {
    match command {
        Commands::Synth { cluster, bucket_dir } => synth(ctx, cluster, bucket_dir).await,
        Commands::Plan { cluster } => plan(ctx, cluster).await,
        Commands::InstanceTypes { types } => instance_types(ctx, &types).await,
        Commands::Zone { region } => zone(ctx, region.as_deref()).await,
        Commands::Config { command } => match command {
            ConfigCommands::Show { cluster } => config_show(ctx, cluster).await,
            ConfigCommands::Path => config_path(ctx).await,
        },
        Commands::Completion { shell } => completion(shell),
    }
}

fn completion(shell: clap_complete::Shell) -> Result<()> {
    use clap::CommandFactory;

    let mut cmd = crate::cli::Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
    Ok(())
}
