//! hubstack library
//!
//! This crate derives everything needed to stand up a managed Kubernetes
//! cluster with a layered data-science platform on top: the action graph
//! handed to a provisioning engine, the platform release values and a
//! configuration snapshot for later redeploys.
//!
//! ## Usage
//!
//! ```bash
//! hubstack synth --name lab --base-domain aws.example.io   # Derive and export
//! hubstack plan                                             # Show the action graph
//! hubstack instance-types g4dn.xlarge t3a.2xlarge           # Resource profiles
//! ```
//!
//! ## Profiles
//!
//! Named parameter sets live in the config file:
//!
//! ```bash
//! hubstack @lab synth
//! hubstack --profile staging plan
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;
pub mod provision;

pub use cli::Cli;
pub use error::{Error, Result};

/// CLI version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Run the CLI with the given arguments.
///
/// This is the main entry point for the CLI, parsing arguments and
/// dispatching to the appropriate command handler.
pub async fn run(args: Vec<String>) -> Result<()> {
    use clap::Parser;

    // Parse @profile prefix before clap
    let (profile_override, args) = cli::parse_profile_prefix(args);

    let mut cli_args = match Cli::try_parse_from(&args) {
        Ok(cli) => cli,
        Err(e) => {
            e.print().ok();
            use clap::error::ErrorKind;
            match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => return Ok(()),
                _ => return Err(Error::other("")),
            }
        }
    };

    if cli_args.profile.is_none() {
        cli_args.profile = profile_override;
    }

    if cli_args.debug {
        init_logging();
    }

    let ctx = commands::Context::new(
        cli_args.profile,
        &cli_args.output,
        &cli_args.color,
        cli_args.quiet,
    )?;

    commands::execute(&ctx, cli_args.command).await
}

/// Initialize tracing/logging for debug mode.
fn init_logging() {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hubstack=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();
}
