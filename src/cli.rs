//! Command-line argument parsing and command definitions.
//!
//! Uses clap with derive macros for type-safe argument parsing.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use crate::config::{PlatformMode, PoolCapacity, Profile};
use crate::provision::secrets::names;

/// hubstack - managed Kubernetes cluster and data-science platform provisioning
#[derive(Parser, Debug)]
#[command(name = "hubstack")]
#[command(version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Profile to use (can also use @profile syntax as first argument)
    #[arg(long, global = true, env = "HUBSTACK_PROFILE")]
    pub profile: Option<String>,

    /// Output format
    #[arg(short, long, global = true, default_value = "table", value_parser = ["table", "json", "yaml", "jsonl"])]
    pub output: String,

    /// Color output mode
    #[arg(long, global = true, default_value = "auto", value_parser = ["auto", "always", "never"])]
    pub color: String,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Derive the cluster, export the snapshot and plan, persist them
    Synth {
        /// Cluster parameters.
        #[command(flatten)]
        cluster: ClusterArgs,

        /// Directory backing the local bucket mirror
        #[arg(long, env = "HUBSTACK_BUCKET_DIR")]
        bucket_dir: Option<PathBuf>,
    },

    /// Show the action graph in submission order
    Plan {
        /// Cluster parameters.
        #[command(flatten)]
        cluster: ClusterArgs,
    },

    /// Show the resource profiles of instance types
    #[command(name = "instance-types")]
    InstanceTypes {
        /// Instance types (e.g., g4dn.xlarge)
        #[arg(required = true)]
        types: Vec<String>,
    },

    /// Resolve the load balancer hosted zone of a region
    Zone {
        /// Region code; lists every known region when omitted
        region: Option<String>,
    },

    /// Configuration management
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the resolved cluster parameters
    Show {
        /// Cluster parameters.
        #[command(flatten)]
        cluster: ClusterArgs,
    },

    /// Show the config file locations
    Path,
}

/// Cluster parameters accepted by every deriving command.
#[derive(Args, Debug, Clone, Default)]
pub struct ClusterArgs {
    /// Short cluster name; the cluster is called eks-<NAME>
    #[arg(long, env = "HUBSTACK_NAME")]
    pub name: Option<String>,

    /// Owner tag
    #[arg(long, env = "HUBSTACK_OWNER")]
    pub owner: Option<String>,

    /// Base domain; leave empty to expose through the CDN
    #[arg(long, env = "HUBSTACK_BASE_DOMAIN")]
    pub base_domain: Option<String>,

    /// Cloud region
    #[arg(long, env = "HUBSTACK_REGION")]
    pub region: Option<String>,

    /// Cloud account id
    #[arg(long, env = "HUBSTACK_ACCOUNT")]
    pub account: Option<String>,

    /// Availability zone of the node pools
    #[arg(long, env = "HUBSTACK_AVAILABILITY_ZONE")]
    pub availability_zone: Option<String>,

    /// Instance type of the CPU user pool
    #[arg(long, env = "HUBSTACK_CPU_INSTANCE")]
    pub cpu_instance: Option<String>,

    /// Instance type of the GPU user pool
    #[arg(long, env = "HUBSTACK_GPU_INSTANCE")]
    pub gpu_instance: Option<String>,

    /// Instance type of the system pool
    #[arg(long, env = "HUBSTACK_SYSTEM_INSTANCE")]
    pub system_instance: Option<String>,

    /// System pool capacity as desired/min/max
    #[arg(long, env = "HUBSTACK_SYSTEM_POOL")]
    pub system_pool: Option<PoolCapacity>,

    /// CPU pool capacity as desired/min/max
    #[arg(long, env = "HUBSTACK_CPU_POOL")]
    pub cpu_pool: Option<PoolCapacity>,

    /// GPU pool capacity as desired/min/max
    #[arg(long, env = "HUBSTACK_GPU_POOL")]
    pub gpu_pool: Option<PoolCapacity>,

    /// Platform edition
    #[arg(long, value_enum, env = "HUBSTACK_MODE")]
    pub mode: Option<PlatformMode>,

    /// Admin email
    #[arg(long, env = "HUBSTACK_EMAIL")]
    pub email: Option<String>,

    /// Platform version pin
    #[arg(long, env = "HUBSTACK_VERSION")]
    pub version: Option<String>,

    /// Existing master role ARN to import
    #[arg(long, env = "HUBSTACK_MASTER_ROLE")]
    pub master_role: Option<String>,

    /// Compute everything but skip the platform release
    #[arg(long, env = "HUBSTACK_DRY_RUN")]
    pub dry_run: bool,

    /// Container registry repository for custom images
    #[arg(long, env = "HUBSTACK_ECR_REPO")]
    pub ecr_repo: Option<String>,

    /// Configuration bucket; an empty value disables persistence
    #[arg(long, env = "HUBSTACK_CONFIG_BUCKET")]
    pub config_bucket: Option<String>,

    /// Object store bucket for the platform
    #[arg(long, env = "HUBSTACK_STORE_BUCKET")]
    pub store_bucket: Option<String>,

    /// Force a password change on first login
    #[arg(long, env = "HUBSTACK_ENFORCE_UPDATE_PASSWORD")]
    pub enforce_update_password: bool,

    /// Known load balancer hostname
    #[arg(long, env = "HUBSTACK_LOAD_BALANCER_HOSTNAME")]
    pub load_balancer_hostname: Option<String>,

    /// Directory the snapshot is written to
    #[arg(long, env = "HUBSTACK_ARTIFACT_DIR")]
    pub artifact_dir: Option<PathBuf>,

    /// Admin password
    #[arg(long)]
    pub admin_password: Option<String>,

    /// Identity provider admin password
    #[arg(long)]
    pub keycloak_password: Option<String>,

    /// Admin UI GraphQL secret
    #[arg(long)]
    pub graphql_secret: Option<String>,

    /// Hub proxy token
    #[arg(long)]
    pub hub_proxy_token: Option<String>,
}

impl ClusterArgs {
    /// The flags as the top profile layer.
    pub fn into_profile(self) -> Profile {
        let secrets: BTreeMap<String, String> = [
            (names::ADMIN_PASSWORD, self.admin_password),
            (names::KEYCLOAK_PASSWORD, self.keycloak_password),
            (names::GRAPHQL_SECRET, self.graphql_secret),
            (names::HUB_PROXY_TOKEN, self.hub_proxy_token),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name.to_string(), v)))
        .collect();

        Profile {
            name: self.name,
            owner: self.owner,
            base_domain: self.base_domain,
            region: self.region,
            account: self.account,
            availability_zone: self.availability_zone,
            cpu_instance: self.cpu_instance,
            gpu_instance: self.gpu_instance,
            system_instance: self.system_instance,
            system_pool: self.system_pool,
            cpu_pool: self.cpu_pool,
            gpu_pool: self.gpu_pool,
            mode: self.mode,
            email: self.email,
            version: self.version,
            master_role: self.master_role,
            dry_run: self.dry_run.then_some(true),
            ecr_repo: self.ecr_repo,
            config_bucket: self.config_bucket,
            store_bucket: self.store_bucket,
            enforce_update_password: self.enforce_update_password.then_some(true),
            load_balancer_hostname: self.load_balancer_hostname,
            artifact_dir: self.artifact_dir,
            secrets,
        }
    }
}

/// Parse @profile prefix from arguments.
///
/// Returns (`profile_name`, `remaining_args`).
pub fn parse_profile_prefix(args: Vec<String>) -> (Option<String>, Vec<String>) {
    let profile = match args.get(1).and_then(|a| a.strip_prefix('@')) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => return (None, args),
    };

    // First arg is the binary name
    let remaining = args.into_iter().enumerate().filter(|(i, _)| *i != 1).map(|(_, a)| a).collect();
    (Some(profile), remaining)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_profile_prefix() {
        let args = vec!["hubstack".to_string(), "@prod".to_string(), "synth".to_string()];
        let (profile, remaining) = parse_profile_prefix(args);
        assert_eq!(profile, Some("prod".to_string()));
        assert_eq!(remaining, vec!["hubstack", "synth"]);
    }

    #[test]
    fn test_parse_profile_prefix_no_profile() {
        let args = vec!["hubstack".to_string(), "synth".to_string()];
        let (profile, remaining) = parse_profile_prefix(args);
        assert!(profile.is_none());
        assert_eq!(remaining, vec!["hubstack", "synth"]);
    }

    #[test]
    fn test_parse_profile_prefix_at_sign_only() {
        let args = vec!["hubstack".to_string(), "@".to_string(), "synth".to_string()];
        let (profile, remaining) = parse_profile_prefix(args);
        assert!(profile.is_none());
        assert_eq!(remaining, vec!["hubstack", "@", "synth"]);
    }

    #[test]
    fn test_cluster_args_into_profile() {
        let cli = Cli::try_parse_from([
            "hubstack",
            "synth",
            "--name",
            "lab",
            "--gpu-pool",
            "1/0/4",
            "--mode",
            "ce",
            "--admin-password",
            "hunter2",
        ])
        .unwrap();
        let Commands::Synth { cluster, .. } = cli.command else {
            panic!("expected synth");
        };

        let profile = cluster.into_profile();
        assert_eq!(profile.name.as_deref(), Some("lab"));
        assert_eq!(profile.gpu_pool, Some(PoolCapacity::new(1, 0, 4)));
        assert_eq!(profile.mode, Some(PlatformMode::Community));
        assert_eq!(profile.dry_run, None);
        assert_eq!(profile.secrets[names::ADMIN_PASSWORD], "hunter2");
        assert_eq!(profile.secrets.len(), 1);
    }

    #[test]
    fn test_bad_capacity_rejected() {
        assert!(Cli::try_parse_from(["hubstack", "plan", "--cpu-pool", "1/2"]).is_err());
    }

    #[test]
    fn test_instance_types_requires_type() {
        assert!(Cli::try_parse_from(["hubstack", "instance-types"]).is_err());
    }
}
