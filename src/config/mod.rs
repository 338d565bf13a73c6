//! Configuration system for hubstack.
//!
//! The configuration follows the XDG Base Directory Specification and supports:
//! - User config: `~/.config/hubstack/config.yaml`
//! - Project config: `.hubstack.yaml` in the current directory
//! - Environment variables: `HUBSTACK_*` flags plus the cloud SDK variables
//! - Command-line flags (highest precedence)
//!
//! All of it is resolved once, at the start of a run, into an immutable
//! [`ClusterSpec`].

pub mod cluster;
mod profile;

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

pub use cluster::{ClusterSpec, PlatformMode, PoolCapacity, SecretSources};
pub use profile::Profile;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::provision::instance::InstanceTypeId;
use crate::provision::secrets::names;

/// Directory name under the XDG base directories.
const APP_DIR: &str = "hubstack";
/// Project config file name.
pub const PROJECT_CONFIG_FILE: &str = ".hubstack.yaml";
/// Default snapshot directory.
pub const DEFAULT_ARTIFACT_DIR: &str = "./artifact";
/// Cluster short name used when none is configured.
pub const DEFAULT_NAME: &str = "cdk";

/// Environment variables supplying secret values, by secret name.
pub const SECRET_ENV_VARS: &[(&str, &str)] = &[
    (names::ADMIN_PASSWORD, "PH_PASSWORD"),
    (names::KEYCLOAK_PASSWORD, "KC_PASSWORD"),
    (names::GRAPHQL_SECRET, "ADMIN_UI_GRAPHQL_SECRET_KEY"),
    (names::HUB_PROXY_TOKEN, "HUB_PROXY_SECRET_TOKEN"),
];

/// Cloud SDK variables consulted for region and account.
const REGION_ENV_VARS: &[&str] = &["AWS_REGION", "AWS_DEFAULT_REGION", "CDK_DEFAULT_REGION"];
const ACCOUNT_ENV_VARS: &[&str] = &["AWS_ACCOUNT_ID", "CDK_DEFAULT_ACCOUNT"];

/// Main configuration file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Name of the default profile to use.
    #[serde(default)]
    pub default_profile: Option<String>,

    /// Named profiles for different clusters.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Config {
    /// Load configuration from the user and project files.
    ///
    /// Resolution order (highest to lowest):
    /// 1. CLI flags and environment (handled by [`resolve`])
    /// 2. Project config (`.hubstack.yaml`)
    /// 3. User config (`~/.config/hubstack/config.yaml`)
    /// 4. Defaults
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = Self::user_config_path()
            && path.exists()
        {
            config.merge(Self::load_from_file(&path)?);
        }

        let project_path = PathBuf::from(PROJECT_CONFIG_FILE);
        if project_path.exists() {
            config.merge(Self::load_from_file(&project_path)?);
        }

        Ok(config)
    }

    /// Load configuration from a YAML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        serde_yaml::from_str(&contents).map_err(|e| {
            Error::config(format!("Failed to parse config file {}: {}", path.display(), e))
        })
    }

    /// Merge another config into this one (other takes precedence).
    fn merge(&mut self, other: Self) {
        if other.default_profile.is_some() {
            self.default_profile = other.default_profile;
        }

        for (name, profile) in other.profiles {
            self.profiles.insert(name, profile);
        }
    }

    /// Get the path to the user config file.
    #[must_use]
    pub fn user_config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("config.yaml"))
    }

    /// Get the path to the user config directory.
    ///
    /// - If `XDG_CONFIG_HOME` is set, uses `$XDG_CONFIG_HOME/hubstack`
    /// - Linux/macOS: Falls back to `~/.config/hubstack`
    /// - Windows: Falls back to `%APPDATA%\hubstack`
    #[must_use]
    pub fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME")
            && !xdg_config.is_empty()
        {
            return Some(PathBuf::from(xdg_config).join(APP_DIR));
        }

        #[cfg(windows)]
        {
            dirs::config_dir().map(|p| p.join(APP_DIR))
        }

        #[cfg(not(windows))]
        {
            dirs::home_dir().map(|p| p.join(".config").join(APP_DIR))
        }
    }

    /// Get the path to the data directory.
    ///
    /// - If `XDG_DATA_HOME` is set, uses `$XDG_DATA_HOME/hubstack`
    /// - Linux/macOS: Falls back to `~/.local/share/hubstack`
    /// - Windows: Falls back to `%APPDATA%\hubstack`
    ///
    /// Holds the local bucket mirror.
    #[must_use]
    pub fn data_dir() -> Option<PathBuf> {
        if let Ok(xdg_data) = std::env::var("XDG_DATA_HOME")
            && !xdg_data.is_empty()
        {
            return Some(PathBuf::from(xdg_data).join(APP_DIR));
        }

        #[cfg(windows)]
        {
            dirs::data_dir().map(|p| p.join(APP_DIR))
        }

        #[cfg(not(windows))]
        {
            dirs::home_dir().map(|p| p.join(".local").join("share").join(APP_DIR))
        }
    }

    /// Get a profile by name.
    #[must_use]
    pub fn get_profile(&self, name: &str) -> Option<&Profile> {
        self.profiles.get(name)
    }

    /// Get the effective profile.
    ///
    /// An explicitly named profile must exist; otherwise the default
    /// profile is used if set, else an empty profile.
    pub fn get_effective_profile(&self, profile_name: Option<&str>) -> Result<Profile> {
        if let Some(name) = profile_name {
            return self
                .get_profile(name)
                .cloned()
                .ok_or_else(|| Error::ProfileNotFound(name.to_string()));
        }

        match &self.default_profile {
            Some(name) => self
                .get_profile(name)
                .cloned()
                .ok_or_else(|| Error::ProfileNotFound(name.clone())),
            None => Ok(Profile::default()),
        }
    }
}

/// The process environment, captured once at the start of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    /// Read every variable hubstack consults.
    pub fn capture() -> Self {
        let names = SECRET_ENV_VARS
            .iter()
            .map(|(_, var)| *var)
            .chain(REGION_ENV_VARS.iter().copied())
            .chain(ACCOUNT_ENV_VARS.iter().copied());

        let vars = names
            .filter_map(|name| std::env::var(name).ok().map(|v| (name.to_string(), v)))
            .collect();
        Self { vars }
    }

    /// Value of a captured variable, if set and non-empty.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str).filter(|v| !v.is_empty())
    }

    fn first_of(&self, names: &[&str]) -> Option<String> {
        names.iter().find_map(|n| self.get(n)).map(str::to_string)
    }

    /// Parameters the environment supplies, as a profile layer.
    pub fn as_profile(&self) -> Profile {
        Profile {
            region: self.first_of(REGION_ENV_VARS),
            account: self.first_of(ACCOUNT_ENV_VARS),
            ..Profile::default()
        }
    }

    /// Secret values from the environment, keyed by secret name.
    pub fn secrets(&self) -> BTreeMap<String, String> {
        SECRET_ENV_VARS
            .iter()
            .filter_map(|(secret, var)| self.get(var).map(|v| (secret.to_string(), v.to_string())))
            .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Environment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self { vars: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }
}

/// Result of configuration resolution.
#[derive(Debug, Clone)]
pub struct Resolved {
    /// The cluster parameters.
    pub spec: ClusterSpec,
    /// Where the snapshot is written.
    pub artifact_dir: PathBuf,
}

/// Resolve every parameter of a run.
///
/// Precedence: `flags` > environment > selected profile > hard default.
pub fn resolve(
    config: &Config,
    profile_name: Option<&str>,
    flags: Profile,
    env: &Environment,
) -> Result<Resolved> {
    let merged = config.get_effective_profile(profile_name)?.overlay(env.as_profile()).overlay(flags);
    debug!(profile = ?profile_name, "resolved configuration layers");

    let parse_type = |value: Option<&String>, default: &str| -> Result<InstanceTypeId> {
        value.map_or(default, String::as_str).parse()
    };

    let name = merged.name.clone().unwrap_or_else(|| DEFAULT_NAME.to_string());
    let config_bucket = match merged.config_bucket {
        Some(bucket) if bucket.is_empty() => None,
        Some(bucket) => Some(bucket),
        None => Some(format!("eks-{name}-primehub-config")),
    };

    let spec = ClusterSpec::builder()
        .name(name)
        .maybe_owner(merged.owner)
        .maybe_base_domain(merged.base_domain)
        .maybe_region(merged.region)
        .maybe_account(merged.account)
        .maybe_availability_zone(merged.availability_zone)
        .cpu_instance(parse_type(merged.cpu_instance.as_ref(), "t3a.xlarge")?)
        .gpu_instance(parse_type(merged.gpu_instance.as_ref(), "g4dn.xlarge")?)
        .system_instance(parse_type(merged.system_instance.as_ref(), "t3a.xlarge")?)
        .maybe_system_pool(merged.system_pool)
        .maybe_cpu_pool(merged.cpu_pool)
        .maybe_gpu_pool(merged.gpu_pool)
        .maybe_mode(merged.mode)
        .maybe_email(merged.email)
        .maybe_version(merged.version)
        .maybe_master_role(merged.master_role)
        .maybe_dry_run(merged.dry_run)
        .maybe_ecr_repo(merged.ecr_repo)
        .maybe_config_bucket(config_bucket)
        .maybe_store_bucket(merged.store_bucket)
        .maybe_enforce_update_password(merged.enforce_update_password)
        .maybe_load_balancer_hostname(merged.load_balancer_hostname)
        .secrets(SecretSources { explicit: merged.secrets, environment: env.secrets() })
        .build();

    spec.validate()?;

    Ok(Resolved {
        spec,
        artifact_dir: merged.artifact_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_ARTIFACT_DIR)),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config_with(name: &str, profile: Profile) -> Config {
        let mut config = Config::default();
        config.profiles.insert(name.to_string(), profile);
        config
    }

    #[test]
    fn test_defaults() {
        let resolved =
            resolve(&Config::default(), None, Profile::default(), &Environment::default()).unwrap();
        let spec = resolved.spec;
        assert_eq!(spec.name, DEFAULT_NAME);
        assert_eq!(spec.cluster_name(), "eks-cdk");
        assert_eq!(spec.owner, "dev@example.com");
        assert_eq!(spec.region, "us-east-1");
        assert_eq!(spec.system_pool, PoolCapacity::new(1, 1, 3));
        assert_eq!(spec.config_bucket.as_deref(), Some("eks-cdk-primehub-config"));
        assert_eq!(resolved.artifact_dir, PathBuf::from(DEFAULT_ARTIFACT_DIR));
    }

    #[test]
    fn test_precedence_flag_env_profile() {
        let config = config_with(
            "lab",
            Profile {
                name: Some("lab".into()),
                region: Some("eu-west-1".into()),
                email: Some("profile@example.com".into()),
                ..Profile::default()
            },
        );
        let env: Environment = [("AWS_REGION", "ap-northeast-1")].into_iter().collect();

        let spec = resolve(&config, Some("lab"), Profile::default(), &env).unwrap().spec;
        assert_eq!(spec.region, "ap-northeast-1");
        assert_eq!(spec.email, "profile@example.com");

        let flags = Profile { region: Some("us-west-2".into()), ..Profile::default() };
        let spec = resolve(&config, Some("lab"), flags, &env).unwrap().spec;
        assert_eq!(spec.region, "us-west-2");
        assert_eq!(spec.name, "lab");
    }

    #[test]
    fn test_missing_profile() {
        let err = resolve(&Config::default(), Some("nope"), Profile::default(), &Environment::default())
            .unwrap_err();
        assert!(matches!(err, Error::ProfileNotFound(_)));
    }

    #[test]
    fn test_default_profile_used() {
        let mut config = config_with("lab", Profile { name: Some("lab".into()), ..Profile::default() });
        config.default_profile = Some("lab".into());
        let spec = resolve(&config, None, Profile::default(), &Environment::default()).unwrap().spec;
        assert_eq!(spec.name, "lab");
    }

    #[test]
    fn test_malformed_instance_type_is_config_error() {
        let flags = Profile { cpu_instance: Some("t3axlarge".into()), ..Profile::default() };
        let err = resolve(&Config::default(), None, flags, &Environment::default()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_secret_sources() {
        let env: Environment =
            [("PH_PASSWORD", "env-admin"), ("KC_PASSWORD", "")].into_iter().collect();
        let flags = Profile {
            secrets: BTreeMap::from([(names::KEYCLOAK_PASSWORD.to_string(), "flag-kc".to_string())]),
            ..Profile::default()
        };
        let spec = resolve(&Config::default(), None, flags, &env).unwrap().spec;
        assert_eq!(spec.secrets.environment(names::ADMIN_PASSWORD), Some("env-admin"));
        assert_eq!(spec.secrets.environment(names::KEYCLOAK_PASSWORD), None);
        assert_eq!(spec.secrets.explicit(names::KEYCLOAK_PASSWORD), Some("flag-kc"));
    }

    #[test]
    fn test_empty_config_bucket_disables_persistence() {
        let flags = Profile { config_bucket: Some(String::new()), ..Profile::default() };
        let spec = resolve(&Config::default(), None, flags, &Environment::default()).unwrap().spec;
        assert!(spec.config_bucket.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "default_profile: lab\nprofiles:\n  lab:\n    name: lab\n    base_domain: aws.example.io\n",
        )
        .unwrap();
        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.default_profile.as_deref(), Some("lab"));
        assert_eq!(
            config.get_profile("lab").unwrap().base_domain.as_deref(),
            Some("aws.example.io")
        );

        std::fs::write(&path, "profiles: [not, a, map]\n").unwrap();
        assert!(matches!(Config::load_from_file(&path), Err(Error::Config(_))));
    }
}
