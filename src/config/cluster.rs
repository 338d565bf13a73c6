//! The resolved, immutable description of one cluster.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::provision::instance::InstanceTypeId;

/// Region used when none is configured.
pub const DEFAULT_REGION: &str = "us-east-1";
/// Kubernetes version of the managed control plane.
pub const KUBERNETES_VERSION: &str = "1.20";
/// Tag value identifying clusters created by this tool.
pub const CLUSTER_TYPE: &str = "dev-eks";

/// Platform edition installed on the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum PlatformMode {
    /// Enterprise edition.
    #[default]
    #[serde(rename = "ee")]
    #[value(name = "ee")]
    Enterprise,
    /// Community edition.
    #[serde(rename = "ce")]
    #[value(name = "ce")]
    Community,
}

impl PlatformMode {
    /// Short mode code passed to the installer.
    pub fn as_str(self) -> &'static str {
        match self {
            PlatformMode::Enterprise => "ee",
            PlatformMode::Community => "ce",
        }
    }
}

impl fmt::Display for PlatformMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ee" | "enterprise" => Ok(Self::Enterprise),
            "ce" | "community" => Ok(Self::Community),
            other => Err(Error::config(format!("Unknown platform mode '{other}'. Use: ee, ce"))),
        }
    }
}

/// Desired, minimum and maximum node count of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolCapacity {
    /// Nodes to start with.
    pub desired: u32,
    /// Lower autoscaling bound.
    pub min: u32,
    /// Upper autoscaling bound.
    pub max: u32,
}

impl PoolCapacity {
    /// Create a capacity triple.
    pub const fn new(desired: u32, min: u32, max: u32) -> Self {
        Self { desired, min, max }
    }

    /// Check `min <= desired <= max`.
    pub fn validate(&self, pool: &str) -> Result<()> {
        if self.min <= self.desired && self.desired <= self.max {
            Ok(())
        } else {
            Err(Error::config(format!(
                "{pool} pool capacity must satisfy min <= desired <= max (got min={}, desired={}, max={})",
                self.min, self.desired, self.max
            )))
        }
    }
}

impl FromStr for PoolCapacity {
    type Err = Error;

    /// Parse `desired/min/max`, e.g. `1/1/3`.
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<_> = s.split('/').map(str::trim).collect();
        let [desired, min, max] = parts.as_slice() else {
            return Err(Error::config(format!("Invalid capacity '{s}': expected desired/min/max")));
        };
        let num = |v: &str| {
            v.parse::<u32>()
                .map_err(|_| Error::config(format!("Invalid capacity '{s}': '{v}' is not a number")))
        };
        Ok(Self::new(num(desired)?, num(min)?, num(max)?))
    }
}

/// Secret values supplied from outside, keyed by secret name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretSources {
    /// Flag or config file values.
    pub explicit: BTreeMap<String, String>,
    /// Values captured from the environment.
    pub environment: BTreeMap<String, String>,
}

impl SecretSources {
    /// Explicit override for a secret.
    pub fn explicit(&self, name: &str) -> Option<&str> {
        self.explicit.get(name).map(String::as_str)
    }

    /// Environment fallback for a secret.
    pub fn environment(&self, name: &str) -> Option<&str> {
        self.environment.get(name).map(String::as_str)
    }
}

/// Every parameter of one provisioning run.
///
/// Produced once by [`crate::config::resolve`] and passed explicitly to each
/// derivation step.
#[derive(Debug, Clone, Builder, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    /// Short name; the cluster itself is called `eks-<name>`.
    #[builder(into)]
    pub name: String,

    /// Owner tag and autoscaler/storage tag value.
    #[builder(into, default = String::from("dev@example.com"))]
    pub owner: String,

    /// Base domain; empty selects the CDN exposure strategy.
    #[builder(into, default)]
    pub base_domain: String,

    /// Cloud region code.
    #[builder(into, default = String::from(DEFAULT_REGION))]
    pub region: String,

    /// Cloud account id.
    #[builder(into, default)]
    pub account: String,

    /// Availability zone the pools are placed in.
    #[builder(into)]
    pub availability_zone: Option<String>,

    /// Instance type of the CPU user pool.
    #[builder(default = InstanceTypeId::new("t3a", "xlarge"))]
    pub cpu_instance: InstanceTypeId,

    /// Instance type of the GPU user pool.
    #[builder(default = InstanceTypeId::new("g4dn", "xlarge"))]
    pub gpu_instance: InstanceTypeId,

    /// Instance type of the system pool.
    #[builder(default = InstanceTypeId::new("t3a", "xlarge"))]
    pub system_instance: InstanceTypeId,

    /// System pool capacity.
    #[builder(default = PoolCapacity::new(1, 1, 3))]
    pub system_pool: PoolCapacity,

    /// CPU user pool capacity.
    #[builder(default = PoolCapacity::new(0, 0, 2))]
    pub cpu_pool: PoolCapacity,

    /// GPU user pool capacity.
    #[builder(default = PoolCapacity::new(0, 0, 2))]
    pub gpu_pool: PoolCapacity,

    /// Platform edition.
    #[builder(default)]
    pub mode: PlatformMode,

    /// Admin email.
    #[builder(into, default = String::from("admin@example.com"))]
    pub email: String,

    /// Platform chart version pin.
    #[builder(into)]
    pub version: Option<String>,

    /// Existing master role ARN to import.
    #[builder(into)]
    pub master_role: Option<String>,

    /// Compute everything but skip the platform release.
    #[builder(default)]
    pub dry_run: bool,

    /// Container registry repository for custom images.
    #[builder(into, default = String::from("primehub"))]
    pub ecr_repo: String,

    /// Bucket receiving the configuration snapshot.
    #[builder(into)]
    pub config_bucket: Option<String>,

    /// Bucket backing the platform's object store feature.
    #[builder(into)]
    pub store_bucket: Option<String>,

    /// Force the admin to change the bootstrap password on first login.
    #[builder(default)]
    pub enforce_update_password: bool,

    /// Known load balancer hostname, instead of the engine-reported one.
    #[builder(into)]
    pub load_balancer_hostname: Option<String>,

    /// External secret sources.
    #[builder(default)]
    #[serde(skip)]
    pub secrets: SecretSources,
}

impl ClusterSpec {
    /// Full cluster name.
    pub fn cluster_name(&self) -> String {
        format!("eks-{}", self.name)
    }

    /// Base domain if one was supplied.
    pub fn base_domain(&self) -> Option<&str> {
        Some(self.base_domain.as_str()).filter(|d| !d.is_empty())
    }

    /// Distinct user instance types, CPU first.
    pub fn user_instance_types(&self) -> Vec<&InstanceTypeId> {
        let mut types = vec![&self.cpu_instance];
        if self.gpu_instance != self.cpu_instance {
            types.push(&self.gpu_instance);
        }
        types
    }

    /// Tags carried by every declared resource.
    pub fn common_tags(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("owner".to_string(), self.owner.clone()),
            ("clusterName".to_string(), self.cluster_name()),
            ("clusterType".to_string(), CLUSTER_TYPE.to_string()),
        ])
    }

    /// Check the parameters before anything is provisioned.
    pub fn validate(&self) -> Result<()> {
        let valid_label = !self.name.is_empty()
            && self.cluster_name().len() <= 63
            && self.name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
            && !self.name.starts_with('-')
            && !self.name.ends_with('-');
        if !valid_label {
            return Err(Error::config(format!(
                "Invalid cluster name '{}': use lowercase letters, digits and '-'",
                self.name
            )));
        }

        if let Some(domain) = self.base_domain() {
            match url::Host::parse(domain) {
                Ok(url::Host::Domain(_)) => {}
                _ => {
                    return Err(Error::config(format!("Invalid base domain '{domain}'")));
                }
            }
        }

        self.system_pool.validate("system")?;
        self.cpu_pool.validate("CPU")?;
        self.gpu_pool.validate("GPU")?;

        if self.region.is_empty() {
            return Err(Error::config("Region must not be empty"));
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let spec = ClusterSpec::builder().name("dev").build();
        assert_eq!(spec.cluster_name(), "eks-dev");
        assert_eq!(spec.region, DEFAULT_REGION);
        assert_eq!(spec.cpu_instance.to_string(), "t3a.xlarge");
        assert_eq!(spec.gpu_instance.to_string(), "g4dn.xlarge");
        assert_eq!(spec.mode, PlatformMode::Enterprise);
        assert!(spec.base_domain().is_none());
        assert!(!spec.dry_run);
        spec.validate().unwrap();
    }

    #[test]
    fn test_invalid_name() {
        for name in ["", "Dev", "dev_1", "-dev", "dev-"] {
            let spec = ClusterSpec::builder().name(name).build();
            assert!(matches!(spec.validate(), Err(Error::Config(_))), "{name:?}");
        }
    }

    #[test]
    fn test_invalid_domain() {
        let spec = ClusterSpec::builder().name("dev").base_domain("not a domain").build();
        assert!(spec.validate().is_err());
        let spec = ClusterSpec::builder().name("dev").base_domain("aws.example.io").build();
        spec.validate().unwrap();
    }

    #[test]
    fn test_pool_capacity() {
        assert_eq!("1/1/3".parse::<PoolCapacity>().unwrap(), PoolCapacity::new(1, 1, 3));
        assert!("1/1".parse::<PoolCapacity>().is_err());
        assert!("a/1/3".parse::<PoolCapacity>().is_err());
        assert!(PoolCapacity::new(4, 1, 3).validate("cpu").is_err());
        assert!(PoolCapacity::new(0, 1, 3).validate("cpu").is_err());
    }

    #[test]
    fn test_user_instance_types_deduplicated() {
        let same = ClusterSpec::builder()
            .name("dev")
            .gpu_instance(InstanceTypeId::new("t3a", "xlarge"))
            .build();
        assert_eq!(same.user_instance_types().len(), 1);
        let spec = ClusterSpec::builder().name("dev").build();
        assert_eq!(spec.user_instance_types().len(), 2);
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("ee".parse::<PlatformMode>().unwrap(), PlatformMode::Enterprise);
        assert_eq!("Community".parse::<PlatformMode>().unwrap(), PlatformMode::Community);
        assert!("deploy".parse::<PlatformMode>().is_err());
    }
}
