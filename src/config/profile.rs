//! Profiles: named, partial sets of cluster parameters.
//!
//! Every field is optional. Layers are stacked with [`Profile::overlay`]:
//! profile from the config file, then values from the environment, then
//! command-line flags. Whatever is still unset after the last layer takes
//! its hard default during resolution.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::cluster::{PlatformMode, PoolCapacity};

/// A partial set of cluster parameters.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Profile {
    /// Short cluster name.
    pub name: Option<String>,
    /// Owner tag.
    pub owner: Option<String>,
    /// Base domain; empty selects the CDN.
    pub base_domain: Option<String>,
    /// Cloud region.
    pub region: Option<String>,
    /// Cloud account id.
    pub account: Option<String>,
    /// Availability zone of the node pools.
    pub availability_zone: Option<String>,
    /// CPU user pool instance type.
    pub cpu_instance: Option<String>,
    /// GPU user pool instance type.
    pub gpu_instance: Option<String>,
    /// System pool instance type.
    pub system_instance: Option<String>,
    /// System pool capacity.
    pub system_pool: Option<PoolCapacity>,
    /// CPU pool capacity.
    pub cpu_pool: Option<PoolCapacity>,
    /// GPU pool capacity.
    pub gpu_pool: Option<PoolCapacity>,
    /// Platform edition.
    pub mode: Option<PlatformMode>,
    /// Admin email.
    pub email: Option<String>,
    /// Platform version pin.
    pub version: Option<String>,
    /// Master role ARN to import.
    pub master_role: Option<String>,
    /// Skip the platform release.
    pub dry_run: Option<bool>,
    /// Container registry repository.
    pub ecr_repo: Option<String>,
    /// Configuration bucket; empty disables persistence.
    pub config_bucket: Option<String>,
    /// Object store bucket.
    pub store_bucket: Option<String>,
    /// Force a password change on first login.
    pub enforce_update_password: Option<bool>,
    /// Known load balancer hostname.
    pub load_balancer_hostname: Option<String>,
    /// Where snapshots are written.
    pub artifact_dir: Option<PathBuf>,
    /// Explicit secret values keyed by secret name.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub secrets: BTreeMap<String, String>,
}

macro_rules! overlay_fields {
    ($self:ident, $other:ident, $($field:ident),* $(,)?) => {
        $(
            if $other.$field.is_some() {
                $self.$field = $other.$field;
            }
        )*
    };
}

impl Profile {
    /// Stack `other` on top of this profile; set fields in `other` win.
    pub fn overlay(mut self, other: Self) -> Self {
        overlay_fields!(
            self,
            other,
            name,
            owner,
            base_domain,
            region,
            account,
            availability_zone,
            cpu_instance,
            gpu_instance,
            system_instance,
            system_pool,
            cpu_pool,
            gpu_pool,
            mode,
            email,
            version,
            master_role,
            dry_run,
            ecr_repo,
            config_bucket,
            store_bucket,
            enforce_update_password,
            load_balancer_hostname,
            artifact_dir,
        );
        self.secrets.extend(other.secrets);
        self
    }

    /// Whether no field is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_prefers_set_fields() {
        let base = Profile {
            name: Some("base".into()),
            region: Some("us-west-2".into()),
            secrets: BTreeMap::from([("admin-password".into(), "a".into())]),
            ..Profile::default()
        };
        let top = Profile {
            name: Some("top".into()),
            dry_run: Some(true),
            secrets: BTreeMap::from([("keycloak-password".into(), "k".into())]),
            ..Profile::default()
        };

        let merged = base.overlay(top);
        assert_eq!(merged.name.as_deref(), Some("top"));
        assert_eq!(merged.region.as_deref(), Some("us-west-2"));
        assert_eq!(merged.dry_run, Some(true));
        assert_eq!(merged.secrets.len(), 2);
    }

    #[test]
    fn test_yaml_shape() {
        let yaml = r"
name: lab
base_domain: aws.example.io
gpu_instance: g4dn.2xlarge
gpu_pool: { desired: 1, min: 0, max: 4 }
mode: ce
secrets:
  admin-password: hunter2
";
        let profile: Profile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(profile.name.as_deref(), Some("lab"));
        assert_eq!(profile.gpu_pool, Some(PoolCapacity::new(1, 0, 4)));
        assert_eq!(profile.mode, Some(PlatformMode::Community));
        assert_eq!(profile.secrets["admin-password"], "hunter2");
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(serde_yaml::from_str::<Profile>("nmae: typo\n").is_err());
    }

    #[test]
    fn test_is_empty() {
        assert!(Profile::default().is_empty());
        assert!(!Profile { email: Some("a@b.c".into()), ..Profile::default() }.is_empty());
    }
}
