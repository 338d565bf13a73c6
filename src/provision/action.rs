//! Payloads of the actions submitted to the provisioning engine.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::cluster::PoolCapacity;
use crate::provision::engine::HostedZone;

/// One unit of work for the provisioning engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Action {
    /// Cluster administrator role.
    MasterRole(MasterRole),
    /// Managed control plane.
    Cluster(ClusterAction),
    /// Group of worker nodes.
    NodePool(NodePool),
    /// Shared network file system.
    FileSystem(FileSystem),
    /// Helm chart release.
    HelmRelease(HelmRelease),
    /// Raw Kubernetes manifest.
    Manifest(Manifest),
    /// DNS alias record.
    AliasRecord(AliasRecord),
    /// CDN distribution.
    Distribution(Distribution),
    /// Object storage bucket.
    Bucket(Bucket),
    /// Upload of a local directory into a bucket.
    BucketDeployment(BucketDeployment),
}

impl Action {
    /// Serialized kind tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::MasterRole(_) => "masterRole",
            Action::Cluster(_) => "cluster",
            Action::NodePool(_) => "nodePool",
            Action::FileSystem(_) => "fileSystem",
            Action::HelmRelease(_) => "helmRelease",
            Action::Manifest(_) => "manifest",
            Action::AliasRecord(_) => "aliasRecord",
            Action::Distribution(_) => "distribution",
            Action::Bucket(_) => "bucket",
            Action::BucketDeployment(_) => "bucketDeployment",
        }
    }
}

/// Master role: imported by ARN or created by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "camelCase")]
pub enum MasterRole {
    /// Existing role.
    Imported {
        /// Role ARN.
        arn: String,
    },
    /// New role assumable by any principal in the account.
    Created {
        /// Role name.
        role_name: String,
    },
}

/// Managed Kubernetes control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterAction {
    /// Cluster name.
    pub name: String,
    /// Kubernetes version.
    pub kubernetes_version: String,
    /// API endpoint exposure.
    pub endpoint_access: String,
    /// Resource tags.
    pub tags: BTreeMap<String, String>,
}

/// Node taint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Taint {
    /// Taint key.
    pub key: String,
    /// Taint value.
    pub value: String,
    /// Taint effect.
    pub effect: String,
}

impl Taint {
    /// A `NoSchedule` taint.
    pub fn no_schedule(key: &str, value: &str) -> Self {
        Self { key: key.to_string(), value: value.to_string(), effect: "NoSchedule".to_string() }
    }
}

/// Worker node group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePool {
    /// Pool name.
    pub name: String,
    /// Instance type of every node.
    pub instance_type: String,
    /// Node count bounds.
    pub capacity: PoolCapacity,
    /// Availability zone, if pinned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,
    /// Kubelet node labels.
    pub labels: BTreeMap<String, String>,
    /// Kubelet registration taints.
    pub taints: Vec<Taint>,
    /// Resource tags, including autoscaler discovery tags.
    pub tags: BTreeMap<String, String>,
}

/// Shared file system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSystem {
    /// File system name.
    pub name: String,
    /// Resource tags.
    pub tags: BTreeMap<String, String>,
}

/// Helm chart release.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HelmRelease {
    /// Release name.
    pub release: String,
    /// Chart name.
    pub chart: String,
    /// Chart repository URL.
    pub repository: String,
    /// Target namespace.
    pub namespace: String,
    /// Chart version pin.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Create the namespace if missing.
    pub create_namespace: bool,
    /// Wait for the release's resources to become ready.
    pub wait: bool,
    /// Install timeout in minutes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_minutes: Option<u32>,
    /// Chart values.
    pub values: serde_json::Value,
}

/// Kubernetes manifest applied with overwrite.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Manifest {
    /// Manifest body.
    pub manifest: serde_json::Value,
}

/// Wildcard alias record pointing at the load balancer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AliasRecord {
    /// Zone the record is created in.
    pub zone: HostedZone,
    /// Fully qualified record name.
    pub record_name: String,
    /// Alias target DNS name.
    pub target_dns_name: String,
    /// Alias target's canonical hosted zone; empty when unresolved.
    pub target_hosted_zone_id: String,
}

/// CDN distribution fronting the load balancer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Distribution {
    /// Origin hostname.
    pub origin_domain: String,
    /// Protocol used towards the origin.
    pub origin_protocol: String,
    /// Viewer protocol policy at the edge.
    pub viewer_protocol: String,
    /// Headers injected on origin requests.
    pub origin_headers: BTreeMap<String, String>,
    /// Forward every method, header and cookie.
    pub forward_all: bool,
}

/// Object storage bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    /// Bucket name.
    pub name: String,
    /// Delete objects when the bucket is destroyed.
    pub auto_delete_objects: bool,
}

/// Upload of a local directory into a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketDeployment {
    /// Destination bucket.
    pub bucket: String,
    /// Local source directory.
    pub source: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_serialized_tag() {
        let actions = [
            Action::Bucket(Bucket { name: "b".into(), auto_delete_objects: true }),
            Action::Manifest(Manifest { manifest: serde_json::json!({}) }),
            Action::BucketDeployment(BucketDeployment { bucket: "b".into(), source: "s".into() }),
        ];
        for action in actions {
            let json = serde_json::to_value(&action).unwrap();
            assert_eq!(json["kind"], action.kind());
        }
    }

    #[test]
    fn test_no_schedule_taint() {
        let taint = Taint::no_schedule("nvidia.com/gpu", "true");
        assert_eq!(taint.effect, "NoSchedule");
        assert_eq!(taint.key, "nvidia.com/gpu");
    }
}
