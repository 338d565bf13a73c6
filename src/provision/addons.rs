//! Cluster infrastructure and the prerequisite services the platform needs.
//!
//! Each chart gets a typed values struct; [`declare`] turns them into graph
//! actions and wires the obvious ordering edges (everything after the
//! cluster, the issuer after its chart, the storage driver after the file
//! system).

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::config::cluster::{ClusterSpec, KUBERNETES_VERSION, PoolCapacity};
use crate::error::Result;
use crate::provision::action::{
    Action, Bucket, ClusterAction, FileSystem, HelmRelease, Manifest, MasterRole, NodePool, Taint,
};
use crate::provision::engine::Token;
use crate::provision::graph::{ActionId, DependencyGraph};
use crate::provision::instance::{
    COMPONENT_LABEL, DEDICATED_TAINT_KEY, GPU_RESOURCE, INSTANCE_TYPE_LABEL, USER_COMPONENT,
};

/// Namespace of the ingress controller.
pub const INGRESS_NAMESPACE: &str = "ingress-nginx";
/// Release name of the ingress controller.
pub const INGRESS_RELEASE: &str = "nginx-ingress";
/// Storage class backed by the shared file system.
pub const SHARED_STORAGE_CLASS: &str = "efs-sc";
/// Cluster issuer used for ACME certificates.
pub const ISSUER_NAME: &str = "letsencrypt-prod";
/// Namespace the platform is installed into.
pub const PLATFORM_NAMESPACE: &str = "hub";

const NODE_PURPOSE_LABEL: &str = "hub.jupyter.org/node-purpose";
const AUTOSCALER_TAG_PREFIX: &str = "k8s.io/cluster-autoscaler";
const SYSTEM_NAMESPACE: &str = "kube-system";

/// Ids of everything [`declare`] put into the graph.
#[derive(Debug, Clone)]
pub struct Infrastructure {
    /// Cluster administrator role.
    pub master_role: ActionId,
    /// Managed control plane.
    pub cluster: ActionId,
    /// System, CPU and GPU node pools.
    pub node_pools: Vec<ActionId>,
    /// Shared file system.
    pub file_system: ActionId,
    /// Ingress controller release; source of the load balancer hostname.
    pub ingress: ActionId,
    /// Certificate manager release.
    pub cert_manager: ActionId,
    /// ACME cluster issuer manifest.
    pub cluster_issuer: ActionId,
    /// Shared storage driver release.
    pub storage_driver: ActionId,
    /// GPU device plugin release.
    pub device_plugin: ActionId,
    /// Cluster autoscaler release.
    pub autoscaler: ActionId,
    /// Registry credential helper release.
    pub registry_credential: ActionId,
    /// Configuration bucket, when one is configured.
    pub config_bucket: Option<ActionId>,
}

/// Declare the cluster, its node pools and the prerequisite services.
pub fn declare(spec: &ClusterSpec, graph: &mut DependencyGraph<Action>) -> Result<Infrastructure> {
    let cluster_name = spec.cluster_name();
    let tags = spec.common_tags();

    let master_role = graph.add("master-role", Action::MasterRole(master_role(spec)))?;
    let cluster = graph.add(
        "cluster",
        Action::Cluster(ClusterAction {
            name: cluster_name.clone(),
            kubernetes_version: KUBERNETES_VERSION.to_string(),
            endpoint_access: "public".to_string(),
            tags: tags.clone(),
        }),
    )?;
    graph.depends_on(&cluster, &master_role)?;

    let mut node_pools = Vec::new();
    for (name, pool) in [
        ("system-pool", system_pool(spec)),
        ("cpu-pool", user_pool(spec, UserPool::Cpu)),
        ("gpu-pool", user_pool(spec, UserPool::Gpu)),
    ] {
        let id = graph.add(name, Action::NodePool(pool))?;
        graph.depends_on(&id, &cluster)?;
        node_pools.push(id);
    }

    let file_system = graph.add(
        "file-system",
        Action::FileSystem(FileSystem { name: format!("efs-{cluster_name}"), tags: tags.clone() }),
    )?;
    graph.depends_on(&file_system, &cluster)?;

    let ingress = chart(graph, &cluster, "ingress-controller", ingress_release()?)?;
    let cert_manager = chart(graph, &cluster, "cert-manager", cert_manager_release()?)?;

    let cluster_issuer = graph.add(
        "cluster-issuer",
        Action::Manifest(Manifest { manifest: serde_json::to_value(ClusterIssuer::acme())? }),
    )?;
    graph.depends_on(&cluster_issuer, &cert_manager)?;

    let storage_driver = chart(
        graph,
        &cluster,
        "storage-driver",
        storage_driver_release(spec, &file_system)?,
    )?;
    graph.depends_on(&storage_driver, &file_system)?;

    let device_plugin = chart(graph, &cluster, "gpu-device-plugin", device_plugin_release()?)?;
    let autoscaler = chart(graph, &cluster, "cluster-autoscaler", autoscaler_release(spec)?)?;
    let registry_credential =
        chart(graph, &cluster, "registry-credential", registry_credential_release(spec)?)?;

    let config_bucket = match &spec.config_bucket {
        Some(name) => Some(graph.add(
            "config-bucket",
            Action::Bucket(Bucket { name: name.clone(), auto_delete_objects: true }),
        )?),
        None => None,
    };

    debug!(cluster = %cluster_name, actions = graph.len(), "declared infrastructure");

    Ok(Infrastructure {
        master_role,
        cluster,
        node_pools,
        file_system,
        ingress,
        cert_manager,
        cluster_issuer,
        storage_driver,
        device_plugin,
        autoscaler,
        registry_credential,
        config_bucket,
    })
}

fn chart(
    graph: &mut DependencyGraph<Action>,
    cluster: &ActionId,
    name: &str,
    release: HelmRelease,
) -> Result<ActionId> {
    let id = graph.add(name, Action::HelmRelease(release))?;
    graph.depends_on(&id, cluster)?;
    Ok(id)
}

fn master_role(spec: &ClusterSpec) -> MasterRole {
    match &spec.master_role {
        Some(arn) => MasterRole::Imported { arn: arn.clone() },
        None => MasterRole::Created { role_name: format!("{}-master-role", spec.cluster_name()) },
    }
}

fn system_pool(spec: &ClusterSpec) -> NodePool {
    let cluster_name = spec.cluster_name();
    let mut tags = spec.common_tags();
    tags.insert("Name".to_string(), format!("{cluster_name}-default-node-group"));

    NodePool {
        name: "default-node-group".to_string(),
        instance_type: spec.system_instance.to_string(),
        capacity: spec.system_pool,
        availability_zone: spec.availability_zone.clone(),
        labels: BTreeMap::new(),
        taints: Vec::new(),
        tags,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UserPool {
    Cpu,
    Gpu,
}

fn user_pool(spec: &ClusterSpec, kind: UserPool) -> NodePool {
    let cluster_name = spec.cluster_name();
    let (suffix, instance_type, capacity): (_, _, PoolCapacity) = match kind {
        UserPool::Cpu => ("cpu", &spec.cpu_instance, spec.cpu_pool),
        UserPool::Gpu => ("gpu", &spec.gpu_instance, spec.gpu_pool),
    };
    let name = format!("{cluster_name}-scaled-{suffix}-pool");

    let mut labels = BTreeMap::from([
        (COMPONENT_LABEL.to_string(), USER_COMPONENT.to_string()),
        (NODE_PURPOSE_LABEL.to_string(), "user".to_string()),
        (INSTANCE_TYPE_LABEL.to_string(), instance_type.to_string()),
    ]);
    let mut taints = vec![Taint::no_schedule(DEDICATED_TAINT_KEY, "user")];
    if kind == UserPool::Gpu {
        labels.insert(GPU_RESOURCE.to_string(), "true".to_string());
        taints.push(Taint::no_schedule(GPU_RESOURCE, "true"));
    }

    let mut tags = spec.common_tags();
    tags.insert("Name".to_string(), name.clone());
    tags.insert(format!("{AUTOSCALER_TAG_PREFIX}/{cluster_name}"), "owned".to_string());
    tags.insert(format!("{AUTOSCALER_TAG_PREFIX}/enabled"), "TRUE".to_string());
    tags.insert(
        format!("{AUTOSCALER_TAG_PREFIX}/node-template/label/auto-scaler"),
        "enabled".to_string(),
    );
    for (key, value) in &labels {
        tags.insert(format!("{AUTOSCALER_TAG_PREFIX}/node-template/label/{key}"), value.clone());
    }
    for taint in &taints {
        tags.insert(
            format!("{AUTOSCALER_TAG_PREFIX}/node-template/taint/{}", taint.key),
            format!("{}:{}", taint.value, taint.effect),
        );
    }

    NodePool {
        name,
        instance_type: instance_type.to_string(),
        capacity,
        availability_zone: spec.availability_zone.clone(),
        labels,
        taints,
        tags,
    }
}

/// CPU and memory quantities of a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quantities {
    /// CPU quantity, e.g. `250m`.
    pub cpu: String,
    /// Memory quantity, e.g. `100Mi`.
    pub memory: String,
}

impl Quantities {
    fn new(cpu: &str, memory: &str) -> Self {
        Self { cpu: cpu.to_string(), memory: memory.to_string() }
    }
}

/// Container resource limits and requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resources {
    /// Upper bound.
    pub limits: Quantities,
    /// Scheduler reservation.
    pub requests: Quantities,
}

#[derive(Debug, Clone, Serialize)]
struct Enabled {
    enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
struct Create {
    create: bool,
}

/// Values of the ingress controller chart.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressValues {
    rbac: Create,
    /// TCP port -> `namespace/service:port` passthrough.
    pub tcp: BTreeMap<String, String>,
    default_backend: DefaultBackend,
    controller: IngressController,
}

#[derive(Debug, Clone, Serialize)]
struct DefaultBackend {
    enabled: bool,
    resources: Resources,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct IngressController {
    host_network: bool,
    admission_webhooks: Enabled,
    config: BTreeMap<String, String>,
    container_port: BTreeMap<String, u16>,
    service: IngressService,
    resources: Resources,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct IngressService {
    target_ports: BTreeMap<String, String>,
    annotations: BTreeMap<String, String>,
}

impl Default for IngressValues {
    fn default() -> Self {
        let pair = |k: &str, v: &str| (k.to_string(), v.to_string());
        Self {
            rbac: Create { create: true },
            tcp: BTreeMap::from([pair("2222", "hub/ssh-bastion-server:2222")]),
            default_backend: DefaultBackend {
                enabled: true,
                resources: Resources {
                    limits: Quantities::new("250m", "100Mi"),
                    requests: Quantities::new("100m", "64Mi"),
                },
            },
            controller: IngressController {
                host_network: true,
                admission_webhooks: Enabled { enabled: false },
                config: BTreeMap::from([pair("use-forwarded-headers", "true")]),
                container_port: BTreeMap::from([("http".to_string(), 80), ("https".to_string(), 443)]),
                service: IngressService {
                    target_ports: BTreeMap::from([pair("http", "http"), pair("https", "https")]),
                    annotations: BTreeMap::from([
                        pair("service.beta.kubernetes.io/aws-load-balancer-backend-protocol", "tcp"),
                        pair("service.beta.kubernetes.io/aws-load-balancer-type", "nlb"),
                    ]),
                },
                resources: Resources {
                    limits: Quantities::new("250m", "200Mi"),
                    requests: Quantities::new("100m", "100Mi"),
                },
            },
        }
    }
}

fn ingress_release() -> Result<HelmRelease> {
    Ok(HelmRelease {
        release: INGRESS_RELEASE.to_string(),
        chart: "ingress-nginx".to_string(),
        repository: "https://kubernetes.github.io/ingress-nginx".to_string(),
        namespace: INGRESS_NAMESPACE.to_string(),
        version: None,
        create_namespace: true,
        wait: true,
        timeout_minutes: None,
        values: serde_json::to_value(IngressValues::default())?,
    })
}

/// Values of the certificate manager chart.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertManagerValues {
    #[serde(rename = "installCRDs")]
    install_crds: bool,
    ingress_shim: IngressShim,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct IngressShim {
    default_issuer_name: String,
    default_issuer_kind: String,
}

impl Default for CertManagerValues {
    fn default() -> Self {
        Self {
            install_crds: true,
            ingress_shim: IngressShim {
                default_issuer_name: ISSUER_NAME.to_string(),
                default_issuer_kind: "ClusterIssuer".to_string(),
            },
        }
    }
}

fn cert_manager_release() -> Result<HelmRelease> {
    Ok(HelmRelease {
        release: "cert-manager".to_string(),
        chart: "cert-manager".to_string(),
        repository: "https://charts.jetstack.io".to_string(),
        namespace: SYSTEM_NAMESPACE.to_string(),
        version: Some("v0.15.0".to_string()),
        create_namespace: false,
        wait: true,
        timeout_minutes: None,
        values: serde_json::to_value(CertManagerValues::default())?,
    })
}

/// ACME `ClusterIssuer` solving http01 challenges through the nginx class.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterIssuer {
    api_version: String,
    kind: String,
    metadata: ObjectMeta,
    spec: IssuerSpec,
}

#[derive(Debug, Clone, Serialize)]
struct ObjectMeta {
    name: String,
}

#[derive(Debug, Clone, Serialize)]
struct IssuerSpec {
    acme: AcmeIssuer,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct AcmeIssuer {
    email: String,
    server: String,
    private_key_secret_ref: ObjectMeta,
    solvers: Vec<AcmeSolver>,
}

#[derive(Debug, Clone, Serialize)]
struct AcmeSolver {
    http01: Http01Solver,
}

/// HTTP-01 challenges answered through an ingress class.
#[derive(Debug, Clone, Serialize)]
struct Http01Solver {
    ingress: IngressClassRef,
}

#[derive(Debug, Clone, Serialize)]
struct IngressClassRef {
    class: String,
}

impl ClusterIssuer {
    /// Production Let's Encrypt issuer.
    pub fn acme() -> Self {
        Self {
            api_version: "cert-manager.io/v1alpha2".to_string(),
            kind: "ClusterIssuer".to_string(),
            metadata: ObjectMeta { name: ISSUER_NAME.to_string() },
            spec: IssuerSpec {
                acme: AcmeIssuer {
                    email: "support@infuseai.io".to_string(),
                    server: "https://acme-v02.api.letsencrypt.org/directory".to_string(),
                    private_key_secret_ref: ObjectMeta { name: "letsencrypt".to_string() },
                    solvers: vec![AcmeSolver {
                        http01: Http01Solver {
                            ingress: IngressClassRef { class: "nginx".to_string() },
                        },
                    }],
                },
            },
        }
    }
}

/// Values of the shared storage driver chart.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageDriverValues {
    replica_count: u32,
    controller: StorageController,
    /// Storage classes created by the chart.
    pub storage_classes: Vec<StorageClass>,
}

#[derive(Debug, Clone, Serialize)]
struct StorageController {
    tags: BTreeMap<String, String>,
}

/// Storage class bound to the shared file system.
#[derive(Debug, Clone, Serialize)]
pub struct StorageClass {
    /// Class name.
    pub name: String,
    /// Provisioner parameters.
    pub parameters: StorageClassParameters,
}

/// Access point provisioning parameters.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageClassParameters {
    provisioning_mode: String,
    /// File system the access points are cut from; usually a token.
    pub file_system_id: String,
    directory_perms: String,
    gid_range_start: String,
    gid_range_end: String,
}

fn storage_driver_release(spec: &ClusterSpec, file_system: &ActionId) -> Result<HelmRelease> {
    let values = StorageDriverValues {
        replica_count: 1,
        controller: StorageController {
            tags: BTreeMap::from([
                ("owner".to_string(), spec.owner.clone()),
                ("clusterName".to_string(), spec.cluster_name()),
            ]),
        },
        storage_classes: vec![StorageClass {
            name: SHARED_STORAGE_CLASS.to_string(),
            parameters: StorageClassParameters {
                provisioning_mode: "efs-ap".to_string(),
                file_system_id: Token::new(file_system, "fileSystemId").to_string(),
                directory_perms: "777".to_string(),
                gid_range_start: "1000".to_string(),
                gid_range_end: "2000".to_string(),
            },
        }],
    };

    Ok(HelmRelease {
        release: "aws-efs-csi-driver".to_string(),
        chart: "aws-efs-csi-driver".to_string(),
        repository: "https://kubernetes-sigs.github.io/aws-efs-csi-driver/".to_string(),
        namespace: SYSTEM_NAMESPACE.to_string(),
        version: None,
        create_namespace: false,
        wait: true,
        timeout_minutes: None,
        values: serde_json::to_value(values)?,
    })
}

/// A pod toleration as written in chart values.
#[derive(Debug, Clone, Serialize)]
struct ChartToleration {
    #[serde(skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    operator: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    effect: Option<String>,
}

/// Values of the GPU device plugin chart.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DevicePluginValues {
    node_selector: BTreeMap<String, String>,
    tolerations: Vec<ChartToleration>,
}

impl Default for DevicePluginValues {
    fn default() -> Self {
        let tolerate = |key: Option<&str>, effect: Option<&str>| ChartToleration {
            key: key.map(str::to_string),
            operator: "Exists".to_string(),
            effect: effect.map(str::to_string),
        };
        Self {
            node_selector: BTreeMap::from([(GPU_RESOURCE.to_string(), "true".to_string())]),
            tolerations: vec![
                tolerate(Some("CriticalAddonsOnly"), None),
                tolerate(Some(GPU_RESOURCE), Some("NoSchedule")),
                tolerate(None, Some("NoSchedule")),
            ],
        }
    }
}

fn device_plugin_release() -> Result<HelmRelease> {
    Ok(HelmRelease {
        release: "nvidia-device-plugin".to_string(),
        chart: "nvidia-device-plugin".to_string(),
        repository: "https://nvidia.github.io/k8s-device-plugin".to_string(),
        namespace: SYSTEM_NAMESPACE.to_string(),
        version: Some("0.11.0".to_string()),
        create_namespace: false,
        wait: false,
        timeout_minutes: None,
        values: serde_json::to_value(DevicePluginValues::default())?,
    })
}

/// Values of the cluster autoscaler chart.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoscalerValues {
    auto_discovery: AutoDiscovery,
    aws_region: String,
    image: ImageTag,
    extra_args: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct AutoDiscovery {
    cluster_name: String,
}

#[derive(Debug, Clone, Serialize)]
struct ImageTag {
    tag: String,
}

fn autoscaler_release(spec: &ClusterSpec) -> Result<HelmRelease> {
    let values = AutoscalerValues {
        auto_discovery: AutoDiscovery { cluster_name: spec.cluster_name() },
        aws_region: spec.region.clone(),
        image: ImageTag { tag: "v1.21.0".to_string() },
        extra_args: BTreeMap::from([
            ("balance-similar-node-groups".to_string(), "true".to_string()),
            ("skip-nodes-with-system-pods".to_string(), "false".to_string()),
        ]),
    };

    Ok(HelmRelease {
        release: "cluster-autoscaler".to_string(),
        chart: "cluster-autoscaler".to_string(),
        repository: "https://kubernetes.github.io/autoscaler".to_string(),
        namespace: SYSTEM_NAMESPACE.to_string(),
        version: None,
        create_namespace: false,
        wait: false,
        timeout_minutes: None,
        values: serde_json::to_value(values)?,
    })
}

/// Values of the registry credential helper chart.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryCredentialValues {
    aws: AccountRegion,
    target_namespace: String,
}

#[derive(Debug, Clone, Serialize)]
struct AccountRegion {
    account: String,
    region: String,
}

fn registry_credential_release(spec: &ClusterSpec) -> Result<HelmRelease> {
    let values = RegistryCredentialValues {
        aws: AccountRegion { account: spec.account.clone(), region: spec.region.clone() },
        target_namespace: PLATFORM_NAMESPACE.to_string(),
    };

    Ok(HelmRelease {
        release: "aws-ecr-credential".to_string(),
        chart: "aws-ecr-credential".to_string(),
        repository: "https://charts.infuseai.io".to_string(),
        namespace: PLATFORM_NAMESPACE.to_string(),
        version: None,
        create_namespace: true,
        wait: false,
        timeout_minutes: None,
        values: serde_json::to_value(values)?,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::provision::instance::InstanceTypeId;

    fn spec() -> ClusterSpec {
        ClusterSpec::builder()
            .name("dev")
            .owner("ops@example.com")
            .config_bucket("eks-dev-primehub-config")
            .build()
    }

    fn release<'a>(graph: &'a DependencyGraph<Action>, id: &ActionId) -> &'a HelmRelease {
        match graph.action(id) {
            Some(Action::HelmRelease(r)) => r,
            other => panic!("expected helm release, got {other:?}"),
        }
    }

    fn pool<'a>(graph: &'a DependencyGraph<Action>, id: &ActionId) -> &'a NodePool {
        match graph.action(id) {
            Some(Action::NodePool(p)) => p,
            other => panic!("expected node pool, got {other:?}"),
        }
    }

    #[test]
    fn test_declares_everything_after_cluster() {
        let mut graph = DependencyGraph::new();
        let infra = declare(&spec(), &mut graph).unwrap();

        assert_eq!(graph.prerequisites(&infra.cluster), vec![&infra.master_role]);
        for id in [&infra.ingress, &infra.cert_manager, &infra.device_plugin, &infra.autoscaler] {
            assert!(graph.prerequisites(id).contains(&&infra.cluster), "{id}");
        }
        assert_eq!(graph.prerequisites(&infra.cluster_issuer), vec![&infra.cert_manager]);
        assert!(graph.prerequisites(&infra.storage_driver).contains(&&infra.file_system));
        assert!(infra.config_bucket.is_some());
        assert_eq!(infra.node_pools.len(), 3);
    }

    #[test]
    fn test_master_role_import_or_create() {
        let mut graph = DependencyGraph::new();
        let infra = declare(&spec(), &mut graph).unwrap();
        assert_eq!(
            graph.action(&infra.master_role),
            Some(&Action::MasterRole(MasterRole::Created {
                role_name: "eks-dev-master-role".to_string()
            }))
        );

        let imported = ClusterSpec::builder()
            .name("dev")
            .master_role("arn:aws:iam::123:role/admin")
            .build();
        let mut graph = DependencyGraph::new();
        let infra = declare(&imported, &mut graph).unwrap();
        assert!(matches!(
            graph.action(&infra.master_role),
            Some(Action::MasterRole(MasterRole::Imported { arn })) if arn == "arn:aws:iam::123:role/admin"
        ));
    }

    #[test]
    fn test_user_pools_labels_taints_tags() {
        let spec = ClusterSpec::builder()
            .name("dev")
            .gpu_instance(InstanceTypeId::new("g4dn", "2xlarge"))
            .build();
        let mut graph = DependencyGraph::new();
        let infra = declare(&spec, &mut graph).unwrap();

        let system = pool(&graph, &infra.node_pools[0]);
        assert_eq!(system.name, "default-node-group");
        assert!(system.taints.is_empty());

        let cpu = pool(&graph, &infra.node_pools[1]);
        assert_eq!(cpu.name, "eks-dev-scaled-cpu-pool");
        assert_eq!(cpu.labels.get("instance-type").unwrap(), "t3a.xlarge");
        assert_eq!(cpu.labels.get(COMPONENT_LABEL).unwrap(), USER_COMPONENT);
        assert_eq!(cpu.taints, vec![Taint::no_schedule(DEDICATED_TAINT_KEY, "user")]);
        assert_eq!(cpu.tags.get("k8s.io/cluster-autoscaler/eks-dev").unwrap(), "owned");
        assert_eq!(cpu.tags.get("k8s.io/cluster-autoscaler/enabled").unwrap(), "TRUE");
        assert_eq!(
            cpu.tags
                .get("k8s.io/cluster-autoscaler/node-template/taint/hub.jupyter.org/dedicated")
                .unwrap(),
            "user:NoSchedule"
        );
        assert_eq!(cpu.capacity, PoolCapacity::new(0, 0, 2));

        let gpu = pool(&graph, &infra.node_pools[2]);
        assert_eq!(gpu.instance_type, "g4dn.2xlarge");
        assert_eq!(gpu.labels.get(GPU_RESOURCE).unwrap(), "true");
        assert!(gpu.taints.contains(&Taint::no_schedule(GPU_RESOURCE, "true")));
        assert_eq!(
            gpu.tags.get("k8s.io/cluster-autoscaler/node-template/taint/nvidia.com/gpu").unwrap(),
            "true:NoSchedule"
        );
    }

    #[test]
    fn test_ingress_values() {
        let mut graph = DependencyGraph::new();
        let infra = declare(&spec(), &mut graph).unwrap();
        let ingress = release(&graph, &infra.ingress);
        assert_eq!(ingress.namespace, INGRESS_NAMESPACE);
        assert_eq!(ingress.release, INGRESS_RELEASE);
        assert_eq!(ingress.values["tcp"]["2222"], "hub/ssh-bastion-server:2222");
        assert_eq!(ingress.values["controller"]["hostNetwork"], true);
        assert_eq!(
            ingress.values["controller"]["service"]["annotations"]
                ["service.beta.kubernetes.io/aws-load-balancer-type"],
            "nlb"
        );
        assert_eq!(ingress.values["controller"]["config"]["use-forwarded-headers"], "true");
    }

    #[test]
    fn test_cert_manager_and_issuer() {
        let mut graph = DependencyGraph::new();
        let infra = declare(&spec(), &mut graph).unwrap();
        let cm = release(&graph, &infra.cert_manager);
        assert_eq!(cm.version.as_deref(), Some("v0.15.0"));
        assert_eq!(cm.values["installCRDs"], true);
        assert_eq!(cm.values["ingressShim"]["defaultIssuerName"], ISSUER_NAME);

        let Some(Action::Manifest(issuer)) = graph.action(&infra.cluster_issuer) else {
            panic!("expected manifest");
        };
        assert_eq!(issuer.manifest["kind"], "ClusterIssuer");
        assert_eq!(issuer.manifest["spec"]["acme"]["solvers"][0]["http01"]["ingress"]["class"], "nginx");
    }

    #[test]
    fn test_storage_driver_references_file_system() {
        let mut graph = DependencyGraph::new();
        let infra = declare(&spec(), &mut graph).unwrap();
        let driver = release(&graph, &infra.storage_driver);
        let class = &driver.values["storageClasses"][0];
        assert_eq!(class["name"], SHARED_STORAGE_CLASS);
        assert_eq!(class["parameters"]["fileSystemId"], "${file-system.fileSystemId}");
        assert_eq!(driver.values["controller"]["tags"]["owner"], "ops@example.com");
    }

    #[test]
    fn test_device_plugin_pinned_to_gpu_nodes() {
        let mut graph = DependencyGraph::new();
        let infra = declare(&spec(), &mut graph).unwrap();
        let plugin = release(&graph, &infra.device_plugin);
        assert_eq!(plugin.version.as_deref(), Some("0.11.0"));
        assert_eq!(plugin.values["nodeSelector"][GPU_RESOURCE], "true");
        assert_eq!(plugin.values["tolerations"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_no_config_bucket() {
        let spec = ClusterSpec::builder().name("dev").build();
        let mut graph = DependencyGraph::new();
        let infra = declare(&spec, &mut graph).unwrap();
        assert!(infra.config_bucket.is_none());
    }
}
