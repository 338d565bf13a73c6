//! Values of the platform release.
//!
//! Every derived value the platform installer consumes ends up here: the
//! exposure decision, the materialized secrets and the resource profiles.
//! The same struct is installed as chart values and exported as the
//! configuration snapshot.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::cluster::ClusterSpec;
use crate::provision::addons::SHARED_STORAGE_CLASS;
use crate::provision::exposure::NetworkExposure;
use crate::provision::instance::{ResourceProfile, Toleration};
use crate::provision::secrets::{names, RandomnessProvider, SecretMaterializer, SecretValue};

/// Storage class of block volumes.
pub const BLOCK_STORAGE_CLASS: &str = "gp2";
/// Secret name of the ingress TLS certificate.
pub const TLS_SECRET_NAME: &str = "hub-tls";

/// The secrets the platform consumes.
#[derive(Debug, Clone)]
pub struct PlatformSecrets {
    /// Bootstrap admin password.
    pub admin_password: SecretValue,
    /// Identity provider admin password.
    pub keycloak_password: SecretValue,
    /// Shared GraphQL secret.
    pub graphql_secret: SecretValue,
    /// Hub auth-state encryption key; the same secret as `graphql_secret`.
    pub auth_state_key: SecretValue,
    /// Hub proxy token.
    pub hub_proxy_token: SecretValue,
}

impl PlatformSecrets {
    /// Materialize every platform secret from the cluster's secret sources.
    pub fn materialize<R: RandomnessProvider>(
        spec: &ClusterSpec,
        materializer: &mut SecretMaterializer<R>,
    ) -> Self {
        let sources = &spec.secrets;
        let mut get = |name: &str| {
            materializer.get(name, sources.explicit(name), sources.environment(name))
        };

        let admin_password = get(names::ADMIN_PASSWORD);
        let keycloak_password = get(names::KEYCLOAK_PASSWORD);
        let graphql_secret = get(names::GRAPHQL_SECRET);
        let hub_proxy_token = get(names::HUB_PROXY_TOKEN);
        // The hub encrypts auth state with the GraphQL secret.
        let auth_state_key = materializer.get(names::GRAPHQL_SECRET, None, None);

        Self { admin_password, keycloak_password, graphql_secret, auth_state_key, hub_proxy_token }
    }
}

/// Chart values of the platform release.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformValues {
    /// Registry used for custom images.
    pub custom_image: CustomImage,
    /// Core platform settings.
    pub primehub: CoreSettings,
    /// Identity provider.
    pub keycloak: Keycloak,
    /// Ingress of the platform.
    pub ingress: Ingress,
    /// Group volumes.
    pub groupvolume: StorageClassRef,
    /// Initial admin and instance types.
    pub bootstrap: Bootstrap,
    /// GraphQL API.
    pub graphql: Graphql,
    /// Usage database.
    pub usage: Usage,
    /// Object store feature.
    pub store: Store,
    /// S3 gateway.
    pub minio: Minio,
    /// Notebook hub.
    pub jupyterhub: Jupyterhub,
    /// SSH bastion.
    pub ssh_bastion_server: SshBastion,
}

/// Container registry endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomImage {
    /// Registry URL.
    pub registry_endpoint: String,
    /// Repository images are pushed to.
    pub push_repo: String,
    /// Pull/push secret.
    pub push_secret_name: String,
}

/// Core platform settings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreSettings {
    /// Public domain.
    pub domain: String,
    /// Edition code.
    pub mode: String,
    /// URL scheme.
    pub scheme: String,
    /// Storage class of shared volumes.
    pub shared_volume_storage_class: String,
}

/// Identity provider settings.
#[derive(Debug, Clone, Serialize)]
pub struct Keycloak {
    /// Admin password.
    pub password: String,
    /// Backing database.
    pub postgresql: Postgresql,
}

/// Identity provider database.
#[derive(Debug, Clone, Serialize)]
pub struct Postgresql {
    /// Database volume.
    pub persistence: StorageClassRef,
}

/// A storage class reference.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageClassRef {
    /// Storage class name.
    pub storage_class: String,
}

/// Platform ingress.
#[derive(Debug, Clone, Serialize)]
pub struct Ingress {
    /// Create the ingress.
    pub enabled: bool,
    /// Ingress annotations; `kubernetes.io/tls-acme` follows the exposure.
    pub annotations: BTreeMap<String, String>,
    /// Served hosts.
    pub hosts: Vec<String>,
    /// TLS hosts and certificate secret.
    pub tls: Vec<IngressTls>,
}

/// TLS section of an ingress.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressTls {
    /// Hosts covered.
    pub hosts: Vec<String>,
    /// Certificate secret.
    pub secret_name: String,
}

/// Initial admin and instance types.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bootstrap {
    /// Admin email.
    pub email: String,
    /// Admin password.
    pub password: String,
    /// Force a password change on first login.
    pub enforce_update_password: bool,
    /// Resource profiles offered to users.
    pub instance_types: Vec<InstanceTypeManifest>,
}

/// GraphQL API settings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Graphql {
    /// Secret shared between the API and its clients.
    pub shared_graphql_secret: String,
}

/// Usage database settings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    /// Database storage class.
    pub db_storage_class: String,
}

/// Object store feature.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Store {
    /// Enabled when a store bucket is configured.
    pub enabled: bool,
    /// Store bucket.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    /// Whether the platform creates the bucket itself.
    pub create_bucket: Toggle,
}

/// `{ enabled: bool }`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Toggle {
    /// Flag.
    pub enabled: bool,
}

/// S3 gateway settings.
#[derive(Debug, Clone, Serialize)]
pub struct Minio {
    /// Gateway in front of the cloud object store.
    pub s3gateway: S3Gateway,
}

/// Gateway in front of the cloud object store; credentials come from the node role.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct S3Gateway {
    /// Enabled with the store.
    pub enabled: bool,
    /// Regional endpoint.
    pub service_endpoint: String,
    /// Always null.
    pub access_key: Option<String>,
    /// Always null.
    pub secret_key: Option<String>,
}

/// Notebook hub settings.
#[derive(Debug, Clone, Serialize)]
pub struct Jupyterhub {
    /// Auth state encryption.
    pub auth: HubAuth,
    /// Hub database and environment.
    pub hub: Hub,
    /// Proxy settings.
    pub proxy: HubProxy,
    /// User scheduling policy.
    pub scheduling: Scheduling,
}

/// Hub authentication settings.
#[derive(Debug, Clone, Serialize)]
pub struct HubAuth {
    /// Encrypted auth state.
    pub state: AuthState,
}

/// Key encrypting the stored auth state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthState {
    /// Hex key; shared with the GraphQL secret.
    pub crypto_key: String,
}

/// Hub process settings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Hub {
    /// Hub database volume.
    pub db: HubDb,
    /// Extra environment of the hub container.
    pub extra_env: Vec<ExtraEnv>,
}

/// Hub database settings.
#[derive(Debug, Clone, Serialize)]
pub struct HubDb {
    /// Volume claim of the database.
    pub pvc: HubDbPvc,
}

/// Hub database volume claim.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HubDbPvc {
    /// Storage class.
    pub storage_class_name: String,
}

/// A container environment variable, literal or from a secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtraEnv {
    /// Variable name.
    pub name: String,
    /// Literal value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Secret reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_from: Option<EnvSource>,
}

impl ExtraEnv {
    fn literal(name: &str, value: String) -> Self {
        Self { name: name.to_string(), value: Some(value), value_from: None }
    }

    fn from_secret(name: &str, secret: &str, key: &str) -> Self {
        Self {
            name: name.to_string(),
            value: None,
            value_from: Some(EnvSource {
                secret_key_ref: SecretKeyRef { name: secret.to_string(), key: key.to_string() },
            }),
        }
    }
}

/// Source of an environment value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvSource {
    /// Key of a secret.
    pub secret_key_ref: SecretKeyRef,
}

/// Key within a named secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecretKeyRef {
    /// Secret name.
    pub name: String,
    /// Key within the secret.
    pub key: String,
}

/// User pod scheduling policy.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scheduling {
    /// Dedicated user scheduler.
    pub user_scheduler: UserScheduler,
    /// Pod priority classes.
    pub pod_priority: Toggle,
    /// Placeholder pods keeping nodes warm.
    pub user_placeholder: Toggle,
    /// Placement of user pods.
    pub user_pods: UserPods,
}

/// User scheduler deployment.
#[derive(Debug, Clone, Serialize)]
pub struct UserScheduler {
    /// Run the scheduler.
    pub enabled: bool,
    /// Replica count.
    pub replicas: u32,
    /// Scheduler image.
    pub image: ImageTag,
}

/// Image tag override.
#[derive(Debug, Clone, Serialize)]
pub struct ImageTag {
    /// Tag.
    pub tag: String,
}

/// Placement of user pods.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPods {
    /// Node affinity policy.
    pub node_affinity: NodeAffinity,
}

/// Node purpose matching.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeAffinity {
    /// `require` pins user pods to user nodes.
    pub match_node_purpose: String,
}

/// Hub proxy settings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HubProxy {
    /// Token shared between hub and proxy.
    pub secret_token: String,
}

/// SSH bastion settings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SshBastion {
    /// Run the bastion.
    pub enabled: bool,
    /// Hostname SSH clients connect to; empty when the public domain works.
    pub custom_hostname: String,
}

/// A resource profile as the platform's instance type resource.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceTypeManifest {
    /// Object metadata.
    pub metadata: ManifestMetadata,
    /// Profile spec.
    pub spec: InstanceTypeSpec,
}

/// Object name.
#[derive(Debug, Clone, Serialize)]
pub struct ManifestMetadata {
    /// Profile name.
    pub name: String,
}

/// Instance type spec with the platform's dotted field names.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceTypeSpec {
    /// Summary of the limits.
    pub description: String,
    /// Label shown to users.
    pub display_name: String,
    /// CPU limit.
    #[serde(rename = "limits.cpu")]
    pub limits_cpu: u32,
    /// Memory limit, e.g. `4G`.
    #[serde(rename = "limits.memory")]
    pub limits_memory: String,
    /// GPU limit.
    #[serde(rename = "limits.nvidia.com/gpu")]
    pub limits_gpu: u32,
    /// CPU request.
    #[serde(rename = "requests.cpu")]
    pub requests_cpu: f64,
    /// Memory request, e.g. `3.2G`.
    #[serde(rename = "requests.memory")]
    pub requests_memory: String,
    /// Node selector.
    pub node_selector: BTreeMap<String, String>,
    /// Tolerations.
    pub tolerations: Vec<Toleration>,
}

impl From<&ResourceProfile> for InstanceTypeManifest {
    fn from(profile: &ResourceProfile) -> Self {
        Self {
            metadata: ManifestMetadata { name: profile.name() },
            spec: InstanceTypeSpec {
                description: profile.description(),
                display_name: profile.display_name(),
                limits_cpu: profile.limits.cpu_cores,
                limits_memory: format!("{}G", profile.limits.memory_gib),
                limits_gpu: profile.limits.gpu_count,
                requests_cpu: profile.requests.cpu,
                requests_memory: format!("{}G", profile.requests.memory_gib),
                node_selector: profile.node_selector.clone(),
                tolerations: profile.tolerations.clone(),
            },
        }
    }
}

impl PlatformValues {
    /// Assemble the platform values from the derived pieces.
    pub fn new(
        spec: &ClusterSpec,
        exposure: &NetworkExposure,
        secrets: &PlatformSecrets,
        profiles: &[ResourceProfile],
    ) -> Self {
        let domain = exposure.domain.clone();
        let registry = format!("{}.dkr.ecr.{}.amazonaws.com", spec.account, spec.region);
        let storage = |class: &str| StorageClassRef { storage_class: class.to_string() };

        let annotations = BTreeMap::from([
            ("ingress.kubernetes.io/affinity".to_string(), "cookie".to_string()),
            ("kubernetes.io/ingress.class".to_string(), "nginx".to_string()),
            ("kubernetes.io/tls-acme".to_string(), exposure.acme_enabled().to_string()),
        ]);

        let store_enabled = spec.store_bucket.is_some();

        Self {
            custom_image: CustomImage {
                registry_endpoint: format!("https://{registry}"),
                push_repo: format!("{registry}/{}", spec.ecr_repo),
                push_secret_name: "aws-registry".to_string(),
            },
            primehub: CoreSettings {
                domain: domain.clone(),
                mode: spec.mode.to_string(),
                scheme: "https".to_string(),
                shared_volume_storage_class: SHARED_STORAGE_CLASS.to_string(),
            },
            keycloak: Keycloak {
                password: secrets.keycloak_password.expose().to_string(),
                postgresql: Postgresql { persistence: storage(BLOCK_STORAGE_CLASS) },
            },
            ingress: Ingress {
                enabled: true,
                annotations,
                hosts: vec![domain.clone()],
                tls: vec![IngressTls {
                    hosts: vec![domain.clone()],
                    secret_name: TLS_SECRET_NAME.to_string(),
                }],
            },
            groupvolume: storage(BLOCK_STORAGE_CLASS),
            bootstrap: Bootstrap {
                email: spec.email.clone(),
                password: secrets.admin_password.expose().to_string(),
                enforce_update_password: spec.enforce_update_password,
                instance_types: profiles.iter().map(InstanceTypeManifest::from).collect(),
            },
            graphql: Graphql { shared_graphql_secret: secrets.graphql_secret.expose().to_string() },
            usage: Usage { db_storage_class: BLOCK_STORAGE_CLASS.to_string() },
            store: Store {
                enabled: store_enabled,
                bucket: spec.store_bucket.clone(),
                create_bucket: Toggle { enabled: false },
            },
            minio: Minio {
                s3gateway: S3Gateway {
                    enabled: store_enabled,
                    service_endpoint: format!("https://s3.{}.amazonaws.com/", spec.region),
                    access_key: None,
                    secret_key: None,
                },
            },
            jupyterhub: Jupyterhub {
                auth: HubAuth {
                    state: AuthState { crypto_key: secrets.auth_state_key.expose().to_string() },
                },
                hub: Hub {
                    db: HubDb {
                        pvc: HubDbPvc { storage_class_name: BLOCK_STORAGE_CLASS.to_string() },
                    },
                    extra_env: vec![
                        ExtraEnv::from_secret(
                            "KC_CLIENT_SECRET",
                            "primehub-client-jupyterhub",
                            "client_secret",
                        ),
                        ExtraEnv::from_secret(
                            "GRAPHQL_SHARED_SECRET",
                            "primehub-graphql-shared-secret",
                            "sharedSecret",
                        ),
                        ExtraEnv::literal(
                            "OAUTH_CALLBACK_URL",
                            format!("https://{domain}/hub/oauth_callback"),
                        ),
                    ],
                },
                proxy: HubProxy { secret_token: secrets.hub_proxy_token.expose().to_string() },
                scheduling: Scheduling {
                    user_scheduler: UserScheduler {
                        enabled: true,
                        replicas: 1,
                        image: ImageTag { tag: "v1.19.8".to_string() },
                    },
                    pod_priority: Toggle { enabled: true },
                    user_placeholder: Toggle { enabled: false },
                    user_pods: UserPods {
                        node_affinity: NodeAffinity { match_node_purpose: "require".to_string() },
                    },
                },
            },
            ssh_bastion_server: SshBastion {
                enabled: true,
                custom_hostname: exposure.custom_hostname.clone(),
            },
        }
    }
}
