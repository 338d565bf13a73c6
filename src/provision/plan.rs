//! One provisioning run, start to finish.
//!
//! [`derive`] resolves secrets and resource profiles, declares the
//! infrastructure, chooses the network exposure, gates the platform release
//! behind its prerequisites and renders the configuration snapshot. It never
//! talks to the cloud; everything it learns from the engine arrives through
//! [`ProvisioningEngine`].

use serde::Serialize;
use tracing::{debug, info};

use crate::config::cluster::ClusterSpec;
use crate::error::Result;
use crate::provision::action::{Action, BucketDeployment, HelmRelease};
use crate::provision::addons::{self, Infrastructure, PLATFORM_NAMESPACE};
use crate::provision::engine::ProvisioningEngine;
use crate::provision::exposure::{self, ExposureRequest, NetworkExposure};
use crate::provision::graph::{ActionId, DependencyGraph, ReadinessGate, ReadinessTracker};
use crate::provision::instance::{ResourceProfile, partition};
use crate::provision::secrets::{RandomnessProvider, SecretMaterializer};
use crate::provision::snapshot::{self, Artifact, PLAN_FILE};
use crate::provision::values::{PlatformSecrets, PlatformValues};

/// Name of the gate in front of the platform release.
pub const PLATFORM_GATE: &str = "platform-prerequisites";
/// Account name of the bootstrap admin.
pub const ADMIN_ACCOUNT: &str = "phadmin";
/// Account name of the identity provider admin.
pub const KEYCLOAK_ACCOUNT: &str = "keycloak";

const PLATFORM_TIMEOUT_MINUTES: u32 = 15;

/// Human-facing results of a run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StackOutputs {
    /// Public URL of the platform.
    pub public_url: String,
    /// Admin account name.
    pub admin_account: String,
    /// Admin password.
    pub admin_password: String,
    /// Identity provider admin account.
    pub keycloak_account: String,
    /// Identity provider admin password.
    pub keycloak_password: String,
    /// Pinned platform version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Load balancer hostname, literal or token.
    pub load_balancer: String,
}

/// One action of the exported plan.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedAction<'a> {
    /// Action id.
    pub id: &'a ActionId,
    /// Submission wave; every action in a wave may be submitted together.
    pub wave: usize,
    /// Direct prerequisites.
    pub prerequisites: Vec<&'a ActionId>,
    /// Payload.
    pub action: &'a Action,
}

/// The exported action plan.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanDocument<'a> {
    /// Cluster name.
    pub cluster: String,
    /// Gate in front of the platform release.
    pub gate: GateDocument<'a>,
    /// Actions in topological order.
    pub actions: Vec<PlannedAction<'a>>,
}

/// Members and dependent of the readiness gate.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GateDocument<'a> {
    /// Gate name.
    pub name: &'a str,
    /// Prerequisites.
    pub members: &'a [ActionId],
    /// Gated action; absent in dry-run mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependent: Option<&'a ActionId>,
}

/// Everything derived for one cluster.
#[derive(Debug)]
pub struct Derivation {
    /// The resolved parameters.
    pub spec: ClusterSpec,
    /// Action graph handed to the engine.
    pub graph: DependencyGraph<Action>,
    /// Ids of the declared infrastructure.
    pub infrastructure: Infrastructure,
    /// Gate in front of the platform release.
    pub gate: ReadinessGate,
    /// Platform release; `None` in dry-run mode.
    pub platform: Option<ActionId>,
    /// Chosen exposure.
    pub exposure: NetworkExposure,
    /// Record or distribution declared for the exposure.
    pub exposure_action: ActionId,
    /// Materialized secrets.
    pub secrets: PlatformSecrets,
    /// Resource profiles of every user instance type.
    pub profiles: Vec<ResourceProfile>,
    /// Platform release values.
    pub values: PlatformValues,
    /// Rendered snapshot, including the plan.
    pub artifact: Artifact,
    /// Human-facing results.
    pub outputs: StackOutputs,
}

/// Resource profiles of every distinct user instance type, CPU type first.
pub fn resource_profiles(spec: &ClusterSpec) -> Vec<ResourceProfile> {
    spec.user_instance_types().into_iter().flat_map(partition).collect()
}

/// Run every derivation step for `spec`.
pub fn derive<E, R>(
    spec: ClusterSpec,
    engine: &E,
    materializer: &mut SecretMaterializer<R>,
) -> Result<Derivation>
where
    E: ProvisioningEngine,
    R: RandomnessProvider,
{
    spec.validate()?;
    let cluster_name = spec.cluster_name();
    info!(cluster = %cluster_name, region = %spec.region, dry_run = spec.dry_run, "deriving cluster");

    let secrets = PlatformSecrets::materialize(&spec, materializer);
    let profiles = resource_profiles(&spec);
    debug!(profiles = profiles.len(), "partitioned instance types");

    let mut graph = DependencyGraph::new();
    let infrastructure = addons::declare(&spec, &mut graph)?;

    let load_balancer = spec
        .load_balancer_hostname
        .clone()
        .unwrap_or_else(|| engine.attribute(&infrastructure.ingress, "loadBalancerHostname"));

    let (exposure, exposure_action) = exposure::resolve(
        engine,
        &mut graph,
        &ExposureRequest {
            base_domain: &spec.base_domain,
            cluster_name: &cluster_name,
            region: &spec.region,
            load_balancer_hostname: &load_balancer,
            origin: &infrastructure.ingress,
        },
    )?;

    let mut gate = ReadinessGate::new(PLATFORM_GATE);
    gate.require(&infrastructure.ingress);
    gate.require(&infrastructure.cert_manager);
    gate.require(&infrastructure.cluster_issuer);
    gate.require(&infrastructure.storage_driver);
    if let Some(bucket) = &infrastructure.config_bucket {
        gate.require(bucket);
    }

    let values = PlatformValues::new(&spec, &exposure, &secrets, &profiles);

    let platform = if spec.dry_run {
        info!("dry run: platform release not declared");
        None
    } else {
        let release = HelmRelease {
            release: "primehub".to_string(),
            chart: "primehub".to_string(),
            repository: "https://charts.infuseai.io".to_string(),
            namespace: PLATFORM_NAMESPACE.to_string(),
            version: spec.version.clone(),
            create_namespace: true,
            wait: false,
            timeout_minutes: Some(PLATFORM_TIMEOUT_MINUTES),
            values: serde_json::to_value(&values)?,
        };
        let id = graph.add("platform", Action::HelmRelease(release))?;
        graph.depends_on(&id, &infrastructure.cluster)?;
        graph.depends_on_gate(&id, &gate)?;
        Some(id)
    };

    if let (Some(bucket), Some(name)) = (&infrastructure.config_bucket, &spec.config_bucket) {
        let upload = graph.add(
            "config-upload",
            Action::BucketDeployment(BucketDeployment {
                bucket: name.clone(),
                source: cluster_name.clone(),
            }),
        )?;
        graph.depends_on(&upload, bucket)?;
    }

    let mut artifact = snapshot::export(&spec, &exposure, &secrets, &values)?;
    let plan = plan_document(&cluster_name, &graph, &gate, platform.as_ref())?;
    artifact.insert(PLAN_FILE, serde_json::to_string_pretty(&plan)?);

    let outputs = StackOutputs {
        public_url: exposure.public_url(),
        admin_account: ADMIN_ACCOUNT.to_string(),
        admin_password: secrets.admin_password.expose().to_string(),
        keycloak_account: KEYCLOAK_ACCOUNT.to_string(),
        keycloak_password: secrets.keycloak_password.expose().to_string(),
        version: spec.version.clone(),
        load_balancer,
    };

    info!(actions = graph.len(), url = %outputs.public_url, "derivation complete");

    Ok(Derivation {
        spec,
        graph,
        infrastructure,
        gate,
        platform,
        exposure,
        exposure_action,
        secrets,
        profiles,
        values,
        artifact,
        outputs,
    })
}

impl Derivation {
    /// The plan of this derivation.
    pub fn plan(&self) -> Result<PlanDocument<'_>> {
        plan_document(&self.spec.cluster_name(), &self.graph, &self.gate, self.platform.as_ref())
    }
}

/// Group actions into submission waves.
///
/// Wave `n` holds the actions that become submittable once every action of
/// the earlier waves is ready.
pub fn submission_waves<A>(graph: &DependencyGraph<A>) -> Result<Vec<Vec<&ActionId>>> {
    let mut tracker = ReadinessTracker::new(graph);
    let mut waves = Vec::new();
    loop {
        let wave = tracker.submittable();
        if wave.is_empty() {
            break;
        }
        for id in &wave {
            tracker.submit(id)?;
        }
        for id in &wave {
            tracker.mark_ready(id)?;
        }
        waves.push(wave);
    }
    Ok(waves)
}

fn plan_document<'a>(
    cluster_name: &str,
    graph: &'a DependencyGraph<Action>,
    gate: &'a ReadinessGate,
    platform: Option<&'a ActionId>,
) -> Result<PlanDocument<'a>> {
    let waves = submission_waves(graph)?;
    let wave_of = |id: &ActionId| waves.iter().position(|w| w.contains(&id)).unwrap_or_default();

    let actions = graph
        .topological_order()
        .into_iter()
        .map(|(id, action)| PlannedAction {
            id,
            wave: wave_of(id),
            prerequisites: graph.prerequisites(id),
            action,
        })
        .collect();

    Ok(PlanDocument {
        cluster: cluster_name.to_string(),
        gate: GateDocument { name: gate.name(), members: gate.members(), dependent: platform },
        actions,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::provision::engine::{SynthEngine, Token};
    use crate::provision::exposure::TlsMode;
    use crate::provision::snapshot::{ENV_FILE, VALUES_FILE};

    fn run(spec: ClusterSpec) -> Derivation {
        let mut m = SecretMaterializer::with_randomness(StdRng::seed_from_u64(42));
        derive(spec, &SynthEngine::new().with_zone("example.com", "ZONE1"), &mut m).unwrap()
    }

    #[test]
    fn test_gate_members_and_dependent() {
        let d = run(ClusterSpec::builder().name("dev").config_bucket("eks-dev-primehub-config").build());
        let infra = &d.infrastructure;
        let members: Vec<_> = d.gate.members().iter().collect();
        assert_eq!(
            members,
            vec![
                &infra.ingress,
                &infra.cert_manager,
                &infra.cluster_issuer,
                &infra.storage_driver,
                infra.config_bucket.as_ref().unwrap()
            ]
        );

        let platform = d.platform.as_ref().unwrap();
        let prereqs = d.graph.prerequisites(platform);
        for member in d.gate.members() {
            assert!(prereqs.contains(&member), "{member}");
        }
    }

    #[test]
    fn test_platform_never_submittable_before_gate() {
        let d = run(ClusterSpec::builder().name("dev").build());
        let platform = d.platform.as_ref().unwrap();
        let mut tracker = ReadinessTracker::new(&d.graph);

        while !tracker.is_complete() {
            let wave = tracker.submittable();
            assert!(!wave.is_empty());
            for id in &wave {
                if *id == platform {
                    for member in d.gate.members() {
                        assert!(tracker.is_ready(member), "{member} not ready");
                    }
                }
                tracker.submit(id).unwrap();
            }
            for id in &wave {
                tracker.mark_ready(id).unwrap();
            }
        }
    }

    #[test]
    fn test_platform_waits_for_cluster_issuer() {
        let d = run(ClusterSpec::builder().name("dev").base_domain("example.com").build());
        let platform = d.platform.as_ref().unwrap();
        let issuer = &d.infrastructure.cluster_issuer;
        let mut tracker = ReadinessTracker::new(&d.graph);
        let mut submitted = Vec::new();

        loop {
            let wave: Vec<_> = tracker.submittable().into_iter().filter(|id| *id != issuer).collect();
            if wave.is_empty() {
                break;
            }
            for id in &wave {
                tracker.submit(id).unwrap();
                tracker.mark_ready(id).unwrap();
                submitted.push(*id);
            }
        }

        assert!(!tracker.is_ready(issuer));
        assert!(!submitted.contains(&platform), "platform released without the issuer");
        assert!(d.graph.prerequisites(platform).contains(&issuer));
    }

    #[test]
    fn test_dry_run_skips_platform_but_exports() {
        let d = run(ClusterSpec::builder().name("dev").dry_run(true).build());
        assert!(d.platform.is_none());
        assert!(!d.graph.contains(&ActionId::from("platform")));
        assert!(d.artifact.get(VALUES_FILE).is_some());
        assert!(d.artifact.get(ENV_FILE).is_some());
        let plan: serde_json::Value =
            serde_json::from_str(d.artifact.get(PLAN_FILE).unwrap()).unwrap();
        assert!(plan["gate"].get("dependent").is_none());
    }

    #[test]
    fn test_dns_outputs() {
        let d = run(ClusterSpec::builder().name("dev").base_domain("example.com").version("3.6.0").build());
        assert_eq!(d.exposure.tls_mode, TlsMode::Acme);
        assert_eq!(d.outputs.public_url, "https://hub.eks-dev.example.com");
        assert_eq!(d.outputs.admin_account, ADMIN_ACCOUNT);
        assert_eq!(d.outputs.version.as_deref(), Some("3.6.0"));
        assert_eq!(d.outputs.admin_password, d.secrets.admin_password.expose());
        assert_eq!(
            d.outputs.load_balancer,
            Token::new(&d.infrastructure.ingress, "loadBalancerHostname").to_string()
        );
    }

    #[test]
    fn test_cdn_with_known_load_balancer() {
        let d = run(
            ClusterSpec::builder()
                .name("dev")
                .load_balancer_hostname("lb-123.elb.amazonaws.com")
                .build(),
        );
        assert_eq!(d.exposure.tls_mode, TlsMode::None);
        assert_eq!(d.exposure.custom_hostname, "lb-123.elb.amazonaws.com");
        assert!(!d.exposure.domain.is_empty());
        assert_eq!(d.values.ssh_bastion_server.custom_hostname, "lb-123.elb.amazonaws.com");
    }

    #[test]
    fn test_profiles_cover_each_distinct_type() {
        let d = run(ClusterSpec::builder().name("dev").build());
        let names: Vec<_> = d.profiles.iter().map(ResourceProfile::name).collect();
        assert_eq!(
            names,
            vec![
                "t3a.xlarge-quarter",
                "t3a.xlarge-half",
                "t3a.xlarge-full",
                "g4dn.xlarge-quarter",
                "g4dn.xlarge-half",
                "g4dn.xlarge-full",
            ]
        );
        assert_eq!(d.values.bootstrap.instance_types.len(), 6);
    }

    #[test]
    fn test_plan_is_topological_with_waves() {
        let d = run(ClusterSpec::builder().name("dev").config_bucket("cfg").build());
        let plan = d.plan().unwrap();
        let mut seen = Vec::new();
        for action in &plan.actions {
            for p in &action.prerequisites {
                assert!(seen.contains(p), "{} before {}", action.id, p);
                let prior = plan.actions.iter().find(|a| a.id == *p).unwrap();
                assert!(prior.wave < action.wave);
            }
            seen.push(action.id);
        }
        assert_eq!(plan.actions.len(), d.graph.len());
        assert_eq!(plan.actions[0].id.as_str(), "master-role");
        assert!(d.graph.contains(&ActionId::from("config-upload")));
    }

    #[test]
    fn test_invalid_spec_fails_before_declaring() {
        let mut m = SecretMaterializer::with_randomness(StdRng::seed_from_u64(1));
        let spec = ClusterSpec::builder().name("Bad_Name").build();
        assert!(derive(spec, &SynthEngine::new(), &mut m).is_err());
        assert!(m.is_empty());
    }

    #[test]
    fn test_submission_waves_cover_graph() {
        let d = run(ClusterSpec::builder().name("dev").build());
        let waves = submission_waves(&d.graph).unwrap();
        let total: usize = waves.iter().map(Vec::len).sum();
        assert_eq!(total, d.graph.len());
        assert_eq!(waves[0].len(), 1);
    }
}
