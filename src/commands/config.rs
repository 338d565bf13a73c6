//! Configuration commands.

use std::path::PathBuf;

use serde::Serialize;

use super::Context;
use crate::cli::ClusterArgs;
use crate::config::{ClusterSpec, Config, PROJECT_CONFIG_FILE};
use crate::error::Result;
use crate::provision::secrets::names;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResolvedView<'a> {
    #[serde(flatten)]
    spec: &'a ClusterSpec,
    cluster_name: String,
    artifact_dir: &'a PathBuf,
    supplied_secrets: Vec<&'a str>,
}

/// Show the resolved cluster parameters.
///
/// Secret values are never printed, only which ones are supplied from outside.
pub async fn config_show(ctx: &Context, cluster: ClusterArgs) -> Result<()> {
    let resolved = ctx.resolve(cluster)?;
    let spec = &resolved.spec;

    let supplied_secrets: Vec<&str> = [
        names::ADMIN_PASSWORD,
        names::KEYCLOAK_PASSWORD,
        names::GRAPHQL_SECRET,
        names::HUB_PROXY_TOKEN,
    ]
    .into_iter()
    .filter(|name| spec.secrets.explicit(name).is_some() || spec.secrets.environment(name).is_some())
    .collect();

    let cluster_name = spec.cluster_name();
    let pools = [
        format!("{} ({})", spec.system_instance, capacity(&spec.system_pool)),
        format!("{} ({})", spec.cpu_instance, capacity(&spec.cpu_pool)),
        format!("{} ({})", spec.gpu_instance, capacity(&spec.gpu_pool)),
    ];
    let base_domain = spec.base_domain().unwrap_or("(none, CDN exposure)");
    let bucket = spec.config_bucket.as_deref().unwrap_or("(disabled)");
    let artifact_dir = resolved.artifact_dir.display().to_string();
    let mode = spec.mode.to_string();
    let secrets = if supplied_secrets.is_empty() {
        "(all generated)".to_string()
    } else {
        supplied_secrets.join(", ")
    };

    let pairs = [
        ("Cluster", cluster_name.as_str()),
        ("Region", spec.region.as_str()),
        ("Base domain", base_domain),
        ("Owner", spec.owner.as_str()),
        ("Mode", mode.as_str()),
        ("System pool", pools[0].as_str()),
        ("CPU pool", pools[1].as_str()),
        ("GPU pool", pools[2].as_str()),
        ("Config bucket", bucket),
        ("Artifact dir", artifact_dir.as_str()),
        ("Supplied secrets", secrets.as_str()),
    ];

    let view = ResolvedView {
        spec,
        cluster_name: cluster_name.clone(),
        artifact_dir: &resolved.artifact_dir,
        supplied_secrets,
    };
    ctx.output.key_values("Configuration", &pairs, &view)
}

fn capacity(pool: &crate::config::PoolCapacity) -> String {
    format!("{}/{}/{}", pool.desired, pool.min, pool.max)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Paths {
    user_config: Option<PathBuf>,
    project_config: PathBuf,
    data_dir: Option<PathBuf>,
}

/// Show where configuration is read from.
pub async fn config_path(ctx: &Context) -> Result<()> {
    let paths = Paths {
        user_config: Config::user_config_path(),
        project_config: PathBuf::from(PROJECT_CONFIG_FILE),
        data_dir: Config::data_dir(),
    };

    let show = |p: &Option<PathBuf>| {
        p.as_ref().map_or_else(|| "(unknown)".to_string(), |p| p.display().to_string())
    };
    let user = show(&paths.user_config);
    let project = paths.project_config.display().to_string();
    let data = show(&paths.data_dir);

    ctx.output.key_values(
        "Config paths",
        &[
            ("User config", user.as_str()),
            ("Project config", project.as_str()),
            ("Data dir", data.as_str()),
        ],
        &paths,
    )
}
