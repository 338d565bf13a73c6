//! `hubstack synth`: derive, export and persist.

use std::path::PathBuf;

use tracing::info;

use super::Context;
use crate::cli::ClusterArgs;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::provision::secrets::SecretMaterializer;
use crate::provision::snapshot::DirectoryObjectStore;
use crate::provision::{StackOutputs, SynthEngine, derive};

/// Bucket mirror directory under the data dir.
const BUCKETS_DIR: &str = "buckets";

/// Derive the cluster, write the snapshot and persist it to the config bucket.
pub async fn synth(ctx: &Context, cluster: ClusterArgs, bucket_dir: Option<PathBuf>) -> Result<()> {
    let resolved = ctx.resolve(cluster)?;
    info!(cluster = %resolved.spec.cluster_name(), "synthesizing");

    let mut materializer = SecretMaterializer::new();
    let derivation = derive(resolved.spec, &SynthEngine::new(), &mut materializer)?;

    let dir = derivation.artifact.write_to(&resolved.artifact_dir).await?;
    ctx.output.success(&format!("Snapshot written to {}", dir.display()));

    match &derivation.spec.config_bucket {
        Some(bucket) => {
            let root = bucket_dir
                .or_else(|| Config::data_dir().map(|d| d.join(BUCKETS_DIR)))
                .ok_or_else(|| {
                    Error::config("Cannot determine the data directory; pass --bucket-dir")
                })?;
            let store = DirectoryObjectStore::new(root);
            let count = derivation.artifact.persist(&store, bucket).await?;
            ctx.output.success(&format!("Persisted {count} files to bucket '{bucket}'"));
        }
        None => ctx.output.warn("No config bucket configured; snapshot not persisted"),
    }

    if derivation.spec.dry_run {
        ctx.output.warn("Dry run: the platform release was not declared");
    }

    print_outputs(ctx, &derivation.outputs)
}

fn print_outputs(ctx: &Context, outputs: &StackOutputs) -> Result<()> {
    let mut pairs = vec![
        ("URL", outputs.public_url.as_str()),
        ("Admin account", outputs.admin_account.as_str()),
        ("Admin password", outputs.admin_password.as_str()),
        ("Keycloak account", outputs.keycloak_account.as_str()),
        ("Keycloak password", outputs.keycloak_password.as_str()),
        ("Load balancer", outputs.load_balancer.as_str()),
    ];
    if let Some(version) = &outputs.version {
        pairs.push(("Version", version.as_str()));
    }

    ctx.output.key_values("Platform", &pairs, outputs)
}
