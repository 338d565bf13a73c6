//! Configuration snapshot export.
//!
//! A snapshot is the platform values as YAML plus the same values as a flat
//! `KEY=value` document for out-of-band tooling. Rendering is pure and
//! deterministic; secrets are already materialized when it runs. Writing to
//! disk and persisting to a bucket are separate async steps.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::cluster::ClusterSpec;
use crate::error::{Error, Result};
use crate::provision::addons::{PLATFORM_NAMESPACE, SHARED_STORAGE_CLASS};
use crate::provision::exposure::NetworkExposure;
use crate::provision::values::{BLOCK_STORAGE_CLASS, PlatformSecrets, PlatformValues};

/// Path of the values document inside an artifact.
pub const VALUES_FILE: &str = "helm_override/primehub.yaml";
/// Path of the environment document inside an artifact.
pub const ENV_FILE: &str = ".env";
/// Path of the action plan inside an artifact.
pub const PLAN_FILE: &str = "plan.json";

/// Rendered snapshot files of one cluster, keyed by relative path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    cluster_name: String,
    files: BTreeMap<String, String>,
}

impl Artifact {
    /// Empty artifact for a cluster.
    pub fn new(cluster_name: impl Into<String>) -> Self {
        Self { cluster_name: cluster_name.into(), files: BTreeMap::new() }
    }

    /// Cluster the artifact belongs to.
    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    /// Add or replace a file.
    pub fn insert(&mut self, path: impl Into<String>, contents: impl Into<String>) {
        self.files.insert(path.into(), contents.into());
    }

    /// Contents of a file.
    pub fn get(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    /// Files in path order.
    pub fn files(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files.iter().map(|(p, c)| (p.as_str(), c.as_str()))
    }

    /// Directory the artifact occupies under `root`.
    pub fn dir(&self, root: &Path) -> PathBuf {
        root.join(&self.cluster_name)
    }

    /// Write every file under `<root>/<cluster>/`, returning that directory.
    pub async fn write_to(&self, root: &Path) -> Result<PathBuf> {
        let dir = self.dir(root);
        for (path, contents) in self.files() {
            let target = dir.join(path);
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&target, contents).await?;
            debug!(path = %target.display(), "wrote artifact file");
        }
        info!(dir = %dir.display(), files = self.files.len(), "exported configuration snapshot");
        Ok(dir)
    }

    /// Upload every file to `bucket`, keyed by its relative path.
    pub async fn persist<S: ObjectStore>(&self, store: &S, bucket: &str) -> Result<usize> {
        for (path, contents) in self.files() {
            store.put(bucket, path, contents.as_bytes()).await?;
        }
        info!(bucket, objects = self.files.len(), "persisted configuration snapshot");
        Ok(self.files.len())
    }
}

/// Durable object storage the snapshot is persisted to.
pub trait ObjectStore {
    /// Store `body` under `key` in `bucket`, replacing any previous object.
    fn put(&self, bucket: &str, key: &str, body: &[u8]) -> impl Future<Output = Result<()>> + Send;
}

/// Object store mirrored into a local directory, one subdirectory per bucket.
#[derive(Debug, Clone)]
pub struct DirectoryObjectStore {
    root: PathBuf,
}

impl DirectoryObjectStore {
    /// Store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Local path of an object.
    pub fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.root.join(bucket).join(key)
    }
}

impl ObjectStore for DirectoryObjectStore {
    async fn put(&self, bucket: &str, key: &str, body: &[u8]) -> Result<()> {
        if bucket.is_empty() || bucket.contains(['/', '\\']) || bucket == "." || bucket == ".." {
            return Err(Error::invalid_arg(format!("Invalid bucket name '{bucket}'")));
        }
        if key.is_empty()
            || Path::new(key).components().any(|c| !matches!(c, std::path::Component::Normal(_)))
        {
            return Err(Error::invalid_arg(format!("Invalid object key '{key}'")));
        }

        let path = self.object_path(bucket, key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, body).await?;
        Ok(())
    }
}

/// Render the snapshot of one cluster.
pub fn export(
    spec: &ClusterSpec,
    exposure: &NetworkExposure,
    secrets: &PlatformSecrets,
    values: &PlatformValues,
) -> Result<Artifact> {
    let mut artifact = Artifact::new(spec.cluster_name());
    artifact.insert(VALUES_FILE, serde_yaml::to_string(values)?);
    artifact.insert(ENV_FILE, render_env(spec, exposure, secrets));
    Ok(artifact)
}

/// The flat environment document.
pub fn render_env(spec: &ClusterSpec, exposure: &NetworkExposure, secrets: &PlatformSecrets) -> String {
    let domain = exposure.domain.as_str();
    let entries: [(&str, &str); 17] = [
        ("PRIMEHUB_MODE", spec.mode.as_str()),
        ("PRIMEHUB_NAMESPACE", PLATFORM_NAMESPACE),
        ("PRIMEHUB_DOMAIN", domain),
        ("PRIMEHUB_SCHEME", "https"),
        ("PRIMEHUB_STORAGE_CLASS", BLOCK_STORAGE_CLASS),
        ("GROUP_VOLUME_STORAGE_CLASS", SHARED_STORAGE_CLASS),
        ("KC_DOMAIN", domain),
        ("KC_SCHEME", "https"),
        ("KC_USER", "keycloak"),
        ("KC_PASSWORD", secrets.keycloak_password.expose()),
        ("KC_REALM", "primehub"),
        ("ADMIN_UI_GRAPHQL_SECRET_KEY", secrets.graphql_secret.expose()),
        ("HUB_AUTH_STATE_CRYPTO_KEY", secrets.auth_state_key.expose()),
        ("HUB_PROXY_SECRET_TOKEN", secrets.hub_proxy_token.expose()),
        ("PH_PASSWORD", secrets.admin_password.expose()),
        ("METACONTROLLER_DEPLOY", "true"),
        ("KEYCLOAK_DEPLOY", "true"),
    ];

    let mut out = String::new();
    for (key, value) in entries {
        out.push_str(&format!("{key}={value}\n"));
    }
    out
}
