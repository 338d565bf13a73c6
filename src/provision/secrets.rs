//! Shared secret resolution.
//!
//! Several charts consume the same credentials (the hub's auth-state crypto
//! key and the GraphQL shared secret are one token). Each secret is resolved
//! once per run through explicit override, then environment fallback, then
//! generation, and memoized by name so every consumer agrees.

use std::collections::HashMap;
use std::fmt;

use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use serde::Serialize;
use tracing::debug;

/// Number of random bytes in a generated secret (rendered as 64 hex chars).
pub const SECRET_BYTES: usize = 32;

/// Well-known secret names used by the platform installer.
pub mod names {
    /// Password of the platform admin account.
    pub const ADMIN_PASSWORD: &str = "admin-password";
    /// Password of the identity provider admin account.
    pub const KEYCLOAK_PASSWORD: &str = "keycloak-password";
    /// GraphQL shared secret, also used as the hub auth-state crypto key.
    pub const GRAPHQL_SECRET: &str = "graphql-secret";
    /// Token shared between the hub and its proxy.
    pub const HUB_PROXY_TOKEN: &str = "hub-proxy-token";
}

/// Source of randomness for generated secrets.
///
/// Any cryptographically secure [`RngCore`] qualifies; tests substitute a
/// seeded `StdRng`.
pub trait RandomnessProvider {
    /// Fill `dest` with random bytes.
    fn try_fill(&mut self, dest: &mut [u8]) -> Result<(), rand::Error>;
}

impl<R: RngCore + CryptoRng> RandomnessProvider for R {
    fn try_fill(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.try_fill_bytes(dest)
    }
}

/// Where a secret value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Supplied by a flag or the config file.
    Explicit,
    /// Taken from the environment snapshot.
    Environment,
    /// Freshly generated for this run.
    Generated,
}

/// A resolved secret.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretValue {
    name: String,
    value: String,
    provenance: Provenance,
}

impl SecretValue {
    /// Secret name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The plaintext value.
    pub fn expose(&self) -> &str {
        &self.value
    }

    /// Where the value came from.
    pub fn provenance(&self) -> Provenance {
        self.provenance
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretValue")
            .field("name", &self.name)
            .field("value", &"********")
            .field("provenance", &self.provenance)
            .finish()
    }
}

/// Resolves and memoizes named secrets for one provisioning run.
pub struct SecretMaterializer<R = OsRng> {
    rng: R,
    resolved: HashMap<String, SecretValue>,
}

impl SecretMaterializer<OsRng> {
    /// Create a materializer backed by the operating system's CSPRNG.
    pub fn new() -> Self {
        Self::with_randomness(OsRng)
    }
}

impl Default for SecretMaterializer<OsRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RandomnessProvider> SecretMaterializer<R> {
    /// Create a materializer with an explicit randomness provider.
    pub fn with_randomness(rng: R) -> Self {
        Self { rng, resolved: HashMap::new() }
    }

    /// Resolve a secret.
    ///
    /// The first non-empty of `explicit` and `env_fallback` wins, otherwise a
    /// fresh 256-bit hex token is generated. Once a name is resolved, later
    /// calls return the same value whatever arguments they pass.
    ///
    /// # Panics
    ///
    /// Panics if the randomness provider fails. Without a working entropy
    /// source no credential can be issued, so the run cannot continue.
    pub fn get(
        &mut self,
        name: &str,
        explicit: Option<&str>,
        env_fallback: Option<&str>,
    ) -> SecretValue {
        if let Some(existing) = self.resolved.get(name) {
            return existing.clone();
        }

        let non_empty = |v: Option<&str>| v.filter(|s| !s.is_empty()).map(str::to_string);

        let (value, provenance) = if let Some(v) = non_empty(explicit) {
            (v, Provenance::Explicit)
        } else if let Some(v) = non_empty(env_fallback) {
            (v, Provenance::Environment)
        } else {
            (self.generate(), Provenance::Generated)
        };

        debug!(secret = name, ?provenance, "resolved secret");

        let secret = SecretValue { name: name.to_string(), value, provenance };
        self.resolved.insert(name.to_string(), secret.clone());
        secret
    }

    /// Look up an already resolved secret.
    pub fn resolved(&self, name: &str) -> Option<&SecretValue> {
        self.resolved.get(name)
    }

    /// Number of secrets resolved so far.
    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    /// Whether no secret has been resolved yet.
    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }

    fn generate(&mut self) -> String {
        let mut raw = [0u8; SECRET_BYTES];
        if let Err(e) = self.rng.try_fill(&mut raw) {
            panic!(
                "CRITICAL: failed to generate random bytes: {e}. \
                 Secrets cannot be issued without a working entropy source."
            );
        }
        hex::encode(raw)
    }
}
