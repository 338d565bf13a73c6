//! Boundary to the external provisioning engine.
//!
//! The engine creates cloud resources and installs charts on its own
//! schedule. This crate only asks it questions it can answer up front (which
//! hosted zone serves a domain) and refers to values it will learn later
//! through `${action.attribute}` tokens.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::provision::graph::ActionId;

/// A DNS hosted zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostedZone {
    /// Zone id; may be a deferred token.
    pub id: String,
    /// Zone apex domain.
    pub domain: String,
}

/// Reference to an attribute the engine learns after creating an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    source: String,
    attribute: String,
}

impl Token {
    /// Reference `attribute` of the action `source`.
    pub fn new(source: &ActionId, attribute: &str) -> Self {
        Self { source: source.to_string(), attribute: attribute.to_string() }
    }

    /// Read a rendered token back; literals yield `None`.
    ///
    /// The attribute is the part after the last dot, so sources may contain
    /// dots themselves.
    pub fn parse(value: &str) -> Option<Self> {
        let inner = value.strip_prefix("${")?.strip_suffix('}')?;
        let (source, attribute) = inner.rsplit_once('.')?;
        if source.is_empty() || attribute.is_empty() {
            return None;
        }
        Some(Self { source: source.to_string(), attribute: attribute.to_string() })
    }

    /// Action or lookup the value comes from.
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${{{}.{}}}", self.source, self.attribute)
    }
}

/// Questions the provisioning engine answers before submission.
pub trait ProvisioningEngine {
    /// Find the hosted zone serving `domain`.
    fn lookup_hosted_zone(&self, domain: &str) -> Result<HostedZone>;

    /// Value of an attribute of `action` once it exists.
    fn attribute(&self, action: &ActionId, attribute: &str) -> String {
        Token::new(action, attribute).to_string()
    }
}

/// Engine that synthesizes a plan without calling any cloud API.
///
/// Zones registered with [`SynthEngine::with_zone`] resolve to their literal
/// id; other lookups are deferred to the engine that applies the plan.
#[derive(Debug, Clone, Default)]
pub struct SynthEngine {
    zones: BTreeMap<String, String>,
}

impl SynthEngine {
    /// Create an engine with no known zones.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a known zone id for a domain.
    pub fn with_zone(mut self, domain: impl Into<String>, id: impl Into<String>) -> Self {
        self.zones.insert(domain.into(), id.into());
        self
    }
}

impl ProvisioningEngine for SynthEngine {
    fn lookup_hosted_zone(&self, domain: &str) -> Result<HostedZone> {
        let id = self.zones.get(domain).cloned().unwrap_or_else(|| {
            debug!(domain, "deferring hosted zone lookup");
            let lookup = ActionId::from(format!("hosted-zone:{domain}").as_str());
            Token::new(&lookup, "id").to_string()
        });
        Ok(HostedZone { id, domain: domain.to_string() })
    }
}
