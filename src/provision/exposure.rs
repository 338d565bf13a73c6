//! How the platform is reached from outside the cluster.
//!
//! With a base domain the tool owns a DNS zone: it points a wildcard alias
//! at the load balancer and lets the certificate issuer validate over ACME.
//! Without one the load balancer is fronted by a CDN distribution whose
//! hostname becomes the public domain; ACME is off because there is no zone
//! to validate against. SSH cannot go through the CDN, so the raw load
//! balancer hostname is still published for the bastion.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::provision::action::{Action, AliasRecord, Distribution};
use crate::provision::engine::{ProvisioningEngine, Token};
use crate::provision::graph::{ActionId, DependencyGraph};
use crate::provision::region;

/// Certificate strategy for the public domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TlsMode {
    /// Certificates issued over ACME.
    Acme,
    /// TLS terminated elsewhere (at the CDN edge).
    None,
}

/// Chosen exposure of the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkExposure {
    /// Public domain of the platform.
    pub domain: String,
    /// Certificate strategy.
    pub tls_mode: TlsMode,
    /// Unproxied hostname for protocols the CDN cannot carry; empty with DNS.
    pub custom_hostname: String,
}

impl NetworkExposure {
    /// Whether the ingress should request ACME certificates.
    pub fn acme_enabled(&self) -> bool {
        self.tls_mode == TlsMode::Acme
    }

    /// Public https URL.
    pub fn public_url(&self) -> String {
        format!("https://{}", self.domain)
    }
}

/// Inputs of the exposure decision.
#[derive(Debug, Clone)]
pub struct ExposureRequest<'a> {
    /// Base domain; empty selects the CDN.
    pub base_domain: &'a str,
    /// Full cluster name.
    pub cluster_name: &'a str,
    /// Region of the load balancer.
    pub region: &'a str,
    /// Load balancer hostname, literal or token.
    pub load_balancer_hostname: &'a str,
    /// Action that creates the load balancer.
    pub origin: &'a ActionId,
}

/// Pick the exposure strategy and declare the record or distribution it needs.
///
/// Returns the exposure and the id of the declared action.
pub fn resolve<E: ProvisioningEngine>(
    engine: &E,
    graph: &mut DependencyGraph<Action>,
    request: &ExposureRequest<'_>,
) -> Result<(NetworkExposure, ActionId)> {
    if let Some(token) = Token::parse(request.load_balancer_hostname) {
        debug!(source = token.source(), "load balancer hostname known only after apply");
    }
    if request.base_domain.is_empty() {
        resolve_cdn(engine, graph, request)
    } else {
        resolve_dns(engine, graph, request)
    }
}

fn resolve_dns<E: ProvisioningEngine>(
    engine: &E,
    graph: &mut DependencyGraph<Action>,
    request: &ExposureRequest<'_>,
) -> Result<(NetworkExposure, ActionId)> {
    let zone = engine.lookup_hosted_zone(request.base_domain)?;
    if Token::parse(&zone.id).is_some() {
        debug!(domain = %zone.domain, "hosted zone id deferred");
    }

    let target_zone = region::resolve(request.region);
    if !target_zone.is_resolved() {
        warn!(
            region = request.region,
            "no load balancer hosted zone known for region; alias record will have an empty zone id"
        );
    }

    let record = AliasRecord {
        zone,
        record_name: format!("*.{}.{}.", request.cluster_name, request.base_domain),
        target_dns_name: request.load_balancer_hostname.to_string(),
        target_hosted_zone_id: target_zone.as_str_or_empty().to_string(),
    };
    let id = graph.add("dns-alias-record", Action::AliasRecord(record))?;
    graph.depends_on(&id, request.origin)?;

    let exposure = NetworkExposure {
        domain: format!("hub.{}.{}", request.cluster_name, request.base_domain),
        tls_mode: TlsMode::Acme,
        custom_hostname: String::new(),
    };
    info!(domain = %exposure.domain, "exposing platform through owned DNS zone");
    Ok((exposure, id))
}

fn resolve_cdn<E: ProvisioningEngine>(
    engine: &E,
    graph: &mut DependencyGraph<Action>,
    request: &ExposureRequest<'_>,
) -> Result<(NetworkExposure, ActionId)> {
    let distribution = Distribution {
        origin_domain: request.load_balancer_hostname.to_string(),
        origin_protocol: "http-only".to_string(),
        viewer_protocol: "redirect-to-https".to_string(),
        origin_headers: BTreeMap::from([("X-Forwarded-Proto".to_string(), "https".to_string())]),
        forward_all: true,
    };
    let id = graph.add("cdn-distribution", Action::Distribution(distribution))?;
    graph.depends_on(&id, request.origin)?;

    let exposure = NetworkExposure {
        domain: engine.attribute(&id, "domainName"),
        tls_mode: TlsMode::None,
        custom_hostname: request.load_balancer_hostname.to_string(),
    };
    info!(domain = %exposure.domain, "no base domain; exposing platform through CDN");
    Ok((exposure, id))
}
