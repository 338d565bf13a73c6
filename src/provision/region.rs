//! Region to load-balancer hosted-zone id lookup.
//!
//! Alias records pointing at a network load balancer must name the canonical
//! hosted zone of the load balancer's region. The table is data only; new
//! regions are added by appending a row.

use serde::Serialize;

/// Canonical hosted-zone ids for network load balancers, by region code.
pub const NLB_HOSTED_ZONES: &[(&str, &str)] = &[
    ("us-east-2", "ZLMOA37VPKANP"),
    ("us-east-1", "Z26RNL4JYFTOTI"),
    ("us-west-1", "Z24FKFUX50B4VW"),
    ("us-west-2", "Z18D5FSROUN65G"),
    ("af-south-1", "Z203XCE67M25HM"),
    ("ap-east-1", "Z12Y7K3UBGUAD1"),
    ("ap-south-1", "ZVDDRBQ08TROA"),
    ("ap-northeast-3", "Z1GWIQ4HH19I5X"),
    ("ap-northeast-2", "ZIBE1TIR4HY56"),
    ("ap-southeast-1", "ZKVM4W9LS7TM"),
    ("ap-southeast-2", "ZCT6FZBF4DROD"),
    ("ap-northeast-1", "Z31USIVHYNEOWT"),
    ("ca-central-1", "Z2EPGBW3API2WT"),
    ("cn-north-1", "Z3QFB96KMJ7ED6"),
    ("cn-northwest-1", "ZQEIKTCZ8352D"),
    ("eu-central-1", "Z3F0SRJ5LGBH90"),
    ("eu-west-1", "Z2IFOLAFXWLO4F"),
    ("eu-west-2", "ZD4D7Y8KGAS4G"),
    ("eu-south-1", "Z23146JA1KNAFP"),
    ("eu-west-3", "Z1CMS0P5QUZ6D5"),
    ("eu-north-1", "Z1UDT6IFJ4EJM"),
    ("me-south-1", "Z3QSRYVP46NYYV"),
    ("sa-east-1", "ZTK26PT1VY4CU"),
    ("us-gov-east-1", "Z1ZSMQQ6Q24QQ8"),
    ("us-gov-west-1", "ZMG1MZ2THAWF1"),
];

/// Result of a zone lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ZoneId {
    /// Known canonical zone id.
    Resolved(&'static str),
    /// Region is not in the table.
    Unresolved,
}

impl ZoneId {
    /// The zone id, or an empty string when unresolved.
    pub fn as_str_or_empty(&self) -> &'static str {
        match self {
            ZoneId::Resolved(id) => id,
            ZoneId::Unresolved => "",
        }
    }

    /// Whether the region was found in the table.
    pub fn is_resolved(&self) -> bool {
        matches!(self, ZoneId::Resolved(_))
    }
}

/// Resolve the load-balancer hosted-zone id for a region code.
pub fn resolve(region: &str) -> ZoneId {
    NLB_HOSTED_ZONES
        .iter()
        .find(|(code, _)| *code == region)
        .map_or(ZoneId::Unresolved, |(_, id)| ZoneId::Resolved(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_region() {
        assert_eq!(resolve("ap-northeast-1"), ZoneId::Resolved("Z31USIVHYNEOWT"));
        assert_eq!(resolve("us-east-1"), ZoneId::Resolved("Z26RNL4JYFTOTI"));
        assert_eq!(resolve("us-gov-west-1"), ZoneId::Resolved("ZMG1MZ2THAWF1"));
    }

    #[test]
    fn test_every_entry_resolves_to_its_literal() {
        for (region, id) in NLB_HOSTED_ZONES {
            assert_eq!(resolve(region), ZoneId::Resolved(id), "region {region}");
            assert_eq!(resolve(region), resolve(region));
        }
        assert_eq!(NLB_HOSTED_ZONES.len(), 25);
    }

    #[test]
    fn test_unknown_region_is_unresolved() {
        let zone = resolve("mars-central-1");
        assert_eq!(zone, ZoneId::Unresolved);
        assert!(!zone.is_resolved());
        assert_eq!(zone.as_str_or_empty(), "");
        assert_eq!(resolve(""), ZoneId::Unresolved);
    }
}
