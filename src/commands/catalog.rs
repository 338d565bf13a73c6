//! Lookup commands that need no cluster parameters.

use serde::Serialize;

use super::Context;
use crate::error::Result;
use crate::output::Displayable;
use crate::provision::instance::{InstanceTypeId, ResourceProfile, partition};
use crate::provision::region::{self, NLB_HOSTED_ZONES};

impl Displayable for ResourceProfile {
    fn table_row(&self) -> Vec<String> {
        vec![
            self.name(),
            self.display_name(),
            self.limits.cpu_cores.to_string(),
            format!("{}G", self.limits.memory_gib),
            self.limits.gpu_count.to_string(),
        ]
    }

    fn table_headers() -> Vec<&'static str> {
        vec!["NAME", "DISPLAY NAME", "CPU", "MEMORY", "GPU"]
    }
}

/// Print the resource profiles of each instance type.
pub async fn instance_types(ctx: &Context, types: &[String]) -> Result<()> {
    let ids = types.iter().map(|t| t.parse()).collect::<Result<Vec<InstanceTypeId>>>()?;
    let profiles: Vec<ResourceProfile> = ids.iter().flat_map(partition).collect();
    ctx.output.table(&profiles)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RegionZone<'a> {
    region: &'a str,
    hosted_zone_id: &'a str,
}

impl Displayable for RegionZone<'_> {
    fn table_row(&self) -> Vec<String> {
        vec![self.region.to_string(), self.hosted_zone_id.to_string()]
    }

    fn table_headers() -> Vec<&'static str> {
        vec!["REGION", "HOSTED ZONE"]
    }
}

/// Print the load balancer hosted zone of one region, or of every region.
///
/// An unknown region prints an empty zone id and a warning.
pub async fn zone(ctx: &Context, region_code: Option<&str>) -> Result<()> {
    let rows: Vec<RegionZone<'_>> = match region_code {
        Some(code) => {
            let zone = region::resolve(code);
            if !zone.is_resolved() {
                ctx.output.warn(&format!("No load balancer hosted zone known for '{code}'"));
            }
            vec![RegionZone { region: code, hosted_zone_id: zone.as_str_or_empty() }]
        }
        None => NLB_HOSTED_ZONES
            .iter()
            .map(|(region, id)| RegionZone { region, hosted_zone_id: id })
            .collect(),
    };
    ctx.output.table(&rows)
}
