//! Instance-type resource profiles.
//!
//! Users pick from quarter, half and full slices of each node instance type.
//! The slices are derived from the instance type name alone: the size token
//! gives CPU and memory, the family gives the memory ratio and GPU count.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Node label carrying the instance type.
pub const INSTANCE_TYPE_LABEL: &str = "instance-type";
/// Node label marking nodes that run user servers.
pub const COMPONENT_LABEL: &str = "component";
/// Value of [`COMPONENT_LABEL`] on user nodes.
pub const USER_COMPONENT: &str = "singleuser-server";
/// Taint key reserving nodes for user servers.
pub const DEDICATED_TAINT_KEY: &str = "hub.jupyter.org/dedicated";
/// Node label and taint key for GPU nodes, also the GPU resource name.
pub const GPU_RESOURCE: &str = "nvidia.com/gpu";

/// Size token -> (cpu cores, memory GiB) for general purpose families.
const SIZE_TABLE: &[(&str, u32, u32)] = &[
    ("xlarge", 4, 16),
    ("2xlarge", 8, 32),
    ("4xlarge", 16, 64),
    ("8xlarge", 32, 128),
    ("12xlarge", 48, 192),
    ("16xlarge", 64, 256),
    ("24xlarge", 96, 384),
    ("metal", 96, 384),
];

/// Amounts used when the size token is not in the table.
const DEFAULT_CPU: u32 = 2;
const DEFAULT_MEMORY_GIB: u32 = 8;

/// A cloud instance type such as `g4dn.2xlarge`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InstanceTypeId {
    family: String,
    size: String,
}

impl InstanceTypeId {
    /// Build an id from known-good parts.
    pub fn new(family: impl Into<String>, size: impl Into<String>) -> Self {
        Self { family: family.into(), size: size.into() }
    }

    /// Instance family, e.g. `g4dn`.
    pub fn family(&self) -> &str {
        &self.family
    }

    /// Instance size, e.g. `2xlarge`.
    pub fn size(&self) -> &str {
        &self.size
    }
}

impl FromStr for InstanceTypeId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().split_once('.') {
            Some((family, size)) if !family.is_empty() && !size.is_empty() => {
                Ok(Self { family: family.to_string(), size: size.to_string() })
            }
            _ => Err(Error::config(format!(
                "Invalid instance type '{s}': expected <family>.<size>, e.g. t3a.xlarge"
            ))),
        }
    }
}

impl TryFrom<String> for InstanceTypeId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<InstanceTypeId> for String {
    fn from(id: InstanceTypeId) -> Self {
        id.to_string()
    }
}

impl fmt::Display for InstanceTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.family, self.size)
    }
}

/// CPU, memory and GPU quantities of an instance type or slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceAmounts {
    /// Whole CPU cores.
    pub cpu_cores: u32,
    /// Memory in GiB.
    pub memory_gib: u32,
    /// Whole GPUs.
    pub gpu_count: u32,
}

impl ResourceAmounts {
    /// Decode the resources of an instance type.
    ///
    /// Unknown sizes fall back to 2 CPU / 8 GiB.
    pub fn of(instance_type: &InstanceTypeId) -> Self {
        let family = instance_type.family();
        let size = instance_type.size();

        let (cpu_cores, mut memory_gib) = SIZE_TABLE
            .iter()
            .find(|(token, _, _)| *token == size)
            .map_or((DEFAULT_CPU, DEFAULT_MEMORY_GIB), |&(_, cpu, memory)| (cpu, memory));

        // Compute optimized families ship half the memory per core.
        if family.starts_with('c') {
            memory_gib /= 2;
        }

        Self { cpu_cores, memory_gib, gpu_count: gpu_count(family, size) }
    }
}

fn gpu_count(family: &str, size: &str) -> u32 {
    match family {
        "g4dn" => match size {
            "12xlarge" => 4,
            "metal" => 8,
            _ => 1,
        },
        "p3" | "p3dn" => match size {
            "2xlarge" => 1,
            "8xlarge" => 4,
            "16xlarge" | "24xlarge" => 8,
            _ => 0,
        },
        _ => 0,
    }
}

/// Fraction of an instance a profile offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Slice {
    /// One quarter of the instance.
    Quarter,
    /// One half of the instance.
    Half,
    /// The whole instance.
    Full,
}

impl Slice {
    /// All slices, smallest first.
    pub const ALL: [Slice; 3] = [Slice::Quarter, Slice::Half, Slice::Full];

    /// Divisor applied to the instance amounts.
    pub fn denominator(self) -> u32 {
        match self {
            Slice::Quarter => 4,
            Slice::Half => 2,
            Slice::Full => 1,
        }
    }

    /// Capitalized label used in display names.
    pub fn label(self) -> &'static str {
        match self {
            Slice::Quarter => "Quarter",
            Slice::Half => "Half",
            Slice::Full => "Full",
        }
    }

    /// Lowercase suffix used in profile names.
    pub fn suffix(self) -> &'static str {
        match self {
            Slice::Quarter => "quarter",
            Slice::Half => "half",
            Slice::Full => "full",
        }
    }
}

/// Whether an instance type carries accelerators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProfileClass {
    /// No GPUs.
    #[serde(rename = "CPU")]
    Cpu,
    /// At least one GPU.
    #[serde(rename = "GPU")]
    Gpu,
}

impl fmt::Display for ProfileClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileClass::Cpu => write!(f, "CPU"),
            ProfileClass::Gpu => write!(f, "GPU"),
        }
    }
}

/// Taint toleration operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TolerationOperator {
    /// Key and value must match.
    Equal,
    /// Key must exist.
    Exists,
}

/// A pod toleration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Toleration {
    /// Taint key.
    pub key: String,
    /// Match operator.
    pub operator: TolerationOperator,
    /// Taint value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Taint effect.
    pub effect: String,
}

impl Toleration {
    /// Tolerate the `dedicated=user` taint of user nodes.
    pub fn dedicated_user() -> Self {
        Self {
            key: DEDICATED_TAINT_KEY.to_string(),
            operator: TolerationOperator::Equal,
            value: Some("user".to_string()),
            effect: "NoSchedule".to_string(),
        }
    }

    /// Tolerate the GPU taint of accelerator nodes.
    pub fn gpu() -> Self {
        Self {
            key: GPU_RESOURCE.to_string(),
            operator: TolerationOperator::Exists,
            value: Some("true".to_string()),
            effect: "NoSchedule".to_string(),
        }
    }
}

/// Scheduler requests of a profile.
///
/// CPU and memory are requested at 80% of the limit; GPUs are never
/// over-committed so their request equals the limit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequests {
    /// Requested CPU cores.
    pub cpu: f64,
    /// Requested memory in GiB.
    pub memory_gib: f64,
    /// Requested GPUs.
    pub gpu_count: u32,
}

impl ResourceRequests {
    fn for_limits(limits: ResourceAmounts) -> Self {
        Self {
            cpu: eighty_percent(limits.cpu_cores),
            memory_gib: eighty_percent(limits.memory_gib),
            gpu_count: limits.gpu_count,
        }
    }
}

// Integer numerator first so results print as 3.2 rather than 3.2000000000000006.
fn eighty_percent(limit: u32) -> f64 {
    f64::from(limit * 8) / 10.0
}

/// One schedulable slice of an instance type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceProfile {
    /// Instance type the slice is cut from.
    pub instance_type: InstanceTypeId,
    /// Which slice.
    pub slice: Slice,
    /// CPU or GPU class of the whole instance type.
    pub class: ProfileClass,
    /// Resource limits.
    pub limits: ResourceAmounts,
    /// Resource requests.
    pub requests: ResourceRequests,
    /// Node selector pinning the pod to the instance type's user nodes.
    pub node_selector: BTreeMap<String, String>,
    /// Tolerations for the user (and GPU) taints.
    pub tolerations: Vec<Toleration>,
}

impl ResourceProfile {
    /// Profile name, e.g. `g4dn.xlarge-half`.
    pub fn name(&self) -> String {
        format!("{}-{}", self.instance_type, self.slice.suffix())
    }

    /// Display name, e.g. `[GPU] g4dn.xlarge -> Half`.
    pub fn display_name(&self) -> String {
        format!("[{}] {} -> {}", self.class, self.instance_type, self.slice.label())
    }

    /// Human readable summary of the limits.
    pub fn description(&self) -> String {
        format!(
            "CPU: {} / Memory: {}G / GPU: {}",
            self.limits.cpu_cores, self.limits.memory_gib, self.limits.gpu_count
        )
    }
}

/// Cut an instance type into quarter, half and full profiles.
///
/// The quarter slice is omitted when it would get less than one core. GPUs
/// are only divided when every slice still gets at least one whole GPU;
/// otherwise each slice carries the instance's full GPU count.
pub fn partition(instance_type: &InstanceTypeId) -> Vec<ResourceProfile> {
    let total = ResourceAmounts::of(instance_type);
    let class = if total.gpu_count > 0 { ProfileClass::Gpu } else { ProfileClass::Cpu };

    Slice::ALL
        .iter()
        .filter(|slice| total.cpu_cores / slice.denominator() >= 1)
        .map(|&slice| {
            let d = slice.denominator();
            let gpu_count =
                if total.gpu_count / d >= 1 { total.gpu_count / d } else { total.gpu_count };
            let limits = ResourceAmounts {
                cpu_cores: total.cpu_cores / d,
                memory_gib: total.memory_gib / d,
                gpu_count,
            };

            let node_selector = BTreeMap::from([
                (INSTANCE_TYPE_LABEL.to_string(), instance_type.to_string()),
                (COMPONENT_LABEL.to_string(), USER_COMPONENT.to_string()),
            ]);

            let mut tolerations = vec![Toleration::dedicated_user()];
            if gpu_count > 0 {
                tolerations.push(Toleration::gpu());
            }

            ResourceProfile {
                instance_type: instance_type.clone(),
                slice,
                class,
                limits,
                requests: ResourceRequests::for_limits(limits),
                node_selector,
                tolerations,
            }
        })
        .collect()
}
