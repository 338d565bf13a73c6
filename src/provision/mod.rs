//! Derivation core: everything computed before the provisioning engine runs.

pub mod action;
pub mod addons;
pub mod engine;
pub mod exposure;
pub mod graph;
pub mod instance;
pub mod plan;
pub mod region;
pub mod secrets;
pub mod snapshot;
pub mod values;

pub use engine::{ProvisioningEngine, SynthEngine};
pub use plan::{Derivation, StackOutputs, derive};
