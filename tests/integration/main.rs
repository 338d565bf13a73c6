//! Integration tests for the `hubstack` CLI.

#![allow(clippy::unwrap_used)] // Tests can use unwrap for cleaner assertions

mod common;

use common::Sandbox;
use predicates::prelude::*;

/// Test that the CLI shows help.
#[test]
fn test_help() {
    Sandbox::new()
        .cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("hubstack"))
        .stdout(predicate::str::contains("synth"));
}

/// Test that the CLI shows version.
#[test]
fn test_version() {
    Sandbox::new()
        .cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

/// Test that unrecognized commands fail.
#[test]
fn test_unknown_command() {
    Sandbox::new().cmd().arg("unknown-command").assert().failure();
}

#[test]
fn test_synth_with_base_domain() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["synth", "--name", "lab", "--base-domain", "aws.example.io"])
        .assert()
        .success()
        .stdout(predicate::str::contains("https://hub.eks-lab.aws.example.io"))
        .stdout(predicate::str::contains("phadmin"));

    let dir = sandbox.artifact_dir().join("eks-lab");
    let values = std::fs::read_to_string(dir.join("helm_override/primehub.yaml")).unwrap();
    assert!(values.contains("hub.eks-lab.aws.example.io"));
    let env = std::fs::read_to_string(dir.join(".env")).unwrap();
    assert!(env.contains("PRIMEHUB_DOMAIN=hub.eks-lab.aws.example.io\n"));
    assert!(dir.join("plan.json").is_file());

    let bucket = sandbox.buckets().join("eks-lab-primehub-config");
    assert!(bucket.join("helm_override/primehub.yaml").is_file());
    assert!(bucket.join(".env").is_file());
}

#[test]
fn test_synth_json_uses_environment_secret() {
    let sandbox = Sandbox::new();
    let output = sandbox
        .cmd()
        .env("PH_PASSWORD", "from-env")
        .args(["synth", "--output", "json", "--keycloak-password", "from-flag"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let outputs: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(outputs["adminPassword"], "from-env");
    assert_eq!(outputs["keycloakPassword"], "from-flag");
    assert_eq!(outputs["adminAccount"], "phadmin");
    // No base domain: served through the CDN
    assert!(outputs["publicUrl"].as_str().unwrap().starts_with("https://${"));
}

#[test]
fn test_synth_generates_distinct_secrets() {
    let sandbox = Sandbox::new();
    let output =
        sandbox.cmd().args(["synth", "--output", "json", "--config-bucket", ""]).output().unwrap();
    assert!(output.status.success());

    let outputs: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let admin = outputs["adminPassword"].as_str().unwrap();
    let keycloak = outputs["keycloakPassword"].as_str().unwrap();
    assert_eq!(admin.len(), 64);
    assert_ne!(admin, keycloak);
}

#[test]
fn test_synth_without_config_bucket() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["synth", "--config-bucket", ""])
        .assert()
        .success()
        .stderr(predicate::str::contains("No config bucket configured"));

    assert!(sandbox.artifact_dir().join("eks-cdk/.env").is_file());
    assert!(!sandbox.buckets().exists());
}

#[test]
fn test_synth_custom_dirs() {
    let sandbox = Sandbox::new();
    let artifacts = sandbox.root().join("out");
    let buckets = sandbox.root().join("mirror");
    sandbox
        .cmd()
        .arg("synth")
        .arg("--artifact-dir")
        .arg(&artifacts)
        .arg("--bucket-dir")
        .arg(&buckets)
        .args(["--config-bucket", "snapshots"])
        .assert()
        .success();

    assert!(artifacts.join("eks-cdk/plan.json").is_file());
    assert!(buckets.join("snapshots/plan.json").is_file());
}

#[test]
fn test_plan_json_gates_platform() {
    let sandbox = Sandbox::new();
    let output = sandbox
        .cmd()
        .args(["plan", "--output", "json", "--base-domain", "aws.example.io"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(plan["cluster"], "eks-cdk");
    assert_eq!(plan["gate"]["dependent"], "platform");

    let actions = plan["actions"].as_array().unwrap();
    let wave_of = |id: &str| {
        actions.iter().find(|a| a["id"] == id).map(|a| a["wave"].as_u64().unwrap()).unwrap()
    };
    let platform_wave = wave_of("platform");
    for member in plan["gate"]["members"].as_array().unwrap() {
        assert!(wave_of(member.as_str().unwrap()) < platform_wave);
    }
}

#[test]
fn test_plan_dry_run_omits_platform() {
    let sandbox = Sandbox::new();
    let output = sandbox.cmd().args(["plan", "--output", "json", "--dry-run"]).output().unwrap();
    assert!(output.status.success());

    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(plan["gate"].get("dependent").is_none());
    assert!(plan["actions"].as_array().unwrap().iter().all(|a| a["id"] != "platform"));
}

#[test]
fn test_plan_table() {
    Sandbox::new()
        .cmd()
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("WAVE"))
        .stdout(predicate::str::contains("cdn-distribution"));
}

#[test]
fn test_instance_types() {
    Sandbox::new()
        .cmd()
        .args(["instance-types", "g4dn.xlarge", "t3a.medium"])
        .assert()
        .success()
        .stdout(predicate::str::contains("g4dn.xlarge-half"))
        .stdout(predicate::str::contains("[GPU] g4dn.xlarge -> Full"))
        .stdout(predicate::str::contains("t3a.medium-full"));
}

#[test]
fn test_instance_types_malformed() {
    Sandbox::new()
        .cmd()
        .args(["instance-types", "t3axlarge"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Invalid instance type"));
}

#[test]
fn test_zone_lookup() {
    Sandbox::new()
        .cmd()
        .args(["zone", "ap-northeast-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Z31USIVHYNEOWT"));

    Sandbox::new()
        .cmd()
        .args(["zone", "mars-central-1"])
        .assert()
        .success()
        .stderr(predicate::str::contains("No load balancer hosted zone"));
}

#[test]
fn test_profile_prefix_selects_profile() {
    let sandbox = Sandbox::new();
    sandbox.write_user_config(
        "profiles:\n  lab:\n    name: lab\n    region: eu-west-1\n    gpu_pool: { desired: 1, min: 0, max: 4 }\n",
    );

    sandbox
        .cmd()
        .args(["@lab", "config", "show", "--output", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"clusterName\": \"eks-lab\""))
        .stdout(predicate::str::contains("\"region\": \"eu-west-1\""));

    // Flags beat the profile
    sandbox
        .cmd()
        .args(["@lab", "config", "show", "--region", "us-west-2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("us-west-2"));
}

#[test]
fn test_environment_beats_profile() {
    let sandbox = Sandbox::new();
    sandbox.write_user_config("default_profile: lab\nprofiles:\n  lab:\n    region: eu-west-1\n");

    sandbox
        .cmd()
        .env("AWS_REGION", "ap-northeast-1")
        .args(["config", "show", "--output", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"region\": \"ap-northeast-1\""));
}

#[test]
fn test_missing_profile() {
    Sandbox::new()
        .cmd()
        .args(["--profile", "nope", "plan"])
        .assert()
        .code(5)
        .stderr(predicate::str::contains("Profile 'nope' not found"));
}

#[test]
fn test_invalid_pool_capacity() {
    Sandbox::new()
        .cmd()
        .args(["plan", "--cpu-pool", "3/0/2"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("min <= desired <= max"));
}

#[test]
fn test_completion() {
    Sandbox::new()
        .cmd()
        .args(["completion", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("hubstack"));
}

#[test]
fn test_profile_prefix_parsing() {
    use hubstack::cli::parse_profile_prefix;

    let args = vec!["hubstack".to_string(), "@prod".to_string(), "synth".to_string()];
    let (profile, remaining) = parse_profile_prefix(args);
    assert_eq!(profile, Some("prod".to_string()));
    assert_eq!(remaining.len(), 2);
}
