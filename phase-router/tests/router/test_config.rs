//! Configuration files driving the coordinator

use super::common::*;
use phase_router::config::RouterConfig;
use phase_router::{Backend, ExecutionCoordinator, Phase, RouterError};
use std::fs;

fn write_config(yaml: &str) -> (tempfile::TempDir, RouterConfig) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    fs::write(&path, yaml).unwrap();
    let config = RouterConfig::load(&path).unwrap();
    (dir, config)
}

#[test]
fn test_configured_backends_and_patterns() {
    let (_dir, config) = write_config(
        r#"
ccs:
  binary_path: /usr/local/bin/ccs
  models:
    kimi:
      flags: ["--context", "long"]
  routing:
    cost_optimized: kimi
    complex_patterns: ["Migration"]
    routine_patterns: ["chore"]
"#,
    );
    let coordinator = ExecutionCoordinator::new(config);

    assert_eq!(coordinator.backend_for(Phase::Execution, "database migration"), Backend::Claude);
    assert_eq!(coordinator.backend_for(Phase::Execution, "chore: bump deps"), Backend::Kimi);
    assert_eq!(coordinator.backend_for(Phase::Execution, "anything else"), Backend::Kimi);
    assert_eq!(
        coordinator.command_for(Backend::Kimi).display(),
        "/usr/local/bin/ccs kimi --context long"
    );
}

#[test]
fn test_large_context_rule_is_opt_in() {
    let default = ExecutionCoordinator::new(RouterConfig::default());
    assert_eq!(
        default.backend_for(Phase::Execution, "scan the large codebase"),
        Backend::Glm
    );

    let (_dir, config) = write_config(
        r#"
ccs:
  routing:
    large_context: gemini
"#,
    );
    let coordinator = ExecutionCoordinator::new(config);
    assert_eq!(
        coordinator.backend_for(Phase::Execution, "scan the large codebase"),
        Backend::Gemini
    );
    // Routine patterns still win over the large-context rule
    assert_eq!(
        coordinator.backend_for(Phase::Execution, "refactor the large codebase"),
        Backend::Glm
    );
}

#[test]
fn test_disabled_routing_in_config() {
    let (_dir, config) = write_config("ccs:\n  enabled: false\n");
    let harness = Harness::with(config, Vec::new(), ScriptedWorkspace::default());

    assert!(!harness.coordinator.routing_enabled());
    assert_eq!(
        harness.coordinator.backend_for(Phase::Execution, "write tests"),
        Backend::Claude
    );
    assert!(harness.coordinator.command_for(Backend::Glm).direct);
}

#[test]
fn test_custom_premium_rate_feeds_savings_baseline() {
    let (_dir, config) = write_config(
        r#"
ccs:
  models:
    default:
      cost_per_million: 3.0
  savings:
    tokens_per_request: 4000
"#,
    );
    let coordinator = ExecutionCoordinator::new(config);
    let baseline = coordinator.ledger().baseline();

    assert_eq!(baseline.premium, Backend::Claude);
    assert_eq!(baseline.premium_rate, 3.0);
    assert_eq!(baseline.tokens_per_request, 4000);
}

#[test]
fn test_invalid_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    fs::write(&path, "ccs:\n  cost_optimization:\n    max_task_cost: -1\n").unwrap();

    assert!(matches!(RouterConfig::load(&path), Err(RouterError::Config(_))));
}
