//! Plan → execute → review

use super::common::*;
use phase_router::availability::AvailabilityGate;
use phase_router::request::{TaskContext, WorkspaceTaskType};
use phase_router::review::CompletionStatus;
use phase_router::{Backend, RouterError, TaskWorkflow};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn three_phases() -> Vec<Script> {
    vec![
        simple_phase("1. Add the route\n2. Add a test", Some(0.10)),
        Script::Messages(vec![
            action("Write", json!({"file_path": "/work/ws/src/health.rs"})),
            action("Bash", json!({"command": "cargo test"})),
            text("Added the route and a test"),
            finished(Some(0.004), true),
        ]),
        simple_phase(
            "## Completion Status\nCOMPLETE\n## Outstanding Items\nNone\n## Recommendations\n- Add metrics",
            Some(0.05),
        ),
    ]
}

fn context() -> TaskContext {
    TaskContext::new("wf-1", "implement a health endpoint", "/work/ws")
        .with_task_type(WorkspaceTaskType::Refine)
}

#[tokio::test]
async fn test_runs_all_phases_in_order() {
    let harness = Harness::new(three_phases());
    let workflow = TaskWorkflow::new(Arc::clone(&harness.coordinator)).with_console(false);

    let outcome = workflow.run(context(), &CancellationToken::new()).await.unwrap();

    assert_eq!(outcome.task_id, "wf-1");
    assert_eq!(outcome.plan.backend_used, Backend::Claude);
    assert_eq!(outcome.execution.backend_used, Backend::Glm);
    assert_eq!(outcome.review.backend_used, Backend::Claude);
    assert!(outcome.success());
    assert_eq!(outcome.completion_status(), CompletionStatus::Complete);
    assert!((outcome.total_cost - 0.154).abs() < 1e-12);
    assert!(outcome.finished_at >= outcome.started_at);
    assert!(outcome
        .execution
        .files_modified
        .contains(&PathBuf::from("src/health.rs")));

    let calls = harness.transport.calls();
    assert_eq!(calls.len(), 3);
    // Plan flows into execution, execution counts flow into review
    assert!(calls[0].0.prompt_text.contains("## Refine Task"));
    assert!(calls[1].0.prompt_text.contains("1. Add the route"));
    assert!(calls[1].0.prompt_text.contains("Cost-Optimized Execution"));
    assert!(calls[2].0.prompt_text.contains("Files Modified: 1"));
    assert!(calls[2].0.prompt_text.contains("Commands Executed: 1"));
}

#[tokio::test]
async fn test_budget_stops_before_next_phase() {
    let harness = Harness::new(three_phases());
    let workflow = TaskWorkflow::new(Arc::clone(&harness.coordinator))
        .with_max_task_cost(Some(0.05))
        .with_console(false);

    let err = workflow.run(context(), &CancellationToken::new()).await.unwrap_err();

    match err {
        RouterError::BudgetExceeded { spent, limit } => {
            assert!((spent - 0.10).abs() < 1e-12);
            assert_eq!(limit, 0.05);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(harness.transport.call_count(), 1);
}

#[tokio::test]
async fn test_budget_counts_only_reported_costs() {
    let harness = Harness::new(vec![
        simple_phase("plan", None),
        simple_phase("work", None),
        simple_phase("COMPLETE", None),
    ]);
    let workflow = TaskWorkflow::new(Arc::clone(&harness.coordinator))
        .with_max_task_cost(Some(0.01))
        .with_console(false);

    let outcome = workflow.run(context(), &CancellationToken::new()).await.unwrap();
    assert_eq!(outcome.total_cost, 0.0);
    assert_eq!(harness.transport.call_count(), 3);
}

#[tokio::test]
async fn test_fallback_workflow_runs_everything_on_premium() {
    let harness = Harness::new(three_phases());
    let gate = AvailabilityGate::with_probe(HangingProbe, Duration::from_millis(20));
    assert!(!harness.coordinator.initialize(&gate).await);

    let workflow = TaskWorkflow::new(Arc::clone(&harness.coordinator)).with_console(false);
    let outcome = workflow.run(context(), &CancellationToken::new()).await.unwrap();

    for result in [&outcome.plan, &outcome.execution, &outcome.review] {
        assert_eq!(result.backend_used, Backend::Claude);
    }
    for (request, command) in harness.transport.calls() {
        assert!(command.direct);
        assert!(!request.prompt_text.contains("Cost-Optimized Execution"));
    }

    let report = harness.coordinator.usage_report();
    assert_eq!(report.per_backend.len(), 1);
    assert_eq!(report.savings.savings, 0.0);
}

#[tokio::test]
async fn test_phase_error_aborts_workflow() {
    let harness = Harness::new(vec![
        simple_phase("plan", Some(0.01)),
        Script::FailOpen("backend crashed".to_string()),
    ]);
    let workflow = TaskWorkflow::new(Arc::clone(&harness.coordinator)).with_console(false);

    let err = workflow.run(context(), &CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, RouterError::StreamFailure { backend: Backend::Glm, .. }));
    assert_eq!(harness.transport.call_count(), 2);
    assert_eq!(harness.coordinator.usage_report().total_requests, 2);
}
