//! Phase execution against a scripted transport

use super::common::*;
use phase_router::config::RouterConfig;
use phase_router::request::{Capability, TaskContext};
use phase_router::review::CompletionStatus;
use phase_router::{Backend, Phase, RouterError};
use phase_router_sdk::PhaseStatus;
use serde_json::json;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn context() -> TaskContext {
    TaskContext::new("task-7", "add feature: health endpoint", "/work/ws")
}

// ============================================================================
// Streaming and status updates
// ============================================================================

#[tokio::test]
async fn test_text_is_accumulated_in_order() {
    let mut harness = Harness::new(vec![Script::Messages(vec![
        text("first"),
        text("second"),
        text("third"),
        finished(Some(0.02), true),
    ])]);

    let result = harness
        .coordinator
        .run_phase(Phase::Planning, &context(), Backend::Claude, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.output_text, "first\nsecond\nthird");
    assert!(result.success);
    assert_eq!(result.cost, Some(0.02));
    assert_eq!(result.duration, Some(Duration::from_millis(1500)));
    assert_eq!(result.turn_count, Some(2));
    assert_eq!(result.usage.map(|u| u.input_tokens), Some(120));
    assert_eq!(result.backend_used, Backend::Claude);

    let updates = harness.drain_updates();
    let statuses: Vec<_> = updates.iter().map(|u| u.status).collect();
    assert_eq!(
        statuses,
        vec![
            PhaseStatus::Running,
            PhaseStatus::Running,
            PhaseStatus::Running,
            PhaseStatus::Completed
        ]
    );
    // Running updates carry only the newest chunk
    assert_eq!(updates[0].answer, "first");
    assert_eq!(updates[1].answer, "second");
    assert_eq!(updates[2].answer, "third");
    assert!(updates.iter().all(|u| u.task_id == "task-7" && u.phase == "planner"));
    assert_eq!(updates[3].answer, "first\nsecond\nthird");
}

#[tokio::test]
async fn test_blank_chunks_are_skipped() {
    let mut harness = Harness::new(vec![Script::Messages(vec![
        text("  alpha \n"),
        text(""),
        text(" \n\t "),
        text("beta"),
        finished(None, true),
    ])]);

    let result = harness
        .coordinator
        .run_phase(Phase::Planning, &context(), Backend::Claude, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.output_text, "alpha\nbeta");
    let updates = harness.drain_updates();
    let answers: Vec<_> = updates.iter().map(|u| u.answer.as_str()).collect();
    assert_eq!(answers, vec!["alpha", "beta", "alpha\nbeta"]);
}

#[tokio::test]
async fn test_running_updates_do_not_grow_with_output() {
    let chunk = "x".repeat(1024);
    let mut messages: Vec<_> = (0..200).map(|_| text(&chunk)).collect();
    messages.push(finished(None, true));
    let mut harness = Harness::new(vec![Script::Messages(messages)]);

    let result = harness
        .coordinator
        .run_phase(Phase::Planning, &context(), Backend::Claude, &CancellationToken::new())
        .await
        .unwrap();

    let updates = harness.drain_updates();
    let (last, running) = updates.split_last().unwrap();
    assert_eq!(running.len(), 200);
    assert!(running.iter().all(|u| u.answer.len() == 1024));
    assert_eq!(last.answer, result.output_text);
}

#[tokio::test]
async fn test_missing_terminal_result_is_not_success() {
    let mut harness = Harness::new(vec![Script::Messages(vec![text("cut short")])]);

    let result = harness
        .coordinator
        .run_phase(Phase::Planning, &context(), Backend::Claude, &CancellationToken::new())
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.cost, None);
    assert_eq!(harness.drain_updates().last().unwrap().status, PhaseStatus::Error);
}

#[tokio::test]
async fn test_reported_error_marks_phase_failed() {
    let mut harness = Harness::new(vec![Script::Messages(vec![
        text("hit the turn limit"),
        finished(Some(0.05), false),
    ])]);

    let result = harness
        .coordinator
        .run_phase(Phase::Execution, &context(), Backend::Glm, &CancellationToken::new())
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.cost, Some(0.05));
    assert_eq!(harness.drain_updates().last().unwrap().status, PhaseStatus::Error);
    let usage = harness.coordinator.ledger().usage(Backend::Glm);
    assert!((usage.cumulative_cost - 0.05).abs() < 1e-12);
}

#[tokio::test]
async fn test_stream_failure_propagates_with_context() {
    let mut harness = Harness::new(vec![Script::Messages(vec![
        text("working"),
        fail("broken pipe"),
        text("never seen"),
    ])]);

    let err = harness
        .coordinator
        .run_phase(Phase::Execution, &context(), Backend::Glm, &CancellationToken::new())
        .await
        .unwrap_err();

    let message = err.to_string();
    assert!(message.contains("execution"));
    assert!(message.contains("glm"));
    assert!(message.contains("broken pipe"));

    let updates = harness.drain_updates();
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[1].status, PhaseStatus::Error);
    assert_eq!(updates[1].answer, "working");
}

#[tokio::test]
async fn test_already_cancelled_token_stops_before_streaming() {
    let mut harness = Harness::new(vec![simple_phase("unused", Some(1.0))]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = harness
        .coordinator
        .run_phase(Phase::Review, &context(), Backend::Claude, &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, RouterError::Cancelled { .. }));
    assert_eq!(harness.drain_updates().last().unwrap().status, PhaseStatus::Error);
    assert_eq!(harness.coordinator.ledger().usage(Backend::Claude).cumulative_cost, 0.0);
}

#[tokio::test]
async fn test_deadline_exceeded() {
    let mut config = RouterConfig::default();
    config.executor.phase_timeout_secs = Some(1);
    let harness = Harness::with(config, vec![Script::Hang], ScriptedWorkspace::default());

    let err = harness
        .coordinator
        .run_phase(Phase::Planning, &context(), Backend::Claude, &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        RouterError::DeadlineExceeded { timeout, phase, .. } => {
            assert_eq!(timeout, Duration::from_secs(1));
            assert_eq!(phase, Phase::Planning);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(harness.coordinator.ledger().usage(Backend::Claude).request_count, 1);
}

// ============================================================================
// Requests handed to the transport
// ============================================================================

#[tokio::test]
async fn test_capabilities_follow_phase() {
    let harness = Harness::new(Vec::new());
    let cancel = CancellationToken::new();
    for phase in Phase::ALL {
        harness
            .coordinator
            .run_phase(phase, &context(), Backend::Claude, &cancel)
            .await
            .unwrap();
    }

    let calls = harness.transport.calls();
    let (planning, execution, review) = (&calls[0].0, &calls[1].0, &calls[2].0);
    for read_only in [planning, review] {
        assert!(read_only.allows(Capability::Read));
        assert!(!read_only.allows(Capability::Write));
        assert!(!read_only.allows(Capability::Bash));
        assert_eq!(read_only.max_turns, 10);
    }
    assert!(execution.allows(Capability::Write));
    assert!(execution.allows(Capability::Edit));
    assert!(execution.allows(Capability::Bash));
    assert_eq!(execution.max_turns, 30);
    assert_eq!(execution.working_directory, PathBuf::from("/work/ws"));
}

#[tokio::test]
async fn test_premium_direct_path_bypasses_multiplexer() {
    let mut config = RouterConfig::default();
    config.ccs.models.insert(
        Backend::Claude,
        phase_router::registry::BackendConfig {
            use_direct_path: true,
            ..Default::default()
        },
    );
    let harness = Harness::with(config, Vec::new(), ScriptedWorkspace::default());
    let cancel = CancellationToken::new();

    for backend in [Backend::Claude, Backend::Glm] {
        harness
            .coordinator
            .run_phase(Phase::Planning, &context(), backend, &cancel)
            .await
            .unwrap();
    }

    let calls = harness.transport.calls();
    assert_eq!(calls[0].1.program, "claude");
    assert!(calls[0].1.direct);
    assert_eq!(calls[1].1.display(), "ccs glm");
}

// ============================================================================
// Execution artifacts
// ============================================================================

#[tokio::test]
async fn test_execution_diff_unions_reported_and_new_files() {
    let workspace = ScriptedWorkspace::new(vec![
        Ok(vec!["src/lib.rs", "Cargo.toml"]),
        Ok(vec!["src/lib.rs", "Cargo.toml", "src/generated.rs"]),
    ]);
    let harness = Harness::with(
        RouterConfig::default(),
        vec![Script::Messages(vec![
            action("Write", json!({"file_path": "/work/ws/src/lib.rs", "content": "..."})),
            action("Bash", json!({"command": "cargo run --bin codegen"})),
            action("Read", json!({"file_path": "/work/ws/Cargo.toml"})),
            text("done"),
            finished(Some(0.01), true),
        ])],
        workspace,
    );

    let result = harness
        .coordinator
        .run_phase(Phase::Execution, &context(), Backend::Glm, &CancellationToken::new())
        .await
        .unwrap();

    let files: Vec<_> = result.files_modified.iter().cloned().collect();
    assert_eq!(files, vec![PathBuf::from("src/generated.rs"), PathBuf::from("src/lib.rs")]);
    assert_eq!(result.commands_executed, vec!["cargo run --bin codegen".to_string()]);
    assert!(result.review.is_none());
}

#[tokio::test]
async fn test_after_snapshot_failure_keeps_reported_files() {
    let workspace = ScriptedWorkspace::new(vec![
        Ok(vec![]),
        Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied")),
    ]);
    let harness = Harness::with(
        RouterConfig::default(),
        vec![Script::Messages(vec![
            action("Edit", json!({"file_path": "README.md"})),
            finished(None, true),
        ])],
        workspace,
    );

    let result = harness
        .coordinator
        .run_phase(Phase::Execution, &context(), Backend::Glm, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.files_modified.len(), 1);
    assert!(result.files_modified.contains(&PathBuf::from("README.md")));
}

#[tokio::test]
async fn test_before_snapshot_failure_aborts_without_dispatch() {
    let workspace = ScriptedWorkspace::new(vec![Err(io::Error::new(
        io::ErrorKind::NotFound,
        "missing workspace",
    ))]);
    let harness = Harness::with(RouterConfig::default(), Vec::new(), workspace);

    let err = harness
        .coordinator
        .run_phase(Phase::Execution, &context(), Backend::Glm, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, RouterError::Io(_)));
    assert_eq!(harness.transport.call_count(), 0);
    assert_eq!(harness.coordinator.ledger().usage(Backend::Glm).request_count, 0);
}

#[tokio::test]
async fn test_planning_discards_actions() {
    let harness = Harness::new(vec![Script::Messages(vec![
        action("Write", json!({"file_path": "notes.md"})),
        action("Bash", json!({"command": "ls"})),
        finished(None, true),
    ])]);

    let result = harness
        .coordinator
        .run_phase(Phase::Planning, &context(), Backend::Claude, &CancellationToken::new())
        .await
        .unwrap();

    assert!(result.files_modified.is_empty());
    assert!(result.commands_executed.is_empty());
}

// ============================================================================
// Review extraction
// ============================================================================

#[tokio::test]
async fn test_review_phase_extracts_verdict() {
    let review_text = "## Completion Status\nINCOMPLETE\n\n## Outstanding Items\n- Add tests\n\n## Recommendations\n- None";
    let harness = Harness::new(vec![simple_phase(review_text, Some(0.03))]);

    let result = harness
        .coordinator
        .run_phase(Phase::Review, &context(), Backend::Claude, &CancellationToken::new())
        .await
        .unwrap();

    let review = result.review.unwrap();
    assert_eq!(review.status, CompletionStatus::Incomplete);
    assert_eq!(review.outstanding_items, vec!["Add tests".to_string()]);
    assert!(review.recommendations.is_empty());
}

#[tokio::test]
async fn test_unparseable_review_degrades_to_unknown() {
    let harness = Harness::new(vec![simple_phase("lgtm", None)]);

    let result = harness
        .coordinator
        .run_phase(Phase::Review, &context(), Backend::Claude, &CancellationToken::new())
        .await
        .unwrap();

    let review = result.review.unwrap();
    assert_eq!(review.status, CompletionStatus::Unknown);
    assert!(review.outstanding_items.is_empty());
}
