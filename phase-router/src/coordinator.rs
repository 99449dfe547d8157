//! Execution coordinator: runs one phase end-to-end against a backend.
//!
//! The coordinator owns the routing latch and the usage ledger. Every phase
//! call goes through a [`PhaseGuard`], whose `Drop` emits the final status and
//! records the ledger entry, so bookkeeping happens on success, on stream
//! failure, on cancellation and when the caller drops the future.

use futures::StreamExt;
use phase_router_sdk::{
    log_routing_disabled, log_usage_recorded, PhaseStatus, StatusObserver, StatusUpdate,
    StderrObserver,
};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::availability::{AvailabilityGate, BackendProbe, RoutingLatch};
use crate::backend::{Backend, Phase};
use crate::config::RouterConfig;
use crate::error::{Result, RouterError};
use crate::ledger::{UsageLedger, UsageReport};
use crate::prompts;
use crate::registry::{BackendRegistry, InvocationCommand};
use crate::request::{ExecutionSummary, PhaseRequest, TaskContext};
use crate::review::{extract_review, ReviewExtraction};
use crate::router::{PhaseRouter, RoutingDecision};
use crate::transport::{CliTransport, StreamMessage, TerminalResult, TokenUsage, Transport};
use crate::workspace::{self, FsWorkspace, Workspace};

/// Actions whose parameters name a file they write
const FILE_WRITE_ACTIONS: &[&str] = &["Write", "Edit", "MultiEdit", "NotebookEdit"];
const SHELL_ACTIONS: &[&str] = &["Bash"];

/// Outcome of one phase call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseResult {
    pub phase: Phase,
    pub output_text: String,
    /// Reported cost in USD; `None` when the backend did not report one
    pub cost: Option<f64>,
    /// Backend-reported duration
    pub duration: Option<Duration>,
    pub turn_count: Option<u32>,
    pub usage: Option<TokenUsage>,
    /// Wall-clock time measured by the coordinator
    pub elapsed: Duration,
    pub backend_used: Backend,
    pub success: bool,
    pub files_modified: BTreeSet<PathBuf>,
    pub commands_executed: Vec<String>,
    pub review: Option<ReviewExtraction>,
}

impl PhaseResult {
    /// Hand-off from Execution to Review
    pub fn execution_summary(&self) -> ExecutionSummary {
        ExecutionSummary {
            output: self.output_text.clone(),
            files_modified: self.files_modified.clone(),
            commands_executed: self.commands_executed.clone(),
        }
    }
}

pub struct CoordinatorBuilder {
    config: RouterConfig,
    transport: Option<Arc<dyn Transport>>,
    observer: Option<Arc<dyn StatusObserver>>,
    workspace: Option<Arc<dyn Workspace>>,
    ledger: Option<Arc<UsageLedger>>,
}

impl CoordinatorBuilder {
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    pub fn observer(mut self, observer: Arc<dyn StatusObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn workspace(mut self, workspace: impl Workspace + 'static) -> Self {
        self.workspace = Some(Arc::new(workspace));
        self
    }

    /// Share an existing ledger instead of creating one
    pub fn ledger(mut self, ledger: Arc<UsageLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn build(self) -> ExecutionCoordinator {
        let registry = BackendRegistry::from_config(&self.config);
        let ledger = self.ledger.unwrap_or_else(|| {
            Arc::new(UsageLedger::from_registry(
                &registry,
                self.config.ccs.savings.tokens_per_request,
            ))
        });

        ExecutionCoordinator {
            router: PhaseRouter::new(self.config.ccs.routing.clone()),
            latch: RoutingLatch::new(self.config.ccs.enabled),
            registry,
            ledger,
            transport: self.transport.unwrap_or_else(|| Arc::new(CliTransport::new())),
            observer: self.observer.unwrap_or_else(|| Arc::new(StderrObserver)),
            workspace: self.workspace.unwrap_or_else(|| Arc::new(FsWorkspace)),
            config: self.config,
        }
    }
}

pub struct ExecutionCoordinator {
    config: RouterConfig,
    registry: BackendRegistry,
    router: PhaseRouter,
    latch: RoutingLatch,
    ledger: Arc<UsageLedger>,
    transport: Arc<dyn Transport>,
    observer: Arc<dyn StatusObserver>,
    workspace: Arc<dyn Workspace>,
}

impl ExecutionCoordinator {
    pub fn builder(config: RouterConfig) -> CoordinatorBuilder {
        CoordinatorBuilder {
            config,
            transport: None,
            observer: None,
            workspace: None,
            ledger: None,
        }
    }

    pub fn new(config: RouterConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    pub fn router(&self) -> &PhaseRouter {
        &self.router
    }

    pub fn ledger(&self) -> &Arc<UsageLedger> {
        &self.ledger
    }

    pub fn usage_report(&self) -> UsageReport {
        self.ledger.report()
    }

    /// Probe the multiplexer once at startup.
    ///
    /// A failed probe disables routing for the rest of the process. Returns
    /// whether routing is enabled afterwards; never fails.
    pub async fn initialize<P: BackendProbe>(&self, gate: &AvailabilityGate<P>) -> bool {
        if !self.latch.is_enabled() {
            tracing::info!("coordinator.routing.disabled_by_config");
            return false;
        }

        if let Err(e) = gate.check(self.registry.binary_path()).await {
            tracing::warn!(error = %e, "availability.probe.failed");
            self.disable_routing(&e.to_string());
            return false;
        }

        tracing::debug!(binary = self.registry.binary_path(), "availability.probe.ok");
        true
    }

    pub fn routing_enabled(&self) -> bool {
        self.latch.is_enabled()
    }

    /// Switch to the fallback path. Returns true for the call that did it.
    pub fn disable_routing(&self, reason: &str) -> bool {
        let flipped = self.latch.disable();
        if flipped {
            log_routing_disabled!(reason);
        }
        flipped
    }

    /// Backend for a phase, honoring the fallback path
    pub fn backend_for(&self, phase: Phase, task_description: &str) -> Backend {
        if self.routing_enabled() {
            self.router.select_backend(phase, task_description)
        } else {
            self.registry.premium()
        }
    }

    pub fn route(&self, phase: Phase, task_description: &str) -> RoutingDecision {
        RoutingDecision {
            phase,
            task_text: task_description.to_string(),
            selected_backend: self.backend_for(phase, task_description),
        }
    }

    /// How `backend` would be started right now
    pub fn command_for(&self, backend: Backend) -> InvocationCommand {
        self.registry.command_for(backend, self.routing_enabled())
    }

    pub fn build_request(&self, phase: Phase, ctx: &TaskContext, backend: Backend) -> PhaseRequest {
        let premium = backend == self.registry.premium();
        let prompt = match phase {
            Phase::Planning => prompts::planner_prompt(ctx),
            Phase::Execution => prompts::worker_prompt(ctx, !premium),
            Phase::Review => prompts::evaluator_prompt(ctx),
        };

        let executor = &self.config.executor;
        let mut request = PhaseRequest::new(phase, backend, prompt, &ctx.working_directory);
        request.extra_directories = ctx.extra_directories.clone();
        request.permission_policy = executor.permission_mode;
        request.max_turns = ctx
            .max_turns
            .unwrap_or_else(|| executor.max_turns.for_phase(phase));
        // Profiles pick their own model
        request.model = if premium { executor.model.clone() } else { None };
        request
    }

    /// Run one phase to completion on `backend`.
    ///
    /// With routing disabled the phase runs on the premium backend whatever
    /// `backend` was asked for.
    pub async fn run_phase(
        &self,
        phase: Phase,
        ctx: &TaskContext,
        backend: Backend,
        cancel: &CancellationToken,
    ) -> Result<PhaseResult> {
        let backend = if self.routing_enabled() {
            backend
        } else {
            let premium = self.registry.premium();
            if backend != premium {
                tracing::debug!(requested = %backend, %premium, "coordinator.fallback.override");
            }
            premium
        };
        let request = self.build_request(phase, ctx, backend);
        let command = self.command_for(backend);
        let started = Instant::now();

        let before = match phase {
            Phase::Execution => Some(self.snapshot(&ctx.working_directory).await?),
            _ => None,
        };

        tracing::info!(
            task_id = %ctx.task_id,
            %phase,
            %backend,
            command = %command.display(),
            max_turns = request.max_turns,
            "coordinator.phase.start"
        );

        let mut guard = PhaseGuard::new(self, &ctx.task_id, phase, backend, &request.prompt_text);

        let streamed = match self.config.executor.phase_timeout() {
            Some(timeout) => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(RouterError::Cancelled { phase, backend }),
                    _ = tokio::time::sleep(timeout) => {
                        Err(RouterError::DeadlineExceeded { phase, backend, timeout })
                    }
                    result = self.stream_phase(&request, &command, &mut guard) => result,
                }
            }
            None => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(RouterError::Cancelled { phase, backend }),
                    result = self.stream_phase(&request, &command, &mut guard) => result,
                }
            }
        };

        if let Err(e) = streamed {
            tracing::error!(
                task_id = %ctx.task_id,
                %phase,
                %backend,
                error = %e,
                "coordinator.phase.failed"
            );
            return Err(e);
        }

        let terminal = guard.terminal.clone();
        if terminal.is_none() {
            tracing::warn!(%phase, %backend, "coordinator.phase.no_terminal_result");
        }
        let success = terminal.as_ref().is_some_and(|t| t.success);

        let files_modified = match before {
            Some(before) => {
                let reported = guard
                    .reported_files
                    .iter()
                    .map(|path| workspace::relative_to(&ctx.working_directory, path));
                match self.snapshot(&ctx.working_directory).await {
                    Ok(after) => workspace::modified_files(reported, &before, &after),
                    Err(e) => {
                        tracing::warn!(error = %e, "coordinator.snapshot.after_failed");
                        reported.collect()
                    }
                }
            }
            None => BTreeSet::new(),
        };

        if guard.output.is_empty() {
            if let Some(text) = terminal.as_ref().and_then(|t| t.result_text.clone()) {
                guard.output = text;
            }
        }
        let output_text = guard.output.clone();
        let commands_executed = guard.commands.clone();
        let review = match phase {
            Phase::Review => Some(extract_review(&output_text)),
            _ => None,
        };

        guard.succeeded = success;
        drop(guard);

        let result = PhaseResult {
            phase,
            output_text,
            cost: terminal.as_ref().and_then(|t| t.cost_usd),
            duration: terminal.as_ref().map(|t| Duration::from_millis(t.duration_ms)),
            turn_count: terminal.as_ref().map(|t| t.turn_count),
            usage: terminal.as_ref().and_then(|t| t.usage),
            elapsed: started.elapsed(),
            backend_used: backend,
            success,
            files_modified,
            commands_executed,
            review,
        };

        tracing::info!(
            task_id = %ctx.task_id,
            %phase,
            %backend,
            success,
            cost = ?result.cost,
            elapsed_ms = result.elapsed.as_millis() as u64,
            "coordinator.phase.finished"
        );
        Ok(result)
    }

    async fn stream_phase(
        &self,
        request: &PhaseRequest,
        command: &InvocationCommand,
        guard: &mut PhaseGuard<'_>,
    ) -> Result<()> {
        let (phase, backend) = (request.phase, request.backend);
        let stream_failure = |source| RouterError::StreamFailure {
            phase,
            backend,
            source,
        };

        let mut stream = self
            .transport
            .open_stream(request, command)
            .await
            .map_err(stream_failure)?;

        while let Some(message) = stream.next().await {
            match message.map_err(stream_failure)? {
                StreamMessage::TextChunk(text) => guard.push_text(&text),
                StreamMessage::ActionInvocation { name, parameters } => {
                    if phase == Phase::Execution {
                        guard.record_action(&name, &parameters);
                    }
                }
                StreamMessage::TerminalResult(result) => guard.terminal = Some(result),
            }
        }
        Ok(())
    }

    async fn snapshot(&self, dir: &Path) -> io::Result<HashSet<PathBuf>> {
        let workspace = Arc::clone(&self.workspace);
        let dir = dir.to_path_buf();
        tokio::task::spawn_blocking(move || workspace.list_files(&dir))
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
    }
}

/// Per-call accumulator that finalizes bookkeeping when dropped
struct PhaseGuard<'a> {
    ledger: &'a UsageLedger,
    observer: &'a dyn StatusObserver,
    task_id: &'a str,
    phase: Phase,
    backend: Backend,
    prompt: &'a str,
    output: String,
    terminal: Option<TerminalResult>,
    reported_files: Vec<PathBuf>,
    commands: Vec<String>,
    succeeded: bool,
}

impl<'a> PhaseGuard<'a> {
    fn new(
        coordinator: &'a ExecutionCoordinator,
        task_id: &'a str,
        phase: Phase,
        backend: Backend,
        prompt: &'a str,
    ) -> Self {
        Self {
            ledger: &coordinator.ledger,
            observer: coordinator.observer.as_ref(),
            task_id,
            phase,
            backend,
            prompt,
            output: String::new(),
            terminal: None,
            reported_files: Vec::new(),
            commands: Vec::new(),
            succeeded: false,
        }
    }

    /// Running updates carry only the new chunk; the final update carries the
    /// whole output.
    fn push_text(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if !self.output.is_empty() {
            self.output.push('\n');
        }
        self.output.push_str(text);
        self.observer.update(StatusUpdate::new(
            self.task_id,
            self.phase.status_label(),
            self.prompt,
            text,
            PhaseStatus::Running,
        ));
    }

    fn record_action(&mut self, name: &str, parameters: &serde_json::Value) {
        if FILE_WRITE_ACTIONS.contains(&name) {
            let path = parameters
                .get("file_path")
                .or_else(|| parameters.get("notebook_path"))
                .and_then(|v| v.as_str());
            if let Some(path) = path {
                self.reported_files.push(PathBuf::from(path));
            }
        } else if SHELL_ACTIONS.contains(&name) {
            if let Some(command) = parameters.get("command").and_then(|v| v.as_str()) {
                self.commands.push(command.to_string());
            }
        }
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        let status = if self.succeeded {
            PhaseStatus::Completed
        } else {
            PhaseStatus::Error
        };
        self.observer.update(StatusUpdate::new(
            self.task_id,
            self.phase.status_label(),
            self.prompt,
            self.output.as_str(),
            status,
        ));

        let cost = self.terminal.as_ref().and_then(|t| t.cost_usd);
        let usage = self.ledger.record(self.backend, cost);
        log_usage_recorded!(self.backend, usage.request_count, usage.cumulative_cost);
    }
}
