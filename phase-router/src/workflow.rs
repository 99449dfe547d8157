//! Plan → execute → review for one task

use chrono::{DateTime, Utc};
use phase_router_sdk::{
    log_backend_selected, log_phase_complete_console, log_phase_start_console, log_stats,
};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::backend::Phase;
use crate::coordinator::{ExecutionCoordinator, PhaseResult};
use crate::error::{Result, RouterError};
use crate::request::TaskContext;
use crate::review::CompletionStatus;

/// Results of all three phases
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowOutcome {
    pub task_id: String,
    pub plan: PhaseResult,
    pub execution: PhaseResult,
    pub review: PhaseResult,
    /// Sum of reported phase costs
    pub total_cost: f64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl WorkflowOutcome {
    pub fn completion_status(&self) -> CompletionStatus {
        self.review
            .review
            .as_ref()
            .map(|r| r.status)
            .unwrap_or(CompletionStatus::Unknown)
    }

    pub fn success(&self) -> bool {
        self.plan.success && self.execution.success && self.review.success
    }
}

pub struct TaskWorkflow {
    coordinator: Arc<ExecutionCoordinator>,
    max_task_cost: Option<f64>,
    console: bool,
}

impl TaskWorkflow {
    /// Workflow bounded by the configured `max_task_cost`
    pub fn new(coordinator: Arc<ExecutionCoordinator>) -> Self {
        let max_task_cost = coordinator.config().ccs.cost_optimization.max_task_cost;
        Self {
            coordinator,
            max_task_cost,
            console: true,
        }
    }

    pub fn with_max_task_cost(mut self, limit: Option<f64>) -> Self {
        self.max_task_cost = limit;
        self
    }

    /// Toggle colored progress output on stdout
    pub fn with_console(mut self, console: bool) -> Self {
        self.console = console;
        self
    }

    pub async fn run(
        &self,
        mut ctx: TaskContext,
        cancel: &CancellationToken,
    ) -> Result<WorkflowOutcome> {
        let started_at = Utc::now();
        let mut spent = 0.0;

        let plan = self.run_step(Phase::Planning, &ctx, cancel).await?;
        spent += plan.cost.unwrap_or(0.0);
        self.check_budget(spent)?;
        ctx.plan = Some(plan.output_text.clone());

        let execution = self.run_step(Phase::Execution, &ctx, cancel).await?;
        spent += execution.cost.unwrap_or(0.0);
        self.check_budget(spent)?;
        ctx.execution = Some(execution.execution_summary());

        let review = self.run_step(Phase::Review, &ctx, cancel).await?;
        spent += review.cost.unwrap_or(0.0);

        Ok(WorkflowOutcome {
            task_id: ctx.task_id,
            plan,
            execution,
            review,
            total_cost: spent,
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn run_step(
        &self,
        phase: Phase,
        ctx: &TaskContext,
        cancel: &CancellationToken,
    ) -> Result<PhaseResult> {
        let backend = self.coordinator.backend_for(phase, &ctx.description);
        log_backend_selected!(ctx.task_id, phase, backend);
        if self.console {
            log_phase_start_console!(phase, backend);
        }

        let result = self.coordinator.run_phase(phase, ctx, backend, cancel).await?;

        if self.console {
            let usage = result.usage.unwrap_or_default();
            log_stats!(
                result.duration.unwrap_or(result.elapsed).as_millis(),
                result.turn_count.unwrap_or(0),
                result.cost.unwrap_or(0.0),
                usage.input_tokens,
                usage.output_tokens
            );
            log_phase_complete_console!(phase);
        }
        Ok(result)
    }

    fn check_budget(&self, spent: f64) -> Result<()> {
        match self.max_task_cost {
            Some(limit) if spent > limit => {
                tracing::warn!(spent, limit, "workflow.budget.exceeded");
                Err(RouterError::BudgetExceeded { spent, limit })
            }
            _ => Ok(()),
        }
    }
}
