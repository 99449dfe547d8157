use anyhow::{Context, Result};
use clap::Parser;
use phase_router::availability::AvailabilityGate;
use phase_router::cli::{Args, Command};
use phase_router::config::RouterConfig;
use phase_router::registry::BackendRegistry;
use phase_router::request::TaskContext;
use phase_router::{ExecutionCoordinator, PhaseRouter, TaskWorkflow, UsageReport};
use phase_router_sdk::{log_info, log_savings, log_warning};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = RouterConfig::load_or_default(args.config.as_deref())
        .context("Failed to load router configuration")?;

    match args.command {
        Command::Run {
            task,
            dir,
            context,
            task_type,
            task_id,
            add_dirs,
            no_routing,
            max_task_cost,
            json,
        } => {
            let mut config = config;
            if no_routing {
                config.ccs.enabled = false;
            }
            let probe_timeout = config.executor.probe_timeout();
            let max_task_cost = max_task_cost.or(config.ccs.cost_optimization.max_task_cost);

            let coordinator = Arc::new(ExecutionCoordinator::new(config));
            let routing_requested = coordinator.routing_enabled();
            let gate = AvailabilityGate::new(probe_timeout);
            if !coordinator.initialize(&gate).await && routing_requested {
                log_warning!(
                    "{} unavailable, running every phase on {}",
                    coordinator.registry().binary_path(),
                    coordinator.registry().premium()
                );
            }

            let cancel = CancellationToken::new();
            let ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    ctrl_c.cancel();
                }
            });

            let working_directory = dir
                .canonicalize()
                .with_context(|| format!("Working directory not found: {}", dir.display()))?;
            let task_id = task_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

            let mut ctx = TaskContext::new(task_id, task, working_directory);
            if let Some(context) = context {
                ctx = ctx.with_workspace_context(context);
            }
            if let Some(task_type) = task_type {
                ctx = ctx.with_task_type(task_type);
            }
            for dir in add_dirs {
                ctx = ctx.with_extra_directory(dir);
            }

            let workflow = TaskWorkflow::new(Arc::clone(&coordinator))
                .with_max_task_cost(max_task_cost)
                .with_console(!json);
            let outcome = workflow.run(ctx, &cancel).await;

            let report = coordinator.usage_report();
            if json {
                let outcome = outcome.context("Task failed")?;
                let value = serde_json::json!({ "outcome": outcome, "usage": report });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                print_report(&report);
                let outcome = outcome.context("Task failed")?;
                log_info!(
                    "Task {} finished: {} (${:.4})",
                    outcome.task_id,
                    outcome.completion_status(),
                    outcome.total_cost
                );
                if let Some(review) = &outcome.review.review {
                    for item in &review.outstanding_items {
                        println!("  outstanding: {}", item);
                    }
                    for item in &review.recommendations {
                        println!("  recommendation: {}", item);
                    }
                }
            }
        }

        Command::Route { phase, task } => {
            let router = PhaseRouter::new(config.ccs.routing.clone());
            let registry = BackendRegistry::from_config(&config);
            let decision = router.decide(phase, &task);
            let backend = decision.selected_backend;

            println!("{} → {}", decision.phase, backend);
            println!(
                "  command: {}",
                registry.command_for(backend, config.ccs.enabled).display()
            );
            println!("  rate: ${:.2} per million tokens", registry.cost_per_million(backend));
        }

        Command::Verify { binary } => {
            let binary = binary.unwrap_or_else(|| config.ccs.binary_path.clone());
            let gate = AvailabilityGate::new(config.executor.probe_timeout());
            gate.check(&binary)
                .await
                .with_context(|| format!("Probe of {} failed", binary))?;
            log_info!("{} is available", binary);
        }

        Command::Config => {
            print!("{}", serde_yaml::to_string(&config)?);
        }
    }

    Ok(())
}

fn print_report(report: &UsageReport) {
    println!();
    println!("Usage: {} requests, ${:.4}", report.total_requests, report.total_cost);
    for (backend, usage) in &report.per_backend {
        println!(
            "  {:<8} {:>4} requests  ${:.4}",
            backend.as_str(),
            usage.request_count,
            usage.cumulative_cost
        );
    }
    log_savings!(
        report.savings.estimated_premium_only_cost,
        report.savings.actual_cost,
        report.savings.savings_percent
    );
}
