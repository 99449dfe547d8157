// Re-export async trait for convenience
pub use async_trait::async_trait;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Number of prompt characters carried in a status update
pub const PROMPT_PREVIEW_CHARS: usize = 500;

/// Marker prefix for structured events written to stderr
pub const EVENT_PREFIX: &str = "__PR_EVENT__:";

/// Lifecycle status of a phase as seen by status observers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Running,
    Completed,
    Error,
}

impl PhaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseStatus::Running => "running",
            PhaseStatus::Completed => "completed",
            PhaseStatus::Error => "error",
        }
    }

    /// Whether this status ends a phase
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PhaseStatus::Running)
    }
}

/// Live status of one phase of one task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub task_id: String,
    /// Phase label (`planner`, `worker`, `evaluator`)
    pub phase: String,
    pub prompt_preview: String,
    /// Newest output chunk while running, full output once finished
    pub answer: String,
    pub status: PhaseStatus,
    pub timestamp: DateTime<Utc>,
}

impl StatusUpdate {
    pub fn new(
        task_id: impl Into<String>,
        phase: impl Into<String>,
        prompt: &str,
        answer: impl Into<String>,
        status: PhaseStatus,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            phase: phase.into(),
            prompt_preview: prompt_preview(prompt),
            answer: answer.into(),
            status,
            timestamp: Utc::now(),
        }
    }
}

/// Truncate a prompt to the preview length on a char boundary
pub fn prompt_preview(prompt: &str) -> String {
    prompt.chars().take(PROMPT_PREVIEW_CHARS).collect()
}

/// Sink for live phase status.
///
/// Called synchronously from the coordinator, including from drop guards, so
/// implementations must return quickly and must not block on I/O.
pub trait StatusObserver: Send + Sync {
    fn update(&self, update: StatusUpdate);
}

/// Observer that discards every update
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl StatusObserver for NullObserver {
    fn update(&self, _update: StatusUpdate) {}
}

/// Observer that writes `__PR_EVENT__:<json>` lines to stderr
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrObserver;

impl StatusObserver for StderrObserver {
    fn update(&self, update: StatusUpdate) {
        RouterLog::PhaseUpdate(update).emit();
    }
}

/// Observer that fans updates out over a broadcast channel.
///
/// Sending never blocks; slow receivers lag and lose the oldest updates.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: broadcast::Sender<StatusUpdate>,
}

impl ChannelObserver {
    pub fn new(capacity: usize) -> (Self, broadcast::Receiver<StatusUpdate>) {
        let (tx, rx) = broadcast::channel(capacity);
        (Self { tx }, rx)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusUpdate> {
        self.tx.subscribe()
    }
}

impl StatusObserver for ChannelObserver {
    fn update(&self, update: StatusUpdate) {
        // No subscribers is not an error
        let _ = self.tx.send(update);
    }
}

/// Structured events emitted by the router for log consumers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RouterLog {
    /// Phase status changed
    PhaseUpdate(StatusUpdate),
    /// Backend chosen for a phase
    BackendSelected {
        task_id: String,
        phase: String,
        backend: String,
    },
    /// Multi-backend routing switched off for the rest of the process
    RoutingDisabled { reason: String },
    /// Ledger entry after a phase call
    UsageRecorded {
        backend: String,
        request_count: u64,
        cumulative_cost: f64,
    },
}

impl RouterLog {
    /// Emit this event to stderr for log parsers
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            use std::io::Write;
            eprintln!("{}{}", EVENT_PREFIX, json);
            let _ = std::io::stderr().flush();
        }
    }

    /// Parse a stderr line produced by [`RouterLog::emit`]
    pub fn parse_line(line: &str) -> Option<Self> {
        let json = line.strip_prefix(EVENT_PREFIX)?;
        serde_json::from_str(json).ok()
    }
}

#[macro_export]
macro_rules! log_backend_selected {
    ($task_id:expr, $phase:expr, $backend:expr) => {
        $crate::RouterLog::BackendSelected {
            task_id: $task_id.to_string(),
            phase: $phase.to_string(),
            backend: $backend.to_string(),
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_routing_disabled {
    ($reason:expr) => {
        $crate::RouterLog::RoutingDisabled {
            reason: $reason.to_string(),
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_usage_recorded {
    ($backend:expr, $requests:expr, $cost:expr) => {
        $crate::RouterLog::UsageRecorded {
            backend: $backend.to_string(),
            request_count: $requests,
            cumulative_cost: $cost,
        }
        .emit();
    };
}

// ============================================================================
// Console Logging Macros
// ============================================================================
// Colored, human-readable output for the CLI, complementing the structured
// RouterLog events.
// ============================================================================

/// Logs the start of a phase with a header and the backend that runs it.
///
/// # Example
/// ```
/// use phase_router_sdk::log_phase_start_console;
/// log_phase_start_console!("planning", "claude");
/// ```
///
/// Outputs:
/// ```text
/// ═══ PHASE planning → claude ═══
/// ```
#[macro_export]
macro_rules! log_phase_start_console {
    ($phase:expr, $backend:expr) => {
        println!("\x1b[1;36m═══ PHASE {} → {} ═══\x1b[0m", $phase, $backend);
    };
}

/// Logs the completion of a phase.
///
/// # Example
/// ```
/// use phase_router_sdk::log_phase_complete_console;
/// log_phase_complete_console!("planning");
/// ```
#[macro_export]
macro_rules! log_phase_complete_console {
    ($phase:expr) => {
        println!("\x1b[32m✓ Phase {} complete\x1b[0m", $phase);
    };
}

/// Logs per-phase statistics.
///
/// # Example
/// ```
/// use phase_router_sdk::log_stats;
/// log_stats!(1250, 3, 0.0234, 1234, 567);
/// ```
///
/// Outputs:
/// ```text
/// Statistics: 1250ms, 3 turns, $0.0234 (tokens: 1234 in / 567 out)
/// ```
#[macro_export]
macro_rules! log_stats {
    ($duration_ms:expr, $turns:expr, $cost_usd:expr, $input_tokens:expr, $output_tokens:expr) => {
        println!(
            "\x1b[2mStatistics: {}ms, {} turns, ${:.4} (tokens: {} in / {} out)\x1b[0m",
            $duration_ms, $turns, $cost_usd, $input_tokens, $output_tokens
        );
    };
}

/// Logs the savings line of a usage report.
///
/// # Example
/// ```
/// use phase_router_sdk::log_savings;
/// log_savings!(0.045, 0.0123, 72.7);
/// ```
///
/// Outputs:
/// ```text
/// Savings: $0.0450 baseline, $0.0123 actual (72.7%)
/// ```
#[macro_export]
macro_rules! log_savings {
    ($baseline:expr, $actual:expr, $percent:expr) => {
        println!(
            "\x1b[1mSavings: ${:.4} baseline, ${:.4} actual ({:.1}%)\x1b[0m",
            $baseline, $actual, $percent
        );
    };
}

/// Logs an informational message.
///
/// # Example
/// ```
/// use phase_router_sdk::log_info;
/// log_info!("Probing ccs...");
/// ```
#[macro_export]
macro_rules! log_info {
    ($message:expr) => {
        println!("\x1b[36mℹ {}\x1b[0m", $message);
    };
    ($fmt:expr, $($arg:tt)*) => {
        println!("\x1b[36mℹ {}\x1b[0m", format!($fmt, $($arg)*));
    };
}

/// Logs a warning message.
///
/// # Example
/// ```
/// use phase_router_sdk::log_warning;
/// log_warning!("ccs not found, using claude only");
/// ```
#[macro_export]
macro_rules! log_warning {
    ($message:expr) => {
        println!("\x1b[33m⚠ Warning: {}\x1b[0m", $message);
    };
    ($fmt:expr, $($arg:tt)*) => {
        println!("\x1b[33m⚠ Warning: {}\x1b[0m", format!($fmt, $($arg)*));
    };
}
