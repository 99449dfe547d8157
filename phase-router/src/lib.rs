// Phases and backends
pub mod backend;

// Errors
pub mod error;

// YAML configuration
pub mod config;

// Backend registry
pub mod registry;

// Phase router
pub mod router;

// Availability gate and routing latch
pub mod availability;

// Usage ledger
pub mod ledger;

// Phase requests and task context
pub mod request;

// Phase prompts
pub mod prompts;

// Streaming transport
pub mod transport;

// Workspace listing
pub mod workspace;

// Review extraction
pub mod review;

// Execution coordinator
pub mod coordinator;

// Task workflow
pub mod workflow;

// CLI arguments
pub mod cli;

pub use backend::{Backend, Phase};
pub use coordinator::{ExecutionCoordinator, PhaseResult};
pub use error::{Result, RouterError, TransportError};
pub use ledger::{UsageLedger, UsageReport};
pub use router::{PhaseRouter, RoutingDecision};
pub use workflow::{TaskWorkflow, WorkflowOutcome};
