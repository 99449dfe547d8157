//! Phase router: pure mapping from (phase, task text) to a backend.
//!
//! Checks run in a fixed order and the first match wins:
//!
//! 1. Planning and Review always go to the premium backend.
//! 2. Execution text containing a complex pattern goes to the premium backend.
//! 3. Execution text containing a routine pattern goes to the cost-optimized backend.
//! 4. If a large-context backend is configured, text containing a
//!    large-context pattern goes there.
//! 5. Anything else in Execution goes to the cost-optimized backend.
//!
//! Matching is case-insensitive substring containment.

use serde::{Deserialize, Serialize};

use crate::backend::{Backend, Phase};

pub const DEFAULT_COMPLEX_PATTERNS: &[&str] = &[
    "architecture",
    "design system",
    "algorithm",
    "optimize",
    "debug complex",
    "security",
    "performance critical",
];

pub const DEFAULT_ROUTINE_PATTERNS: &[&str] = &[
    "implement",
    "add feature",
    "write tests",
    "documentation",
    "refactor",
    "update",
    "migration",
    "boilerplate",
];

pub const DEFAULT_LARGE_CONTEXT_PATTERNS: &[&str] = &["large codebase", "comprehensive"];

/// Routing policy loaded from configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingPolicy {
    pub premium: Backend,
    pub cost_optimized: Backend,
    pub complex_patterns: Vec<String>,
    pub routine_patterns: Vec<String>,
    /// Backend for large-context work; `None` disables the rule
    pub large_context: Option<Backend>,
    pub large_context_patterns: Vec<String>,
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        Self {
            premium: Backend::Claude,
            cost_optimized: Backend::Glm,
            complex_patterns: to_owned(DEFAULT_COMPLEX_PATTERNS),
            routine_patterns: to_owned(DEFAULT_ROUTINE_PATTERNS),
            large_context: None,
            large_context_patterns: to_owned(DEFAULT_LARGE_CONTEXT_PATTERNS),
        }
    }
}

fn to_owned(patterns: &[&str]) -> Vec<String> {
    patterns.iter().map(|p| p.to_string()).collect()
}

/// The outcome of one routing call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutingDecision {
    pub phase: Phase,
    pub task_text: String,
    pub selected_backend: Backend,
}

/// Deterministic backend selector
#[derive(Debug, Clone)]
pub struct PhaseRouter {
    policy: RoutingPolicy,
}

impl PhaseRouter {
    pub fn new(mut policy: RoutingPolicy) -> Self {
        for patterns in [
            &mut policy.complex_patterns,
            &mut policy.routine_patterns,
            &mut policy.large_context_patterns,
        ] {
            normalize(patterns);
        }
        Self { policy }
    }

    pub fn policy(&self) -> &RoutingPolicy {
        &self.policy
    }

    pub fn premium(&self) -> Backend {
        self.policy.premium
    }

    pub fn cost_optimized(&self) -> Backend {
        self.policy.cost_optimized
    }

    /// Select the backend for a phase of a task
    pub fn select_backend(&self, phase: Phase, task_description: &str) -> Backend {
        match phase {
            Phase::Planning | Phase::Review => self.policy.premium,
            Phase::Execution => self.select_for_execution(task_description),
        }
    }

    pub fn decide(&self, phase: Phase, task_description: &str) -> RoutingDecision {
        RoutingDecision {
            phase,
            task_text: task_description.to_string(),
            selected_backend: self.select_backend(phase, task_description),
        }
    }

    fn select_for_execution(&self, task_description: &str) -> Backend {
        let text = task_description.to_lowercase();

        if contains_any(&text, &self.policy.complex_patterns) {
            return self.policy.premium;
        }
        if contains_any(&text, &self.policy.routine_patterns) {
            return self.policy.cost_optimized;
        }
        if let Some(backend) = self.policy.large_context {
            if contains_any(&text, &self.policy.large_context_patterns) {
                return backend;
            }
        }

        self.policy.cost_optimized
    }
}

impl Default for PhaseRouter {
    fn default() -> Self {
        Self::new(RoutingPolicy::default())
    }
}

/// Lower-case patterns and drop empty ones (an empty pattern would match everything)
fn normalize(patterns: &mut Vec<String>) {
    patterns.retain(|p| !p.trim().is_empty());
    for pattern in patterns.iter_mut() {
        *pattern = pattern.to_lowercase();
    }
}

fn contains_any(text: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|pattern| text.contains(pattern.as_str()))
}
