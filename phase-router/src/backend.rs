//! Phases and backends.
//!
//! Both are closed enums. Per-backend settings live in the
//! [`BackendRegistry`](crate::registry::BackendRegistry) side table, so adding
//! a backend means adding a variant here and, optionally, a config entry.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the three sequential stages of a task workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Planning,
    Execution,
    Review,
}

impl Phase {
    /// All phases in workflow order
    pub const ALL: [Phase; 3] = [Phase::Planning, Phase::Execution, Phase::Review];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Planning => "planning",
            Phase::Execution => "execution",
            Phase::Review => "review",
        }
    }

    /// Label used in live status updates
    pub fn status_label(&self) -> &'static str {
        match self {
            Phase::Planning => "planner",
            Phase::Execution => "worker",
            Phase::Review => "evaluator",
        }
    }

    pub fn default_max_turns(&self) -> u32 {
        match self {
            Phase::Planning => 10,
            Phase::Execution => 30,
            Phase::Review => 10,
        }
    }

    /// Whether the phase may change the workspace
    pub fn is_read_only(&self) -> bool {
        !matches!(self, Phase::Execution)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "planning" | "plan" | "planner" => Ok(Phase::Planning),
            "execution" | "execute" | "worker" => Ok(Phase::Execution),
            "review" | "evaluator" | "evaluation" => Ok(Phase::Review),
            other => Err(format!(
                "unknown phase '{}' (expected planning, execution or review)",
                other
            )),
        }
    }
}

/// A selectable model backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// The default Claude account
    #[serde(alias = "default")]
    Claude,
    Glm,
    Gemini,
    Kimi,
}

impl Backend {
    pub const ALL: [Backend; 4] = [Backend::Claude, Backend::Glm, Backend::Gemini, Backend::Kimi];

    /// Stable identifier, also the multiplexer profile name
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Claude => "claude",
            Backend::Glm => "glm",
            Backend::Gemini => "gemini",
            Backend::Kimi => "kimi",
        }
    }

    /// Built-in cost rate in USD per million tokens
    pub fn default_cost_per_million(&self) -> f64 {
        match self {
            Backend::Claude => 15.0,
            Backend::Glm => 0.50,
            Backend::Gemini => 2.50,
            Backend::Kimi => 0.25,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "claude" | "default" => Ok(Backend::Claude),
            "glm" => Ok(Backend::Glm),
            "gemini" => Ok(Backend::Gemini),
            "kimi" => Ok(Backend::Kimi),
            other => Err(format!("unknown backend '{}'", other)),
        }
    }
}
