//! Router configuration loaded from YAML.
//!
//! ```yaml
//! ccs:
//!   enabled: true
//!   binary_path: ccs
//!   models:
//!     claude:
//!       flags: []
//!       use_direct_path: true
//!     glm:
//!       flags: ["--fast"]
//!   cost_optimization:
//!     max_task_cost: 5.0
//! executor:
//!   max_turns:
//!     execution: 40
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::backend::{Backend, Phase};
use crate::error::{Result, RouterError};
use crate::ledger::DEFAULT_TOKENS_PER_REQUEST;
use crate::registry::BackendConfig;
use crate::request::PermissionPolicy;
use crate::router::RoutingPolicy;

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub ccs: CcsConfig,
    pub executor: ExecutorConfig,
}

/// Multi-backend routing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CcsConfig {
    pub enabled: bool,
    /// Multiplexer binary that fronts the non-default backends
    pub binary_path: String,
    pub models: BTreeMap<Backend, BackendConfig>,
    pub cost_optimization: CostOptimization,
    pub routing: RoutingPolicy,
    pub savings: SavingsConfig,
}

impl Default for CcsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            binary_path: "ccs".to_string(),
            models: BTreeMap::new(),
            cost_optimization: CostOptimization::default(),
            routing: RoutingPolicy::default(),
            savings: SavingsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostOptimization {
    /// Upper bound on the reported cost of one task, in USD
    pub max_task_cost: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SavingsConfig {
    /// Rough per-request token count used for the all-premium baseline
    pub tokens_per_request: u64,
}

impl Default for SavingsConfig {
    fn default() -> Self {
        Self {
            tokens_per_request: DEFAULT_TOKENS_PER_REQUEST,
        }
    }
}

/// Phase execution settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Binary used for the direct path and for the fallback path
    pub default_binary: String,
    /// Model name passed to the backend CLI
    pub model: Option<String>,
    pub permission_mode: PermissionPolicy,
    pub max_turns: PhaseTurns,
    /// Per-phase deadline; `None` waits indefinitely
    pub phase_timeout_secs: Option<u64>,
    pub probe_timeout_secs: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            default_binary: "claude".to_string(),
            model: Some("claude-sonnet-4-5-20250929".to_string()),
            permission_mode: PermissionPolicy::AcceptEdits,
            max_turns: PhaseTurns::default(),
            phase_timeout_secs: Some(3600),
            probe_timeout_secs: 5,
        }
    }
}

impl ExecutorConfig {
    pub fn phase_timeout(&self) -> Option<Duration> {
        self.phase_timeout_secs.map(Duration::from_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

/// Maximum turn budget per phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseTurns {
    pub planning: u32,
    pub execution: u32,
    pub review: u32,
}

impl Default for PhaseTurns {
    fn default() -> Self {
        Self {
            planning: Phase::Planning.default_max_turns(),
            execution: Phase::Execution.default_max_turns(),
            review: Phase::Review.default_max_turns(),
        }
    }
}

impl PhaseTurns {
    pub fn for_phase(&self, phase: Phase) -> u32 {
        match phase {
            Phase::Planning => self.planning,
            Phase::Execution => self.execution,
            Phase::Review => self.review,
        }
    }
}

impl RouterConfig {
    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: RouterConfig =
            serde_yaml::from_str(&raw).map_err(|source| RouterError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, else from the default location, else use defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }

        match Self::default_path() {
            Some(default) if default.exists() => {
                tracing::debug!(path = %default.display(), "config.load.default_path");
                Self::load(&default)
            }
            _ => Ok(Self::default()),
        }
    }

    /// `$XDG_CONFIG_HOME/phase-router/config.yaml` or the platform equivalent
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("phase-router").join("config.yaml"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.ccs.binary_path.trim().is_empty() {
            return Err(RouterError::Config("ccs.binary_path must not be empty".into()));
        }
        if self.executor.default_binary.trim().is_empty() {
            return Err(RouterError::Config(
                "executor.default_binary must not be empty".into(),
            ));
        }
        if let Some(limit) = self.ccs.cost_optimization.max_task_cost {
            if !(limit.is_finite() && limit > 0.0) {
                return Err(RouterError::Config(format!(
                    "cost_optimization.max_task_cost must be positive, got {}",
                    limit
                )));
            }
        }
        for (backend, model) in &self.ccs.models {
            if let Some(rate) = model.cost_per_million {
                if !(rate.is_finite() && rate >= 0.0) {
                    return Err(RouterError::Config(format!(
                        "models.{}.cost_per_million must be non-negative, got {}",
                        backend, rate
                    )));
                }
            }
        }
        if self.executor.probe_timeout_secs == 0 {
            return Err(RouterError::Config(
                "executor.probe_timeout_secs must be at least 1".into(),
            ));
        }
        if self.executor.phase_timeout_secs == Some(0) {
            return Err(RouterError::Config(
                "executor.phase_timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
