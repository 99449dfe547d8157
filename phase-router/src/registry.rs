//! Backend registry: per-backend settings and invocation commands

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::backend::Backend;
use crate::config::RouterConfig;

/// Settings for one backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Extra arguments appended after the backend profile
    pub flags: Vec<String>,
    /// Run the default binary directly instead of the multiplexer
    pub use_direct_path: bool,
    /// Override of the built-in cost rate (USD per million tokens)
    pub cost_per_million: Option<f64>,
}

static EMPTY_BACKEND_CONFIG: BackendConfig = BackendConfig {
    flags: Vec::new(),
    use_direct_path: false,
    cost_per_million: None,
};

/// Program and arguments that start a backend session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationCommand {
    pub program: String,
    pub args: Vec<String>,
    /// True when the multiplexer is bypassed
    pub direct: bool,
}

impl InvocationCommand {
    /// Human-readable command line
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Side table of backend settings, loaded once at startup
#[derive(Debug, Clone)]
pub struct BackendRegistry {
    binary_path: String,
    default_binary: String,
    premium: Backend,
    models: BTreeMap<Backend, BackendConfig>,
}

impl BackendRegistry {
    pub fn from_config(config: &RouterConfig) -> Self {
        Self {
            binary_path: config.ccs.binary_path.clone(),
            default_binary: config.executor.default_binary.clone(),
            premium: config.ccs.routing.premium,
            models: config.ccs.models.clone(),
        }
    }

    /// Multiplexer binary path
    pub fn binary_path(&self) -> &str {
        &self.binary_path
    }

    pub fn premium(&self) -> Backend {
        self.premium
    }

    /// Settings for `backend`; an empty configuration when none was given
    pub fn get_backend_config(&self, backend: Backend) -> &BackendConfig {
        self.models.get(&backend).unwrap_or(&EMPTY_BACKEND_CONFIG)
    }

    pub fn cost_per_million(&self, backend: Backend) -> f64 {
        self.get_backend_config(backend)
            .cost_per_million
            .unwrap_or_else(|| backend.default_cost_per_million())
    }

    /// Cost of `tokens` tokens on `backend` at its configured rate
    pub fn estimate_cost(&self, backend: Backend, tokens: u64) -> f64 {
        tokens as f64 / 1_000_000.0 * self.cost_per_million(backend)
    }

    /// The default binary with no extra arguments
    pub fn direct_command(&self) -> InvocationCommand {
        InvocationCommand {
            program: self.default_binary.clone(),
            args: Vec::new(),
            direct: true,
        }
    }

    /// Resolve how to invoke `backend`.
    ///
    /// With routing disabled every backend collapses to the direct command.
    /// The premium backend may also opt into the direct command. Otherwise
    /// the multiplexer is invoked with the backend profile (omitted for the
    /// premium backend) followed by the configured flags.
    pub fn command_for(&self, backend: Backend, routing_enabled: bool) -> InvocationCommand {
        if !routing_enabled {
            return self.direct_command();
        }

        let config = self.get_backend_config(backend);
        if backend == self.premium && config.use_direct_path {
            return self.direct_command();
        }

        let mut args = Vec::with_capacity(config.flags.len() + 1);
        if backend != self.premium {
            args.push(backend.as_str().to_string());
        }
        args.extend(config.flags.iter().cloned());

        InvocationCommand {
            program: self.binary_path.clone(),
            args,
            direct: false,
        }
    }
}
