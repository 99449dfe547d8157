//! Per-backend usage accounting and savings against an all-premium baseline.
//!
//! One ledger is owned by the coordinator and shared by handle. Every update
//! is a single increment-and-optionally-add under one lock, so concurrent
//! workflows never lose counts.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::backend::Backend;
use crate::registry::BackendRegistry;

/// Rough per-request token count behind the savings estimate
pub const DEFAULT_TOKENS_PER_REQUEST: u64 = 1000;

/// Counters for one backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BackendUsage {
    pub request_count: u64,
    pub cumulative_cost: f64,
}

/// Inputs of the hypothetical all-premium cost
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SavingsBaseline {
    pub premium: Backend,
    /// Premium rate in USD per million tokens
    pub premium_rate: f64,
    pub tokens_per_request: u64,
}

impl SavingsBaseline {
    /// What `requests` requests would cost on the premium backend
    pub fn premium_cost_of(&self, requests: u64) -> f64 {
        requests as f64 * self.tokens_per_request as f64 / 1_000_000.0 * self.premium_rate
    }
}

impl Default for SavingsBaseline {
    fn default() -> Self {
        Self {
            premium: Backend::Claude,
            premium_rate: Backend::Claude.default_cost_per_million(),
            tokens_per_request: DEFAULT_TOKENS_PER_REQUEST,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CostSavings {
    pub estimated_premium_only_cost: f64,
    pub actual_cost: f64,
    pub savings: f64,
    pub savings_percent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UsageReport {
    pub total_cost: f64,
    pub total_requests: u64,
    pub per_backend: BTreeMap<Backend, BackendUsage>,
    pub savings: CostSavings,
}

#[derive(Debug, Default)]
pub struct UsageLedger {
    entries: Mutex<BTreeMap<Backend, BackendUsage>>,
    baseline: SavingsBaseline,
}

impl UsageLedger {
    pub fn new(baseline: SavingsBaseline) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            baseline,
        }
    }

    pub fn from_registry(registry: &BackendRegistry, tokens_per_request: u64) -> Self {
        let premium = registry.premium();
        Self::new(SavingsBaseline {
            premium,
            premium_rate: registry.cost_per_million(premium),
            tokens_per_request,
        })
    }

    pub fn baseline(&self) -> SavingsBaseline {
        self.baseline
    }

    // The map holds plain counters, so a panic mid-update cannot leave it
    // inconsistent and poisoning is safe to ignore.
    fn entries(&self) -> MutexGuard<'_, BTreeMap<Backend, BackendUsage>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count one request; add `cost` only when it was reported and finite.
    /// Returns the updated counters for `backend`.
    pub fn record(&self, backend: Backend, cost: Option<f64>) -> BackendUsage {
        let mut entries = self.entries();
        let entry = entries.entry(backend).or_default();
        entry.request_count += 1;
        match cost {
            Some(cost) if cost.is_finite() => entry.cumulative_cost += cost,
            Some(cost) => {
                tracing::warn!(%backend, cost, "ledger.record.non_finite_cost");
            }
            None => {}
        }
        *entry
    }

    pub fn usage(&self, backend: Backend) -> BackendUsage {
        self.entries().get(&backend).copied().unwrap_or_default()
    }

    pub fn total_requests(&self) -> u64 {
        self.entries().values().map(|u| u.request_count).sum()
    }

    /// Snapshot of all counters plus the derived savings
    pub fn report(&self) -> UsageReport {
        let per_backend = self.entries().clone();

        let mut total_cost = 0.0;
        let mut total_requests = 0;
        let mut baseline_cost = 0.0;
        for (backend, usage) in &per_backend {
            total_cost += usage.cumulative_cost;
            total_requests += usage.request_count;
            baseline_cost += if *backend == self.baseline.premium {
                usage.cumulative_cost
            } else {
                self.baseline.premium_cost_of(usage.request_count)
            };
        }

        let savings = baseline_cost - total_cost;
        let savings_percent = if baseline_cost > 0.0 {
            savings / baseline_cost * 100.0
        } else {
            0.0
        };

        UsageReport {
            total_cost,
            total_requests,
            per_backend,
            savings: CostSavings {
                estimated_premium_only_cost: baseline_cost,
                actual_cost: total_cost,
                savings,
                savings_percent,
            },
        }
    }
}
