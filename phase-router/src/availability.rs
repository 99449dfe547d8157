//! Startup probe for the multiplexer binary and the one-way routing latch

use async_trait::async_trait;
use std::io;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::process::Command;

use crate::error::{Result, RouterError};

/// Runs a binary and reports whether it exited cleanly
#[async_trait]
pub trait BackendProbe: Send + Sync {
    async fn probe(&self, binary: &str) -> io::Result<bool>;
}

/// Probe that resolves the binary on `PATH` and runs `<binary> --version`
#[derive(Debug, Clone, Default)]
pub struct CommandProbe;

#[async_trait]
impl BackendProbe for CommandProbe {
    async fn probe(&self, binary: &str) -> io::Result<bool> {
        let resolved = which::which(binary)
            .map_err(|e| io::Error::new(io::ErrorKind::NotFound, e.to_string()))?;

        let status = Command::new(resolved)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await?;

        Ok(status.success())
    }
}

/// Decides at startup whether the multiplexer can be used
pub struct AvailabilityGate<P = CommandProbe> {
    probe: P,
    timeout: Duration,
}

impl AvailabilityGate<CommandProbe> {
    pub fn new(timeout: Duration) -> Self {
        Self {
            probe: CommandProbe,
            timeout,
        }
    }
}

impl<P: BackendProbe> AvailabilityGate<P> {
    pub fn with_probe(probe: P, timeout: Duration) -> Self {
        Self { probe, timeout }
    }

    /// Probe `binary`, returning the reason when it cannot be used
    pub async fn check(&self, binary: &str) -> Result<()> {
        let unavailable = |reason: String| RouterError::BackendUnavailable {
            binary: binary.to_string(),
            reason,
        };

        match tokio::time::timeout(self.timeout, self.probe.probe(binary)).await {
            Ok(Ok(true)) => Ok(()),
            Ok(Ok(false)) => Err(unavailable("version check exited non-zero".into())),
            Ok(Err(e)) if e.kind() == io::ErrorKind::NotFound => {
                Err(unavailable(format!("not found: {}", e)))
            }
            Ok(Err(e)) => Err(unavailable(e.to_string())),
            Err(_) => Err(unavailable(format!(
                "version check timed out after {:?}",
                self.timeout
            ))),
        }
    }

    /// True only when `<binary> --version` succeeds within the timeout
    pub async fn verify(&self, binary: &str) -> bool {
        match self.check(binary).await {
            Ok(()) => {
                tracing::debug!(binary, "availability.probe.ok");
                true
            }
            Err(e) => {
                tracing::warn!(binary, error = %e, "availability.probe.failed");
                false
            }
        }
    }
}

/// Routing switch that can be turned off once and never back on
#[derive(Debug)]
pub struct RoutingLatch {
    enabled: AtomicBool,
}

impl RoutingLatch {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Disable routing. Returns true only for the call that flipped the latch.
    pub fn disable(&self) -> bool {
        self.enabled
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Default for RoutingLatch {
    fn default() -> Self {
        Self::new(true)
    }
}
