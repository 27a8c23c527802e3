//! ---
//! ems_section: "05-networking-external-interfaces"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Grid state model and grid interface boundary."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::errors::{GridError, Result};
use crate::interface::{AttackRecord, GridInterface, InterfaceStatus};
use crate::phasor::{Phase, Phasor};
use crate::state::GridState;

/// Wraps a [`GridInterface`] with per-call deadlines and write serialization.
///
/// Reads run concurrently. Injection, blocking, time advance and reset calls
/// queue behind a single async lock so at most one is in flight.
pub struct GridGateway {
    inner: Arc<dyn GridInterface>,
    actuation: Mutex<()>,
    call_timeout: Duration,
}

impl GridGateway {
    /// Wrap an interface with the supplied per-call deadline.
    pub fn new(inner: Arc<dyn GridInterface>, call_timeout: Duration) -> Self {
        Self {
            inner,
            actuation: Mutex::new(()),
            call_timeout,
        }
    }

    /// Deadline applied to every call.
    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send,
    {
        match timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!(operation, timeout = ?self.call_timeout, "grid call timed out");
                Err(GridError::Timeout {
                    operation,
                    after: self.call_timeout,
                })
            }
        }
    }

    async fn serialized<T, F>(&self, operation: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send,
    {
        let _guard = self.actuation.lock().await;
        debug!(operation, "actuation lock acquired");
        self.bounded(operation, call).await
    }
}

impl std::fmt::Debug for GridGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridGateway")
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl GridInterface for GridGateway {
    async fn current_state(&self) -> Result<GridState> {
        self.bounded("current_state", self.inner.current_state())
            .await
    }

    async fn inject_voltage(&self, phase: Phase, phasor: Phasor) -> Result<()> {
        self.serialized("inject_voltage", self.inner.inject_voltage(phase, phasor))
            .await
    }

    async fn inject_power(&self, phase: Phase, phasor: Phasor) -> Result<()> {
        self.serialized("inject_power", self.inner.inject_power(phase, phasor))
            .await
    }

    async fn block_commands(&self, enable: bool) -> Result<()> {
        self.serialized("block_commands", self.inner.block_commands(enable))
            .await
    }

    async fn advance_time(&self, step: Option<f64>) -> Result<f64> {
        self.serialized("advance_time", self.inner.advance_time(step))
            .await
    }

    async fn attack_history(&self) -> Result<Vec<AttackRecord>> {
        self.bounded("attack_history", self.inner.attack_history())
            .await
    }

    async fn reset_state(&self) -> Result<()> {
        self.serialized("reset_state", self.inner.reset_state())
            .await
    }

    async fn status(&self) -> Result<InterfaceStatus> {
        self.bounded("status", self.inner.status()).await
    }
}
