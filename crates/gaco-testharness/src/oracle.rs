//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Test doubles for the grid interface and planning oracle."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use gaco_planner::{OracleError, PlanningOracle};

#[derive(Debug, Clone)]
pub enum StubMode {
    /// Reply with the given text.
    Fixed(String),
    /// Fail every call.
    Fail(OracleError),
    /// Never answer.
    Hang,
}

/// Planning oracle double with a fixed behaviour and a call counter.
#[derive(Debug)]
pub struct StubOracle {
    mode: StubMode,
    calls: AtomicUsize,
}

impl StubOracle {
    pub fn new(mode: StubMode) -> Self {
        Self {
            mode,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn fixed(reply: impl Into<String>) -> Self {
        Self::new(StubMode::Fixed(reply.into()))
    }

    pub fn failing(error: OracleError) -> Self {
        Self::new(StubMode::Fail(error))
    }

    pub fn hanging() -> Self {
        Self::new(StubMode::Hang)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlanningOracle for StubOracle {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.mode {
            StubMode::Fixed(reply) => Ok(reply.clone()),
            StubMode::Fail(error) => Err(error.clone()),
            StubMode::Hang => std::future::pending().await,
        }
    }

    fn name(&self) -> &str {
        "stub"
    }
}
