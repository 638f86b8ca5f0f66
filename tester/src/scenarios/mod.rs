//! Test Scenarios
//!
//! Short scenario names the `tester` binary can run against a ready suite.
//! Storage scenarios share one backend so the emulator starts once per run.

pub mod service;
pub mod storage;

use crate::error::{HarnessError, HarnessResult};
use crate::runtime::{SuiteContext, SuiteLifecycle};
use crate::storage::{BackendHandle, StorageKind};
use serde::Serialize;
use std::time::Instant;
use tracing::{error, info, warn};

/// Individual scenarios, in the order `all` runs them
pub const SCENARIOS: &[&str] = &["service_ready", "storage_roundtrip", "stable_location", "bucket_idempotent"];

/// Result of one scenario, as written to the JSON report
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioOutcome {
    pub name: String,
    pub backend: String,
    pub passed: bool,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct TestScenarios {
    backend: StorageKind,
}

impl TestScenarios {
    pub fn new(backend: StorageKind) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> StorageKind {
        self.backend
    }

    /// Names accepted by [`TestScenarios::run_scenario`]
    pub fn available_scenarios() -> Vec<&'static str> {
        let mut names = SCENARIOS.to_vec();
        names.push("all");
        names
    }

    /// Resolve a scenario name to the individual scenarios it runs
    pub fn expand(name: &str) -> HarnessResult<Vec<&'static str>> {
        if name == "all" {
            return Ok(SCENARIOS.to_vec());
        }
        SCENARIOS
            .iter()
            .find(|s| **s == name)
            .map(|s| vec![*s])
            .ok_or_else(|| HarnessError::ScenarioFailed {
                name: name.to_string(),
                reason: format!("unknown scenario. Available: {}", Self::available_scenarios().join(", ")),
            })
    }

    /// Run a scenario (or `all`) and collect one outcome per scenario
    ///
    /// Individual failures are recorded, not returned; only being unable to
    /// open the storage backend aborts the run.
    pub async fn run_scenario(
        &self,
        name: &str,
        suite: &SuiteLifecycle,
        context: &SuiteContext,
    ) -> HarnessResult<Vec<ScenarioOutcome>> {
        let names = Self::expand(name)?;
        let backend = if names.iter().any(|n| *n != "service_ready") {
            Some(BackendHandle::open(self.backend, suite, context).await?)
        } else {
            None
        };

        let mut outcomes = Vec::with_capacity(names.len());
        for scenario in names {
            info!("🧪 Running scenario '{}' on {} storage", scenario, self.backend);
            let started = Instant::now();
            let result = self.run_one(scenario, context, backend.as_ref()).await;
            let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

            match &result {
                Ok(()) => info!("✅ Scenario '{}' passed in {}ms", scenario, elapsed_ms),
                Err(e) => error!("❌ Scenario '{}' failed: {}", scenario, e),
            }
            outcomes.push(ScenarioOutcome {
                name: scenario.to_string(),
                backend: self.backend.to_string(),
                passed: result.is_ok(),
                elapsed_ms,
                error: result.err().map(|e| e.to_string()),
            });
        }

        if let Some(backend) = backend {
            if let Err(e) = backend.release(suite).await {
                warn!("⚠️ Storage backend did not shut down cleanly: {}", e);
            }
        }
        Ok(outcomes)
    }

    async fn run_one(&self, name: &str, context: &SuiteContext, backend: Option<&BackendHandle>) -> HarnessResult<()> {
        let backend = || {
            backend.ok_or_else(|| HarnessError::ScenarioFailed {
                name: name.to_string(),
                reason: "no storage backend open".to_string(),
            })
        };
        match name {
            "service_ready" => service::service_ready(context).await,
            "storage_roundtrip" => storage::roundtrip(context, backend()?.fixture()).await,
            "stable_location" => storage::stable_location(context, backend()?.fixture()).await,
            "bucket_idempotent" => storage::bucket_idempotent(backend()?).await,
            other => Err(HarnessError::ScenarioFailed {
                name: other.to_string(),
                reason: "not runnable".to_string(),
            }),
        }
    }
}

/// Fail `scenario` with `reason` unless `condition` holds
pub(crate) fn ensure(condition: bool, scenario: &str, reason: impl Into<String>) -> HarnessResult<()> {
    if condition {
        Ok(())
    } else {
        Err(HarnessError::ScenarioFailed {
            name: scenario.to_string(),
            reason: reason.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_all_runs_every_scenario() {
        assert_eq!(TestScenarios::expand("all").unwrap(), SCENARIOS.to_vec());
        assert_eq!(TestScenarios::expand("stable_location").unwrap(), vec!["stable_location"]);
    }

    #[test]
    fn test_expand_unknown_lists_available() {
        let err = TestScenarios::expand("nope").unwrap_err();
        assert!(err.to_string().contains("storage_roundtrip"));
    }

    #[test]
    fn test_outcome_report_omits_missing_error() {
        let outcome = ScenarioOutcome {
            name: "service_ready".into(),
            backend: "local".into(),
            passed: true,
            elapsed_ms: 12,
            error: None,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["passed"], true);
        assert!(json.get("error").is_none());
    }
}
