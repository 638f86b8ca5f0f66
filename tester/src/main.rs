//! Harness Runner
//!
//! Runs named scenarios against a freshly started service:
//! - Creates the suite workspace and writes the service config
//! - Starts the service and waits for its HTTP port
//! - Opens the selected storage backend (starting the S3 emulator if needed)
//! - Tears everything down on success, failure, timeout or Ctrl+C

use anyhow::{Context, bail};
use chrono::{DateTime, Utc};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::time::timeout;

use tester::runtime::suite::INTERRUPTED_EXIT_CODE;
use tester::{HarnessError, HarnessSettings, ScenarioOutcome, StorageKind, SuiteLifecycle, TestScenarios};

#[derive(Parser)]
#[command(name = "tester")]
#[command(about = "Integration test harness for the funnel task service")]
struct Args {
    /// Scenario to run (service_ready, storage_roundtrip, stable_location, bucket_idempotent, all)
    #[arg(long, default_value = "all")]
    scenario: String,

    /// Storage backend to run storage scenarios against (local or s3)
    #[arg(long, default_value = "local")]
    backend: StorageKind,

    /// Overall timeout in seconds, setup excluded
    #[arg(long, default_value = "120")]
    timeout_secs: u64,

    /// Service binary, overriding FUNNEL_TEST_SERVICE_BINARY
    #[arg(long)]
    service_binary: Option<String>,

    /// Pick random HTTP/RPC ports for the service
    #[arg(long)]
    random_ports: bool,

    /// Enable verbose tracing output
    #[arg(long)]
    verbose: bool,

    /// Write a JSON report to this path
    #[arg(long)]
    json: Option<PathBuf>,
}

#[derive(Serialize)]
struct RunReport {
    scenario: String,
    backend: String,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    workspace: Option<PathBuf>,
    passed: bool,
    error: Option<String>,
    outcomes: Vec<ScenarioOutcome>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    shared::logging::init_tracing_verbose(args.verbose);

    let mut settings = HarnessSettings::from_env().context("invalid FUNNEL_TEST_* settings")?;
    if let Some(binary) = &args.service_binary {
        settings.service_binary = binary.clone();
    }
    settings.random_ports |= args.random_ports;

    // Reject unknown names before anything is started
    TestScenarios::expand(&args.scenario)?;

    shared::logging::log_startup("tester", &format!("scenario={} backend={}", args.scenario, args.backend));
    tracing::info!("Scenario: {}, Backend: {}, Timeout: {}s", args.scenario, args.backend, args.timeout_secs);

    let started_at = Utc::now();
    let clock = Instant::now();
    let suite = SuiteLifecycle::new(settings);
    let scenarios = TestScenarios::new(args.backend);
    let budget = Duration::from_secs(args.timeout_secs);

    let mut workspace = None;
    let result = suite
        .run(|context| {
            workspace = Some(context.workspace.base().to_path_buf());
            let suite = &suite;
            let scenarios = &scenarios;
            let name = args.scenario.as_str();
            async move {
                timeout(budget, scenarios.run_scenario(name, suite, &context))
                    .await
                    .map_err(|_| HarnessError::TimedOut {
                        condition: format!("scenario '{name}'"),
                        waited: budget,
                        attempts: 1,
                    })?
            }
        })
        .await;

    let outcomes = match &result {
        Ok(outcomes) => outcomes.clone(),
        Err(_) => Vec::new(),
    };
    let failed: Vec<&str> = outcomes.iter().filter(|o| !o.passed).map(|o| o.name.as_str()).collect();
    let report = RunReport {
        scenario: args.scenario.clone(),
        backend: args.backend.to_string(),
        started_at,
        finished_at: Utc::now(),
        workspace,
        passed: result.is_ok() && failed.is_empty(),
        error: result.as_ref().err().map(|e| e.to_string()),
        outcomes: outcomes.clone(),
    };

    if let Some(path) = &args.json {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json).with_context(|| format!("writing report to {}", path.display()))?;
        tracing::info!("📄 Report written to {}", path.display());
    }

    match result {
        Err(HarnessError::Interrupted { signal }) => {
            shared::logging::log_shutdown("tester", &format!("interrupted by {signal}"));
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
        Err(e) => {
            tracing::error!("❌ Suite failed after {:?}: {}", clock.elapsed(), e);
            Err(e.into())
        }
        Ok(_) if !failed.is_empty() => {
            bail!("{} of {} scenarios failed: {}", failed.len(), outcomes.len(), failed.join(", "))
        }
        Ok(_) => {
            tracing::info!("🏁 {} scenarios passed in {:?}", outcomes.len(), clock.elapsed());
            Ok(())
        }
    }
}
