//! Signal handling tests
//!
//! Raising SIGTERM affects the whole test process, so these live in their own
//! test binary.

#![cfg(unix)]

use assert_matches::assert_matches;
use nix::sys::signal::{Signal, raise};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tester::runtime::SuiteState;
use tester::{HarnessError, HarnessResult, SuiteLifecycle};

mod common;
use common::{FakeEndpoint, TestFixtures, TestHelpers};

/// Test SIGTERM during a run aborts the body and stops the service
#[tokio::test]
async fn test_sigterm_during_run_tears_down() {
    // Arrange
    let root = tempfile::tempdir().unwrap();
    let endpoint = FakeEndpoint::start().await;
    let service = TestFixtures::script(root.path(), "fake-funnel", TestFixtures::RECORDING_SERVICE);
    let suite = SuiteLifecycle::new(TestHelpers::settings(root.path(), &service, endpoint.port()));
    let service_pid = AtomicU32::new(0);

    // Act
    let result: HarnessResult<()> = suite
        .run(|context| {
            let service_pid = &service_pid;
            async move {
                service_pid.store(context.service_pid, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(100)).await;
                raise(Signal::SIGTERM).unwrap();
                std::future::pending().await
            }
        })
        .await;

    // Assert
    assert_matches!(result, Err(HarnessError::Interrupted { signal }) => {
        assert_eq!(signal, "SIGTERM");
    });
    assert_eq!(suite.state().await, SuiteState::TornDown);
    let pid = service_pid.load(Ordering::SeqCst);
    assert_ne!(pid, 0, "body saw a running service");
    #[cfg(target_os = "linux")]
    tester::PollCondition::new("service to exit", Duration::from_secs(5), Duration::from_millis(20))
        .unwrap()
        .wait_until(|| std::future::ready(TestHelpers::process_gone(pid)))
        .await
        .unwrap();
}
