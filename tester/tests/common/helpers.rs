//! Test helpers: settings, scripted container runtimes and fake HTTP endpoints

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tester::runtime::container::MockContainerRuntime;
use tester::{ContainerLookup, ContainerRuntime, HarnessSettings};

/// Helper functions for common test operations
pub struct TestHelpers;

impl TestHelpers {
    /// Settings for a suite rooted in `temp_root` with fast polling
    pub fn settings(temp_root: &Path, service_binary: &Path, http_port: u16) -> HarnessSettings {
        HarnessSettings {
            service_binary: service_binary.display().to_string(),
            temp_root: temp_root.to_path_buf(),
            host_name: "127.0.0.1".to_string(),
            http_port,
            rpc_port: Self::free_port(),
            readiness_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(50),
            termination_grace: Duration::from_secs(2),
            ..HarnessSettings::default()
        }
    }

    /// A port nothing listens on right now
    pub fn free_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    /// Runtime answering `lookups` in order, then repeating the last one
    pub fn scripted_runtime(lookups: Vec<ContainerLookup>) -> (Arc<dyn ContainerRuntime>, Arc<AtomicUsize>) {
        assert!(!lookups.is_empty());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut mock = MockContainerRuntime::new();
        mock.expect_lookup().returning(move |name| {
            assert_eq!(name, "tes_minio_test");
            let call = counter.fetch_add(1, Ordering::SeqCst);
            lookups[call.min(lookups.len() - 1)].clone()
        });
        (Arc::new(mock), calls)
    }

    /// True once `pid` no longer exists or is only a zombie
    #[cfg(target_os = "linux")]
    pub fn process_gone(pid: u32) -> bool {
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Err(_) => true,
            // state is the first field after the parenthesised command name
            Ok(stat) => stat
                .rsplit_once(')')
                .and_then(|(_, rest)| rest.split_whitespace().next())
                .is_some_and(|state| state == "Z" || state == "X"),
        }
    }
}

#[derive(Clone, Default)]
struct EndpointState {
    key: Arc<Mutex<Option<String>>>,
    shutdown_hits: Arc<AtomicUsize>,
}

/// Stand-in for both the service's HTTP port and a task checkpoint server
///
/// `GET /` answers 200 with the current key, or 503 while none is set.
/// `GET /shutdown` counts the call.
pub struct FakeEndpoint {
    addr: SocketAddr,
    state: EndpointState,
}

impl FakeEndpoint {
    pub async fn start() -> Self {
        Self::start_on("127.0.0.1:0").await
    }

    pub async fn start_on(addr: &str) -> Self {
        let state = EndpointState::default();
        let app = Router::new()
            .route("/", get(current_key))
            .route("/shutdown", get(shutdown))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { addr, state }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn set_key(&self, key: &str) {
        *self.state.key.lock().unwrap() = Some(key.to_string());
    }

    pub fn shutdown_hits(&self) -> usize {
        self.state.shutdown_hits.load(Ordering::SeqCst)
    }
}

async fn current_key(State(state): State<EndpointState>) -> (StatusCode, String) {
    match state.key.lock().unwrap().clone() {
        Some(key) => (StatusCode::OK, key),
        None => (StatusCode::SERVICE_UNAVAILABLE, String::new()),
    }
}

async fn shutdown(State(state): State<EndpointState>) -> StatusCode {
    state.shutdown_hits.fetch_add(1, Ordering::SeqCst);
    StatusCode::OK
}
