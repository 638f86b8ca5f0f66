//! Service Configuration Builder
//!
//! Provides a flexible builder pattern for constructing the config the
//! service under test is launched with

use rand::Rng;
use shared::{ServiceConfig, StorageDescriptor, WorkerConfig, config_seconds};
use std::ops::Range;
use std::path::PathBuf;
use std::time::Duration;

/// Range random ports are drawn from
pub const RANDOM_PORT_RANGE: Range<u16> = 10000..20000;

pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    /// Defaults tuned for tests: every loop runs at 50 ms and tasks never time out
    pub fn new() -> Self {
        let rate = config_seconds(0.05);
        Self {
            config: ServiceConfig {
                host_name: "localhost".to_string(),
                http_port: 8000,
                rpc_port: 9090,
                work_dir: PathBuf::from("."),
                storage: Vec::new(),
                log_level: "info".to_string(),
                worker: WorkerConfig::uniform(rate),
                schedule_rate: rate,
            },
        }
    }

    /// Set host name
    pub fn host_name<S: Into<String>>(mut self, host: S) -> Self {
        self.config.host_name = host.into();
        self
    }

    /// Set HTTP API port
    pub fn http_port(mut self, port: u16) -> Self {
        self.config.http_port = port;
        self
    }

    /// Set RPC API port
    pub fn rpc_port(mut self, port: u16) -> Self {
        self.config.rpc_port = port;
        self
    }

    /// Pick distinct HTTP and RPC ports from [`RANDOM_PORT_RANGE`]
    pub fn random_ports(mut self) -> Self {
        let mut rng = rand::thread_rng();
        let http = rng.gen_range(RANDOM_PORT_RANGE);
        let mut rpc = rng.gen_range(RANDOM_PORT_RANGE);
        while rpc == http {
            rpc = rng.gen_range(RANDOM_PORT_RANGE);
        }
        self.config.http_port = http;
        self.config.rpc_port = rpc;
        self
    }

    /// Set the service work directory
    pub fn work_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.work_dir = dir.into();
        self
    }

    /// Append a local storage backend
    pub fn local_storage<I, P>(mut self, allowed_dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.config.storage.push(StorageDescriptor::local(allowed_dirs));
        self
    }

    /// Append an S3 storage backend
    pub fn s3_storage(mut self, endpoint: &str, key: &str, secret: &str) -> Self {
        self.config.storage.push(StorageDescriptor::s3(endpoint, key, secret));
        self
    }

    /// Set log level (debug, info, warn, error)
    pub fn log_level<S: Into<String>>(mut self, level: S) -> Self {
        self.config.log_level = level.into();
        self
    }

    /// Set every worker and scheduler rate at once
    pub fn rate(mut self, rate: Duration) -> Self {
        let timeout = self.config.worker.timeout;
        self.config.worker = WorkerConfig::uniform(rate);
        self.config.worker.timeout = timeout;
        self.config.schedule_rate = rate;
        self
    }

    /// Set the worker task timeout (`None` disables it)
    pub fn worker_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.worker.timeout = timeout;
        self
    }

    /// Build the configuration
    pub fn build(self) -> ServiceConfig {
        self.config
    }
}

impl Default for ServiceConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
