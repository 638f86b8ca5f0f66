//! Runtime configuration of the task service under test
//!
//! Field names mirror the service's own config file (`HostName`, `HTTPPort`,
//! `Worker.StatusPollRate`, ...). Durations are `Duration` in Rust and integer
//! nanoseconds on disk.

pub mod duration;

use crate::errors::{SharedError, SharedResult};
use duration::{nanos, port_string, timeout_nanos};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceConfig {
    pub host_name: String,
    #[serde(rename = "HTTPPort", with = "port_string")]
    pub http_port: u16,
    #[serde(rename = "RPCPort", with = "port_string")]
    pub rpc_port: u16,
    pub work_dir: PathBuf,
    pub storage: Vec<StorageDescriptor>,
    pub log_level: String,
    pub worker: WorkerConfig,
    #[serde(with = "nanos")]
    pub schedule_rate: Duration,
}

/// Worker and scheduling loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WorkerConfig {
    /// `None` is written as -1, which the service reads as "no timeout"
    #[serde(with = "timeout_nanos")]
    pub timeout: Option<Duration>,
    #[serde(with = "nanos")]
    pub status_poll_rate: Duration,
    #[serde(with = "nanos")]
    pub log_update_rate: Duration,
    #[serde(with = "nanos")]
    pub new_job_poll_rate: Duration,
    #[serde(with = "nanos")]
    pub update_rate: Duration,
    #[serde(with = "nanos")]
    pub tracker_rate: Duration,
}

impl WorkerConfig {
    /// Every loop polls at the same rate and tasks never time out
    pub fn uniform(rate: Duration) -> Self {
        Self {
            timeout: None,
            status_poll_rate: rate,
            log_update_rate: rate,
            new_job_poll_rate: rate,
            update_rate: rate,
            tracker_rate: rate,
        }
    }

    fn rates(&self) -> [(&'static str, Duration); 5] {
        [
            ("Worker.StatusPollRate", self.status_poll_rate),
            ("Worker.LogUpdateRate", self.log_update_rate),
            ("Worker.NewJobPollRate", self.new_job_poll_rate),
            ("Worker.UpdateRate", self.update_rate),
            ("Worker.TrackerRate", self.tracker_rate),
        ]
    }
}

/// Local filesystem backend: the directories the service may read and write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LocalStorage {
    pub allowed_dirs: Vec<PathBuf>,
}

/// S3-compatible backend endpoint and credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct S3Storage {
    pub endpoint: String,
    pub key: String,
    pub secret: String,
}

/// One entry of the `Storage` list
///
/// On disk this is a map with a single `Local` or `S3` key. The fields are
/// private so an entry can only be built holding exactly one backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageDescriptor {
    #[serde(rename = "Local", default, skip_serializing_if = "Option::is_none")]
    local: Option<LocalStorage>,
    #[serde(rename = "S3", default, skip_serializing_if = "Option::is_none")]
    s3: Option<S3Storage>,
}

/// Borrowed view of the backend a descriptor names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackendRef<'a> {
    Local(&'a LocalStorage),
    S3(&'a S3Storage),
}

impl StorageDescriptor {
    pub fn local<I, P>(allowed_dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            local: Some(LocalStorage {
                allowed_dirs: allowed_dirs.into_iter().map(Into::into).collect(),
            }),
            s3: None,
        }
    }

    pub fn s3(endpoint: impl Into<String>, key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            local: None,
            s3: Some(S3Storage {
                endpoint: endpoint.into(),
                key: key.into(),
                secret: secret.into(),
            }),
        }
    }

    /// The configured backend, or an error if the entry names zero or two
    pub fn backend(&self) -> SharedResult<StorageBackendRef<'_>> {
        match (&self.local, &self.s3) {
            (Some(local), None) => Ok(StorageBackendRef::Local(local)),
            (None, Some(s3)) => Ok(StorageBackendRef::S3(s3)),
            (None, None) => Err(SharedError::invalid("Storage", "entry names no backend")),
            (Some(_), Some(_)) => Err(SharedError::invalid("Storage", "entry names both Local and S3")),
        }
    }
}

impl ServiceConfig {
    /// Check the invariants the service cannot enforce itself
    ///
    /// A zero rate disables the matching loop inside the service, so it is
    /// always a harness bug.
    pub fn validate(&self) -> SharedResult<()> {
        if self.host_name.trim().is_empty() {
            return Err(SharedError::invalid("HostName", "<empty>"));
        }
        if self.http_port == 0 {
            return Err(SharedError::invalid("HTTPPort", self.http_port));
        }
        if self.rpc_port == 0 {
            return Err(SharedError::invalid("RPCPort", self.rpc_port));
        }
        if self.http_port == self.rpc_port {
            return Err(SharedError::invalid("RPCPort", format!("{} (same as HTTPPort)", self.rpc_port)));
        }
        if self.schedule_rate.is_zero() {
            return Err(SharedError::invalid("ScheduleRate", 0));
        }
        for (field, rate) in self.worker.rates() {
            if rate.is_zero() {
                return Err(SharedError::invalid(field, 0));
            }
        }
        if let Some(timeout) = self.worker.timeout {
            if timeout.is_zero() {
                return Err(SharedError::invalid("Worker.Timeout", 0));
            }
        }
        for descriptor in &self.storage {
            descriptor.backend()?;
        }
        Ok(())
    }

    /// Serialize to the YAML document the service reads
    pub fn to_yaml(&self) -> SharedResult<String> {
        serde_yaml::to_string(self).map_err(|e| SharedError::SerializationError {
            message: e.to_string(),
        })
    }

    pub fn from_yaml(text: &str) -> SharedResult<Self> {
        serde_yaml::from_str(text).map_err(|e| SharedError::DeserializationError {
            message: e.to_string(),
        })
    }

    /// `host:port` of the service's HTTP API
    pub fn http_address(&self) -> String {
        format!("{}:{}", self.host_name, self.http_port)
    }

    /// `host:port` of the service's RPC API
    pub fn rpc_address(&self) -> String {
        format!("{}:{}", self.host_name, self.rpc_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::duration::config_seconds;

    fn sample() -> ServiceConfig {
        let rate = config_seconds(0.05);
        ServiceConfig {
            host_name: "localhost".to_string(),
            http_port: 8000,
            rpc_port: 9090,
            work_dir: PathBuf::from("/tmp/suite.work-dir"),
            storage: vec![
                StorageDescriptor::local(["/tmp/suite.storage"]),
                StorageDescriptor::s3("localhost:9000", "key", "secret"),
            ],
            log_level: "info".to_string(),
            worker: WorkerConfig::uniform(rate),
            schedule_rate: rate,
        }
    }

    #[test]
    fn test_service_schema_field_names() {
        let value = serde_json::to_value(sample()).unwrap();

        assert_eq!(value["HostName"], "localhost");
        assert_eq!(value["HTTPPort"], "8000");
        assert_eq!(value["RPCPort"], "9090");
        assert_eq!(value["WorkDir"], "/tmp/suite.work-dir");
        assert_eq!(value["LogLevel"], "info");
        assert_eq!(value["ScheduleRate"], 50_000_000);
        assert_eq!(value["Worker"]["Timeout"], -1);
        assert_eq!(value["Worker"]["StatusPollRate"], 50_000_000);
        assert_eq!(value["Worker"]["TrackerRate"], 50_000_000);
        assert_eq!(value["Storage"][0]["Local"]["AllowedDirs"][0], "/tmp/suite.storage");
        assert!(value["Storage"][0].get("S3").is_none());
        assert_eq!(value["Storage"][1]["S3"]["Endpoint"], "localhost:9000");
    }

    #[test]
    fn test_yaml_round_trip_preserves_config() {
        let config = sample();
        let yaml = config.to_yaml().unwrap();
        assert!(yaml.contains("HTTPPort: '8000'") || yaml.contains("HTTPPort: \"8000\""));
        assert_eq!(ServiceConfig::from_yaml(&yaml).unwrap(), config);
    }

    #[test]
    fn test_validate_rejects_zero_rates() {
        let mut config = sample();
        config.worker.update_rate = Duration::ZERO;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Worker.UpdateRate"));

        let mut config = sample();
        config.schedule_rate = config_seconds(-1.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_ambiguous_storage_entry() {
        let mut config = sample();
        config.storage.push(StorageDescriptor { local: None, s3: None });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_negative_rate_is_not_deserialized() {
        let mut yaml = sample().to_yaml().unwrap();
        yaml = yaml.replace("ScheduleRate: 50000000", "ScheduleRate: -5");
        assert!(ServiceConfig::from_yaml(&yaml).is_err());
    }

    #[test]
    fn test_validate_accepts_sample() {
        sample().validate().unwrap();
        assert_eq!(sample().http_address(), "localhost:8000");
    }
}
