//! Config Materialization
//!
//! Writes a `ServiceConfig` to a uniquely named YAML file that outlives the
//! harness, so the service can be pointed at it with `--config`.

use crate::error::{HarnessError, HarnessResult};
use shared::ServiceConfig;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

const FILE_PREFIX: &str = "funnel-config-";
const FILE_SUFFIX: &str = ".yml";

/// Validate and write `config` to a fresh file under the system temp dir
pub fn materialize(config: &ServiceConfig) -> HarnessResult<PathBuf> {
    materialize_in(config, &std::env::temp_dir())
}

/// Validate and write `config` to a fresh file under `dir`
///
/// Every call creates a new file; existing files are never rewritten.
pub fn materialize_in(config: &ServiceConfig, dir: &Path) -> HarnessResult<PathBuf> {
    config.validate()?;
    let yaml = config.to_yaml()?;

    let mut file = tempfile::Builder::new()
        .prefix(FILE_PREFIX)
        .suffix(FILE_SUFFIX)
        .tempfile_in(dir)
        .map_err(|source| HarnessError::Workspace {
            path: dir.to_path_buf(),
            source,
        })?;
    file.write_all(yaml.as_bytes())?;
    file.flush()?;

    let (_, path) = file.keep().map_err(|e| HarnessError::Workspace {
        path: e.file.path().to_path_buf(),
        source: e.error,
    })?;

    info!("📝 Service config written to {}", path.display());
    Ok(path)
}

/// Read a materialized config back
pub fn load(path: &Path) -> HarnessResult<ServiceConfig> {
    let text = std::fs::read_to_string(path)?;
    Ok(ServiceConfig::from_yaml(&text)?)
}
