//! Test fixtures and data for harness tests

use std::path::{Path, PathBuf};

/// Standard test data and fixtures
pub struct TestFixtures;

impl TestFixtures {
    pub const CONTAINER_NAME: &'static str = "tes_minio_test";
    pub const WORKSPACE_PREFIX: &'static str = "funnel-tests-";

    /// Fake service that records its arguments and then idles
    pub const RECORDING_SERVICE: &'static str = "#!/bin/sh\necho \"$@\" > args.txt\nexec sleep 30\n";

    /// Fake service that dies right away
    pub const CRASHING_SERVICE: &'static str = "#!/bin/sh\necho 'bad config' >&2\nexit 3\n";

    /// Bytes covering every value, with a length that is not a power of two
    pub fn sample_bytes() -> Vec<u8> {
        (0..=255u8).cycle().take(10_007).collect()
    }

    /// Write an executable shell script into `dir`
    #[cfg(unix)]
    pub fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    /// Fake container runtime that appends each invocation to `calls.txt`
    ///
    /// `on_run` is the shell run for the `run` subcommand; every other
    /// subcommand succeeds silently. Returns the script and the call log.
    #[cfg(unix)]
    pub fn fake_runtime(dir: &Path, on_run: &str) -> (PathBuf, PathBuf) {
        let calls = dir.join("calls.txt");
        let body = format!(
            "#!/bin/sh\necho \"$@\" >> '{}'\nif [ \"$1\" = run ]; then\n{on_run}\nfi\nexit 0\n",
            calls.display()
        );
        (Self::script(dir, "fake-docker", &body), calls)
    }

    /// Lines of a fake runtime call log, or none if it was never invoked
    pub fn runtime_calls(calls: &Path) -> Vec<String> {
        std::fs::read_to_string(calls)
            .map(|log| log.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Write `contents` to `dir/name`
    pub fn input_file(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }
}
