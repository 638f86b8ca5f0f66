//! S3-compatible object store fixture
//!
//! Every key lives under the suite's workspace name so concurrent and
//! historical runs sharing one bucket never collide. The bucket itself is
//! created on first use and treated as already present if another run got
//! there first.

use super::{StorageFixture, StorageKind, StorageLocation, file_basename};
use crate::error::{HarnessError, HarnessResult};
use crate::settings::ObjectStoreSettings;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::OnceCell;
use tracing::{debug, info};

pub struct ObjectStoreFixture {
    client: Client,
    bucket: String,
    key_prefix: String,
    output_dir: PathBuf,
    bucket_ready: OnceCell<()>,
}

impl ObjectStoreFixture {
    /// Build an S3 client for the emulator described by `settings`
    pub async fn client(settings: &ObjectStoreSettings) -> Client {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .endpoint_url(settings.endpoint_url())
            .credentials_provider(Credentials::new(
                settings.access_key.clone(),
                settings.secret_key.clone(),
                None,
                None,
                "funnel-tests",
            ))
            .load()
            .await;
        let builder = aws_sdk_s3::config::Builder::from(&config).force_path_style(true);
        Client::from_conf(builder.build())
    }

    /// Fixture writing under `key_prefix` and downloading into `output_dir`
    pub async fn connect(
        settings: &ObjectStoreSettings,
        key_prefix: impl Into<String>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self::from_client(Self::client(settings).await, settings.bucket.clone(), key_prefix, output_dir)
    }

    pub fn from_client(
        client: Client,
        bucket: impl Into<String>,
        key_prefix: impl Into<String>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            key_prefix: key_prefix.into(),
            output_dir: output_dir.into(),
            bucket_ready: OnceCell::new(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Create the bucket once per fixture
    pub async fn ensure_bucket(&self) -> HarnessResult<()> {
        self.bucket_ready
            .get_or_try_init(|| self.create_bucket_if_missing())
            .await
            .map(|_| ())
    }

    /// Check-then-create; "already exists" from a racing creator is success
    pub async fn create_bucket_if_missing(&self) -> HarnessResult<()> {
        if self.client.head_bucket().bucket(&self.bucket).send().await.is_ok() {
            debug!("Bucket '{}' already exists", self.bucket);
            return Ok(());
        }

        match self.client.create_bucket().bucket(&self.bucket).send().await {
            Ok(_) => {
                info!("🪣 Created bucket '{}'", self.bucket);
                Ok(())
            }
            Err(err) => {
                let already_there = err
                    .as_service_error()
                    .is_some_and(|e| e.is_bucket_already_owned_by_you() || e.is_bucket_already_exists());
                if already_there {
                    debug!("Bucket '{}' was created concurrently", self.bucket);
                    Ok(())
                } else {
                    Err(HarnessError::object_store("create_bucket", &self.bucket, DisplayErrorContext(&err)))
                }
            }
        }
    }

    /// Number of buckets named like ours, for asserting creation is idempotent
    pub async fn bucket_count(&self) -> HarnessResult<usize> {
        let output = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(|err| HarnessError::object_store("list_buckets", &self.bucket, DisplayErrorContext(&err)))?;
        Ok(output
            .buckets()
            .iter()
            .filter(|b| b.name() == Some(self.bucket.as_str()))
            .count())
    }

    fn object_key(&self, basename: &str) -> String {
        if self.key_prefix.is_empty() {
            basename.to_string()
        } else {
            format!("{}/{}", self.key_prefix.trim_end_matches('/'), basename)
        }
    }
}

#[async_trait]
impl StorageFixture for ObjectStoreFixture {
    fn kind(&self) -> StorageKind {
        StorageKind::ObjectStore
    }

    fn location_for(&self, local_path: &Path) -> HarnessResult<StorageLocation> {
        Ok(StorageLocation::Object {
            bucket: self.bucket.clone(),
            key: self.object_key(&file_basename(local_path)?),
        })
    }

    async fn copy_to_storage(&self, local_path: &Path) -> HarnessResult<StorageLocation> {
        self.ensure_bucket().await?;
        let location = self.location_for(local_path)?;
        let StorageLocation::Object { bucket, key } = &location else {
            return Err(HarnessError::invalid_location(&location, "not an object location"));
        };

        info!("⬆️ Uploading {} to {}", local_path.display(), location);
        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|err| HarnessError::object_store("read", local_path.display().to_string(), err))?;
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|err| HarnessError::object_store("put_object", location.to_string(), DisplayErrorContext(&err)))?;
        Ok(location)
    }

    async fn get_from_storage(&self, location: &StorageLocation) -> HarnessResult<PathBuf> {
        let StorageLocation::Object { bucket, key } = location else {
            return Err(HarnessError::invalid_location(location, "object storage cannot resolve local paths"));
        };
        let basename = location
            .basename()
            .ok_or_else(|| HarnessError::invalid_location(location, "object key has no file name"))?;
        let destination = self.output_dir.join(basename);
        info!("⬇️ Downloading {} to {}", location, destination.display());

        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| HarnessError::object_store("get_object", location.to_string(), DisplayErrorContext(&err)))?;

        let storage_err = |source| HarnessError::Storage {
            operation: "download",
            path: destination.clone(),
            source,
        };
        let mut file = tokio::fs::File::create(&destination).await.map_err(storage_err)?;
        let mut body = output.body.into_async_read();
        tokio::io::copy(&mut body, &mut file).await.map_err(storage_err)?;
        file.flush().await.map_err(storage_err)?;
        Ok(destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn offline_fixture(prefix: &str) -> ObjectStoreFixture {
        ObjectStoreFixture::connect(&ObjectStoreSettings::default(), prefix, "/tmp/out").await
    }

    #[tokio::test]
    async fn test_location_uses_key_prefix() {
        let fixture = offline_fixture("funnel-tests-abc").await;
        let location = fixture.location_for(Path::new("/data/inputs/reads.fastq")).unwrap();
        assert_eq!(location.to_string(), "s3://tes-test/funnel-tests-abc/reads.fastq");
    }

    #[tokio::test]
    async fn test_location_is_stable_for_same_basename() {
        let fixture = offline_fixture("funnel-tests-abc/").await;
        let first = fixture.location_for(Path::new("/a/input.txt")).unwrap();
        let second = fixture.location_for(Path::new("/b/input.txt")).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.to_string(), "s3://tes-test/funnel-tests-abc/input.txt");
    }

    #[tokio::test]
    async fn test_get_rejects_local_location() {
        let fixture = offline_fixture("p").await;
        let local = StorageLocation::Local(PathBuf::from("input.txt"));
        assert!(fixture.get_from_storage(&local).await.is_err());
    }
}
