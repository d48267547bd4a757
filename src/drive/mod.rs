//! Object storage for evidence files and branding assets.

use aws_config::BehaviorVersion;
use bytes::Bytes;
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::{config::Builder as S3ConfigBuilder, Client as S3Client};
use log::{info, trace, warn};
use std::time::Duration;

use crate::core::config::DriveConfig;

pub const LOCATOR_SCHEME: &str = "s3://";
pub const BUCKET_SETUP_ATTEMPTS: u32 = 10;
pub const BUCKET_SETUP_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
pub enum DriveError {
    #[error("Invalid storage locator: {0}")]
    InvalidLocator(String),
    #[error("Storage request failed: {0}")]
    Request(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketProbe {
    Exists,
    Missing,
    Forbidden,
    Failed,
}

#[derive(Clone)]
pub struct ObjectStore {
    client: S3Client,
    bucket: String,
}

pub async fn create_s3_operator(config: &DriveConfig) -> S3Client {
    let endpoint = if !config.server.ends_with('/') {
        format!("{}/", config.server)
    } else {
        config.server.clone()
    };
    let base_config = aws_config::defaults(BehaviorVersion::latest())
        .endpoint_url(endpoint)
        .region(aws_sdk_s3::config::Region::new(config.region.clone()))
        .credentials_provider(aws_sdk_s3::config::Credentials::new(
            config.access_key.clone(),
            config.secret_key.clone(),
            None,
            None,
            "static",
        ))
        .load()
        .await;
    let s3_config = S3ConfigBuilder::from(&base_config)
        .force_path_style(true)
        .build();
    S3Client::from_conf(s3_config)
}

impl ObjectStore {
    pub async fn connect(config: &DriveConfig) -> Self {
        Self {
            client: create_s3_operator(config).await,
            bucket: config.bucket.clone(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn probe_bucket(&self) -> BucketProbe {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => BucketProbe::Exists,
            Err(e) => {
                let status = e.raw_response().map(|r| r.status().as_u16());
                let probe = classify_bucket_probe(status, e.code());
                trace!("head_bucket {} -> {:?} ({:?})", self.bucket, probe, status);
                probe
            }
        }
    }

    /// Creates the bucket when absent. An access-denied probe counts as present:
    /// restricted credentials may still write objects.
    pub async fn ensure_container_exists(&self) -> Result<(), DriveError> {
        match self.probe_bucket().await {
            BucketProbe::Exists => Ok(()),
            BucketProbe::Forbidden => {
                warn!(
                    "No permission to inspect bucket {}, assuming it exists",
                    self.bucket
                );
                Ok(())
            }
            BucketProbe::Missing => {
                self.client
                    .create_bucket()
                    .bucket(&self.bucket)
                    .send()
                    .await
                    .map_err(|e| DriveError::Request(format!("create_bucket: {e}")))?;
                info!("Created bucket {}", self.bucket);
                Ok(())
            }
            BucketProbe::Failed => Err(DriveError::Request(format!(
                "Could not reach bucket {}",
                self.bucket
            ))),
        }
    }

    pub async fn upload(
        &self,
        bytes: Bytes,
        key: &str,
        content_type: &str,
    ) -> Result<String, DriveError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| DriveError::Request(format!("put_object {key}: {e}")))?;
        let locator = build_locator(&self.bucket, key);
        info!("Uploaded object {locator}");
        Ok(locator)
    }

    pub async fn download(&self, locator: &str) -> Result<(Bytes, String), DriveError> {
        let (bucket, key) = parse_locator(locator)?;
        let output = self
            .client
            .get_object()
            .bucket(&bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| DriveError::Request(format!("get_object {key}: {e}")))?;
        let content_type = output
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| guess_content_type(&key));
        let data = output
            .body
            .collect()
            .await
            .map_err(|e| DriveError::Request(format!("read body {key}: {e}")))?
            .into_bytes();
        Ok((data, content_type))
    }
}

/// Runs the startup bucket check with a fixed retry budget. Failure is fatal
/// only when `strict` is set.
pub async fn ensure_bucket_on_startup(
    store: &ObjectStore,
    strict: bool,
    attempts: u32,
    delay: Duration,
) -> Result<(), DriveError> {
    let mut last_error = None;
    for attempt in 1..=attempts {
        match store.ensure_container_exists().await {
            Ok(()) => {
                info!("Bucket {} ready (attempt {attempt})", store.bucket());
                return Ok(());
            }
            Err(e) => {
                warn!(
                    "Bucket {} not ready (attempt {attempt}/{attempts}): {e}",
                    store.bucket()
                );
                last_error = Some(e);
                if attempt < attempts {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    let error = last_error
        .unwrap_or_else(|| DriveError::Request("no bucket setup attempt was made".to_string()));
    if strict {
        return Err(error);
    }
    warn!("Continuing without a verified bucket: {error}");
    Ok(())
}

pub fn classify_bucket_probe(status: Option<u16>, code: Option<&str>) -> BucketProbe {
    match (status, code) {
        (Some(404), _) | (_, Some("NoSuchBucket")) | (_, Some("NotFound")) => BucketProbe::Missing,
        (Some(403), _) | (_, Some("AccessDenied")) | (_, Some("Forbidden")) => {
            BucketProbe::Forbidden
        }
        _ => BucketProbe::Failed,
    }
}

pub fn build_locator(bucket: &str, key: &str) -> String {
    format!("{LOCATOR_SCHEME}{bucket}/{key}")
}

pub fn parse_locator(locator: &str) -> Result<(String, String), DriveError> {
    let rest = locator
        .strip_prefix(LOCATOR_SCHEME)
        .ok_or_else(|| DriveError::InvalidLocator(locator.to_string()))?;
    match rest.split_once('/') {
        Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => {
            Ok((bucket.to_string(), key.to_string()))
        }
        _ => Err(DriveError::InvalidLocator(locator.to_string())),
    }
}

pub fn guess_content_type(name: &str) -> String {
    mime_guess::from_path(name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Lowercased extension with leading dot, or empty.
pub fn file_suffix(name: &str) -> String {
    std::path::Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_round_trip() {
        let locator = build_locator("evidencias", "auditoria_1/avaliacao_2/abc.pdf");
        assert_eq!(locator, "s3://evidencias/auditoria_1/avaliacao_2/abc.pdf");
        let (bucket, key) = parse_locator(&locator).expect("valid locator");
        assert_eq!(bucket, "evidencias");
        assert_eq!(key, "auditoria_1/avaliacao_2/abc.pdf");
    }

    #[test]
    fn test_parse_locator_rejects_malformed() {
        assert!(parse_locator("https://evidencias/key").is_err());
        assert!(parse_locator("s3://evidencias").is_err());
        assert!(parse_locator("s3:///key").is_err());
    }

    #[test]
    fn test_classify_bucket_probe() {
        assert_eq!(classify_bucket_probe(Some(404), None), BucketProbe::Missing);
        assert_eq!(
            classify_bucket_probe(None, Some("NoSuchBucket")),
            BucketProbe::Missing
        );
        assert_eq!(classify_bucket_probe(Some(403), None), BucketProbe::Forbidden);
        assert_eq!(
            classify_bucket_probe(Some(400), Some("AccessDenied")),
            BucketProbe::Forbidden
        );
        assert_eq!(classify_bucket_probe(Some(500), None), BucketProbe::Failed);
        assert_eq!(classify_bucket_probe(None, None), BucketProbe::Failed);
    }

    #[test]
    fn test_file_suffix_and_content_type() {
        assert_eq!(file_suffix("Relatorio.PDF"), ".pdf");
        assert_eq!(file_suffix("sem_extensao"), "");
        assert_eq!(guess_content_type("foto.png"), "image/png");
        assert_eq!(guess_content_type("dados"), "application/octet-stream");
    }
}
