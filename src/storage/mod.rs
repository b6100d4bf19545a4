//! Durable object storage uploads.
//!
//! The commit stage hands finished audio files to an [`Uploader`]. The
//! production implementation, [`ObjectStorage`], targets a Supabase-style
//! storage HTTP API; tests substitute their own `Uploader`.
//!
//! Uploads never overwrite: `x-upsert` is off, and a conflict response is
//! treated as already-durable rather than as a failure.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE};
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Per-upload timeout.
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Cache lifetime advertised for uploaded objects, in seconds.
const CACHE_MAX_AGE_SECS: u32 = 3600;

/// Errors that can occur during an upload.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The local file could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        /// The file that could not be read.
        path: std::path::PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Network-level error reaching the storage API.
    #[error("network error uploading {file}: {reason}")]
    Network {
        /// The file being uploaded.
        file: String,
        /// Description of the underlying failure.
        reason: String,
    },

    /// The storage API rejected the upload.
    #[error("HTTP {status} uploading {file}")]
    HttpStatus {
        /// The file being uploaded.
        file: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The local path has no usable filename component.
    #[error("path has no filename: {path}")]
    NoFilename {
        /// The offending path.
        path: std::path::PathBuf,
    },

    /// The configured storage base URL is not a valid URL.
    #[error("invalid storage base URL {base_url}: {source}")]
    InvalidBaseUrl {
        /// The offending value.
        base_url: String,
        /// The underlying parse error.
        #[source]
        source: url::ParseError,
    },

    /// HTTP client construction failed.
    #[error("HTTP client construction failed: {reason}")]
    ClientBuild {
        /// Description of the builder failure.
        reason: String,
    },
}

/// Pushes a finished local file to durable storage.
///
/// Returns the public URL of the stored object. Uses `async_trait` so the
/// commit gate can hold a `dyn Uploader` and tests can substitute fakes.
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Uploads `local` into `bucket`, returning its durable public URL.
    async fn upload(&self, local: &Path, bucket: &str) -> Result<String, UploadError>;
}

/// Supabase-style storage API client.
pub struct ObjectStorage {
    client: Client,
    base_url: String,
    api_key: String,
}

impl ObjectStorage {
    /// Creates a storage client for the given project base URL and key.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::InvalidBaseUrl`] for a malformed base URL and
    /// [`UploadError::ClientBuild`] if client construction fails.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, UploadError> {
        let base_url = base_url.into();
        url::Url::parse(&base_url).map_err(|source| UploadError::InvalidBaseUrl {
            base_url: base_url.clone(),
            source,
        })?;

        let client = Client::builder()
            .timeout(UPLOAD_TIMEOUT)
            .build()
            .map_err(|e| UploadError::ClientBuild {
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// Public URL for an object. Bucket and filename are percent-encoded.
    #[must_use]
    pub fn public_url(&self, bucket: &str, filename: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url,
            urlencoding::encode(bucket),
            urlencoding::encode(filename),
        )
    }
}

impl std::fmt::Debug for ObjectStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStorage")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Uploader for ObjectStorage {
    #[instrument(skip(self), fields(file = %local.display(), bucket))]
    async fn upload(&self, local: &Path, bucket: &str) -> Result<String, UploadError> {
        let filename = local
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| UploadError::NoFilename {
                path: local.to_path_buf(),
            })?
            .to_string();

        let bytes = tokio::fs::read(local)
            .await
            .map_err(|source| UploadError::Io {
                path: local.to_path_buf(),
                source,
            })?;

        let url = format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url,
            urlencoding::encode(bucket),
            urlencoding::encode(&filename),
        );

        debug!(bytes = bytes.len(), "uploading object");

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header("apikey", self.api_key.clone())
            .header(CONTENT_TYPE, content_type_for(&filename))
            .header(CACHE_CONTROL, format!("max-age={CACHE_MAX_AGE_SECS}"))
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await
            .map_err(|e| UploadError::Network {
                file: filename.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        // 409 means the object already exists; with upsert off that is the
        // durable state we wanted to reach.
        if status.is_success() || status.as_u16() == 409 {
            if status.as_u16() == 409 {
                warn!(%filename, "object already exists; keeping stored copy");
            }
            return Ok(self.public_url(bucket, &filename));
        }

        Err(UploadError::HttpStatus {
            file: filename,
            status: status.as_u16(),
        })
    }
}

/// MIME type by file extension; unknown extensions get a binary type.
fn content_type_for(filename: &str) -> &'static str {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase();

    match extension.as_str() {
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "m4a" => "audio/mp4",
        "aac" => "audio/aac",
        "ogg" => "audio/ogg",
        "flac" => "audio/flac",
        _ => "application/octet-stream",
    }
}
