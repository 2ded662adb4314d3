//! Outbound HTTP transfers for symbol files.
//!
//! Uploads and the metadata fetch propagate their failures as [`TransferError`];
//! turning those into log output is left to the caller through
//! [`classify_and_log_error`].

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::TransferConfig;

pub mod diagnostics;
pub mod error;
pub mod http;
pub mod mock;

pub use diagnostics::{ErrorClassification, classify, classify_and_log_error};
pub use error::{ResponseBody, TransferError};
pub use http::TransferClient;
pub use mock::MockUploader;

/// Snapshot of an upload in flight
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressInfo {
    /// Percentage in the 0-100 range
    pub progress: f64,
    pub loaded: u64,
    pub total: u64,
}

impl ProgressInfo {
    pub fn new(loaded: u64, total: u64) -> Self {
        let progress = if total == 0 {
            100.0
        } else {
            loaded as f64 / total as f64 * 100.0
        };
        Self {
            progress,
            loaded,
            total,
        }
    }
}

pub type ProgressCallback = Arc<dyn Fn(ProgressInfo) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct FileUpload {
    pub path: PathBuf,
    /// Form field the file is attached under for multipart uploads
    pub field_name: String,
}

impl FileUpload {
    pub fn new(path: impl Into<PathBuf>, field_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            field_name: field_name.into(),
        }
    }
}

#[derive(Clone)]
pub struct UploadRequest {
    pub url: String,
    pub file: FileUpload,
    pub token: Option<String>,
    pub parameters: BTreeMap<String, String>,
    pub on_progress: Option<ProgressCallback>,
}

impl UploadRequest {
    pub fn new(url: impl Into<String>, file: FileUpload) -> Self {
        Self {
            url: url.into(),
            file,
            token: None,
            parameters: BTreeMap::new(),
            on_progress: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.parameters.insert(key.into(), value.to_string());
        self
    }

    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressInfo) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    pub(crate) fn report(&self, info: ProgressInfo) {
        if let Some(callback) = &self.on_progress {
            callback(info);
        }
    }
}

impl fmt::Debug for UploadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadRequest")
            .field("url", &self.url)
            .field("file", &self.file)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("parameters", &self.parameters)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

/// Content type for a raw (non-multipart) upload, derived from the extension
pub fn content_type_for(path: &Path) -> &'static str {
    let is_gzip = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"));
    if is_gzip {
        "application/gzip"
    } else {
        "text/plain"
    }
}

/// Common interface over the real and simulated upload paths
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, request: &UploadRequest) -> Result<(), TransferError>;

    fn name(&self) -> &'static str;
}

/// Raw body PUT (Android mapping files)
pub struct StreamUploader {
    client: TransferClient,
}

impl StreamUploader {
    pub fn new(client: TransferClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Uploader for StreamUploader {
    async fn upload(&self, request: &UploadRequest) -> Result<(), TransferError> {
        self.client.upload_stream(request).await
    }

    fn name(&self) -> &'static str {
        "stream"
    }
}

/// Multipart form PUT (dSYM archives)
pub struct MultipartUploader {
    client: TransferClient,
}

impl MultipartUploader {
    pub fn new(client: TransferClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Uploader for MultipartUploader {
    async fn upload(&self, request: &UploadRequest) -> Result<(), TransferError> {
        self.client.upload_multipart(request).await
    }

    fn name(&self) -> &'static str {
        "multipart"
    }
}

/// Factory function to create the uploader for a given mode
pub fn create_uploader(
    mode: &str,
    client: TransferClient,
    config: &TransferConfig,
) -> Box<dyn Uploader> {
    match mode.to_lowercase().as_str() {
        "stream" | "raw" => Box::new(StreamUploader::new(client)),
        "multipart" | "form" => Box::new(MultipartUploader::new(client)),
        "mock" => Box::new(MockUploader::from_config(config)),
        _ => {
            tracing::warn!("Unknown upload mode '{}', using multipart", mode);
            Box::new(MultipartUploader::new(client))
        }
    }
}
