use bytes::Bytes;
use futures::TryStreamExt;
use reqwest::header::{ACCEPT, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Body, RequestBuilder, Response};
use std::path::Path;
use tokio_util::io::ReaderStream;
use tracing::debug;

use super::error::{ResponseBody, TransferError};
use super::{ProgressInfo, UploadRequest, content_type_for};
use crate::config::TransferConfig;

/// Thin wrapper around a `reqwest::Client` that knows the token header
#[derive(Clone)]
pub struct TransferClient {
    client: reqwest::Client,
    token_header: String,
}

impl TransferClient {
    pub fn new(config: &TransferConfig) -> Result<Self, TransferError> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .build()
            .map_err(TransferError::Client)?;
        Ok(Self {
            client,
            token_header: config.token_header.clone(),
        })
    }

    fn with_token(&self, builder: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        match token {
            Some(token) => builder.header(self.token_header.as_str(), token),
            None => builder,
        }
    }

    /// Fetch the list of mapping identifiers already known to the service
    pub async fn fetch_metadata(&self, url: &str, token: &str) -> Result<Vec<String>, TransferError> {
        let request = self
            .with_token(self.client.get(url), Some(token))
            .header(ACCEPT, mime::APPLICATION_JSON.as_ref());

        let response = request
            .send()
            .await
            .map_err(|e| TransferError::from_send(url, e))?;
        let response = ensure_success(url, response).await?;

        let body = response.bytes().await.map_err(|e| TransferError::NoResponse {
            url: url.to_string(),
            source: e,
        })?;
        serde_json::from_slice(&body).map_err(|e| TransferError::Decode {
            url: url.to_string(),
            source: e,
        })
    }

    /// PUT the file as the raw request body
    pub async fn upload_stream(&self, request: &UploadRequest) -> Result<(), TransferError> {
        let path = request.file.path.as_path();
        let (file, size) = open_file(path).await?;
        let content_type = content_type_for(path);

        debug!(
            "PUT {} ({} bytes, {}) to {}",
            path.display(),
            size,
            content_type,
            request.url
        );

        let builder = self
            .client
            .put(&request.url)
            .header(CONTENT_TYPE, content_type)
            .header(CONTENT_LENGTH, size)
            .body(progress_body(file, size, request.clone()));

        self.send(request, builder).await
    }

    /// PUT the file as one part of a multipart form, alongside the extra parameters
    pub async fn upload_multipart(&self, request: &UploadRequest) -> Result<(), TransferError> {
        let path = request.file.path.as_path();
        let (file, size) = open_file(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        let part = reqwest::multipart::Part::stream_with_length(
            progress_body(file, size, request.clone()),
            size,
        )
        .file_name(file_name);

        let mut form =
            reqwest::multipart::Form::new().part(request.file.field_name.clone(), part);
        for (key, value) in &request.parameters {
            form = form.text(key.clone(), value.clone());
        }

        debug!(
            "PUT multipart {} ({} bytes, {} extra fields) to {}",
            path.display(),
            size,
            request.parameters.len(),
            request.url
        );

        let builder = self.client.put(&request.url).multipart(form);
        self.send(request, builder).await
    }

    async fn send(&self, request: &UploadRequest, builder: RequestBuilder) -> Result<(), TransferError> {
        let response = self
            .with_token(builder, request.token.as_deref())
            .send()
            .await
            .map_err(|e| TransferError::from_send(&request.url, e))?;
        ensure_success(&request.url, response).await?;
        Ok(())
    }
}

async fn open_file(path: &Path) -> Result<(tokio::fs::File, u64), TransferError> {
    let file_error = |source| TransferError::File {
        path: path.to_path_buf(),
        source,
    };

    let metadata = tokio::fs::metadata(path).await.map_err(file_error)?;
    if !metadata.is_file() {
        return Err(file_error(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "not a regular file",
        )));
    }
    let file = tokio::fs::File::open(path).await.map_err(file_error)?;
    Ok((file, metadata.len()))
}

/// Stream the file as a request body, reporting progress as chunks are read
fn progress_body(file: tokio::fs::File, total: u64, request: UploadRequest) -> Body {
    let mut loaded = 0u64;
    let stream = ReaderStream::new(file).inspect_ok(move |chunk: &Bytes| {
        loaded += chunk.len() as u64;
        request.report(ProgressInfo::new(loaded, total));
    });
    Body::wrap_stream(stream)
}

async fn ensure_success(url: &str, response: Response) -> Result<Response, TransferError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with(mime::APPLICATION_JSON.as_ref()));
    let raw = match response.text().await {
        Ok(raw) => raw,
        Err(e) => {
            debug!("Failed to read error response body from {}: {}", url, e);
            String::new()
        }
    };

    Err(TransferError::Status {
        url: url.to_string(),
        status,
        body: ResponseBody::parse(raw, is_json),
    })
}
