use reqwest::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

/// Status text used when a code has no canonical reason phrase
pub const UNKNOWN_STATUS: &str = "Unknown Status";

/// Body of a failed HTTP response
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Text(String),
    Json(serde_json::Value),
}

impl ResponseBody {
    pub fn parse(raw: String, is_json: bool) -> Self {
        if is_json {
            if let Ok(value) = serde_json::from_str(&raw) {
                return ResponseBody::Json(value);
            }
        }
        ResponseBody::Text(raw)
    }

    /// Plain text bodies only; structured bodies are not echoed to the user
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseBody::Text(text) => Some(text),
            ResponseBody::Json(_) => None,
        }
    }

    pub fn pretty(&self) -> String {
        let value = match self {
            ResponseBody::Text(text) => serde_json::Value::String(text.clone()),
            ResponseBody::Json(value) => value.clone(),
        };
        serde_json::to_string_pretty(&value).unwrap_or_default()
    }
}

#[derive(Error, Debug)]
pub enum TransferError {
    /// The server answered with a non-success status
    #[error(
        "HTTP {}: {}\nResponse Data: {}",
        .status.as_u16(),
        .status.canonical_reason().unwrap_or(UNKNOWN_STATUS),
        .body.pretty()
    )]
    Status {
        url: String,
        status: StatusCode,
        body: ResponseBody,
    },

    /// The request went out but no response came back
    #[error("Response from {url} was not received")]
    NoResponse {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The request could not be built or dispatched
    #[error("Request to {url} could not be sent: {message}")]
    NotSent { url: String, message: String },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Failed to read {}: {source}", .path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot simulate uploading {size} bytes at {rate_mbps} Mbps")]
    MockRate { rate_mbps: f64, size: u64 },

    #[error("Invalid response body from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl TransferError {
    pub(crate) fn from_send(url: &str, err: reqwest::Error) -> Self {
        if err.is_builder() {
            TransferError::NotSent {
                url: url.to_string(),
                message: err.to_string(),
            }
        } else {
            TransferError::NoResponse {
                url: url.to_string(),
                source: err,
            }
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            TransferError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the failure came out of the HTTP layer rather than local I/O
    pub fn is_http(&self) -> bool {
        matches!(
            self,
            TransferError::Status { .. }
                | TransferError::NoResponse { .. }
                | TransferError::NotSent { .. }
                | TransferError::Client(_)
        )
    }
}
