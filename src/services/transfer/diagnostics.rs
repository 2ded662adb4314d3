use reqwest::StatusCode;
use std::error::Error;
use tracing::{error, warn};

use super::error::{TransferError, UNKNOWN_STATUS};

/// Shape of a failure as far as user-facing reporting is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClassification {
    PayloadTooLarge,
    ServerError,
    NoResponse,
    RequestConstructionFailure,
    Unknown,
}

/// Find an HTTP-layer transfer error anywhere in the source chain
fn find_http_error<'a>(error: &'a (dyn Error + 'static)) -> Option<&'a TransferError> {
    let mut current = Some(error);
    while let Some(err) = current {
        if let Some(transfer) = err.downcast_ref::<TransferError>() {
            if transfer.is_http() {
                return Some(transfer);
            }
        }
        current = err.source();
    }
    None
}

pub fn classify(error: &(dyn Error + 'static)) -> ErrorClassification {
    match find_http_error(error) {
        Some(TransferError::Status { status, .. }) if *status == StatusCode::PAYLOAD_TOO_LARGE => {
            ErrorClassification::PayloadTooLarge
        }
        Some(TransferError::Status { .. }) => ErrorClassification::ServerError,
        Some(TransferError::NoResponse { .. }) => ErrorClassification::NoResponse,
        Some(TransferError::NotSent { .. } | TransferError::Client(_)) => {
            ErrorClassification::RequestConstructionFailure
        }
        _ => ErrorClassification::Unknown,
    }
}

fn status_line(status: StatusCode) -> String {
    format!(
        "{} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or(UNKNOWN_STATUS)
    )
}

/// Log a failed operation in user-facing terms.
///
/// `context` describes what was being attempted and is logged last in every
/// branch. Returns `true` when the error came from the HTTP layer. Never fails.
pub fn classify_and_log_error(error: &(dyn Error + 'static), context: &str, url: &str) -> bool {
    let Some(transfer) = find_http_error(error) else {
        error!("An unexpected error occurred: {}", error);
        error!("{}", context);
        return false;
    };

    match transfer {
        TransferError::Status { status, .. } if *status == StatusCode::PAYLOAD_TOO_LARGE => {
            warn!("{}", status_line(*status));
            warn!("{}", context);
        }
        TransferError::Status { status, body, .. } => {
            error!("{}", status_line(*status));
            error!("{}", body.as_text().unwrap_or("Error data not available"));
            error!("{}", context);
        }
        TransferError::NoResponse { source, .. } => {
            error!("Response from {} was not received", url);
            if let Some(cause) = source.source() {
                error!("{}", cause);
            }
            error!("{}", context);
        }
        TransferError::NotSent { message, .. } => {
            error!("Request to {} could not be sent", url);
            if message.is_empty() {
                error!("An unknown error occurred");
            } else {
                error!("{}", message);
            }
            error!("{}", context);
        }
        other => {
            error!("Request to {} could not be sent", url);
            error!("{}", other);
            error!("{}", context);
        }
    }

    true
}
