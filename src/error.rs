use std::io;
use std::path::Path;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error carrying a message meant to be shown to the user as-is.
///
/// The wrapped cause is kept for diagnostics (`{:?}` / `source()`), but the
/// message never depends on it.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct UserFriendlyError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl UserFriendlyError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(source: impl Into<BoxError>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Translate an OS-level error into a user-facing one.
    ///
    /// `messages` maps error kinds to the message used at this call site.
    /// Kinds missing from the table fall back to a generic message naming `path`.
    pub fn from_io(err: io::Error, path: &Path, messages: &[(io::ErrorKind, String)]) -> Self {
        let message = messages
            .iter()
            .find(|(kind, _)| *kind == err.kind())
            .map(|(_, message)| message.clone())
            .unwrap_or_else(|| {
                format!(
                    "Unexpected error while accessing {}: {}",
                    path.display(),
                    err
                )
            });
        Self::with_source(err, message)
    }
}
