pub mod config;
pub mod error;
pub mod services;
pub mod utils;

pub use crate::error::UserFriendlyError;
pub use crate::services::staging::{Stager, StagingResult, cleanup_staging};
pub use crate::services::transfer::{
    ProgressInfo, TransferClient, TransferError, UploadRequest, classify_and_log_error,
};
