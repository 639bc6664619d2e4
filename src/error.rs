//! Typed failures of the upload lifecycle.
//!
//! Everything here is recoverable: the controller turns each error into a single
//! dismissible notice and the user may retry or reset.

use thiserror::Error;

/// Fallback shown when the service reports a failure without a message.
pub const GENERIC_SERVICE_ERROR: &str = "An error occurred while processing your image.";

/// Pre-flight rejection of a selected file. Never reaches the network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please select a valid image file (PNG, JPG, JPEG, or WebP).")]
    UnsupportedType { mime_type: String },

    #[error("File size must be less than 16MB.")]
    TooLarge { size_bytes: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadErrorKind {
    /// Network unreachable, timeout, or an unparseable body.
    Transport,
    /// The service answered but declared failure or broke the response contract.
    Service,
    /// The selected file could not be read back from disk.
    Local,
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("network error")]
    Transport(#[from] reqwest::Error),

    #[error("network error")]
    InvalidBody(#[from] serde_json::Error),

    #[error("{message}")]
    Rejected { message: String },

    #[error("Malformed response from server: missing or invalid `{field}`")]
    MalformedResponse { field: &'static str },

    #[error("Could not read {name}: {source}")]
    Payload {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// The file on disk outgrew the limit between selection and upload.
    #[error("{name} changed on disk. File size must be less than 16MB.")]
    GrewTooLarge { name: String },
}

impl UploadError {
    pub fn kind(&self) -> UploadErrorKind {
        match self {
            UploadError::Transport(_) | UploadError::InvalidBody(_) => UploadErrorKind::Transport,
            UploadError::Rejected { .. } | UploadError::MalformedResponse { .. } => {
                UploadErrorKind::Service
            }
            UploadError::Payload { .. } | UploadError::GrewTooLarge { .. } => {
                UploadErrorKind::Local
            }
        }
    }
}
