//! Pre-flight checks on a selected file.

use crate::error::ValidationError;
use crate::model::{RawFileDescriptor, SelectedFile};

/// Largest accepted upload (16 MiB, inclusive).
pub const MAX_UPLOAD_BYTES: u64 = 16 * 1024 * 1024;

pub const ALLOWED_MIME_TYPES: [&str; 4] = ["image/png", "image/jpeg", "image/jpg", "image/webp"];

/// Check a candidate against the type and size policy.
///
/// Only the declared MIME type is inspected; content is never sniffed. Empty files
/// pass, since only the upper size bound is enforced.
pub fn validate(candidate: RawFileDescriptor) -> Result<SelectedFile, ValidationError> {
    let mime_type = candidate.mime_type.trim().to_ascii_lowercase();
    if !ALLOWED_MIME_TYPES.contains(&mime_type.as_str()) {
        return Err(ValidationError::UnsupportedType {
            mime_type: candidate.mime_type,
        });
    }

    if candidate.size_bytes > MAX_UPLOAD_BYTES {
        return Err(ValidationError::TooLarge {
            size_bytes: candidate.size_bytes,
        });
    }

    Ok(SelectedFile {
        name: candidate.name,
        mime_type,
        size_bytes: candidate.size_bytes,
        payload: candidate.payload,
    })
}
