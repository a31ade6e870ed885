//! Intake validation: decide whether a selected file may be uploaded.
//!
//! Runs before any network call and has no side effects. A zero-byte image
//! passes here; whether the service accepts it is its own business.

use crate::config::RemovalConfig;
use crate::error::Rejection;
use crate::media::ImageFile;
use tracing::debug;

/// Check the declared MIME type, then the size.
pub fn validate(file: &ImageFile, config: &RemovalConfig) -> Result<(), Rejection> {
    let mime = file.mime_type();
    if !mime.starts_with(&config.accepted_mime_prefix) {
        debug!("Rejected '{}': MIME type {}", file.name, mime);
        return Err(Rejection::InvalidType {
            mime: mime.to_string(),
        });
    }

    let size = file.size();
    if size > config.max_upload_bytes {
        debug!(
            "Rejected '{}': {} bytes > {} max",
            file.name, size, config.max_upload_bytes
        );
        return Err(Rejection::TooLarge {
            size,
            max: config.max_upload_bytes,
        });
    }

    Ok(())
}
