//! Upload Validation
//!
//! Extracts the single `file` part from a multipart request and validates it
//! against a route's allow-list:
//!
//! 1. a `file` part carrying a filename is present
//! 2. the filename is non-empty
//! 3. the lowercased extension of the *original* filename is allowed
//!
//! The extension is checked before sanitization because sanitizing can alter
//! or drop it. The validated extension is then re-appended to the sanitized
//! stem.

pub mod sanitize;
pub mod types;

use axum::extract::Multipart;

pub use sanitize::{original_extension, sanitize_stem, secure_filename, split_extension};
pub use types::*;

/// Multipart field name carrying the upload
pub const FILE_FIELD: &str = "file";

/// Read the `file` part out of a multipart body.
///
/// Parts without a `filename` parameter are not file uploads and are skipped,
/// as are parts with any other name.
pub async fn read_file_field(multipart: &mut Multipart) -> Result<UploadedFile, UploadError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let Some(file_name) = field.file_name().map(|s| s.to_string()) else {
            continue;
        };
        let content_type = field.content_type().map(|s| s.to_string());

        let data = field.bytes().await?;

        tracing::debug!(
            file_name = %file_name,
            content_type = ?content_type,
            size = data.len(),
            "Received file part"
        );

        return Ok(UploadedFile {
            file_name,
            content_type,
            data,
        });
    }

    Err(UploadError::NoFile)
}

/// Validate an upload's name against `allow` and derive its safe name
pub fn validate(upload: &UploadedFile, allow: &AllowList) -> Result<SanitizedName, UploadError> {
    if upload.file_name.is_empty() {
        return Err(UploadError::EmptyFilename);
    }

    let extension = original_extension(&upload.file_name);
    if !allow.contains(&extension) {
        return Err(UploadError::UnsupportedExtension {
            extension,
            expected: allow.label(),
        });
    }

    let (base, _) = split_extension(&upload.file_name);
    Ok(SanitizedName::new(sanitize_stem(base), extension))
}
