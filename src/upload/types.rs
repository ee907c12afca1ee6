//! Upload types

use axum::body::Bytes;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;

// ============================================================================
// Uploaded File
// ============================================================================

/// A single file part as received from the client
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Filename declared by the client, untrusted
    pub file_name: String,

    /// Declared MIME type, if any
    pub content_type: Option<String>,

    /// Raw file contents
    pub data: Bytes,
}

impl UploadedFile {
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

// ============================================================================
// Sanitized Name
// ============================================================================

/// Flat, safe file name derived from an upload.
///
/// The stem never contains path separators and the extension is the validated
/// lowercase extension of the original name (dot included).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedName {
    stem: String,
    extension: String,
}

impl SanitizedName {
    pub(crate) fn new(stem: String, extension: String) -> Self {
        Self { stem, extension }
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// `<stem><extension>`
    pub fn file_name(&self) -> String {
        format!("{}{}", self.stem, self.extension)
    }

    /// `<stem><suffix><extension>`, e.g. `report_compressed.pdf`
    pub fn derived(&self, suffix: &str, extension: &str) -> String {
        format!("{}{}{}", self.stem, suffix, extension)
    }
}

// ============================================================================
// Allow Lists
// ============================================================================

/// Extensions a route accepts, checked against the original filename
#[derive(Debug, Clone, Copy)]
pub struct AllowList {
    extensions: &'static [&'static str],
    label: &'static str,
}

impl AllowList {
    pub const fn new(extensions: &'static [&'static str], label: &'static str) -> Self {
        Self { extensions, label }
    }

    pub fn contains(&self, extension: &str) -> bool {
        self.extensions.contains(&extension)
    }

    /// Human-readable format name used in rejection messages
    pub fn label(&self) -> &'static str {
        self.label
    }
}

/// PDF documents only
pub const PDF_ONLY: AllowList = AllowList::new(&[".pdf"], "PDF");

/// Raster images accepted by image-to-pdf
pub const RASTER_IMAGES: AllowList = AllowList::new(&[".jpg", ".jpeg", ".png"], "JPEG/PNG");

// ============================================================================
// Errors
// ============================================================================

/// Client input errors raised before any conversion work
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("No file uploaded")]
    NoFile,

    #[error("No file selected")]
    EmptyFilename,

    #[error("File must be in {expected} format (got {extension:?})")]
    UnsupportedExtension {
        extension: String,
        expected: &'static str,
    },

    #[error("Uploaded file is empty")]
    EmptyUpload,

    #[error("Failed to read upload: {0}")]
    Multipart(#[from] MultipartError),
}

impl UploadError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // Body-limit rejections surface here as 413
            Self::Multipart(e) => e.status(),
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoFile => "NO_FILE",
            Self::EmptyFilename => "EMPTY_FILENAME",
            Self::UnsupportedExtension { .. } => "UNSUPPORTED_EXTENSION",
            Self::EmptyUpload => "EMPTY_UPLOAD",
            Self::Multipart(_) => "INVALID_MULTIPART",
        }
    }
}
