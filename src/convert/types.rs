//! Conversion types

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::transient::{StoreError, TempArtifacts};
use crate::upload::SanitizedName;

// ============================================================================
// Job / Output
// ============================================================================

/// One conversion request handed to a backend
pub struct ConversionJob<'a> {
    /// Persisted, verified upload
    pub input: &'a Path,

    /// Reserved (and already tracked) output location
    pub output: &'a Path,

    /// Sanitized name of the upload
    pub name: &'a SanitizedName,

    /// Cleanup guard for any extra files the backend creates
    pub artifacts: &'a TempArtifacts,
}

/// What a backend produced
#[derive(Debug, Clone)]
pub struct ConversionOutput {
    /// File to send back
    pub path: PathBuf,

    /// Suggested download filename
    pub download_name: String,

    /// Set when compression did not help and the original was kept
    pub size_report: Option<SizeReport>,
}

impl ConversionOutput {
    pub fn converted(path: &Path, download_name: impl Into<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            download_name: download_name.into(),
            size_report: None,
        }
    }
}

/// Sizes reported when the compressed file was discarded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SizeReport {
    pub original_size: u64,
    /// Size of the file actually returned, i.e. the original
    pub compressed_size: u64,
    /// What the optimizer produced before it was discarded
    #[serde(skip)]
    pub rejected_size: u64,
}

// ============================================================================
// Errors
// ============================================================================

/// Broad failure class, used for status codes and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The external service or executable failed
    Upstream,
    /// Something on our side failed
    Internal,
}

/// Conversion errors
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("{service} request failed: {message}")]
    Api {
        service: &'static str,
        message: String,
    },

    #[error("{service} usage limit reached: {message}")]
    Usage {
        service: &'static str,
        message: String,
    },

    #[error("{service} client error: {message}")]
    Sdk {
        service: &'static str,
        message: String,
    },

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    ProcessFailed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("Failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    #[error("Failed to build PDF: {0}")]
    PdfBuild(String),

    #[error("Conversion produced no output at {0}")]
    MissingOutput(PathBuf),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Conversion task failed: {0}")]
    Task(String),
}

impl ConvertError {
    pub fn class(&self) -> FailureClass {
        match self {
            Self::NotConfigured(_)
            | Self::Api { .. }
            | Self::Usage { .. }
            | Self::Sdk { .. }
            | Self::Spawn { .. }
            | Self::ProcessFailed { .. } => FailureClass::Upstream,
            Self::ImageDecode(_)
            | Self::PdfBuild(_)
            | Self::MissingOutput(_)
            | Self::Store(_)
            | Self::Task(_) => FailureClass::Internal,
        }
    }

    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotConfigured(_) => "SERVICE_NOT_CONFIGURED",
            Self::Api { .. } => "UPSTREAM_API_ERROR",
            Self::Usage { .. } => "UPSTREAM_USAGE_ERROR",
            Self::Sdk { .. } => "UPSTREAM_SDK_ERROR",
            Self::Spawn { .. } | Self::ProcessFailed { .. } => "OPTIMIZER_FAILED",
            Self::ImageDecode(_) => "IMAGE_DECODE_ERROR",
            Self::PdfBuild(_) | Self::MissingOutput(_) | Self::Store(_) | Self::Task(_) => {
                "INTERNAL_ERROR"
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sdk_failures_share_class_but_not_code() {
        let api = ConvertError::Api { service: "PDF Services", message: "bad asset".into() };
        let usage = ConvertError::Usage { service: "PDF Services", message: "quota".into() };
        let sdk = ConvertError::Sdk { service: "PDF Services", message: "timeout".into() };

        for err in [&api, &usage, &sdk] {
            assert_eq!(err.class(), FailureClass::Upstream);
        }
        assert_ne!(api.code(), usage.code());
        assert_ne!(usage.code(), sdk.code());
    }

    #[test]
    fn test_local_failures_are_internal() {
        let err = ConvertError::MissingOutput(PathBuf::from("/tmp/x.docx"));
        assert_eq!(err.class(), FailureClass::Internal);
        assert_eq!(err.code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_size_report_serializes_public_fields() {
        let report = SizeReport { original_size: 10, compressed_size: 10, rejected_size: 12 };
        let json = serde_json::to_value(report).unwrap();
        assert_eq!(json, serde_json::json!({ "original_size": 10, "compressed_size": 10 }));
    }
}
