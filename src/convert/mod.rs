//! Conversion Backends
//!
//! Every route hands its validated upload to exactly one backend:
//!
//! - ConvertAPI (hosted conversion, PDF to DOCX)
//! - Adobe PDF Services (asset upload + export job, PDF to DOCX)
//! - Ghostscript (local executable, PDF compression)
//! - Image to PDF (in-process, no external service)
//!
//! Backends are picked statically when the router is built.

mod compress;
mod convert_api;
mod image_pdf;
mod pdf_services;
mod types;

use async_trait::async_trait;

use crate::upload::SanitizedName;

pub use compress::GhostscriptCompressor;
pub use convert_api::ConvertApiConverter;
pub use image_pdf::{ImageToPdf, PDF_RESOLUTION_DPI};
pub use pdf_services::PdfServicesConverter;
pub use types::{ConversionJob, ConversionOutput, ConvertError, FailureClass, SizeReport};

/// Conversion backend trait
#[async_trait]
pub trait Converter: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Output file name for an upload, e.g. `report.docx`
    fn output_name(&self, name: &SanitizedName) -> String;

    /// Convert `job.input` into `job.output`
    async fn convert(&self, job: &ConversionJob<'_>) -> Result<ConversionOutput, ConvertError>;
}

/// Converter that writes a fixed payload, for route tests
#[cfg(test)]
pub struct StaticConverter {
    pub payload: Vec<u8>,
    pub extension: &'static str,
}

#[cfg(test)]
#[async_trait]
impl Converter for StaticConverter {
    fn name(&self) -> &'static str {
        "static"
    }

    fn output_name(&self, name: &SanitizedName) -> String {
        name.derived("", self.extension)
    }

    async fn convert(&self, job: &ConversionJob<'_>) -> Result<ConversionOutput, ConvertError> {
        job.artifacts.store().persist(job.output, &self.payload).await?;
        Ok(ConversionOutput::converted(job.output, self.output_name(job.name)))
    }
}
