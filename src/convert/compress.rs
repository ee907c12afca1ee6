//! Ghostscript compression backend
//!
//! Rewrites a PDF through `gs -sDEVICE=pdfwrite` with image downsampling. The
//! result is only used when it is strictly smaller than the input; otherwise
//! it is discarded and the original is handed back with a [`SizeReport`].

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;

use super::types::{ConversionJob, ConversionOutput, ConvertError, SizeReport};
use super::Converter;
use crate::config::GhostscriptConfig;
use crate::transient::StoreError;
use crate::upload::SanitizedName;

/// Appended to the stem of compressed outputs
pub const COMPRESSED_SUFFIX: &str = "_compressed";

/// PDF optimizer invoked as a subprocess
pub struct GhostscriptCompressor {
    binary: PathBuf,
    pdf_settings: String,
    compatibility_level: String,
    color_image_resolution: u32,
}

impl GhostscriptCompressor {
    pub fn new(config: &GhostscriptConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            pdf_settings: config.pdf_settings.clone(),
            compatibility_level: config.compatibility_level.clone(),
            color_image_resolution: config.color_image_resolution,
        }
    }

    /// Fixed argument template; the input path always comes last
    fn arguments(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let mut out_arg = OsString::from("-sOutputFile=");
        out_arg.push(output);

        vec![
            "-sDEVICE=pdfwrite".into(),
            format!("-dCompatibilityLevel={}", self.compatibility_level).into(),
            format!("-dPDFSETTINGS={}", self.pdf_settings).into(),
            "-dNOPAUSE".into(),
            "-dBATCH".into(),
            "-dQUIET".into(),
            "-dDownsampleColorImages=true".into(),
            format!("-dColorImageResolution={}", self.color_image_resolution).into(),
            "-dRemoveUnusedObjects=true".into(),
            out_arg,
            input.as_os_str().to_owned(),
        ]
    }

    async fn run(&self, input: &Path, output: &Path) -> Result<(), ConvertError> {
        let program = self.binary.display().to_string();

        tracing::info!(program = %program, input = %input.display(), "Running PDF optimizer");

        let result = Command::new(&self.binary)
            .args(self.arguments(input, output))
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ConvertError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
            return Err(ConvertError::ProcessFailed {
                program,
                status: result
                    .status
                    .code()
                    .map_or_else(|| "signal".to_string(), |c| format!("exit code {}", c)),
                stderr,
            });
        }

        Ok(())
    }
}

#[async_trait]
impl Converter for GhostscriptCompressor {
    fn name(&self) -> &'static str {
        "ghostscript"
    }

    fn output_name(&self, name: &SanitizedName) -> String {
        name.derived(COMPRESSED_SUFFIX, ".pdf")
    }

    async fn convert(&self, job: &ConversionJob<'_>) -> Result<ConversionOutput, ConvertError> {
        self.run(job.input, job.output).await?;

        let store = job.artifacts.store();
        let original_size = store.size_of(job.input).await?;
        let compressed_size = match store.size_of(job.output).await {
            Ok(size) => size,
            Err(StoreError::MissingFile(path)) => return Err(ConvertError::MissingOutput(path)),
            Err(e) => return Err(e.into()),
        };

        tracing::info!(original_size, compressed_size, "PDF optimizer finished");

        if compressed_size >= original_size {
            tracing::info!("Compression did not reduce size, keeping original");
            store.remove_all(&[job.output]).await;

            return Ok(ConversionOutput {
                path: job.input.to_path_buf(),
                download_name: job.name.file_name(),
                size_report: Some(SizeReport {
                    original_size,
                    compressed_size: original_size,
                    rejected_size: compressed_size,
                }),
            });
        }

        Ok(ConversionOutput::converted(job.output, self.output_name(job.name)))
    }
}
