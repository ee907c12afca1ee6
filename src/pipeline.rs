//! Upload-Convert-Respond Pipeline
//!
//! The sequence every conversion route runs:
//!
//! validate -> save -> convert -> read result -> clean up
//!
//! Validation happens before anything touches the scratch directory. From the
//! moment the first file is written, a [`TempArtifacts`] guard owns every path
//! so that all exits, `?` included, delete what was created.

use axum::extract::Multipart;

use crate::convert::{ConversionJob, Converter, SizeReport};
use crate::error::Result;
use crate::transient::{TempArtifacts, TransientStore};
use crate::upload::{self, AllowList, SanitizedName, UploadedFile};

/// Route-level parameters
#[derive(Debug, Clone, Copy)]
pub struct Operation {
    /// Route name for logs
    pub name: &'static str,
    /// Extensions accepted for this route
    pub allow: AllowList,
}

/// Finished result, already read out of the scratch directory
#[derive(Debug)]
pub struct Delivery {
    pub data: Vec<u8>,
    pub download_name: String,
    /// Set when compression fell back to the original
    pub size_report: Option<SizeReport>,
}

/// Read and validate the upload for `op`
pub async fn accept(multipart: &mut Multipart, op: &Operation) -> Result<(UploadedFile, SanitizedName)> {
    let upload = upload::read_file_field(multipart).await?;

    tracing::info!(
        route = op.name,
        file_name = %upload.file_name,
        content_type = ?upload.content_type,
        size = upload.size(),
        "Upload received"
    );

    let name = upload::validate(&upload, &op.allow)?;
    tracing::debug!(route = op.name, safe_name = %name.file_name(), "Upload validated");

    Ok((upload, name))
}

/// Persist, convert and collect the result, cleaning up on every path
pub async fn execute(
    store: &TransientStore,
    op: &Operation,
    converter: &dyn Converter,
    upload: &UploadedFile,
    name: &SanitizedName,
) -> Result<Delivery> {
    let artifacts = TempArtifacts::new(store.clone());

    let input = artifacts.reserve(&name.file_name());
    store.persist(&input, &upload.data).await?;
    let size = store.verify(&input).await?;

    let output = artifacts.reserve(&converter.output_name(name));

    tracing::info!(
        route = op.name,
        backend = converter.name(),
        input = %input.display(),
        output = %output.display(),
        size,
        "Starting conversion"
    );

    let job = ConversionJob {
        input: &input,
        output: &output,
        name,
        artifacts: &artifacts,
    };
    let result = converter.convert(&job).await?;

    let data = store.read(&result.path).await?;

    tracing::info!(
        route = op.name,
        download_name = %result.download_name,
        size = data.len(),
        "Conversion complete"
    );

    artifacts.release().await;

    Ok(Delivery {
        data,
        download_name: result.download_name,
        size_report: result.size_report,
    })
}

/// [`accept`] then [`execute`]
pub async fn run(
    store: &TransientStore,
    op: &Operation,
    converter: &dyn Converter,
    multipart: &mut Multipart,
) -> Result<Delivery> {
    let (upload, name) = accept(multipart, op).await?;
    execute(store, op, converter, &upload, &name).await
}
