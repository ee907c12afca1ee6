//! Compression routes
//!
//! Endpoints:
//! - POST /compress-pdf - compressed PDF, or a JSON warning when it did not shrink
//! - POST /compress-pdf/download - compressed PDF, or the original when it did not shrink

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Serialize;

use super::respond::attachment;
use crate::convert::SizeReport;
use crate::error::Result;
use crate::pipeline::{self, Delivery, Operation};
use crate::state::AppState;
use crate::upload::PDF_ONLY;

const COMPRESS_PDF: Operation = Operation {
    name: "compress-pdf",
    allow: PDF_ONLY,
};

/// Returned instead of a file when compression did not help
#[derive(Debug, Serialize)]
pub struct CompressionWarning {
    pub warning: String,
    #[serde(flatten)]
    pub sizes: SizeReport,
}

/// Create the compression router
pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/compress-pdf", post(compress_pdf))
        .route("/compress-pdf/download", post(compress_pdf_download))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

async fn compress(state: &AppState, multipart: &mut Multipart) -> Result<Delivery> {
    let converter = state.backends().compress.clone();
    pipeline::run(state.store(), &COMPRESS_PDF, converter.as_ref(), multipart).await
}

/// POST /compress-pdf
async fn compress_pdf(State(state): State<AppState>, mut multipart: Multipart) -> Result<Response> {
    let delivery = compress(&state, &mut multipart).await?;

    match delivery.size_report {
        Some(report) => Ok(Json(CompressionWarning {
            warning: "The file could not be compressed further. The original was kept.".to_string(),
            sizes: report,
        })
        .into_response()),
        None => attachment(delivery),
    }
}

/// POST /compress-pdf/download
async fn compress_pdf_download(State(state): State<AppState>, mut multipart: Multipart) -> Result<Response> {
    let delivery = compress(&state, &mut multipart).await?;
    if let Some(report) = &delivery.size_report {
        tracing::info!(
            original_size = report.original_size,
            rejected_size = report.rejected_size,
            "Returning original instead of larger compressed file"
        );
    }
    attachment(delivery)
}
