//! Conversion routes
//!
//! Endpoints:
//! - POST /pdf-to-word - PDF to DOCX through ConvertAPI
//! - POST /pdf-to-word/export - PDF to DOCX through a PDF Services export job
//! - POST /jpeg-to-pdf - JPEG/PNG to a single-page PDF, locally

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    response::Response,
    routing::post,
    Router,
};

use super::respond::attachment;
use crate::error::Result;
use crate::pipeline::{self, Operation};
use crate::state::AppState;
use crate::upload::{PDF_ONLY, RASTER_IMAGES};

const PDF_TO_WORD: Operation = Operation {
    name: "pdf-to-word",
    allow: PDF_ONLY,
};

const PDF_EXPORT: Operation = Operation {
    name: "pdf-to-word/export",
    allow: PDF_ONLY,
};

const IMAGE_TO_PDF: Operation = Operation {
    name: "jpeg-to-pdf",
    allow: RASTER_IMAGES,
};

/// Create the conversion router
pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/pdf-to-word", post(pdf_to_word))
        .route("/pdf-to-word/export", post(pdf_export))
        .route("/jpeg-to-pdf", post(jpeg_to_pdf))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

/// POST /pdf-to-word
async fn pdf_to_word(State(state): State<AppState>, mut multipart: Multipart) -> Result<Response> {
    let converter = state.backends().pdf_to_word.clone();
    let delivery = pipeline::run(state.store(), &PDF_TO_WORD, converter.as_ref(), &mut multipart).await?;
    attachment(delivery)
}

/// POST /pdf-to-word/export
async fn pdf_export(State(state): State<AppState>, mut multipart: Multipart) -> Result<Response> {
    let converter = state.backends().pdf_export.clone();
    let delivery = pipeline::run(state.store(), &PDF_EXPORT, converter.as_ref(), &mut multipart).await?;
    attachment(delivery)
}

/// POST /jpeg-to-pdf
async fn jpeg_to_pdf(State(state): State<AppState>, mut multipart: Multipart) -> Result<Response> {
    let converter = state.backends().image_to_pdf.clone();
    let delivery = pipeline::run(state.store(), &IMAGE_TO_PDF, converter.as_ref(), &mut multipart).await?;
    attachment(delivery)
}
