//! Response builders for finished conversions

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::Response,
};

use crate::error::{AppError, Result};
use crate::pipeline::Delivery;

/// Binary download with attachment disposition
pub fn attachment(delivery: Delivery) -> Result<Response> {
    let content_type = mime_guess::from_path(&delivery.download_name).first_or_octet_stream();

    // Download names are sanitized to [A-Za-z0-9_.-], so no quoting issues
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type.as_ref())
        .header(header::CONTENT_LENGTH, delivery.data.len())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", delivery.download_name),
        )
        .body(Body::from(delivery.data))
        .map_err(|e| AppError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_headers() {
        let response = attachment(Delivery {
            data: b"%PDF-1.4".to_vec(),
            download_name: "scan.pdf".to_string(),
            size_report: None,
        })
        .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "8");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"scan.pdf\""
        );
    }

    #[test]
    fn test_docx_content_type() {
        let response = attachment(Delivery {
            data: vec![1, 2, 3],
            download_name: "report.docx".to_string(),
            size_report: None,
        })
        .unwrap();

        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        );
    }
}
