//! ConvertAPI backend
//!
//! Posts the upload to `{base}/convert/{from}/to/{to}` and saves every file
//! the service returns into the scratch directory. The service picks its own
//! result file names, so when nothing landed at the expected output path the
//! first result is downloaded there from its `Url`.

use std::path::Path;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use super::types::{ConversionJob, ConversionOutput, ConvertError};
use super::Converter;
use crate::config::ConvertApiConfig;
use crate::transient::StoreError;
use crate::upload::{sanitize_stem, split_extension, SanitizedName};

const SERVICE: &str = "ConvertAPI";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ConvertResponse {
    #[serde(default)]
    files: Vec<ResultFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ResultFile {
    file_name: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    file_data: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorBody {
    message: Option<String>,
}

/// Hosted conversion through ConvertAPI
pub struct ConvertApiConverter {
    client: reqwest::Client,
    base_url: String,
    secret: Option<String>,
    from_format: &'static str,
    to_format: &'static str,
}

impl ConvertApiConverter {
    pub fn new(config: &ConvertApiConfig, from_format: &'static str, to_format: &'static str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            secret: config.secret.clone(),
            from_format,
            to_format,
        }
    }

    /// PDF to Word
    pub fn pdf_to_docx(config: &ConvertApiConfig) -> Self {
        Self::new(config, "pdf", "docx")
    }

    async fn request_conversion(&self, secret: &str, job: &ConversionJob<'_>) -> Result<ConvertResponse, ConvertError> {
        let data = tokio::fs::read(job.input)
            .await
            .map_err(|e| StoreError::io(job.input, e))?;

        let mime = mime_guess::from_path(job.input).first_or_octet_stream();
        let part = Part::bytes(data)
            .file_name(job.name.file_name())
            .mime_str(mime.as_ref())
            .map_err(|e| api_error(format!("invalid content type: {}", e)))?;
        let form = Form::new().part("File", part).text("StoreFile", "true");

        let url = format!(
            "{}/convert/{}/to/{}",
            self.base_url, self.from_format, self.to_format
        );

        tracing::info!(url = %url, input = %job.input.display(), "Submitting conversion");

        let response = self
            .client
            .post(&url)
            .bearer_auth(secret)
            .multipart(form)
            .send()
            .await
            .map_err(|e| api_error(format!("failed to call service: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or(body);
            return Err(api_error(format!("service returned {}: {}", status, message)));
        }

        let parsed: ConvertResponse = response
            .json()
            .await
            .map_err(|e| api_error(format!("failed to parse response: {}", e)))?;

        tracing::debug!(files = parsed.files.len(), "Conversion response received");
        Ok(parsed)
    }

    /// Save each result file under its sanitized service-provided name
    async fn save_files(&self, files: &[ResultFile], job: &ConversionJob<'_>) -> Result<(), ConvertError> {
        for file in files {
            let (base, extension) = split_extension(&file.file_name);
            let name = format!("{}{}", sanitize_stem(base), extension.to_ascii_lowercase());
            let path = job.artifacts.reserve(&name);

            match (&file.file_data, &file.url) {
                (Some(encoded), _) => {
                    let data = BASE64
                        .decode(encoded)
                        .map_err(|e| api_error(format!("invalid FileData for {}: {}", file.file_name, e)))?;
                    job.artifacts.store().persist(&path, &data).await?;
                }
                (None, Some(url)) => self.download(url, &path).await?,
                (None, None) => {
                    tracing::warn!(file_name = %file.file_name, "Result file has neither data nor URL");
                }
            }
        }
        Ok(())
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<(), ConvertError> {
        tracing::debug!(url = %url, dest = %dest.display(), "Downloading result file");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| api_error(format!("failed to download result: {}", e)))?;

        let data = response
            .bytes()
            .await
            .map_err(|e| api_error(format!("failed to read result: {}", e)))?;

        tokio::fs::write(dest, &data)
            .await
            .map_err(|e| StoreError::io(dest, e))?;
        Ok(())
    }
}

#[async_trait]
impl Converter for ConvertApiConverter {
    fn name(&self) -> &'static str {
        "convertapi"
    }

    fn output_name(&self, name: &SanitizedName) -> String {
        name.derived("", &format!(".{}", self.to_format))
    }

    async fn convert(&self, job: &ConversionJob<'_>) -> Result<ConversionOutput, ConvertError> {
        let secret = self
            .secret
            .as_deref()
            .ok_or(ConvertError::NotConfigured(SERVICE))?;

        let response = self.request_conversion(secret, job).await?;
        let Some(first) = response.files.first() else {
            return Err(api_error("response contained no files".to_string()));
        };

        self.save_files(&response.files, job).await?;

        let materialized = tokio::fs::try_exists(job.output)
            .await
            .map_err(|e| StoreError::io(job.output, e))?;
        if !materialized {
            tracing::warn!(
                expected = %job.output.display(),
                returned = %first.file_name,
                "Result not at expected path, downloading from URL"
            );
            let url = first
                .url
                .as_deref()
                .ok_or_else(|| api_error("response file has no URL".to_string()))?;
            self.download(url, job.output).await?;
        }

        Ok(ConversionOutput::converted(job.output, self.output_name(job.name)))
    }
}

fn api_error(message: String) -> ConvertError {
    ConvertError::Api {
        service: SERVICE,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transient::{TempArtifacts, TransientStore};
    use crate::upload::{validate, UploadedFile, PDF_ONLY};
    use axum::body::Bytes;
    use axum::extract::{Multipart, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use tempfile::TempDir;

    const DOCX: &[u8] = b"PK\x03\x04 fake docx";

    async fn spawn_stub(build: impl FnOnce(String) -> Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let router = build(base.clone());
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        base
    }

    async fn convert_handler(
        State(base): State<String>,
        headers: HeaderMap,
        mut multipart: Multipart,
    ) -> Result<Json<serde_json::Value>, StatusCode> {
        if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bearer test-secret") {
            return Err(StatusCode::UNAUTHORIZED);
        }
        let mut saw_file = false;
        while let Some(field) = multipart.next_field().await.unwrap() {
            if field.name() == Some("File") {
                saw_file = !field.bytes().await.unwrap().is_empty();
            }
        }
        if !saw_file {
            return Err(StatusCode::BAD_REQUEST);
        }
        Ok(Json(serde_json::json!({
            "ConversionCost": 1,
            "Files": [{
                "FileName": "service chose this.docx",
                "FileExt": "docx",
                "FileSize": DOCX.len(),
                "Url": format!("{}/d/result", base),
            }]
        })))
    }

    fn setup(temp_dir: &TempDir) -> (TransientStore, SanitizedName) {
        let store = TransientStore::at(temp_dir.path()).unwrap();
        let upload = UploadedFile {
            file_name: "report.pdf".to_string(),
            content_type: Some("application/pdf".to_string()),
            data: Bytes::from_static(b"%PDF-1.4"),
        };
        let name = validate(&upload, &PDF_ONLY).unwrap();
        (store, name)
    }

    #[tokio::test]
    async fn test_falls_back_to_url_download() {
        let base = spawn_stub(|base| {
            Router::new()
                .route("/convert/pdf/to/docx", post(convert_handler))
                .route("/d/result", get(|| async { DOCX }))
                .with_state(base)
        })
        .await;

        let temp_dir = TempDir::new().unwrap();
        let (store, name) = setup(&temp_dir);
        let artifacts = TempArtifacts::new(store.clone());
        let input = artifacts.reserve(&name.file_name());
        store.persist(&input, b"%PDF-1.4 test").await.unwrap();

        let converter = ConvertApiConverter::pdf_to_docx(&ConvertApiConfig {
            base_url: base,
            secret: Some("test-secret".to_string()),
        });
        let output = artifacts.reserve(&converter.output_name(&name));

        let job = ConversionJob { input: &input, output: &output, name: &name, artifacts: &artifacts };
        let result = converter.convert(&job).await.unwrap();

        assert_eq!(result.download_name, "report.docx");
        assert_eq!(std::fs::read(&result.path).unwrap(), DOCX);

        // The service-named copy is tracked too
        let extra = temp_dir.path().join("service_chose_this.docx");
        assert!(extra.exists());
        assert!(artifacts.is_tracked(&extra));

        artifacts.release().await;
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_inline_file_data_at_expected_name() {
        let base = spawn_stub(|_| {
            Router::new().route(
                "/convert/pdf/to/docx",
                post(|| async {
                    Json(serde_json::json!({
                        "Files": [{ "FileName": "report.docx", "FileData": BASE64.encode(DOCX) }]
                    }))
                }),
            )
        })
        .await;

        let temp_dir = TempDir::new().unwrap();
        let (store, name) = setup(&temp_dir);
        let artifacts = TempArtifacts::new(store.clone());
        let input = artifacts.reserve(&name.file_name());
        store.persist(&input, b"%PDF-1.4 test").await.unwrap();

        let converter = ConvertApiConverter::pdf_to_docx(&ConvertApiConfig {
            base_url: base,
            secret: Some("test-secret".to_string()),
        });
        let output = artifacts.reserve("report.docx");

        let job = ConversionJob { input: &input, output: &output, name: &name, artifacts: &artifacts };
        converter.convert(&job).await.unwrap();

        assert_eq!(std::fs::read(&output).unwrap(), DOCX);
        assert_eq!(artifacts.len(), 2);
    }

    #[tokio::test]
    async fn test_service_error_message_is_surfaced() {
        let base = spawn_stub(|_| {
            Router::new().route(
                "/convert/pdf/to/docx",
                post(|| async {
                    (
                        StatusCode::UNAUTHORIZED,
                        Json(serde_json::json!({ "Code": 4013, "Message": "Secret is invalid" })),
                    )
                }),
            )
        })
        .await;

        let temp_dir = TempDir::new().unwrap();
        let (store, name) = setup(&temp_dir);
        let artifacts = TempArtifacts::new(store.clone());
        let input = artifacts.reserve(&name.file_name());
        store.persist(&input, b"%PDF-1.4 test").await.unwrap();
        let output = artifacts.reserve("report.docx");

        let converter = ConvertApiConverter::pdf_to_docx(&ConvertApiConfig {
            base_url: base,
            secret: Some("wrong".to_string()),
        });
        let job = ConversionJob { input: &input, output: &output, name: &name, artifacts: &artifacts };
        let err = converter.convert(&job).await.unwrap_err();

        assert!(matches!(err, ConvertError::Api { .. }));
        assert!(err.to_string().contains("Secret is invalid"));
    }

    /// Run a conversion against a stub that always answers with `reply`
    async fn convert_against(reply: serde_json::Value, temp_dir: &TempDir) -> Result<ConversionOutput, ConvertError> {
        let base = spawn_stub(move |_| {
            Router::new().route("/convert/pdf/to/docx", post(move || async move { Json(reply) }))
        })
        .await;

        let (store, name) = setup(temp_dir);
        let artifacts = TempArtifacts::new(store.clone());
        let input = artifacts.reserve(&name.file_name());
        store.persist(&input, b"%PDF-1.4 test").await.unwrap();
        let output = artifacts.reserve("report.docx");

        let converter = ConvertApiConverter::pdf_to_docx(&ConvertApiConfig {
            base_url: base,
            secret: Some("test-secret".to_string()),
        });
        let job = ConversionJob { input: &input, output: &output, name: &name, artifacts: &artifacts };
        converter.convert(&job).await
    }

    #[tokio::test]
    async fn test_empty_file_list_is_api_error() {
        let temp_dir = TempDir::new().unwrap();

        let err = convert_against(serde_json::json!({ "ConversionCost": 1, "Files": [] }), &temp_dir)
            .await
            .unwrap_err();

        assert!(matches!(err, ConvertError::Api { .. }));
        assert!(err.to_string().contains("no files"));
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_file_data_is_api_error() {
        let temp_dir = TempDir::new().unwrap();

        let err = convert_against(
            serde_json::json!({ "Files": [{ "FileName": "report.docx", "FileData": "not base64!!" }] }),
            &temp_dir,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ConvertError::Api { .. }));
        assert!(err.to_string().contains("invalid FileData"));
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_missing_secret_is_not_configured() {
        let temp_dir = TempDir::new().unwrap();
        let (store, name) = setup(&temp_dir);
        let artifacts = TempArtifacts::new(store);
        let input = artifacts.reserve("report.pdf");
        let output = artifacts.reserve("report.docx");

        let converter = ConvertApiConverter::pdf_to_docx(&ConvertApiConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            secret: None,
        });
        let job = ConversionJob { input: &input, output: &output, name: &name, artifacts: &artifacts };
        assert!(matches!(
            converter.convert(&job).await,
            Err(ConvertError::NotConfigured("ConvertAPI"))
        ));
    }
}
