//! Adobe PDF Services backend
//!
//! Job-based export:
//! 1. exchange client credentials for an access token
//! 2. create an asset and PUT the input bytes to its upload URI
//! 3. submit an `exportpdf` job for the asset
//! 4. poll the job location until it is `done` or `failed`
//! 5. download the result asset into the expected output path
//!
//! Failures fall into three classes: the service rejected the request or the
//! job failed (API), the account ran out of quota (usage), or the client side
//! broke down (SDK).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

use super::types::{ConversionJob, ConversionOutput, ConvertError};
use super::Converter;
use crate::config::PdfServicesConfig;
use crate::transient::StoreError;
use crate::upload::SanitizedName;

const SERVICE: &str = "PDF Services";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct AssetUpload {
    #[serde(rename = "uploadUri")]
    upload_uri: String,
    #[serde(rename = "assetID")]
    asset_id: String,
}

#[derive(Debug, Deserialize)]
struct JobStatus {
    status: String,
    #[serde(default)]
    asset: Option<ResultAsset>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ResultAsset {
    #[serde(rename = "downloadUri")]
    download_uri: String,
}

struct Credentials {
    client_id: String,
    client_secret: String,
}

/// Export job against Adobe PDF Services
pub struct PdfServicesConverter {
    client: reqwest::Client,
    base_url: String,
    credentials: Option<Credentials>,
    target_format: &'static str,
    poll_interval: Duration,
    max_polls: u32,
}

impl PdfServicesConverter {
    pub fn new(config: &PdfServicesConfig, target_format: &'static str) -> Self {
        let credentials = match (&config.client_id, &config.client_secret) {
            (Some(id), Some(secret)) => Some(Credentials {
                client_id: id.clone(),
                client_secret: secret.clone(),
            }),
            _ => None,
        };

        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials,
            target_format,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            max_polls: config.max_polls.max(1),
        }
    }

    /// PDF to Word
    pub fn export_docx(config: &PdfServicesConfig) -> Self {
        Self::new(config, "docx")
    }

    async fn access_token(&self, credentials: &Credentials) -> Result<String, ConvertError> {
        let response = self
            .client
            .post(format!("{}/token", self.base_url))
            .form(&[
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        let token: TokenResponse = parse_json(check_status(response, "token").await?).await?;
        Ok(token.access_token)
    }

    async fn upload_asset(
        &self,
        credentials: &Credentials,
        token: &str,
        job: &ConversionJob<'_>,
    ) -> Result<String, ConvertError> {
        let media_type = mime_guess::from_path(job.input).first_or_octet_stream().to_string();

        let response = self
            .client
            .post(format!("{}/assets", self.base_url))
            .header("X-API-Key", &credentials.client_id)
            .bearer_auth(token)
            .json(&json!({ "mediaType": &media_type }))
            .send()
            .await
            .map_err(transport_error)?;
        let asset: AssetUpload = parse_json(check_status(response, "create asset").await?).await?;

        let data = tokio::fs::read(job.input)
            .await
            .map_err(|e| StoreError::io(job.input, e))?;

        let response = self
            .client
            .put(&asset.upload_uri)
            .header(header::CONTENT_TYPE, media_type)
            .body(data)
            .send()
            .await
            .map_err(transport_error)?;
        check_status(response, "upload asset").await?;

        tracing::debug!(asset_id = %asset.asset_id, "Input asset uploaded");
        Ok(asset.asset_id)
    }

    async fn submit_export(
        &self,
        credentials: &Credentials,
        token: &str,
        asset_id: &str,
    ) -> Result<String, ConvertError> {
        let response = self
            .client
            .post(format!("{}/operation/exportpdf", self.base_url))
            .header("X-API-Key", &credentials.client_id)
            .bearer_auth(token)
            .json(&json!({ "assetID": asset_id, "targetFormat": self.target_format }))
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(response, "submit export").await?;

        response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .ok_or_else(|| sdk_error("export job response has no Location header".to_string()))
    }

    async fn wait_for_result(
        &self,
        credentials: &Credentials,
        token: &str,
        location: &str,
    ) -> Result<String, ConvertError> {
        for attempt in 1..=self.max_polls {
            let response = self
                .client
                .get(location)
                .header("X-API-Key", &credentials.client_id)
                .bearer_auth(token)
                .send()
                .await
                .map_err(transport_error)?;
            let status: JobStatus = parse_json(check_status(response, "poll job").await?).await?;

            match status.status.as_str() {
                "done" => {
                    return status
                        .asset
                        .map(|a| a.download_uri)
                        .ok_or_else(|| sdk_error("finished job has no result asset".to_string()));
                }
                "failed" => {
                    let error = status.error.unwrap_or(Value::Null);
                    return Err(classify(None, &error, "export job failed"));
                }
                other => {
                    tracing::debug!(attempt, status = %other, "Export job not finished");
                    if attempt < self.max_polls {
                        tokio::time::sleep(self.poll_interval).await;
                    }
                }
            }
        }

        Err(sdk_error(format!(
            "export job did not finish after {} polls",
            self.max_polls
        )))
    }
}

#[async_trait]
impl Converter for PdfServicesConverter {
    fn name(&self) -> &'static str {
        "pdf-services"
    }

    fn output_name(&self, name: &SanitizedName) -> String {
        name.derived("", &format!(".{}", self.target_format))
    }

    async fn convert(&self, job: &ConversionJob<'_>) -> Result<ConversionOutput, ConvertError> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or(ConvertError::NotConfigured(SERVICE))?;

        let token = self.access_token(credentials).await?;
        let asset_id = self.upload_asset(credentials, &token, job).await?;
        let location = self.submit_export(credentials, &token, &asset_id).await?;

        tracing::info!(asset_id = %asset_id, location = %location, "Export job submitted");

        let download_uri = self.wait_for_result(credentials, &token, &location).await?;

        let response = self
            .client
            .get(&download_uri)
            .send()
            .await
            .map_err(transport_error)?;
        let data = check_status(response, "download result")
            .await?
            .bytes()
            .await
            .map_err(transport_error)?;

        job.artifacts.store().persist(job.output, &data).await?;

        Ok(ConversionOutput::converted(job.output, self.output_name(job.name)))
    }
}

// ============================================================================
// Error Classification
// ============================================================================

async fn check_status(response: reqwest::Response, stage: &str) -> Result<reqwest::Response, ConvertError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let parsed: Value = serde_json::from_str(&body).unwrap_or(Value::String(body));
    Err(classify(Some(status), &parsed, stage))
}

/// Map a service error body to the API / usage split
fn classify(status: Option<StatusCode>, body: &Value, stage: &str) -> ConvertError {
    let error = body.get("error").unwrap_or(body);
    let code = error
        .get("code")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .map(|s| s.to_string())
        .or_else(|| error.as_str().map(|s| s.to_string()))
        .unwrap_or_default();

    let detail = match (&status, code.is_empty()) {
        (Some(s), false) => format!("{} ({} {}): {}", stage, s.as_u16(), code, message),
        (Some(s), true) => format!("{} ({}): {}", stage, s.as_u16(), message),
        (None, false) => format!("{} ({}): {}", stage, code, message),
        (None, true) => format!("{}: {}", stage, message),
    };

    let quota = status == Some(StatusCode::TOO_MANY_REQUESTS) || code.to_ascii_uppercase().contains("QUOTA");
    if quota {
        ConvertError::Usage {
            service: SERVICE,
            message: detail,
        }
    } else {
        ConvertError::Api {
            service: SERVICE,
            message: detail,
        }
    }
}

async fn parse_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T, ConvertError> {
    response
        .json()
        .await
        .map_err(|e| sdk_error(format!("malformed response: {}", e)))
}

fn transport_error(e: reqwest::Error) -> ConvertError {
    sdk_error(format!("request failed: {}", e))
}

fn sdk_error(message: String) -> ConvertError {
    ConvertError::Sdk {
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
    use axum::extract::State;
    use axum::http::{header as http_header, StatusCode as HttpStatus};
    use axum::response::IntoResponse;
    use axum::routing::{get, post, put};
    use axum::{Json, Router};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    const DOCX: &[u8] = b"PK\x03\x04 exported docx";

    struct Stub {
        base: String,
        polls: AtomicU32,
        uploaded: Mutex<Vec<u8>>,
        fail_job: bool,
    }

    type StubState = Arc<Stub>;

    fn stub_router(state: StubState) -> Router {
        Router::new()
            .route(
                "/token",
                post(|| async { Json(json!({ "access_token": "tok", "token_type": "bearer" })) }),
            )
            .route(
                "/assets",
                post(|State(s): State<StubState>| async move {
                    Json(json!({ "uploadUri": format!("{}/upload/in-1", s.base), "assetID": "in-1" }))
                }),
            )
            .route(
                "/upload/in-1",
                put(|State(s): State<StubState>, body: Bytes| async move {
                    *s.uploaded.lock() = body.to_vec();
                    HttpStatus::OK
                }),
            )
            .route(
                "/operation/exportpdf",
                post(|State(s): State<StubState>| async move {
                    (
                        HttpStatus::CREATED,
                        [(http_header::LOCATION, format!("{}/status/job-1", s.base))],
                    )
                }),
            )
            .route(
                "/status/job-1",
                get(|State(s): State<StubState>| async move {
                    let poll = s.polls.fetch_add(1, Ordering::SeqCst);
                    if poll == 0 {
                        Json(json!({ "status": "in progress" }))
                    } else if s.fail_job {
                        Json(json!({
                            "status": "failed",
                            "error": { "code": "BAD_PDF", "message": "Unable to read input", "status": 400 }
                        }))
                    } else {
                        Json(json!({
                            "status": "done",
                            "asset": { "assetID": "out-1", "downloadUri": format!("{}/download/out-1", s.base) }
                        }))
                    }
                }),
            )
            .route("/download/out-1", get(|| async { DOCX.into_response() }))
            .with_state(state)
    }

    async fn spawn_stub(fail_job: bool) -> (String, StubState) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let state = Arc::new(Stub {
            base: base.clone(),
            polls: AtomicU32::new(0),
            uploaded: Mutex::new(Vec::new()),
            fail_job,
        });
        let router = stub_router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        (base, state)
    }

    fn config(base: String) -> PdfServicesConfig {
        PdfServicesConfig {
            base_url: base,
            client_id: Some("client".to_string()),
            client_secret: Some("secret".to_string()),
            poll_interval_ms: 10,
            max_polls: 5,
        }
    }

    async fn run(converter: &PdfServicesConverter, temp_dir: &TempDir) -> Result<Vec<u8>, ConvertError> {
        let store = TransientStore::at(temp_dir.path()).unwrap();
        let upload = UploadedFile {
            file_name: "contract.pdf".to_string(),
            content_type: None,
            data: Bytes::from_static(b"%PDF-1.7 contract"),
        };
        let name = validate(&upload, &PDF_ONLY).unwrap();
        let artifacts = TempArtifacts::new(store.clone());
        let input = artifacts.reserve(&name.file_name());
        store.persist(&input, &upload.data).await.unwrap();
        let output = artifacts.reserve(&converter.output_name(&name));

        let job = ConversionJob { input: &input, output: &output, name: &name, artifacts: &artifacts };
        let result = converter.convert(&job).await?;
        assert_eq!(result.download_name, "contract.docx");
        Ok(std::fs::read(&result.path).unwrap())
    }

    #[tokio::test]
    async fn test_export_job_round_trip() {
        let (base, stub) = spawn_stub(false).await;
        let temp_dir = TempDir::new().unwrap();
        let converter = PdfServicesConverter::export_docx(&config(base));

        let output = run(&converter, &temp_dir).await.unwrap();

        assert_eq!(output, DOCX);
        assert_eq!(*stub.uploaded.lock(), b"%PDF-1.7 contract");
        assert_eq!(stub.polls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_job_is_api_error() {
        let (base, _stub) = spawn_stub(true).await;
        let temp_dir = TempDir::new().unwrap();
        let converter = PdfServicesConverter::export_docx(&config(base));

        let err = run(&converter, &temp_dir).await.unwrap_err();
        assert!(matches!(err, ConvertError::Api { .. }));
        assert!(err.to_string().contains("Unable to read input"));
    }

    #[tokio::test]
    async fn test_poll_limit_is_sdk_error() {
        let (base, stub) = spawn_stub(false).await;
        let temp_dir = TempDir::new().unwrap();
        let mut cfg = config(base);
        cfg.max_polls = 1;
        // No wait after the final poll
        cfg.poll_interval_ms = 60_000;
        let converter = PdfServicesConverter::export_docx(&cfg);

        let err = tokio::time::timeout(Duration::from_secs(10), run(&converter, &temp_dir))
            .await
            .expect("gave up without sleeping past the last poll")
            .unwrap_err();
        assert!(matches!(err, ConvertError::Sdk { .. }));
        assert_eq!(stub.polls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_credentials_is_not_configured() {
        let temp_dir = TempDir::new().unwrap();
        let mut cfg = config("http://127.0.0.1:9".to_string());
        cfg.client_secret = None;
        let converter = PdfServicesConverter::export_docx(&cfg);

        let err = run(&converter, &temp_dir).await.unwrap_err();
        assert!(matches!(err, ConvertError::NotConfigured(_)));
    }

    #[test]
    fn test_classify_quota() {
        let by_status = classify(
            Some(StatusCode::TOO_MANY_REQUESTS),
            &json!({ "error": { "code": "TOO_MANY", "message": "slow down" } }),
            "submit export",
        );
        assert!(matches!(by_status, ConvertError::Usage { .. }));

        let by_code = classify(
            Some(StatusCode::FORBIDDEN),
            &json!({ "error": { "code": "INSUFFICIENT_QUOTA", "message": "no credits" } }),
            "create asset",
        );
        assert!(matches!(by_code, ConvertError::Usage { .. }));

        let plain = classify(
            Some(StatusCode::BAD_REQUEST),
            &json!({ "error": { "code": "BAD_REQUEST", "message": "bad media type" } }),
            "create asset",
        );
        assert!(matches!(plain, ConvertError::Api { .. }));
        assert!(plain.to_string().contains("bad media type"));
    }

    #[test]
    fn test_classify_plain_text_body() {
        let err = classify(
            Some(StatusCode::BAD_GATEWAY),
            &Value::String("upstream down".to_string()),
            "token",
        );
        assert!(matches!(err, ConvertError::Api { .. }));
        assert!(err.to_string().contains("upstream down"));
    }
}
