//! Configuration management for Docshift Server

use serde::Deserialize;
use std::env;
use std::path::PathBuf;

/// Default request body ceiling: 16MB
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub scratch: ScratchConfig,
    pub convert_api: ConvertApiConfig,
    pub pdf_services: PdfServicesConfig,
    pub ghostscript: GhostscriptConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Enforced by the router before any handler runs
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScratchConfig {
    /// Fixed scratch directory. When unset a fresh temporary directory is
    /// created at startup and removed on shutdown.
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConvertApiConfig {
    pub base_url: String,
    pub secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PdfServicesConfig {
    pub base_url: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub poll_interval_ms: u64,
    pub max_polls: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GhostscriptConfig {
    pub binary: PathBuf,
    pub pdf_settings: String,
    pub compatibility_level: String,
    pub color_image_resolution: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
                max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            },
            scratch: ScratchConfig { dir: None },
            convert_api: ConvertApiConfig {
                base_url: "https://v2.convertapi.com".to_string(),
                secret: None,
            },
            pdf_services: PdfServicesConfig {
                base_url: "https://pdf-services.adobe.io".to_string(),
                client_id: None,
                client_secret: None,
                poll_interval_ms: 2000,
                max_polls: 150,
            },
            ghostscript: GhostscriptConfig {
                binary: PathBuf::from("gs"),
                pdf_settings: "/ebook".to_string(),
                compatibility_level: "1.4".to_string(),
                color_image_resolution: 72,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: parse_var("SERVER_PORT", defaults.server.port)?,
                max_upload_bytes: parse_var("MAX_UPLOAD_BYTES", defaults.server.max_upload_bytes)?,
            },
            scratch: ScratchConfig {
                dir: non_empty_var("SCRATCH_DIR").map(PathBuf::from),
            },
            convert_api: ConvertApiConfig {
                base_url: env::var("CONVERT_API_URL").unwrap_or(defaults.convert_api.base_url),
                secret: non_empty_var("CONVERT_API_SECRET"),
            },
            pdf_services: PdfServicesConfig {
                base_url: env::var("PDF_SERVICES_URL").unwrap_or(defaults.pdf_services.base_url),
                client_id: non_empty_var("PDF_SERVICES_CLIENT_ID"),
                client_secret: non_empty_var("PDF_SERVICES_CLIENT_SECRET"),
                poll_interval_ms: parse_var(
                    "PDF_SERVICES_POLL_INTERVAL_MS",
                    defaults.pdf_services.poll_interval_ms,
                )?,
                max_polls: parse_var("PDF_SERVICES_MAX_POLLS", defaults.pdf_services.max_polls)?,
            },
            ghostscript: GhostscriptConfig {
                binary: non_empty_var("GHOSTSCRIPT_BINARY")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.ghostscript.binary),
                pdf_settings: env::var("GHOSTSCRIPT_PDF_SETTINGS")
                    .unwrap_or(defaults.ghostscript.pdf_settings),
                compatibility_level: env::var("GHOSTSCRIPT_COMPATIBILITY_LEVEL")
                    .unwrap_or(defaults.ghostscript.compatibility_level),
                color_image_resolution: parse_var(
                    "GHOSTSCRIPT_IMAGE_RESOLUTION",
                    defaults.ghostscript.color_image_resolution,
                )?,
            },
        })
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match non_empty_var(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        None => Ok(default),
    }
}
