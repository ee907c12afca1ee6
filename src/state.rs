//! Application state management

use std::sync::Arc;

use crate::config::Config;
use crate::convert::{
    ConvertApiConverter, Converter, GhostscriptCompressor, ImageToPdf, PdfServicesConverter,
};
use crate::transient::{StoreError, TransientStore};

/// Conversion backend per route
#[derive(Clone)]
pub struct Backends {
    /// `/pdf-to-word`
    pub pdf_to_word: Arc<dyn Converter>,
    /// `/pdf-to-word/export`
    pub pdf_export: Arc<dyn Converter>,
    /// `/jpeg-to-pdf`
    pub image_to_pdf: Arc<dyn Converter>,
    /// `/compress-pdf`
    pub compress: Arc<dyn Converter>,
}

impl Backends {
    /// Production backends built from configuration
    pub fn from_config(config: &Config) -> Self {
        if config.convert_api.secret.is_none() {
            tracing::warn!("CONVERT_API_SECRET not set; /pdf-to-word will fail");
        }
        if config.pdf_services.client_id.is_none() || config.pdf_services.client_secret.is_none() {
            tracing::warn!("PDF Services credentials not set; /pdf-to-word/export will fail");
        }

        Self {
            pdf_to_word: Arc::new(ConvertApiConverter::pdf_to_docx(&config.convert_api)),
            pdf_export: Arc::new(PdfServicesConverter::export_docx(&config.pdf_services)),
            image_to_pdf: Arc::new(ImageToPdf::new()),
            compress: Arc::new(GhostscriptCompressor::new(&config.ghostscript)),
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    store: TransientStore,
    backends: Backends,
}

impl AppState {
    /// Create state with explicit backends
    pub fn new(config: Config, store: TransientStore, backends: Backends) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                backends,
            }),
        }
    }

    /// Create state from configuration, setting up the scratch directory
    pub fn from_config(config: Config) -> Result<Self, StoreError> {
        let store = match &config.scratch.dir {
            Some(dir) => TransientStore::at(dir)?,
            None => TransientStore::temporary()?,
        };
        let backends = Backends::from_config(&config);
        Ok(Self::new(config, store, backends))
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the scratch store
    pub fn store(&self) -> &TransientStore {
        &self.inner.store
    }

    /// Get the conversion backends
    pub fn backends(&self) -> &Backends {
        &self.inner.backends
    }
}
