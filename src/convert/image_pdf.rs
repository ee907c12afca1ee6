//! Image to PDF
//!
//! Local transform with no external service: the raster is decoded, re-encoded
//! as an RGB JPEG and placed on a single page sized at a fixed resolution.
//! An alpha channel, when present, is kept as a soft mask on the image.

use std::io::Cursor;
use std::path::Path;

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use lopdf::{Dictionary, Document, Object, Stream};

use super::types::{ConversionJob, ConversionOutput, ConvertError};
use super::Converter;
use crate::transient::StoreError;
use crate::upload::SanitizedName;

/// Pixels per inch used to size the page
pub const PDF_RESOLUTION_DPI: f32 = 100.0;

const JPEG_QUALITY: u8 = 90;

/// Single-page PDF from a JPEG/PNG
#[derive(Debug, Default)]
pub struct ImageToPdf;

impl ImageToPdf {
    pub fn new() -> Self {
        Self
    }
}

/// Build a one-page PDF holding `image_data`
pub fn render_pdf(image_data: &[u8]) -> Result<Vec<u8>, ConvertError> {
    let decoded = image::load_from_memory(image_data)?;
    let rgb = decoded.to_rgb8();
    let (width, height) = rgb.dimensions();
    let alpha = decoded
        .color()
        .has_alpha()
        .then(|| decoded.to_luma_alpha8().pixels().map(|p| p[1]).collect::<Vec<u8>>());

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(Cursor::new(&mut jpeg), JPEG_QUALITY).encode_image(&rgb)?;

    let page_width = width as f32 * 72.0 / PDF_RESOLUTION_DPI;
    let page_height = height as f32 * 72.0 / PDF_RESOLUTION_DPI;

    let mut doc = Document::with_version("1.4");
    let pages_id = doc.new_object_id();

    let mut image_dict = Dictionary::new();
    image_dict.set("Type", Object::Name(b"XObject".to_vec()));
    image_dict.set("Subtype", Object::Name(b"Image".to_vec()));
    image_dict.set("Width", Object::Integer(width as i64));
    image_dict.set("Height", Object::Integer(height as i64));
    image_dict.set("ColorSpace", Object::Name(b"DeviceRGB".to_vec()));
    image_dict.set("BitsPerComponent", Object::Integer(8));
    image_dict.set("Filter", Object::Name(b"DCTDecode".to_vec()));
    if let Some(alpha) = alpha {
        let mut mask_dict = Dictionary::new();
        mask_dict.set("Type", Object::Name(b"XObject".to_vec()));
        mask_dict.set("Subtype", Object::Name(b"Image".to_vec()));
        mask_dict.set("Width", Object::Integer(width as i64));
        mask_dict.set("Height", Object::Integer(height as i64));
        mask_dict.set("ColorSpace", Object::Name(b"DeviceGray".to_vec()));
        mask_dict.set("BitsPerComponent", Object::Integer(8));
        let mask_id = doc.add_object(Stream::new(mask_dict, alpha));
        image_dict.set("SMask", Object::Reference(mask_id));
    }
    // Already DCT-encoded, must not be flate-compressed on save
    let image_id = doc.add_object(Stream::new(image_dict, jpeg).with_compression(false));

    let content = format!("q {:.4} 0 0 {:.4} 0 0 cm /Im0 Do Q", page_width, page_height);
    let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));

    let mut xobjects = Dictionary::new();
    xobjects.set("Im0", Object::Reference(image_id));
    let mut resources = Dictionary::new();
    resources.set("XObject", Object::Dictionary(xobjects));

    let mut page = Dictionary::new();
    page.set("Type", Object::Name(b"Page".to_vec()));
    page.set("Parent", Object::Reference(pages_id));
    page.set(
        "MediaBox",
        Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(page_width),
            Object::Real(page_height),
        ]),
    );
    page.set("Contents", Object::Reference(content_id));
    page.set("Resources", Object::Dictionary(resources));
    let page_id = doc.add_object(page);

    let mut pages = Dictionary::new();
    pages.set("Type", Object::Name(b"Pages".to_vec()));
    pages.set("Kids", Object::Array(vec![Object::Reference(page_id)]));
    pages.set("Count", Object::Integer(1));
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", Object::Reference(catalog_id));

    // Flate-compresses the soft mask and content stream
    doc.compress();

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| ConvertError::PdfBuild(e.to_string()))?;
    Ok(out)
}

#[async_trait]
impl Converter for ImageToPdf {
    fn name(&self) -> &'static str {
        "image-to-pdf"
    }

    fn output_name(&self, name: &SanitizedName) -> String {
        name.derived("", ".pdf")
    }

    async fn convert(&self, job: &ConversionJob<'_>) -> Result<ConversionOutput, ConvertError> {
        let input: &Path = job.input;
        let data = tokio::fs::read(input)
            .await
            .map_err(|e| StoreError::io(input, e))?;

        let pdf = tokio::task::spawn_blocking(move || render_pdf(&data))
            .await
            .map_err(|e| ConvertError::Task(e.to_string()))??;

        job.artifacts.store().persist(job.output, &pdf).await?;

        Ok(ConversionOutput::converted(job.output, self.output_name(job.name)))
    }
}
