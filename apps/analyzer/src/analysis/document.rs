//! Document Renderer — turns an uploaded PDF into the ordered page images sent
//! to the model, plus a decoded first-page preview for the page.
//!
//! Flow: header sniff → rasterize (150 DPI, via [`PdfRasterizer`]) → JPEG → base64.

use std::io::Cursor;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use image::{codecs::jpeg::JpegEncoder, DynamicImage, ImageFormat};
use thiserror::Error;
use tracing::{info, warn};

use crate::analysis::rasterizer::PdfRasterizer;

/// Rasterization resolution. Balances legibility for the model against payload size.
pub const RENDER_DPI: u16 = 150;
pub const JPEG_QUALITY: u8 = 85;
pub const PAGE_MIME_TYPE: &str = "image/jpeg";

/// The PDF header may be preceded by junk; readers accept it within the first KiB.
const HEADER_SEARCH_WINDOW: usize = 1024;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("the uploaded file is not a PDF document")]
    NotAPdf,

    #[error("{0}")]
    Rasterize(String),

    #[error("the document has no pages")]
    EmptyDocument,

    #[error("could not encode page image: {0}")]
    Encode(String),

    #[error("the PDF renderer is not running")]
    WorkerUnavailable,
}

/// One page as sent to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPage {
    pub mime_type: &'static str,
    /// Base64 (standard alphabet) of the JPEG bytes.
    pub data: String,
}

/// Decoded image of page one. Only used for on-screen display.
#[derive(Debug, Clone)]
pub struct PreviewImage {
    image: DynamicImage,
}

impl PreviewImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// `data:` URI suitable for an `<img src>`.
    pub fn to_data_uri(&self) -> Result<String, RenderError> {
        let mut jpeg = Vec::new();
        self.image
            .write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg)
            .map_err(|e| RenderError::Encode(e.to_string()))?;
        Ok(format!("data:{PAGE_MIME_TYPE};base64,{}", STANDARD.encode(jpeg)))
    }
}

/// A successfully rendered resume. `pages` is never empty and `preview` is page 0.
#[derive(Debug, Clone)]
pub struct RenderedResume {
    pages: Vec<RenderedPage>,
    preview: PreviewImage,
}

impl RenderedResume {
    pub fn pages(&self) -> &[RenderedPage] {
        &self.pages
    }

    pub fn preview(&self) -> &PreviewImage {
        &self.preview
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

#[derive(Clone)]
pub struct DocumentRenderer {
    rasterizer: Arc<dyn PdfRasterizer>,
}

impl DocumentRenderer {
    pub fn new(rasterizer: Arc<dyn PdfRasterizer>) -> Self {
        Self { rasterizer }
    }

    /// Renders every page in document order. Any failure yields no pages and no preview.
    pub async fn render(&self, pdf: Bytes) -> Result<RenderedResume, RenderError> {
        if !looks_like_pdf(&pdf) {
            warn!("Rejected upload of {} bytes without a PDF header", pdf.len());
            return Err(RenderError::NotAPdf);
        }

        let bitmaps = self.rasterizer.rasterize(pdf, RENDER_DPI).await?;
        if bitmaps.is_empty() {
            return Err(RenderError::EmptyDocument);
        }

        let resume = tokio::task::spawn_blocking(move || encode_pages(bitmaps))
            .await
            .map_err(|e| RenderError::Encode(e.to_string()))??;

        info!("Rendered resume: {} page(s)", resume.page_count());
        Ok(resume)
    }
}

pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(HEADER_SEARCH_WINDOW)];
    head.windows(5).any(|w| w == b"%PDF-")
}

fn encode_pages(bitmaps: Vec<DynamicImage>) -> Result<RenderedResume, RenderError> {
    let mut pages = Vec::with_capacity(bitmaps.len());
    let mut preview = None;

    for bitmap in &bitmaps {
        let jpeg = encode_jpeg(bitmap)?;
        if preview.is_none() {
            let image = image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg)
                .map_err(|e| RenderError::Encode(e.to_string()))?;
            preview = Some(PreviewImage { image });
        }
        pages.push(RenderedPage {
            mime_type: PAGE_MIME_TYPE,
            data: STANDARD.encode(&jpeg),
        });
    }

    let preview = preview.ok_or(RenderError::EmptyDocument)?;
    Ok(RenderedResume { pages, preview })
}

fn encode_jpeg(bitmap: &DynamicImage) -> Result<Vec<u8>, RenderError> {
    // JPEG has no alpha channel; pdfium hands back RGBA.
    let rgb = bitmap.to_rgb8();
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY)
        .encode_image(&rgb)
        .map_err(|e| RenderError::Encode(e.to_string()))?;
    Ok(jpeg)
}
