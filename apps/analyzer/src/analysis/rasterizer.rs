//! PDF → bitmap backends.
//!
//! pdfium is not async-safe, so [`PdfiumRasterizer`] owns the library binding on
//! one dedicated thread and serves jobs from a channel, one document at a time.

use std::sync::mpsc;

use async_trait::async_trait;
use bytes::Bytes;
use image::{DynamicImage, RgbaImage};
use pdfium_render::prelude::*;
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::analysis::document::RenderError;

/// PDF user space is defined in points: 72 per inch.
const POINTS_PER_INCH: f32 = 72.0;

/// Turns PDF bytes into one bitmap per page, in page order.
#[async_trait]
pub trait PdfRasterizer: Send + Sync {
    async fn rasterize(&self, pdf: Bytes, dpi: u16) -> Result<Vec<DynamicImage>, RenderError>;
}

struct Job {
    pdf: Bytes,
    dpi: u16,
    reply: oneshot::Sender<Result<Vec<DynamicImage>, RenderError>>,
}

pub struct PdfiumRasterizer {
    jobs: mpsc::Sender<Job>,
}

impl PdfiumRasterizer {
    /// Starts the worker thread and waits until it has bound libpdfium.
    ///
    /// Search order: `library_dir` (if given), the working directory, the system library.
    pub fn spawn(library_dir: Option<&str>) -> anyhow::Result<Self> {
        let library_dir = library_dir.map(str::to_string);
        let (jobs, queue) = mpsc::channel::<Job>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();

        std::thread::Builder::new()
            .name("pdfium".to_string())
            .spawn(move || {
                let pdfium = match bind_pdfium(library_dir) {
                    Ok(pdfium) => {
                        let _ = ready_tx.send(Ok(()));
                        pdfium
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                while let Ok(job) = queue.recv() {
                    let result = rasterize_document(&pdfium, &job.pdf, job.dpi);
                    // The requester may have gone away; nothing to do then.
                    let _ = job.reply.send(result);
                }
                debug!("pdfium worker shutting down");
            })?;

        ready_rx
            .recv()
            .map_err(|_| anyhow::anyhow!("pdfium worker exited during startup"))?
            .map_err(|e| anyhow::anyhow!("Failed to load PDFium library: {e}"))?;

        info!("PDFium rasterizer ready");
        Ok(Self { jobs })
    }
}

#[async_trait]
impl PdfRasterizer for PdfiumRasterizer {
    async fn rasterize(&self, pdf: Bytes, dpi: u16) -> Result<Vec<DynamicImage>, RenderError> {
        let (reply, response) = oneshot::channel();
        self.jobs
            .send(Job { pdf, dpi, reply })
            .map_err(|_| RenderError::WorkerUnavailable)?;
        response.await.map_err(|_| RenderError::WorkerUnavailable)?
    }
}

fn bind_pdfium(library_dir: Option<String>) -> Result<Pdfium, String> {
    let local = || Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"));
    let bindings = match library_dir {
        Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir.as_str()))
            .or_else(|_| local()),
        None => local(),
    }
    .or_else(|_| Pdfium::bind_to_system_library())
    .map_err(|e| format!("{e:?}"))?;

    Ok(Pdfium::new(bindings))
}

/// The document handle is closed when `document` drops at the end of this call,
/// on success and failure alike.
fn rasterize_document(pdfium: &Pdfium, pdf: &[u8], dpi: u16) -> Result<Vec<DynamicImage>, RenderError> {
    let document = pdfium
        .load_pdf_from_byte_slice(pdf, None)
        .map_err(|e| RenderError::Rasterize(format!("{e:?}")))?;

    let config = PdfRenderConfig::new().scale_page_by_factor(f32::from(dpi) / POINTS_PER_INCH);

    let mut bitmaps = Vec::new();
    for (index, page) in document.pages().iter().enumerate() {
        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| RenderError::Rasterize(format!("page {}: {e:?}", index + 1)))?;

        let (width, height) = (bitmap.width() as u32, bitmap.height() as u32);
        let image = RgbaImage::from_raw(width, height, bitmap.as_rgba_bytes()).ok_or_else(|| {
            RenderError::Rasterize(format!("page {}: bitmap size mismatch", index + 1))
        })?;
        bitmaps.push(DynamicImage::ImageRgba8(image));
    }

    debug!("Rasterized {} page(s) at {dpi} DPI", bitmaps.len());
    Ok(bitmaps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::document::RENDER_DPI;

    /// Builds a PDF whose pages have the given MediaBox sizes (in points), with a correct xref.
    fn pdf_with_pages(sizes: &[(u32, u32)]) -> Vec<u8> {
        let mut objects = vec![
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            format!(
                "<< /Type /Pages /Kids [{}] /Count {} >>",
                (0..sizes.len())
                    .map(|i| format!("{} 0 R", i + 3))
                    .collect::<Vec<_>>()
                    .join(" "),
                sizes.len()
            ),
        ];
        for (width, height) in sizes {
            objects.push(format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {width} {height}] /Resources << >> >>"
            ));
        }

        let mut pdf = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for (i, object) in objects.iter().enumerate() {
            offsets.push(pdf.len());
            pdf.extend_from_slice(format!("{} 0 obj\n{object}\nendobj\n", i + 1).as_bytes());
        }
        let xref_at = pdf.len();
        pdf.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
        for offset in offsets {
            pdf.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
        }
        pdf.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_at}\n%%EOF\n",
                objects.len() + 1
            )
            .as_bytes(),
        );
        pdf
    }

    // One test: libpdfium can only be bound once per process.
    #[tokio::test]
    #[ignore = "requires libpdfium"]
    async fn test_pdfium_renders_each_page_in_order_at_render_dpi() {
        let rasterizer = PdfiumRasterizer::spawn(None).unwrap();
        // 1in x 1in, then 2in x 1in.
        let pdf = Bytes::from(pdf_with_pages(&[(72, 72), (144, 72)]));

        let bitmaps = rasterizer.rasterize(pdf, RENDER_DPI).await.unwrap();

        let scale = f32::from(RENDER_DPI) / POINTS_PER_INCH;
        let expected = vec![
            ((72.0 * scale).round() as u32, (72.0 * scale).round() as u32),
            ((144.0 * scale).round() as u32, (72.0 * scale).round() as u32),
        ];
        let actual: Vec<(u32, u32)> = bitmaps.iter().map(|b| (b.width(), b.height())).collect();
        assert_eq!(bitmaps.len(), 2);
        assert_eq!(actual, expected);
        assert_eq!(actual[0], (150, 150));

        let err = rasterizer
            .rasterize(Bytes::from_static(b"not a document at all"), RENDER_DPI)
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::Rasterize(_)));
    }
}
