//! PDF rasterisation (C1): PDF → page-ordered PNG bytes via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which uses thread-local
//! state internally and is not safe to call from async contexts.
//! `tokio::task::spawn_blocking` moves the work onto a dedicated blocking
//! thread, preventing Tokio worker threads from stalling during CPU-heavy
//! rendering.
//!
//! ## Why cap pixels, not DPI?
//!
//! Page sizes vary wildly: an A0 poster at 200 DPI would produce an
//! enormous image. `max_rendered_pixels` caps the longest edge regardless
//! of physical size, keeping memory bounded and matching the image-size
//! sweet spot document-parser VLM variants expect.
//!
//! This stage only runs when the selected document-parser variant needs
//! rendered pages rather than native text extraction (§4.2) — the
//! `native` variant skips it entirely.

use crate::error::ExamParseError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info, warn};

/// One rasterised page: 0-indexed page number, PNG bytes, and MIME type.
pub struct RasterizedPage {
    pub page_index: usize,
    pub png_bytes: Vec<u8>,
    pub mime_type: &'static str,
}

/// Rasterise every page of a PDF to PNG at the given DPI-derived pixel cap.
///
/// Returns a finite, already-materialised sequence (the underlying pdfium
/// document handle does not outlive this call; a caller wanting to
/// re-rasterise simply calls this again, matching §4.1's "restartable"
/// requirement without needing the document to stay open between calls).
pub async fn rasterize_pages(
    pdf_path: &Path,
    max_rendered_pixels: u32,
    password: Option<&str>,
) -> Result<Vec<RasterizedPage>, ExamParseError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(|s| s.to_string());

    tokio::task::spawn_blocking(move || rasterize_pages_blocking(&path, max_rendered_pixels, pwd.as_deref()))
        .await
        .map_err(|e| ExamParseError::Internal(format!("rasterize task panicked: {e}")))?
}

fn rasterize_pages_blocking(
    pdf_path: &Path,
    max_rendered_pixels: u32,
    password: Option<&str>,
) -> Result<Vec<RasterizedPage>, ExamParseError> {
    let pdfium = Pdfium::default();

    let document = pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                ExamParseError::WrongPassword {
                    path: pdf_path.to_path_buf(),
                }
            } else {
                ExamParseError::PasswordRequired {
                    path: pdf_path.to_path_buf(),
                }
            }
        } else {
            ExamParseError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: err_str,
            }
        }
    })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    if total_pages == 0 {
        return Err(ExamParseError::EmptyDocument {
            path: pdf_path.to_path_buf(),
        });
    }
    info!("PDF loaded: {} pages", total_pages);

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_rendered_pixels as i32)
        .set_maximum_height(max_rendered_pixels as i32);

    let mut results = Vec::with_capacity(total_pages);
    for idx in 0..total_pages {
        let page = pages
            .get(idx as u16)
            .map_err(|e| ExamParseError::ParserRuntimeError {
                page: idx + 1,
                detail: format!("{:?}", e),
            })?;

        let bitmap = match page.render_with_config(&render_config) {
            Ok(b) => b,
            Err(e) => {
                warn!("Rasterisation failed for page {}: {:?}", idx + 1, e);
                continue;
            }
        };

        let image: DynamicImage = bitmap.as_image();
        let mut png_bytes = Vec::new();
        image
            .write_to(&mut std::io::Cursor::new(&mut png_bytes), image::ImageFormat::Png)
            .map_err(|e| ExamParseError::Internal(format!("PNG encode failed for page {}: {e}", idx + 1)))?;

        debug!(
            "Rasterised page {} → {}x{} px, {} bytes",
            idx + 1,
            image.width(),
            image.height(),
            png_bytes.len()
        );

        results.push(RasterizedPage {
            page_index: idx,
            png_bytes,
            mime_type: "image/png",
        });
    }

    if results.is_empty() {
        return Err(ExamParseError::AllPagesFailed {
            total: total_pages,
            first_error: "every page failed rasterisation".to_string(),
        });
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rasterized_page_carries_png_mime() {
        let page = RasterizedPage {
            page_index: 0,
            png_bytes: vec![0x89, b'P', b'N', b'G'],
            mime_type: "image/png",
        };
        assert_eq!(page.mime_type, "image/png");
        assert_eq!(page.page_index, 0);
    }
}
