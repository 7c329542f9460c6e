//! Embedded-image extraction: pull raster images out of a PDF via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async
//! contexts. `tokio::task::spawn_blocking` moves the work onto a thread
//! designed for blocking operations, preventing the Tokio worker threads
//! from stalling while pdfium walks page objects.
//!
//! ## Raw vs processed images
//!
//! `get_raw_image` returns the bitmap exactly as embedded in the PDF,
//! before page transforms (rotation, scaling) are applied. That is what
//! the vision model should see: the diagram as authored, at its native
//! resolution, not resampled to its on-page display size.

use crate::error::SopError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use tracing::{debug, warn};

/// Extract every embedded raster image from a PDF, in page/object order.
///
/// Individually corrupt image objects are skipped with a WARN; they never
/// abort extraction of the remainder. An empty result is not an error
/// here — the orchestrator decides what a diagram-less PDF means.
pub async fn extract_embedded_images(pdf_bytes: Vec<u8>) -> Result<Vec<DynamicImage>, SopError> {
    tokio::task::spawn_blocking(move || extract_blocking(&pdf_bytes))
        .await
        .map_err(|e| SopError::Internal(format!("Extraction task panicked: {}", e)))?
}

/// Blocking implementation of embedded-image extraction.
fn extract_blocking(pdf_bytes: &[u8]) -> Result<Vec<DynamicImage>, SopError> {
    let pdfium = Pdfium::default();

    let document = pdfium
        .load_pdf_from_byte_slice(pdf_bytes, None)
        .map_err(|e| SopError::CorruptPdf {
            detail: format!("{:?}", e),
        })?;

    let pages = document.pages();
    debug!("PDF loaded: {} pages", pages.len());

    let mut images = Vec::new();

    for (page_index, page) in pages.iter().enumerate() {
        for (object_index, object) in page.objects().iter().enumerate() {
            let Some(image_object) = object.as_image_object() else {
                continue;
            };

            match image_object.get_raw_image() {
                Ok(image) => {
                    debug!(
                        "Extracted image {} on page {} → {}x{} px",
                        object_index,
                        page_index + 1,
                        image.width(),
                        image.height()
                    );
                    images.push(image);
                }
                Err(e) => {
                    // One unreadable image must not sink the rest.
                    warn!(
                        "Skipping corrupt image {} on page {}: {:?}",
                        object_index,
                        page_index + 1,
                        e
                    );
                }
            }
        }
    }

    debug!("Extraction complete: {} images", images.len());
    Ok(images)
}
