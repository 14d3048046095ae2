//! Paginated document access.
//!
//! The index pipeline only needs three things from a document: how many
//! pages it has, the embedded text of a page, and a rendered bitmap of a
//! page for the vision fallback. Those are the [`PageSource`] trait;
//! [`DocumentOpener`] turns raw bytes into a `PageSource`.
//!
//! [`LopdfOpener`] is the default. It parses the document once with
//! `lopdf` and extracts every page's text up front, keeping per-page
//! failures so they surface when that page is requested. Rendering needs
//! pdfium (`--features pdfium`); without it `render_page` returns an error.

use anyhow::{anyhow, Result};
use std::sync::Arc;

/// A loaded paginated document. Page indices are 0-based.
pub trait PageSource: Send + Sync {
    fn page_count(&self) -> usize;

    /// Embedded text of one page.
    fn page_text(&self, index: usize) -> Result<String>;

    /// PNG rendering of one page at `scale` times its natural size.
    fn render_page(&self, index: usize, scale: f32) -> Result<Vec<u8>>;
}

/// Opens a document from its full byte content.
pub trait DocumentOpener: Send + Sync {
    fn open(&self, bytes: Arc<[u8]>) -> Result<Box<dyn PageSource>>;
}

// ============ lopdf ============

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfOpener;

impl DocumentOpener for LopdfOpener {
    fn open(&self, bytes: Arc<[u8]>) -> Result<Box<dyn PageSource>> {
        let document =
            lopdf::Document::load_mem(&bytes).map_err(|e| anyhow!("cannot open PDF: {}", e))?;

        let pages = document
            .get_pages()
            .keys()
            .map(|&number| {
                document
                    .extract_text(&[number])
                    .map_err(|e| format!("text extraction failed on page {}: {}", number, e))
            })
            .collect();

        Ok(Box::new(LopdfDocument { bytes, pages }))
    }
}

struct LopdfDocument {
    #[cfg_attr(not(feature = "pdfium"), allow(dead_code))]
    bytes: Arc<[u8]>,
    pages: Vec<std::result::Result<String, String>>,
}

impl PageSource for LopdfDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_text(&self, index: usize) -> Result<String> {
        match self.pages.get(index) {
            Some(Ok(text)) => Ok(text.clone()),
            Some(Err(e)) => Err(anyhow!("{}", e)),
            None => Err(anyhow!(
                "page index {} out of range [0, {})",
                index,
                self.pages.len()
            )),
        }
    }

    #[cfg(feature = "pdfium")]
    fn render_page(&self, index: usize, scale: f32) -> Result<Vec<u8>> {
        render_with_pdfium(&self.bytes, index, scale)
    }

    #[cfg(not(feature = "pdfium"))]
    fn render_page(&self, _index: usize, _scale: f32) -> Result<Vec<u8>> {
        Err(anyhow!(
            "page rendering requires the `pdfium` feature"
        ))
    }
}

#[cfg(feature = "pdfium")]
fn render_with_pdfium(bytes: &[u8], index: usize, scale: f32) -> Result<Vec<u8>> {
    use pdfium_render::prelude::*;

    let page_index = PdfPageIndex::try_from(index)
        .map_err(|_| anyhow!("page index {} exceeds pdfium's page range", index))?;
    let bindings = Pdfium::bind_to_system_library()
        .map_err(|e| anyhow!("pdfium library not available: {:?}", e))?;
    let pdfium = Pdfium::new(bindings);
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| anyhow!("pdfium cannot open document: {:?}", e))?;
    let page = document
        .pages()
        .get(page_index)
        .map_err(|e| anyhow!("pdfium cannot load page {}: {:?}", index, e))?;
    let bitmap = page
        .render_with_config(&PdfRenderConfig::new().scale_page_by_factor(scale))
        .map_err(|e| anyhow!("pdfium render failed: {:?}", e))?;

    let mut png = Vec::new();
    bitmap
        .as_image()
        .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)?;
    Ok(png)
}
