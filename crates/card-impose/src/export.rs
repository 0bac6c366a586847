//! Export packaging: per-row images, a ZIP archive of sheets, or a PDF.

use crate::impose::{CancelHandle, RenderedPage};
use crate::layout::ResolvedLayout;
use crate::options::PageLayout;
use crate::render::Renderer;
use crate::types::{ImposeError, Result};
use card_template::{DataRow, TemplateDocument, fill};
use image::RgbaImage;
use log::info;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Pacing delay between consecutive per-row file writes so a burst of
/// artifacts does not overwhelm the host's download queue.
const DOWNLOAD_PACING: Duration = Duration::from_millis(300);

/// Output mode for a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// One image per data row
    Singles,
    /// One ZIP archive bundling the imposed sheets
    Archive,
    /// One PDF embedding each sheet at true page dimensions
    Document,
}

/// What an export produced.
#[derive(Debug, Default)]
pub struct ExportSummary {
    /// Written artifacts, in output order
    pub files: Vec<PathBuf>,
    /// Non-fatal warnings collected during rendering
    pub warnings: Vec<String>,
}

/// Encode a raster as PNG bytes.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)?;
    Ok(bytes)
}

/// Export one PNG per data row as `design_{n}.png` (1-based), written in
/// row order into `out_dir`.
pub async fn export_singles<R: Renderer>(
    template: &TemplateDocument,
    rows: &[DataRow],
    layout: &PageLayout,
    renderer: &mut R,
    cancel: &CancelHandle,
    out_dir: impl AsRef<Path>,
) -> Result<ExportSummary> {
    let resolved = layout.resolve();
    let out_dir = out_dir.as_ref();
    tokio::fs::create_dir_all(out_dir).await?;

    let mut summary = ExportSummary::default();
    for (i, row) in rows.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(ImposeError::Cancelled);
        }
        if i > 0 {
            tokio::time::sleep(DOWNLOAD_PACING).await;
        }

        let filled = fill(template, row);
        renderer.load(&filled);
        let raster = renderer
            .rasterize(resolved.cell_width_px, resolved.cell_height_px)
            .await?;

        let png = tokio::task::spawn_blocking(move || encode_png(&raster)).await??;
        let path = out_dir.join(format!("design_{}.png", i + 1));
        tokio::fs::write(&path, png).await?;
        info!("wrote {}", path.display());
        summary.files.push(path);
    }

    summary.warnings = renderer.take_warnings();
    Ok(summary)
}

/// Bundle imposed sheets as `page_{n}.png` (1-based) entries in one ZIP
/// archive at `path`.
pub async fn export_archive(pages: Vec<RenderedPage>, path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref().to_owned();
    let out = path.clone();

    tokio::task::spawn_blocking(move || {
        let file = std::fs::File::create(&path)?;
        let mut archive = zip::ZipWriter::new(file);
        let options = zip::write::FileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);

        for page in &pages {
            archive.start_file(format!("page_{}.png", page.index + 1), options)?;
            let png = encode_png(&page.image)?;
            archive.write_all(&png)?;
        }
        archive.finish()?;
        Ok::<_, ImposeError>(())
    })
    .await??;

    info!("wrote {}", out.display());
    Ok(out)
}

/// Write imposed sheets as one PDF at `path`, each page embedded at the
/// layout's true page size in mm.
pub async fn export_document(
    pages: Vec<RenderedPage>,
    layout: &ResolvedLayout,
    path: impl AsRef<Path>,
) -> Result<PathBuf> {
    let path = path.as_ref().to_owned();
    let width_mm = layout.page_width_mm;
    let height_mm = layout.page_height_mm;
    let dpi = layout.dpi;

    // PDF generation is CPU-bound, spawn blocking
    let bytes =
        tokio::task::spawn_blocking(move || build_pdf_bytes(&pages, width_mm, height_mm, dpi))
            .await??;

    tokio::fs::write(&path, bytes).await?;
    info!("wrote {}", path.display());
    Ok(path)
}

fn build_pdf_bytes(
    pages: &[RenderedPage],
    width_mm: f32,
    height_mm: f32,
    dpi: f32,
) -> Result<Vec<u8>> {
    use printpdf::*;

    let mut doc = PdfDocument::new("Card sheets");
    let mut warnings = Vec::new();
    let mut out_pages = Vec::new();

    for page in pages {
        let png = encode_png(&page.image)?;
        let raw = RawImage::decode_from_bytes(&png, &mut warnings)
            .map_err(|e| ImposeError::Pdf(e.to_string()))?;
        let image_id = doc.add_image(&raw);

        let ops = vec![Op::UseXobject {
            id: image_id.clone(),
            transform: XObjectTransform {
                dpi: Some(dpi),
                ..Default::default()
            },
        }];
        out_pages.push(PdfPage::new(Mm(width_mm), Mm(height_mm), ops));
    }

    doc.pages = out_pages;
    Ok(doc.save(&PdfSaveOptions::default(), &mut warnings))
}
