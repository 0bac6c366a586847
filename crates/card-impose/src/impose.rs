//! Batch imposition: filled instances tiled onto print sheets.
//!
//! The batch is an explicit sequential loop: every row's rasterization
//! is fully awaited before the next one starts, because all rows share
//! one scratch surface. Output pages come out in strict row order no
//! matter how long individual image fetches take.

use crate::layout::ResolvedLayout;
use crate::marks::draw_marks;
use crate::options::PageLayout;
use crate::render::Renderer;
use crate::types::{CellScaling, ImposeError, Result};
use card_template::{DataRow, TemplateDocument, fill};
use image::{Rgba, RgbaImage, imageops};
use log::info;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// One finished print sheet.
pub struct RenderedPage {
    /// 0-based page index within the batch
    pub index: usize,
    pub image: RgbaImage,
}

/// Progress updates emitted while a batch runs.
#[derive(Debug, Clone)]
pub enum BatchUpdate {
    Started { rows: usize, pages: usize },
    RowRendered { row_index: usize },
    PageComplete { page_index: usize },
    Finished { pages: usize, warnings: usize },
}

/// Shared cancellation flag, checked between rows.
///
/// Cancelling stops the batch before the next row starts; pages already
/// produced stay valid and no partial row is emitted.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Result of a completed batch.
pub struct BatchOutcome {
    pub pages: Vec<RenderedPage>,
    /// Non-fatal per-row issues (broken image sources), surfaced once
    /// after the batch instead of interrupting it
    pub warnings: Vec<String>,
}

/// Impose every data row onto print sheets.
///
/// Zero rows produce zero pages. The template is filled per row but the
/// caller's copy is never modified.
pub async fn impose<R: Renderer>(
    template: &TemplateDocument,
    rows: &[DataRow],
    page_layout: &PageLayout,
    renderer: &mut R,
    cancel: &CancelHandle,
    mut on_update: impl FnMut(BatchUpdate),
) -> Result<BatchOutcome> {
    let layout = page_layout.resolve();
    let page_count = layout.page_count(rows.len());

    info!("imposing {} rows onto {} pages", rows.len(), page_count);
    on_update(BatchUpdate::Started {
        rows: rows.len(),
        pages: page_count,
    });

    let mut pages = Vec::with_capacity(page_count);
    for page_index in 0..page_count {
        let page =
            render_page_inner(template, rows, &layout, renderer, page_index, cancel, &mut on_update)
                .await?;
        on_update(BatchUpdate::PageComplete { page_index });
        pages.push(page);
    }

    let warnings = renderer.take_warnings();
    on_update(BatchUpdate::Finished {
        pages: pages.len(),
        warnings: warnings.len(),
    });

    Ok(BatchOutcome { pages, warnings })
}

/// Render a single page of the batch.
///
/// Pure function of (template, rows, layout, page_index) apart from
/// renderer warnings, so a page sequence can be recomputed or resumed
/// from any index and yields the same sheets.
pub async fn render_page<R: Renderer>(
    template: &TemplateDocument,
    rows: &[DataRow],
    layout: &ResolvedLayout,
    renderer: &mut R,
    page_index: usize,
) -> Result<RenderedPage> {
    render_page_inner(
        template,
        rows,
        layout,
        renderer,
        page_index,
        &CancelHandle::new(),
        &mut |_| {},
    )
    .await
}

async fn render_page_inner<R: Renderer>(
    template: &TemplateDocument,
    rows: &[DataRow],
    layout: &ResolvedLayout,
    renderer: &mut R,
    page_index: usize,
    cancel: &CancelHandle,
    on_update: &mut dyn FnMut(BatchUpdate),
) -> Result<RenderedPage> {
    let mut page = RgbaImage::from_pixel(
        layout.page_width_px,
        layout.page_height_px,
        Rgba([255, 255, 255, 255]),
    );

    for i in layout.rows_on_page(rows.len(), page_index) {
        if cancel.is_cancelled() {
            return Err(ImposeError::Cancelled);
        }

        let filled = fill(template, &rows[i]);
        renderer.load(&filled);

        let raster = match layout.scaling {
            CellScaling::Stretch => {
                renderer
                    .rasterize(layout.cell_width_px, layout.cell_height_px)
                    .await?
            }
            CellScaling::Fit => {
                let (w, h) = fit_dimensions(
                    template.width,
                    template.height,
                    layout.cell_width_px,
                    layout.cell_height_px,
                );
                renderer.rasterize(w, h).await?
            }
        };

        let (_, pos) = layout.position_of(i);
        let (cell_x, cell_y) = layout.cell_origin(pos);
        // Centering is a no-op for stretch; fit rasters sit mid-cell
        let offset_x = (layout.cell_width_px.saturating_sub(raster.width())) / 2;
        let offset_y = (layout.cell_height_px.saturating_sub(raster.height())) / 2;
        imageops::overlay(
            &mut page,
            &raster,
            (cell_x + offset_x) as i64,
            (cell_y + offset_y) as i64,
        );

        on_update(BatchUpdate::RowRendered { row_index: i });
    }

    draw_marks(&mut page, layout);

    Ok(RenderedPage {
        index: page_index,
        image: page,
    })
}

/// Largest size preserving the template aspect ratio within the cell.
fn fit_dimensions(doc_w: f32, doc_h: f32, cell_w: u32, cell_h: u32) -> (u32, u32) {
    if doc_w <= 0.0 || doc_h <= 0.0 {
        return (cell_w, cell_h);
    }
    let scale = (cell_w as f32 / doc_w).min(cell_h as f32 / doc_h);
    let w = ((doc_w * scale).round() as u32).clamp(1, cell_w);
    let h = ((doc_h * scale).round() as u32).clamp(1, cell_h);
    (w, h)
}
