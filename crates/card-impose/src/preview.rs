use crate::impose::{RenderedPage, render_page};
use crate::marks::draw_safe_area_guides;
use crate::options::PageLayout;
use crate::render::Renderer;
use crate::types::Result;
use card_template::{DataRow, TemplateDocument};

/// Generate a preview of the batch
/// Renders only the first page, with safe-area guides overlaid;
/// `None` when there are no rows
pub async fn generate_preview<R: Renderer>(
    template: &TemplateDocument,
    rows: &[DataRow],
    layout: &PageLayout,
    renderer: &mut R,
) -> Result<Option<RenderedPage>> {
    let resolved = layout.resolve();
    if resolved.page_count(rows.len()) == 0 {
        return Ok(None);
    }
    let mut page = render_page(template, rows, &resolved, renderer, 0).await?;
    draw_safe_area_guides(&mut page.image, &resolved);
    Ok(Some(page))
}
