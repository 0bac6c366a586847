//! Printer's marks drawn onto rendered pages.
//!
//! Crop marks are L-shaped pairs at the four page corners, pulled inward
//! by the bleed inset; the registration mark is a crosshair with a
//! circle. Everything is drawn directly onto the page raster.

use crate::layout::{GridPosition, ResolvedLayout};
use crate::units::mm_to_px;
use image::{Rgba, RgbaImage};

/// Length of crop marks in mm
const CROP_MARK_LENGTH_MM: f32 = 5.0;

/// Gap between crop mark and the trim corner
const CROP_MARK_GAP_MM: f32 = 1.0;

/// Radius of the registration mark circle
const REGISTRATION_RADIUS_MM: f32 = 2.5;

/// Half-length of the registration crosshair arms
const REGISTRATION_ARM_MM: f32 = 3.5;

/// Stroke width of all marks
const MARK_WIDTH_MM: f32 = 0.15;

const MARK_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Draw all enabled marks for this layout onto a finished page raster.
pub fn draw_marks(page: &mut RgbaImage, layout: &ResolvedLayout) {
    if layout.marks.crop_marks {
        draw_crop_marks(page, layout);
    }
    if layout.marks.registration_marks {
        draw_registration_mark(page, layout);
    }
}

/// Crop marks at the four page corners, offset inward by the bleed inset.
fn draw_crop_marks(page: &mut RgbaImage, layout: &ResolvedLayout) {
    let dpi = layout.dpi;
    let len = mm_to_px(CROP_MARK_LENGTH_MM, dpi).max(1) as i64;
    let gap = mm_to_px(CROP_MARK_GAP_MM, dpi) as i64;
    let width = mm_to_px(MARK_WIDTH_MM, dpi).max(1) as i64;

    let w = layout.page_width_px as i64;
    let h = layout.page_height_px as i64;
    let bleed = &layout.bleed_px;

    // Trim corners after cutting away the bleed
    let left = bleed.left as i64;
    let right = w - bleed.right as i64;
    let top = bleed.top as i64;
    let bottom = h - bleed.bottom as i64;

    // Ticks run inward along the trim lines so they stay on the raster
    // even with zero bleed.
    for (corner_x, corner_y, dx, dy) in [
        (left, top, 1i64, 1i64),
        (right, top, -1, 1),
        (left, bottom, 1, -1),
        (right, bottom, -1, -1),
    ] {
        // Horizontal tick along the top/bottom trim line
        fill_rect(
            page,
            corner_x + dx * gap,
            corner_y - width / 2,
            corner_x + dx * (gap + len),
            corner_y + width / 2 + width % 2,
        );
        // Vertical tick along the left/right trim line
        fill_rect(
            page,
            corner_x - width / 2,
            corner_y + dy * gap,
            corner_x + width / 2 + width % 2,
            corner_y + dy * (gap + len),
        );
    }
}

/// Crosshair plus circle at the configured point (page center by default).
fn draw_registration_mark(page: &mut RgbaImage, layout: &ResolvedLayout) {
    let dpi = layout.dpi;
    let (cx, cy) = match layout.marks.registration_point_mm {
        Some((x_mm, y_mm)) => (mm_to_px(x_mm, dpi) as i64, mm_to_px(y_mm, dpi) as i64),
        None => (
            layout.page_width_px as i64 / 2,
            layout.page_height_px as i64 / 2,
        ),
    };

    let arm = mm_to_px(REGISTRATION_ARM_MM, dpi).max(1) as i64;
    let radius = mm_to_px(REGISTRATION_RADIUS_MM, dpi).max(1) as i64;
    let width = mm_to_px(MARK_WIDTH_MM, dpi).max(1) as i64;

    // Crosshair
    fill_rect(page, cx - arm, cy - width / 2, cx + arm, cy + width / 2 + width % 2);
    fill_rect(page, cx - width / 2, cy - arm, cx + width / 2 + width % 2, cy + arm);

    // Circle outline: band test between inner and outer radius
    let inner = (radius - width).max(0);
    let inner_sq = inner * inner;
    let outer_sq = radius * radius;
    for y in (cy - radius)..=(cy + radius) {
        for x in (cx - radius)..=(cx + radius) {
            let dx = x - cx;
            let dy = y - cy;
            let d_sq = dx * dx + dy * dy;
            if d_sq <= outer_sq && d_sq >= inner_sq {
                put_pixel(page, x, y);
            }
        }
    }
}

const GUIDE_COLOR: Rgba<u8> = Rgba([180, 180, 180, 255]);

/// Outline each cell's safe area for preview display. Content inside
/// these boxes is guaranteed not to be trimmed.
pub fn draw_safe_area_guides(page: &mut RgbaImage, layout: &ResolvedLayout) {
    let safe = &layout.safe_area_px;
    if safe.top == 0 && safe.right == 0 && safe.bottom == 0 && safe.left == 0 {
        return;
    }

    for row in 0..layout.rows {
        for col in 0..layout.cols {
            let (cell_x, cell_y) = layout.cell_origin(GridPosition::new(row, col));
            let x0 = cell_x as i64 + safe.left as i64;
            let y0 = cell_y as i64 + safe.top as i64;
            let x1 = (cell_x + layout.cell_width_px) as i64 - safe.right as i64;
            let y1 = (cell_y + layout.cell_height_px) as i64 - safe.bottom as i64;
            if x1 <= x0 || y1 <= y0 {
                continue;
            }
            outline_rect(page, x0, y0, x1, y1);
        }
    }
}

/// One-pixel rectangle outline.
fn outline_rect(page: &mut RgbaImage, x0: i64, y0: i64, x1: i64, y1: i64) {
    for x in x0..=x1 {
        put_guide_pixel(page, x, y0);
        put_guide_pixel(page, x, y1);
    }
    for y in y0..=y1 {
        put_guide_pixel(page, x0, y);
        put_guide_pixel(page, x1, y);
    }
}

fn put_guide_pixel(page: &mut RgbaImage, x: i64, y: i64) {
    if x >= 0 && y >= 0 && (x as u32) < page.width() && (y as u32) < page.height() {
        page.put_pixel(x as u32, y as u32, GUIDE_COLOR);
    }
}

/// Fill the rectangle spanned by two corners, clipped to the image.
fn fill_rect(page: &mut RgbaImage, x0: i64, y0: i64, x1: i64, y1: i64) {
    let (x0, x1) = (x0.min(x1), x0.max(x1));
    let (y0, y1) = (y0.min(y1), y0.max(y1));
    for y in y0..=y1 {
        for x in x0..=x1 {
            put_pixel(page, x, y);
        }
    }
}

fn put_pixel(page: &mut RgbaImage, x: i64, y: i64) {
    if x >= 0 && y >= 0 && (x as u32) < page.width() && (y as u32) < page.height() {
        page.put_pixel(x as u32, y as u32, MARK_COLOR);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::PageLayout;
    use crate::types::{PageSize, PrinterMarks};

    fn small_layout(marks: PrinterMarks) -> ResolvedLayout {
        PageLayout {
            page_size: PageSize::Custom {
                width_mm: 50.0,
                height_mm: 50.0,
            },
            dpi: 100.0,
            marks,
            ..Default::default()
        }
        .resolve()
    }

    fn ink_count(page: &RgbaImage) -> usize {
        page.pixels().filter(|p| p.0 != [255, 255, 255, 255]).count()
    }

    #[test]
    fn test_no_marks_draw_nothing() {
        let layout = small_layout(PrinterMarks::default());
        let mut page = RgbaImage::from_pixel(
            layout.page_width_px,
            layout.page_height_px,
            Rgba([255, 255, 255, 255]),
        );
        draw_marks(&mut page, &layout);
        assert_eq!(ink_count(&page), 0);
    }

    #[test]
    fn test_crop_marks_touch_all_corners() {
        let layout = small_layout(PrinterMarks {
            crop_marks: true,
            ..Default::default()
        });
        let mut page = RgbaImage::from_pixel(
            layout.page_width_px,
            layout.page_height_px,
            Rgba([255, 255, 255, 255]),
        );
        draw_marks(&mut page, &layout);
        assert!(ink_count(&page) > 0);

        // Some ink in each quadrant corner region
        let w = page.width();
        let h = page.height();
        let region_has_ink = |x0: u32, y0: u32| {
            (y0..(y0 + h / 4))
                .any(|y| (x0..(x0 + w / 4)).any(|x| page.get_pixel(x, y).0 != [255, 255, 255, 255]))
        };
        assert!(region_has_ink(0, 0));
        assert!(region_has_ink(3 * w / 4, 0));
        assert!(region_has_ink(0, 3 * h / 4));
        assert!(region_has_ink(3 * w / 4, 3 * h / 4));
    }

    #[test]
    fn test_registration_mark_at_center() {
        let layout = small_layout(PrinterMarks {
            registration_marks: true,
            ..Default::default()
        });
        let mut page = RgbaImage::from_pixel(
            layout.page_width_px,
            layout.page_height_px,
            Rgba([255, 255, 255, 255]),
        );
        draw_marks(&mut page, &layout);

        let cx = page.width() / 2;
        let cy = page.height() / 2;
        assert_eq!(page.get_pixel(cx, cy).0, [0, 0, 0, 255]);
    }
}
