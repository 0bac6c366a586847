//! Single-instance rasterization.
//!
//! The batch pipeline only sees the [`Renderer`] trait; the drawing
//! stack stays behind it. [`RasterRenderer`] is the built-in backend: it
//! owns one scratch surface that is cleared and reused for every row, so
//! memory stays flat across a multi-hundred-row batch.

use crate::types::{ImposeError, Result};
use ab_glyph::{Font, FontArc, ScaleFont};
use card_template::{Color, DocObject, ObjectKind, ShapeKind, TemplateDocument, TextAlign};
use image::imageops::FilterType;
use image::{Rgba, RgbaImage, imageops};
use log::warn;
use spleen_font::{FONT_12X24, PSF2Font};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Narrow interface over a rendering surface.
///
/// One document is loaded at a time; `rasterize` draws it at the target
/// pixel size and extracts the buffer. The surface belongs exclusively
/// to the in-flight rasterization; callers must fully await one call
/// before issuing the next.
pub trait Renderer {
    /// Replace the loaded document. The caller's copy is never touched.
    fn load(&mut self, document: &TemplateDocument);

    /// Draw the loaded document at `width_px × height_px` and return the
    /// pixel buffer.
    async fn rasterize(&mut self, width_px: u32, height_px: u32) -> Result<RgbaImage>;

    /// Release the scratch surface and any cached resources.
    fn dispose(&mut self);

    /// Drain non-fatal warnings collected since the last call.
    fn take_warnings(&mut self) -> Vec<String> {
        Vec::new()
    }
}

/// Configuration for [`RasterRenderer`].
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// TTF/OTF font used for text objects; a built-in bitmap font is the
    /// fallback when unset.
    pub font: Option<FontArc>,
    /// Upper bound on fetching one remote image source. A dead URL
    /// renders as a blank slot instead of stalling the batch.
    pub image_timeout: Duration,
    /// Base directory for relative file image sources.
    pub base_dir: Option<PathBuf>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            font: None,
            image_timeout: Duration::from_secs(10),
            base_dir: None,
        }
    }
}

/// Load a TTF/OTF font for [`RenderOptions::font`].
pub async fn load_font(path: impl AsRef<Path>) -> Result<FontArc> {
    let bytes = tokio::fs::read(path.as_ref()).await?;
    FontArc::try_from_vec(bytes).map_err(|e| ImposeError::Font(e.to_string()))
}

/// Raster backend drawing onto an `image` buffer.
pub struct RasterRenderer {
    options: RenderOptions,
    http: reqwest::Client,
    document: Option<TemplateDocument>,
    surface: Option<RgbaImage>,
    /// Decoded images keyed by source; `None` marks a known-bad source
    /// so it is only fetched once per batch.
    image_cache: HashMap<String, Option<RgbaImage>>,
    warnings: Vec<String>,
}

impl RasterRenderer {
    pub fn new(options: RenderOptions) -> Self {
        Self {
            options,
            http: reqwest::Client::new(),
            document: None,
            surface: None,
            image_cache: HashMap::new(),
            warnings: Vec::new(),
        }
    }

    /// Resolve and decode every concrete image source in the document,
    /// caching results (including failures) for the rest of the batch.
    async fn prefetch_images(&mut self, document: &TemplateDocument) {
        let mut sources = Vec::new();
        collect_image_sources(&document.objects, &mut sources);

        for src in sources {
            // Unresolved placeholder tokens are expected for rows with no
            // value; they render as empty slots without a warning.
            if src.is_empty() || src.contains("{{") {
                continue;
            }
            if self.image_cache.contains_key(&src) {
                continue;
            }
            let entry = match self.load_image(&src).await {
                Ok(img) => Some(img),
                Err(e) => {
                    warn!("image source '{}' failed: {}", src, e);
                    self.warnings.push(format!("image '{}': {}", src, e));
                    None
                }
            };
            self.image_cache.insert(src, entry);
        }
    }

    async fn load_image(&self, src: &str) -> Result<RgbaImage> {
        let bytes = if src.starts_with("http://") || src.starts_with("https://") {
            let response = tokio::time::timeout(self.options.image_timeout, async {
                self.http.get(src).send().await?.error_for_status()?.bytes().await
            })
            .await
            .map_err(|_| {
                ImposeError::ImageSource(format!(
                    "timed out after {:?} fetching {}",
                    self.options.image_timeout, src
                ))
            })??;
            response.to_vec()
        } else {
            let path = match &self.options.base_dir {
                Some(base) => base.join(src),
                None => PathBuf::from(src),
            };
            tokio::fs::read(path).await?
        };

        let decoded = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes)).await??;
        Ok(decoded.to_rgba8())
    }
}

impl Renderer for RasterRenderer {
    fn load(&mut self, document: &TemplateDocument) {
        self.document = Some(document.clone());
    }

    async fn rasterize(&mut self, width_px: u32, height_px: u32) -> Result<RgbaImage> {
        let document = self
            .document
            .take()
            .ok_or_else(|| ImposeError::Config("no document loaded".to_string()))?;

        self.prefetch_images(&document).await;

        let width_px = width_px.max(1);
        let height_px = height_px.max(1);

        // Reuse the scratch surface when the size matches
        let mut surface = match self.surface.take() {
            Some(s) if s.width() == width_px && s.height() == height_px => s,
            _ => RgbaImage::new(width_px, height_px),
        };

        let background = document.background.unwrap_or_else(Color::white);
        let clear = Rgba([background.r, background.g, background.b, 255]);
        for pixel in surface.pixels_mut() {
            *pixel = clear;
        }

        let sx = if document.width > 0.0 {
            width_px as f32 / document.width
        } else {
            1.0
        };
        let sy = if document.height > 0.0 {
            height_px as f32 / document.height
        } else {
            1.0
        };

        let ctx = DrawCtx {
            images: &self.image_cache,
            font: self.options.font.as_ref(),
        };
        for object in &document.objects {
            draw_object(&mut surface, object, sx, sy, &ctx);
        }

        let buffer = surface.clone();
        self.surface = Some(surface);
        self.document = Some(document);
        Ok(buffer)
    }

    fn dispose(&mut self) {
        self.document = None;
        self.surface = None;
        self.image_cache.clear();
    }

    fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }
}

fn collect_image_sources(objects: &[DocObject], out: &mut Vec<String>) {
    for object in objects {
        match &object.kind {
            ObjectKind::Image { src, .. } => out.push(src.clone()),
            ObjectKind::Group { children } => collect_image_sources(children, out),
            _ => {}
        }
    }
}

struct DrawCtx<'a> {
    images: &'a HashMap<String, Option<RgbaImage>>,
    font: Option<&'a FontArc>,
}

/// Draw one object into `surface` at its scaled position. The object is
/// rendered into its own sprite first so rotation and opacity apply
/// uniformly across object kinds.
fn draw_object(surface: &mut RgbaImage, object: &DocObject, sx: f32, sy: f32, ctx: &DrawCtx) {
    let w = (object.width * sx).round().max(1.0) as u32;
    let h = (object.height * sy).round().max(1.0) as u32;
    // Ignore degenerate boxes larger than any sane canvas
    if w > 20_000 || h > 20_000 {
        return;
    }

    let mut sprite = RgbaImage::new(w, h);
    let mut opacity = 1.0;

    match &object.kind {
        ObjectKind::Text {
            content,
            font_size,
            fill,
            align,
            ..
        } => {
            draw_text(&mut sprite, content, font_size * sy, *fill, *align, ctx.font);
        }
        ObjectKind::Image {
            src,
            opacity: image_opacity,
        } => {
            opacity = image_opacity.clamp(0.0, 1.0);
            if let Some(Some(decoded)) = ctx.images.get(src) {
                let scaled = imageops::resize(decoded, w, h, FilterType::Triangle);
                imageops::overlay(&mut sprite, &scaled, 0, 0);
            }
            // Missing or failed sources stay blank
        }
        ObjectKind::Shape {
            shape,
            fill,
            stroke,
            stroke_width,
        } => {
            let stroke_px = (stroke_width * (sx + sy) / 2.0).round().max(0.0) as u32;
            draw_shape(&mut sprite, *shape, *fill, *stroke, stroke_px);
        }
        ObjectKind::Group { children } => {
            // Children are positioned relative to the group origin and
            // share the outer scale
            for child in children {
                draw_object(&mut sprite, child, sx, sy, ctx);
            }
        }
    }

    let x = object.x * sx;
    let y = object.y * sy;
    blit(surface, &sprite, x, y, object.rotation, opacity);
}

fn draw_text(
    sprite: &mut RgbaImage,
    content: &str,
    size_px: f32,
    fill: Color,
    align: TextAlign,
    font: Option<&FontArc>,
) {
    if content.is_empty() || size_px < 1.0 {
        return;
    }
    match font {
        Some(font) => draw_text_outline(sprite, content, size_px, fill, align, font),
        None => draw_text_bitmap(sprite, content, size_px, fill, align),
    }
}

/// Anti-aliased text from glyph outlines.
fn draw_text_outline(
    sprite: &mut RgbaImage,
    content: &str,
    size_px: f32,
    fill: Color,
    align: TextAlign,
    font: &FontArc,
) {
    let scaled = font.as_scaled(size_px);

    // Layout: caret advance per glyph
    let mut glyphs = Vec::new();
    let mut caret = 0.0f32;
    for ch in content.chars() {
        let glyph_id = font.glyph_id(ch);
        glyphs.push((glyph_id, caret));
        caret += scaled.h_advance(glyph_id);
    }

    let offset_x = align_offset(align, sprite.width() as f32, caret);
    let baseline_y = scaled.ascent();

    for (glyph_id, glyph_x) in glyphs {
        let glyph =
            glyph_id.with_scale_and_position(size_px, ab_glyph::point(glyph_x + offset_x, baseline_y));
        if let Some(outlined) = font.outline_glyph(glyph) {
            let bounds = outlined.px_bounds();
            outlined.draw(|px, py, coverage| {
                let x = px as i32 + bounds.min.x as i32;
                let y = py as i32 + bounds.min.y as i32;
                if x >= 0 && y >= 0 && (x as u32) < sprite.width() && (y as u32) < sprite.height() {
                    let src = Rgba([fill.r, fill.g, fill.b, fill.a]);
                    blend_pixel(sprite.get_pixel_mut(x as u32, y as u32), src, coverage);
                }
            });
        }
    }
}

const BITMAP_GLYPH_W: usize = 12;
const BITMAP_GLYPH_H: usize = 24;

/// Built-in bitmap font fallback, nearest-neighbor scaled to the
/// requested size.
fn draw_text_bitmap(sprite: &mut RgbaImage, content: &str, size_px: f32, fill: Color, align: TextAlign) {
    let Ok(mut font) = PSF2Font::new(FONT_12X24) else {
        return;
    };

    let scale = size_px / BITMAP_GLYPH_H as f32;
    let char_w = BITMAP_GLYPH_W as f32 * scale;
    let text_width = char_w * content.chars().count() as f32;
    let offset_x = align_offset(align, sprite.width() as f32, text_width);
    let color = Rgba([fill.r, fill.g, fill.b, fill.a]);

    for (i, ch) in content.chars().enumerate() {
        let utf8 = ch.to_string();
        let Some(glyph) = font.glyph_for_utf8(utf8.as_bytes()) else {
            continue;
        };

        let mut bitmap = [[false; BITMAP_GLYPH_W]; BITMAP_GLYPH_H];
        for (row_y, row) in glyph.enumerate() {
            for (col_x, on) in row.enumerate() {
                if row_y < BITMAP_GLYPH_H && col_x < BITMAP_GLYPH_W {
                    bitmap[row_y][col_x] = on;
                }
            }
        }

        let x0 = offset_x + i as f32 * char_w;
        let out_w = char_w.ceil() as i32;
        let out_h = size_px.ceil() as i32;
        for oy in 0..out_h {
            for ox in 0..out_w {
                let src_x = (ox as f32 / scale) as usize;
                let src_y = (oy as f32 / scale) as usize;
                if src_x < BITMAP_GLYPH_W && src_y < BITMAP_GLYPH_H && bitmap[src_y][src_x] {
                    let x = x0 as i32 + ox;
                    let y = oy;
                    if x >= 0 && y >= 0 && (x as u32) < sprite.width() && (y as u32) < sprite.height()
                    {
                        sprite.put_pixel(x as u32, y as u32, color);
                    }
                }
            }
        }
    }
}

fn align_offset(align: TextAlign, box_width: f32, text_width: f32) -> f32 {
    match align {
        TextAlign::Left => 0.0,
        TextAlign::Center => (box_width - text_width) / 2.0,
        TextAlign::Right => box_width - text_width,
    }
}

fn draw_shape(
    sprite: &mut RgbaImage,
    shape: ShapeKind,
    fill: Option<Color>,
    stroke: Option<Color>,
    stroke_px: u32,
) {
    let w = sprite.width();
    let h = sprite.height();
    let fill = fill.map(|c| Rgba([c.r, c.g, c.b, c.a]));
    let stroke = stroke.filter(|_| stroke_px > 0).map(|c| Rgba([c.r, c.g, c.b, c.a]));

    match shape {
        ShapeKind::Rect => {
            for y in 0..h {
                for x in 0..w {
                    let on_border = x < stroke_px
                        || y < stroke_px
                        || x >= w.saturating_sub(stroke_px)
                        || y >= h.saturating_sub(stroke_px);
                    if on_border {
                        if let Some(c) = stroke {
                            sprite.put_pixel(x, y, c);
                            continue;
                        }
                    }
                    if let Some(c) = fill {
                        sprite.put_pixel(x, y, c);
                    }
                }
            }
        }
        ShapeKind::Ellipse => {
            let a = w as f32 / 2.0;
            let b = h as f32 / 2.0;
            let inner_a = (a - stroke_px as f32).max(0.0);
            let inner_b = (b - stroke_px as f32).max(0.0);
            for y in 0..h {
                for x in 0..w {
                    let dx = (x as f32 + 0.5 - a) / a;
                    let dy = (y as f32 + 0.5 - b) / b;
                    let outer = dx * dx + dy * dy <= 1.0;
                    if !outer {
                        continue;
                    }
                    let inside_inner = if inner_a > 0.0 && inner_b > 0.0 {
                        let ix = (x as f32 + 0.5 - a) / inner_a;
                        let iy = (y as f32 + 0.5 - b) / inner_b;
                        ix * ix + iy * iy <= 1.0
                    } else {
                        false
                    };
                    if !inside_inner {
                        if let Some(c) = stroke {
                            sprite.put_pixel(x, y, c);
                            continue;
                        }
                    }
                    if inside_inner || stroke.is_none() {
                        if let Some(c) = fill {
                            sprite.put_pixel(x, y, c);
                        }
                    }
                }
            }
        }
    }
}

/// Composite `sprite` onto `surface` at (x, y), rotated about the sprite
/// center, with a global alpha multiplier.
fn blit(surface: &mut RgbaImage, sprite: &RgbaImage, x: f32, y: f32, rotation_deg: f32, alpha: f32) {
    if alpha <= 0.0 {
        return;
    }
    let rotation = rotation_deg.rem_euclid(360.0);

    if rotation == 0.0 {
        let ox = x.round() as i64;
        let oy = y.round() as i64;
        for (px, py, pixel) in sprite.enumerate_pixels() {
            let dx = ox + px as i64;
            let dy = oy + py as i64;
            if dx >= 0 && dy >= 0 && (dx as u32) < surface.width() && (dy as u32) < surface.height()
            {
                blend_pixel(
                    surface.get_pixel_mut(dx as u32, dy as u32),
                    *pixel,
                    alpha * pixel.0[3] as f32 / 255.0,
                );
            }
        }
        return;
    }

    // Inverse mapping over the rotated bounding box, nearest sample
    let theta = rotation.to_radians();
    let (sin, cos) = theta.sin_cos();
    let sw = sprite.width() as f32;
    let sh = sprite.height() as f32;
    let cx = x + sw / 2.0;
    let cy = y + sh / 2.0;

    let half_w = (sw * cos.abs() + sh * sin.abs()) / 2.0;
    let half_h = (sw * sin.abs() + sh * cos.abs()) / 2.0;
    let x0 = (cx - half_w).floor().max(0.0) as u32;
    let y0 = (cy - half_h).floor().max(0.0) as u32;
    let x1 = ((cx + half_w).ceil() as u32).min(surface.width());
    let y1 = ((cy + half_h).ceil() as u32).min(surface.height());

    for dy in y0..y1 {
        for dx in x0..x1 {
            let rel_x = dx as f32 + 0.5 - cx;
            let rel_y = dy as f32 + 0.5 - cy;
            // Rotate backwards into sprite space
            let src_x = rel_x * cos + rel_y * sin + sw / 2.0;
            let src_y = -rel_x * sin + rel_y * cos + sh / 2.0;
            if src_x < 0.0 || src_y < 0.0 || src_x >= sw || src_y >= sh {
                continue;
            }
            let pixel = *sprite.get_pixel(src_x as u32, src_y as u32);
            blend_pixel(
                surface.get_pixel_mut(dx, dy),
                pixel,
                alpha * pixel.0[3] as f32 / 255.0,
            );
        }
    }
}

/// Source-over blend with an explicit coverage/alpha factor.
fn blend_pixel(dst: &mut Rgba<u8>, src: Rgba<u8>, alpha: f32) {
    let alpha = alpha.clamp(0.0, 1.0);
    if alpha <= 0.0 {
        return;
    }
    for i in 0..3 {
        let d = dst.0[i] as f32;
        let s = src.0[i] as f32;
        dst.0[i] = (s * alpha + d * (1.0 - alpha)).round() as u8;
    }
    let da = dst.0[3] as f32 / 255.0;
    dst.0[3] = ((alpha + da * (1.0 - alpha)) * 255.0).round() as u8;
}
