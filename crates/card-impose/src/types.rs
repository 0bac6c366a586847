use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImposeError {
    #[error("Template error: {0}")]
    Template(#[from] card_template::TemplateError),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Font error: {0}")]
    Font(String),
    #[error("PDF error: {0}")]
    Pdf(String),
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Image source error: {0}")]
    ImageSource(String),
    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
    #[error("Batch cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, ImposeError>;

/// Page orientation
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Orientation {
    /// Portrait: height > width (default for most page sizes)
    #[default]
    Portrait,
    /// Landscape: width > height
    Landscape,
}

/// Standard page sizes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PageSize {
    A4,
    Letter,
    Legal,
    Tabloid,
    /// ID-1 / CR80 card blank
    IdCard,
    Custom { width_mm: f32, height_mm: f32 },
}

/// Sane bounds for user-entered custom page dimensions.
pub const MIN_PAGE_MM: f32 = 1.0;
pub const MAX_PAGE_MM: f32 = 3000.0;

impl PageSize {
    /// Get base dimensions in mm (portrait for standard sizes).
    /// Custom values are clamped to 1–3000 mm.
    pub fn dimensions_mm(self) -> (f32, f32) {
        match self {
            PageSize::A4 => (210.0, 297.0),
            PageSize::Letter => (215.9, 279.4),
            PageSize::Legal => (215.9, 355.6),
            PageSize::Tabloid => (279.4, 431.8),
            PageSize::IdCard => (85.6, 53.98),
            PageSize::Custom {
                width_mm,
                height_mm,
            } => (
                width_mm.clamp(MIN_PAGE_MM, MAX_PAGE_MM),
                height_mm.clamp(MIN_PAGE_MM, MAX_PAGE_MM),
            ),
        }
    }

    /// Get dimensions with orientation applied
    pub fn dimensions_with_orientation(self, orientation: Orientation) -> (f32, f32) {
        let (w, h) = self.dimensions_mm();
        match orientation {
            Orientation::Portrait => (w, h),
            Orientation::Landscape => (h, w),
        }
    }
}

/// How a filled instance is scaled into its grid cell
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum CellScaling {
    /// Fill the cell box exactly, ignoring aspect ratio (default)
    #[default]
    Stretch,
    /// Preserve aspect ratio, centered in the cell
    Fit,
}

/// Page margins. The bottom margin is derived from the grid, matching
/// the layout panel's top/left/right inputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub top_mm: f32,
    pub right_mm: f32,
    pub left_mm: f32,
}

impl Default for Margins {
    fn default() -> Self {
        Self {
            top_mm: 10.0,
            right_mm: 10.0,
            left_mm: 10.0,
        }
    }
}

impl Margins {
    /// Create uniform margins
    pub fn uniform(margin_mm: f32) -> Self {
        Self {
            top_mm: margin_mm,
            right_mm: margin_mm,
            left_mm: margin_mm,
        }
    }
}

/// Per-side insets in mm, used for bleed and safe areas
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Insets {
    pub top_mm: f32,
    pub right_mm: f32,
    pub bottom_mm: f32,
    pub left_mm: f32,
}

impl Insets {
    /// Create uniform insets on all sides
    pub fn uniform(inset_mm: f32) -> Self {
        Self {
            top_mm: inset_mm,
            right_mm: inset_mm,
            bottom_mm: inset_mm,
            left_mm: inset_mm,
        }
    }
}

/// Printer's marks options
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PrinterMarks {
    /// Add crop marks at the four page corners, offset by the bleed inset
    pub crop_marks: bool,
    /// Add a registration mark (crosshair + circle)
    pub registration_marks: bool,
    /// Registration mark center in mm from the page origin; page center
    /// when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_point_mm: Option<(f32, f32)>,
}
