use crate::layout::{InsetsPx, ResolvedLayout};
use crate::types::*;
use crate::units::mm_to_px;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

const DEFAULT_DPI: f32 = 300.0;

/// Page layout configuration for a batch export.
///
/// Numeric fields come straight from user-typed inputs, so resolution
/// clamps instead of failing: rows/cols below 1 become 1, non-positive
/// DPI falls back to 300, and derived cell sizes are kept at least one
/// pixel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageLayout {
    pub page_size: PageSize,
    pub orientation: Orientation,
    pub dpi: f32,
    pub margins: Margins,
    /// Horizontal gap between columns
    pub h_spacing_mm: f32,
    /// Vertical gap between rows
    pub v_spacing_mm: f32,
    /// Explicit cell width in mm; derived from the grid when unset
    pub cell_width_mm: Option<f32>,
    /// Explicit cell height in mm; derived from the grid when unset
    pub cell_height_mm: Option<f32>,
    pub rows_per_page: usize,
    pub cols_per_page: usize,
    pub bleed: Insets,
    pub safe_area: Insets,
    pub marks: PrinterMarks,
    pub scaling: CellScaling,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            page_size: PageSize::A4,
            orientation: Orientation::Portrait,
            dpi: DEFAULT_DPI,
            margins: Margins::default(),
            h_spacing_mm: 5.0,
            v_spacing_mm: 5.0,
            cell_width_mm: Some(85.6),
            cell_height_mm: Some(53.98),
            rows_per_page: 4,
            cols_per_page: 2,
            bleed: Insets::default(),
            safe_area: Insets::default(),
            marks: PrinterMarks::default(),
            scaling: CellScaling::default(),
        }
    }
}

impl PageLayout {
    /// Load a layout from a JSON file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let layout = serde_json::from_slice(&bytes)
            .map_err(|e| ImposeError::Config(format!("Failed to parse layout: {}", e)))?;
        Ok(layout)
    }

    /// Save a layout to a JSON file
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ImposeError::Config(format!("Failed to serialize layout: {}", e)))?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    /// Resolve to device pixels.
    ///
    /// This is the single place the landscape swap is applied, so
    /// resolving the same layout any number of times yields the same
    /// page dimensions.
    pub fn resolve(&self) -> ResolvedLayout {
        let (page_width_mm, page_height_mm) =
            self.page_size.dimensions_with_orientation(self.orientation);
        let dpi = if self.dpi > 0.0 { self.dpi } else { DEFAULT_DPI };

        let rows = self.rows_per_page.max(1);
        let cols = self.cols_per_page.max(1);

        let page_width_px = mm_to_px(page_width_mm, dpi).max(1);
        let page_height_px = mm_to_px(page_height_mm, dpi).max(1);

        let margin_left_px = mm_to_px(self.margins.left_mm, dpi);
        let margin_right_px = mm_to_px(self.margins.right_mm, dpi);
        let margin_top_px = mm_to_px(self.margins.top_mm, dpi);
        let h_spacing_px = mm_to_px(self.h_spacing_mm, dpi);
        let v_spacing_px = mm_to_px(self.v_spacing_mm, dpi);

        let cell_width_px = match self.cell_width_mm {
            Some(mm) if mm > 0.0 => mm_to_px(mm, dpi),
            _ => derived_cell_px(
                page_width_px,
                margin_left_px + margin_right_px,
                h_spacing_px,
                cols,
            ),
        }
        .max(1);

        let cell_height_px = match self.cell_height_mm {
            Some(mm) if mm > 0.0 => mm_to_px(mm, dpi),
            _ => {
                // Bottom margin mirrors the top one for derivation
                let v_margins = margin_top_px * 2;
                derived_cell_px(page_height_px, v_margins, v_spacing_px, rows)
            }
        }
        .max(1);

        ResolvedLayout {
            page_width_px,
            page_height_px,
            page_width_mm,
            page_height_mm,
            dpi,
            rows,
            cols,
            cell_width_px,
            cell_height_px,
            margin_left_px,
            margin_top_px,
            h_spacing_px,
            v_spacing_px,
            bleed_px: insets_px(&self.bleed, dpi),
            safe_area_px: insets_px(&self.safe_area, dpi),
            marks: self.marks,
            scaling: self.scaling,
        }
    }
}

/// `(page − margins − spacing×(n−1)) / n`, floored at one pixel.
fn derived_cell_px(page_px: u32, margins_px: u32, spacing_px: u32, n: usize) -> u32 {
    let n = n as u32;
    let used = margins_px + spacing_px * (n - 1);
    let available = page_px.saturating_sub(used);
    (available / n).max(1)
}

fn insets_px(insets: &Insets, dpi: f32) -> InsetsPx {
    InsetsPx {
        top: mm_to_px(insets.top_mm, dpi),
        right: mm_to_px(insets.right_mm, dpi),
        bottom: mm_to_px(insets.bottom_mm, dpi),
        left: mm_to_px(insets.left_mm, dpi),
    }
}

/// Named layout presets persisted as one JSON map.
///
/// No schema versioning: a layout saved by an older build loads with the
/// missing fields at their defaults, which the user can re-enter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PresetStore {
    presets: BTreeMap<String, PageLayout>,
}

impl PresetStore {
    /// Load the store, treating a missing file as empty
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        match tokio::fs::read(path.as_ref()).await {
            Ok(bytes) => {
                let store = serde_json::from_slice(&bytes)
                    .map_err(|e| ImposeError::Config(format!("Failed to parse presets: {}", e)))?;
                Ok(store)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ImposeError::Config(format!("Failed to serialize presets: {}", e)))?;
        tokio::fs::write(path.as_ref(), json).await?;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&PageLayout> {
        self.presets.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, layout: PageLayout) {
        self.presets.insert(name.into(), layout);
    }

    pub fn remove(&mut self, name: &str) -> Option<PageLayout> {
        self.presets.remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.presets.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landscape_swap_applies_exactly_once() {
        let layout = PageLayout {
            page_size: PageSize::A4,
            orientation: Orientation::Landscape,
            ..Default::default()
        };

        let first = layout.resolve();
        let second = layout.resolve();
        let third = layout.resolve();

        assert_eq!(first.page_width_mm, 297.0);
        assert_eq!(first.page_height_mm, 210.0);
        assert_eq!(first, second);
        assert_eq!(second, third);
    }

    #[test]
    fn test_degenerate_grid_clamps_to_one() {
        let layout = PageLayout {
            rows_per_page: 0,
            cols_per_page: 0,
            ..Default::default()
        };
        let resolved = layout.resolve();
        assert_eq!(resolved.rows, 1);
        assert_eq!(resolved.cols, 1);
        assert!(resolved.capacity() >= 1);
    }

    #[test]
    fn test_custom_page_size_is_clamped() {
        let layout = PageLayout {
            page_size: PageSize::Custom {
                width_mm: 0.0,
                height_mm: 99999.0,
            },
            ..Default::default()
        };
        let resolved = layout.resolve();
        assert_eq!(resolved.page_width_mm, MIN_PAGE_MM);
        assert_eq!(resolved.page_height_mm, MAX_PAGE_MM);
    }

    #[test]
    fn test_derived_cell_size() {
        // 100 mm page, 10 mm margins both sides, 2 cols, 5 mm spacing:
        // (100 - 20 - 5) / 2 = 37.5 mm per cell
        let layout = PageLayout {
            page_size: PageSize::Custom {
                width_mm: 100.0,
                height_mm: 100.0,
            },
            dpi: 254.0, // 10 px per mm
            margins: Margins::uniform(10.0),
            h_spacing_mm: 5.0,
            v_spacing_mm: 5.0,
            cell_width_mm: None,
            cell_height_mm: None,
            rows_per_page: 2,
            cols_per_page: 2,
            ..Default::default()
        };
        let resolved = layout.resolve();
        assert_eq!(resolved.cell_width_px, 375);
        assert_eq!(resolved.cell_height_px, 375);
    }

    #[test]
    fn test_zero_dpi_falls_back() {
        let layout = PageLayout {
            dpi: 0.0,
            ..Default::default()
        };
        assert_eq!(layout.resolve().dpi, DEFAULT_DPI);
    }

    #[tokio::test]
    async fn test_layout_save_and_load() {
        let mut layout = PageLayout::default();
        layout.orientation = Orientation::Landscape;
        layout.rows_per_page = 5;
        layout.marks.crop_marks = true;

        let file = tempfile::NamedTempFile::new().unwrap();
        layout.save(file.path()).await.unwrap();
        let loaded = PageLayout::load(file.path()).await.unwrap();
        assert_eq!(loaded, layout);
    }

    #[tokio::test]
    async fn test_preset_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("presets.json");

        let mut store = PresetStore::load(&path).await.unwrap();
        assert_eq!(store.names().count(), 0);

        store.insert("badge-sheet", PageLayout::default());
        store.save(&path).await.unwrap();

        let loaded = PresetStore::load(&path).await.unwrap();
        assert_eq!(loaded.get("badge-sheet"), Some(&PageLayout::default()));
        assert_eq!(loaded.names().collect::<Vec<_>>(), vec!["badge-sheet"]);
    }

    #[tokio::test]
    async fn test_partial_preset_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("presets.json");
        tokio::fs::write(
            &path,
            r#"{"presets": {"old": {"dpi": 150.0, "rows_per_page": 3}}}"#,
        )
        .await
        .unwrap();

        let store = PresetStore::load(&path).await.unwrap();
        let old = store.get("old").unwrap();
        assert_eq!(old.dpi, 150.0);
        assert_eq!(old.rows_per_page, 3);
        // Everything absent from the stored blob keeps its default
        assert_eq!(old.cols_per_page, PageLayout::default().cols_per_page);
        assert_eq!(old.page_size, PageSize::A4);
    }
}
