pub mod export;
mod impose;
mod layout;
mod marks;
mod options;
mod preview;
mod render;
mod stats;
mod types;
mod units;

pub use impose::{BatchOutcome, BatchUpdate, CancelHandle, RenderedPage, impose, render_page};
pub use layout::{GridPosition, InsetsPx, ResolvedLayout};
pub use options::*;
pub use preview::generate_preview;
pub use render::{RasterRenderer, RenderOptions, Renderer, load_font};
pub use stats::{BatchStatistics, calculate_statistics};
pub use types::*;
pub use units::{MM_PER_INCH, mm_to_px, px_to_mm};
