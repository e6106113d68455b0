//! Fragmap - per-round combat statistics composited onto game map images
//!
//! Reads a CSV of per-round stats, aggregates them into a fixed 10x10 grid
//! per map region, and renders the grid as a color-mapped overlay on the
//! map image with a colorbar legend and title.

pub mod colors;
pub mod error;
pub mod grid;
pub mod pipeline;
pub mod render;
pub mod rounds;

// Re-export commonly used types for convenience
pub use colors::{
    ColorScale, ControlPoint, OVERLAY_ALPHA, ScaleBounds, cell_color, differential_scale,
    engagement_scale,
};
pub use error::{HeatmapError, Result};
pub use grid::{AggregatedGrids, ClampPolicy, GRID_SIZE, IngestMode, StatGrid, aggregate};
pub use pipeline::{
    DEFAULT_FONT_FILE, RunArtifacts, RunConfig, StatKind, run, sanitize_match_label,
};
pub use render::{
    DEFAULT_OUTPUT_LONG_EDGE, LegendSpec, MapImage, RenderOptions, Style, compose, load_font,
    load_map,
};
pub use rounds::{RoundRecord, leading_count, leading_signed, load_rounds, parse_coordinate};
