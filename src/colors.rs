//! Piecewise-linear color scales and value normalization

use image::Rgba;

use crate::grid::StatGrid;

/// Overlay opacity for cells that hold data; "no data" cells stay fully
/// transparent.
pub const OVERLAY_ALPHA: f32 = 0.8;

/// One control point of a color scale.
#[derive(Clone, Copy, Debug)]
pub struct ControlPoint {
    /// Position along the scale, 0.0 to 1.0.
    pub position: f32,
    pub color: [u8; 3],
}

/// Ordered control points defining a piecewise-linear RGB gradient.
#[derive(Clone, Debug)]
pub struct ColorScale {
    points: Vec<ControlPoint>,
}

impl ColorScale {
    /// Build a scale from (position, rgb) pairs.
    ///
    /// Points must be ordered by position, starting at 0.0 and ending
    /// at 1.0.
    pub fn new(points: &[(f32, [u8; 3])]) -> Self {
        let points = points
            .iter()
            .map(|&(position, color)| ControlPoint { position, color })
            .collect();
        Self { points }
    }

    /// Sample the gradient at t, clamped to [0,1].
    pub fn sample(&self, t: f32) -> [u8; 3] {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };

        for pair in self.points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if t <= b.position {
                let span = b.position - a.position;
                let f = if span <= f32::EPSILON {
                    0.0
                } else {
                    (t - a.position) / span
                };
                return [
                    lerp_channel(a.color[0], b.color[0], f),
                    lerp_channel(a.color[1], b.color[1], f),
                    lerp_channel(a.color[2], b.color[2], f),
                ];
            }
        }

        self.points.last().map(|p| p.color).unwrap_or([0, 0, 0])
    }
}

fn lerp_channel(a: u8, b: u8, f: f32) -> u8 {
    (a as f32 + (b as f32 - a as f32) * f).round() as u8
}

/// Diverging red-white-green scale for kill differential.
pub fn differential_scale() -> ColorScale {
    ColorScale::new(&[
        (0.0, [0x8b, 0x00, 0x00]),
        (0.25, [0xff, 0x99, 0x99]),
        (0.5, [0xff, 0xff, 0xff]),
        (0.75, [0x66, 0xff, 0x66]),
        (1.0, [0x00, 0x64, 0x00]),
    ])
}

/// Sequential light-red to dark-red scale for engagement density.
pub fn engagement_scale() -> ColorScale {
    ColorScale::new(&[(0.0, [0xff, 0xe6, 0xe6]), (1.0, [0x8b, 0x00, 0x00])])
}

/// (min, max) normalization range for a statistic.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScaleBounds {
    pub min: f32,
    pub max: f32,
}

impl ScaleBounds {
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Fixed differential bounds, independent of the data.
    pub fn differential() -> Self {
        Self::new(-3.0, 3.0)
    }

    /// Engagement bounds from the grid's largest finite value; an all
    /// "no data" grid falls back to a max of 1.
    pub fn engagement(grid: &StatGrid) -> Self {
        Self::new(0.0, grid.max_finite().unwrap_or(1.0))
    }

    /// Normalize a value into [0,1] over (min, max); a degenerate range
    /// maps everything to 0.
    pub fn normalize(&self, value: f32) -> f32 {
        let span = self.max - self.min;
        if span.abs() <= f32::EPSILON {
            return 0.0;
        }
        ((value - self.min) / span).clamp(0.0, 1.0)
    }
}

/// Map one grid cell value to its RGBA overlay color.
pub fn cell_color(value: f32, scale: &ColorScale, bounds: ScaleBounds) -> Rgba<u8> {
    if value.is_nan() {
        return Rgba([0, 0, 0, 0]);
    }
    let [r, g, b] = scale.sample(bounds.normalize(value));
    Rgba([r, g, b, (OVERLAY_ALPHA * 255.0).round() as u8])
}
