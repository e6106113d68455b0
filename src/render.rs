//! Map loading and figure compositing
//!
//! Renders back-to-front: styled canvas, map image, nearest-neighbor
//! upsampled cell overlay (masked by the map's alpha channel when present),
//! optional grid lines and cell labels, colorbar, title.

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::{Rgba, RgbaImage, imageops};
use imageproc::drawing::{draw_line_segment_mut, draw_text_mut, text_size};
use tracing::warn;

use crate::colors::{ColorScale, ScaleBounds, cell_color};
use crate::error::Result;
use crate::grid::{GRID_SIZE, StatGrid};

/// Long-side pixel target for composited output; keeps small map images
/// legible at print resolution (a 10in figure at 300 DPI).
pub const DEFAULT_OUTPUT_LONG_EDGE: u32 = 3000;

/// Canvas colors for the dark (default) and light presentations.
#[derive(Clone, Copy, Debug)]
pub struct Style {
    pub background: Rgba<u8>,
    pub text: Rgba<u8>,
    pub grid_line: Rgba<u8>,
}

impl Style {
    pub fn dark() -> Self {
        Self {
            background: Rgba([0x12, 0x12, 0x12, 0xff]),
            text: Rgba([0xff, 0xff, 0xff, 0xff]),
            grid_line: Rgba([0xe0, 0xe0, 0xe0, 0xff]),
        }
    }

    pub fn light() -> Self {
        Self {
            background: Rgba([0xf5, 0xf5, 0xf5, 0xff]),
            text: Rgba([0x20, 0x20, 0x20, 0xff]),
            grid_line: Rgba([0x30, 0x30, 0x30, 0xff]),
        }
    }
}

/// Background map pixels; the alpha channel doubles as the playable-area
/// mask when the source image carries one.
pub struct MapImage {
    pub pixels: RgbaImage,
    pub has_alpha: bool,
}

impl MapImage {
    /// Upscale (aspect preserved) so the long side reaches `target`;
    /// smaller targets never downscale.
    pub fn upscale_for_output(&mut self, target: u32) {
        let (w, h) = self.pixels.dimensions();
        let long = w.max(h);
        if long == 0 || long >= target {
            return;
        }
        let factor = target as f32 / long as f32;
        let nw = ((w as f32 * factor).round() as u32).max(1);
        let nh = ((h as f32 * factor).round() as u32).max(1);
        self.pixels = imageops::resize(&self.pixels, nw, nh, imageops::FilterType::Triangle);
    }
}

/// Load the background map image.
///
/// Missing or unreadable files are fatal. A map without an alpha channel
/// disables overlay masking and warns.
pub fn load_map(path: &Path) -> Result<MapImage> {
    let dynamic = image::open(path)?;
    let has_alpha = dynamic.color().has_alpha();
    if !has_alpha {
        warn!(
            "Map image {} has no alpha channel; overlay masking disabled",
            path.display()
        );
    }
    Ok(MapImage {
        pixels: dynamic.to_rgba8(),
        has_alpha,
    })
}

/// Load the label font, or None (with a warning) when unavailable. Text
/// layers are presentation-only and are skipped without a font.
pub fn load_font(path: &Path) -> Option<FontVec> {
    match std::fs::read(path) {
        Ok(bytes) => match FontVec::try_from_vec(bytes) {
            Ok(font) => Some(font),
            Err(_) => {
                warn!(
                    "Font {} is not a usable font file; text disabled",
                    path.display()
                );
                None
            }
        },
        Err(err) => {
            warn!("Font {} unavailable ({err}); text disabled", path.display());
            None
        }
    }
}

/// Presentation switches for the composited figure.
pub struct RenderOptions {
    pub style: Style,
    pub grid_lines: bool,
    pub cell_labels: bool,
    pub font: Option<FontVec>,
}

/// Scale, bounds, and captions for the statistic being drawn.
pub struct LegendSpec<'a> {
    pub scale: &'a ColorScale,
    pub bounds: ScaleBounds,
    /// Colorbar caption, e.g. "Kill Differential".
    pub axis_label: &'a str,
    /// Full figure title.
    pub title: &'a str,
}

struct Layout {
    map_x: u32,
    map_y: u32,
    bar_x: u32,
    bar_y: u32,
    bar_w: u32,
    bar_h: u32,
    title_band: u32,
    canvas_w: u32,
    canvas_h: u32,
}

fn layout(map_w: u32, map_h: u32) -> Layout {
    let s = (map_h as f32 / 1000.0).max(0.05);
    let px = |units: f32| ((units * s).round() as u32).max(1);

    let margin = px(40.0);
    let title_band = px(110.0);
    let legend_w = px(200.0);
    let bar_inset = px(30.0);

    Layout {
        map_x: margin,
        map_y: title_band,
        bar_x: margin + map_w + px(40.0),
        bar_y: title_band + bar_inset,
        bar_w: px(34.0),
        bar_h: map_h.saturating_sub(2 * bar_inset).max(1),
        title_band,
        canvas_w: margin + map_w + legend_w + margin,
        canvas_h: title_band + map_h + margin,
    }
}

/// Render the full figure for one statistic grid.
pub fn compose(
    map: &MapImage,
    grid: &StatGrid,
    legend: &LegendSpec<'_>,
    options: &RenderOptions,
) -> RgbaImage {
    let (map_w, map_h) = map.pixels.dimensions();
    let layout = layout(map_w, map_h);

    let mut canvas = RgbaImage::from_pixel(
        layout.canvas_w,
        layout.canvas_h,
        options.style.background,
    );

    blit_map(&mut canvas, map, layout.map_x, layout.map_y);
    paint_overlay(&mut canvas, map, grid, legend, layout.map_x, layout.map_y);

    if options.grid_lines {
        draw_grid_lines(
            &mut canvas,
            options.style.grid_line,
            layout.map_x,
            layout.map_y,
            map_w,
            map_h,
        );
    }
    if options.cell_labels {
        if let Some(font) = &options.font {
            draw_cell_labels(&mut canvas, font, &options.style, &layout, map_w, map_h);
        }
    }

    draw_colorbar(&mut canvas, legend, options, &layout);
    if let Some(font) = &options.font {
        draw_title(&mut canvas, font, &options.style, legend.title, &layout);
    }

    canvas
}

/// Standard "over" alpha blend of src onto dst.
fn blend_pixel(dst: &mut Rgba<u8>, src: Rgba<u8>) {
    let a = src.0[3] as f32 / 255.0;
    if a <= 0.0 {
        return;
    }
    for c in 0..3 {
        let s = src.0[c] as f32;
        let d = dst.0[c] as f32;
        dst.0[c] = (s * a + d * (1.0 - a)).round() as u8;
    }
    let da = dst.0[3] as f32 / 255.0;
    dst.0[3] = ((a + da * (1.0 - a)) * 255.0).round() as u8;
}

/// Draw the map at full opacity over the canvas background.
fn blit_map(canvas: &mut RgbaImage, map: &MapImage, x0: u32, y0: u32) {
    for (x, y, px) in map.pixels.enumerate_pixels() {
        blend_pixel(canvas.get_pixel_mut(x0 + x, y0 + y), *px);
    }
}

/// Upsample the cell grid to map resolution (nearest neighbor, so cell
/// boundaries align with pixel boundaries) and composite it over the map,
/// multiplying by the map's alpha mask when present.
fn paint_overlay(
    canvas: &mut RgbaImage,
    map: &MapImage,
    grid: &StatGrid,
    legend: &LegendSpec<'_>,
    x0: u32,
    y0: u32,
) {
    let (map_w, map_h) = map.pixels.dimensions();

    let mut cell_colors = [[Rgba([0u8, 0, 0, 0]); GRID_SIZE]; GRID_SIZE];
    for (row, colors) in cell_colors.iter_mut().enumerate() {
        for (col, color) in colors.iter_mut().enumerate() {
            *color = cell_color(grid.get(row, col), legend.scale, legend.bounds);
        }
    }

    let n = GRID_SIZE as u64;
    for y in 0..map_h {
        let row = ((y as u64 * n) / map_h as u64).min(n - 1) as usize;
        for x in 0..map_w {
            let col = ((x as u64 * n) / map_w as u64).min(n - 1) as usize;
            let mut px = cell_colors[row][col];
            if px.0[3] == 0 {
                continue;
            }
            if map.has_alpha {
                let mask = map.pixels.get_pixel(x, y).0[3] as f32 / 255.0;
                px.0[3] = (px.0[3] as f32 * mask).round() as u8;
                if px.0[3] == 0 {
                    continue;
                }
            }
            blend_pixel(canvas.get_pixel_mut(x0 + x, y0 + y), px);
        }
    }
}

fn draw_grid_lines(
    canvas: &mut RgbaImage,
    color: Rgba<u8>,
    x0: u32,
    y0: u32,
    map_w: u32,
    map_h: u32,
) {
    let (left, top) = (x0 as f32, y0 as f32);
    let (right, bottom) = ((x0 + map_w - 1) as f32, (y0 + map_h - 1) as f32);

    for i in 0..=GRID_SIZE {
        let t = i as f32 / GRID_SIZE as f32;
        let x = left + t * (map_w - 1) as f32;
        let y = top + t * (map_h - 1) as f32;
        draw_line_segment_mut(canvas, (x, top), (x, bottom), color);
        draw_line_segment_mut(canvas, (left, y), (right, y), color);
    }
}

fn draw_cell_labels(
    canvas: &mut RgbaImage,
    font: &FontVec,
    style: &Style,
    layout: &Layout,
    map_w: u32,
    map_h: u32,
) {
    let scale = PxScale::from((map_h as f32 / 1000.0 * 22.0).max(8.0));

    for row in 0..GRID_SIZE {
        for col in 0..GRID_SIZE {
            let text = format!("{row},{col}");
            let (tw, th) = text_size(scale, font, &text);
            let cx = layout.map_x as f32 + (col as f32 + 0.5) / GRID_SIZE as f32 * map_w as f32;
            let cy = layout.map_y as f32 + (row as f32 + 0.5) / GRID_SIZE as f32 * map_h as f32;
            draw_text_mut(
                canvas,
                style.text,
                (cx - tw as f32 / 2.0) as i32,
                (cy - th as f32 / 2.0) as i32,
                scale,
                font,
                &text,
            );
        }
    }
}

/// Vertical gradient legend; max at the top, min at the bottom.
fn draw_colorbar(
    canvas: &mut RgbaImage,
    legend: &LegendSpec<'_>,
    options: &RenderOptions,
    layout: &Layout,
) {
    let denom = (layout.bar_h.saturating_sub(1)).max(1) as f32;
    for dy in 0..layout.bar_h {
        let t = 1.0 - dy as f32 / denom;
        let [r, g, b] = legend.scale.sample(t);
        for dx in 0..layout.bar_w {
            let x = layout.bar_x + dx;
            let y = layout.bar_y + dy;
            if x < canvas.width() && y < canvas.height() {
                canvas.put_pixel(x, y, Rgba([r, g, b, 0xff]));
            }
        }
    }

    let Some(font) = &options.font else {
        return;
    };

    let scale = PxScale::from((layout.bar_h as f32 * 0.035).max(8.0));
    let text_x = (layout.bar_x + layout.bar_w + layout.bar_w / 2) as i32;
    let top_y = layout.bar_y as i32;
    let bottom_y = (layout.bar_y + layout.bar_h) as i32 - scale.y as i32;

    draw_text_mut(
        canvas,
        options.style.text,
        text_x,
        top_y,
        scale,
        font,
        &format_bound(legend.bounds.max),
    );
    draw_text_mut(
        canvas,
        options.style.text,
        text_x,
        bottom_y,
        scale,
        font,
        &format_bound(legend.bounds.min),
    );

    // Axis caption under the bar.
    let caption_y = (layout.bar_y + layout.bar_h) as i32 + scale.y as i32;
    draw_text_mut(
        canvas,
        options.style.text,
        layout.bar_x as i32,
        caption_y,
        scale,
        font,
        legend.axis_label,
    );
}

fn format_bound(value: f32) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.1}")
    }
}

fn draw_title(
    canvas: &mut RgbaImage,
    font: &FontVec,
    style: &Style,
    title: &str,
    layout: &Layout,
) {
    let scale = PxScale::from((layout.title_band as f32 * 0.42).max(10.0));
    let (tw, _) = text_size(scale, font, title);
    let x = ((layout.canvas_w as i32 - tw as i32) / 2).max(0);
    let y = (layout.title_band as f32 * 0.28) as i32;
    draw_text_mut(canvas, style.text, x, y, scale, font, title);
}
