//! PNG charts drawn straight onto an RGB raster.
//!
//! Charts carry a frame, gridlines and data only; there is no text rendering.

use std::path::Path;

use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use tracing::debug;

use crate::config::ChartConfig;

const MARGIN: u32 = 40;
const GRID_LINES: u32 = 5;

const BACKGROUND: [u8; 3] = [255, 255, 255];
const AXIS: [u8; 3] = [60, 60, 60];
const GRID: [u8; 3] = [225, 225, 225];
const THRESHOLD: [u8; 3] = [128, 128, 128];

/// Line colours cycled through for multi-series charts.
const PALETTE: [[u8; 3]; 10] = [
    [31, 119, 180],
    [255, 127, 14],
    [44, 160, 44],
    [214, 39, 40],
    [148, 103, 189],
    [140, 86, 75],
    [227, 119, 194],
    [127, 127, 127],
    [188, 189, 34],
    [23, 190, 207],
];

pub const LINE_COLOR: [u8; 3] = PALETTE[0];
pub const BAR_COLOR: [u8; 3] = [70, 130, 180];

/// Closed value range shown along one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Range {
    min: f64,
    max: f64,
}

impl Range {
    /// Smallest range covering `values`, always including zero. Falls back to
    /// `[0, 1]` when nothing finite is given or all values are zero.
    fn covering(values: impl IntoIterator<Item = f64>) -> Self {
        let (min, max) = values
            .into_iter()
            .filter(|v| v.is_finite())
            .fold((0.0f64, 0.0f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
        if max - min <= 0.0 {
            return Range { min: 0.0, max: 1.0 };
        }
        Range { min, max }
    }

    /// Smallest range spanning `values` without forcing zero in. A single
    /// distinct value gets half a unit either side.
    fn spanning(values: impl IntoIterator<Item = f64>) -> Self {
        let (min, max) = values
            .into_iter()
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
        if min > max {
            return Range { min: 0.0, max: 1.0 };
        }
        if max - min <= 0.0 {
            return Range {
                min: min - 0.5,
                max: max + 0.5,
            };
        }
        Range { min, max }
    }

    /// Position of `value` in `[0, 1]`.
    fn fraction(&self, value: f64) -> f64 {
        ((value - self.min) / (self.max - self.min)).clamp(0.0, 1.0)
    }
}

/// A raster with a framed plot area inside fixed margins.
struct Canvas {
    image: RgbImage,
    left: i64,
    top: i64,
    right: i64,
    bottom: i64,
}

impl Canvas {
    fn new(config: &ChartConfig) -> Self {
        let width = config.width.max(2 * MARGIN + 2);
        let height = config.height.max(2 * MARGIN + 2);
        let image = RgbImage::from_pixel(width, height, Rgb(BACKGROUND));

        Canvas {
            image,
            left: MARGIN as i64,
            top: MARGIN as i64,
            right: (width - MARGIN) as i64,
            bottom: (height - MARGIN) as i64,
        }
    }

    fn x(&self, fraction: f64) -> i64 {
        self.left + (fraction * (self.right - self.left) as f64).round() as i64
    }

    /// Pixel row of `fraction`, measured upwards from the bottom of the plot.
    fn y(&self, fraction: f64) -> i64 {
        self.bottom - (fraction * (self.bottom - self.top) as f64).round() as i64
    }

    fn put(&mut self, x: i64, y: i64, color: [u8; 3]) {
        if x < 0 || y < 0 {
            return;
        }
        let (x, y) = (x as u32, y as u32);
        if x < self.image.width() && y < self.image.height() {
            self.image.put_pixel(x, y, Rgb(color));
        }
    }

    /// Bresenham line.
    fn line(&mut self, (x0, y0): (i64, i64), (x1, y1): (i64, i64), color: [u8; 3]) {
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let (mut x, mut y, mut err) = (x0, y0, dx + dy);

        loop {
            self.put(x, y, color);
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    fn thick_line(&mut self, from: (i64, i64), to: (i64, i64), color: [u8; 3]) {
        for offset in -1..=1 {
            self.line((from.0, from.1 + offset), (to.0, to.1 + offset), color);
        }
    }

    fn fill_rect(&mut self, x0: i64, y0: i64, x1: i64, y1: i64, color: [u8; 3]) {
        for y in y0.min(y1)..=y0.max(y1) {
            for x in x0.min(x1)..=x0.max(x1) {
                self.put(x, y, color);
            }
        }
    }

    fn dot(&mut self, x: i64, y: i64, color: [u8; 3]) {
        self.fill_rect(x - 2, y - 2, x + 2, y + 2, color);
    }

    fn dashed_line(&mut self, from: (i64, i64), to: (i64, i64), color: [u8; 3]) {
        let steps = (to.0 - from.0).abs().max((to.1 - from.1).abs()).max(1);
        for i in 0..=steps {
            if (i / 6) % 2 == 1 {
                continue;
            }
            let t = i as f64 / steps as f64;
            let x = from.0 + ((to.0 - from.0) as f64 * t).round() as i64;
            let y = from.1 + ((to.1 - from.1) as f64 * t).round() as i64;
            self.put(x, y, color);
        }
    }

    /// Horizontal gridlines plus the frame of the plot area.
    fn frame(&mut self) {
        for i in 1..GRID_LINES {
            let y = self.y(i as f64 / GRID_LINES as f64);
            self.line((self.left, y), (self.right, y), GRID);
        }
        let (l, t, r, b) = (self.left, self.top, self.right, self.bottom);
        self.line((l, b), (r, b), AXIS);
        self.line((l, t), (l, b), AXIS);
    }

    fn save(self, path: &Path) -> Result<()> {
        self.image
            .save(path)
            .with_context(|| format!("failed to save chart {}", path.display()))?;
        debug!(path = %path.display(), "Chart written");
        Ok(())
    }
}

fn plot_series(canvas: &mut Canvas, values: &[f64], range: Range, color: [u8; 3]) {
    let last = values.len().saturating_sub(1).max(1) as f64;
    let points: Vec<(i64, i64)> = values
        .iter()
        .enumerate()
        .map(|(i, v)| (canvas.x(i as f64 / last), canvas.y(range.fraction(*v))))
        .collect();

    for pair in points.windows(2) {
        canvas.thick_line(pair[0], pair[1], color);
    }
    for &(x, y) in &points {
        canvas.dot(x, y, color);
    }
}

/// Single series over evenly spaced x positions, e.g. an hourly profile.
pub fn line_chart(path: &Path, values: &[f64], config: &ChartConfig) -> Result<()> {
    multi_line_chart(path, &[values], config)
}

/// Several series sharing one y range, coloured from a fixed palette.
pub fn multi_line_chart(path: &Path, series: &[&[f64]], config: &ChartConfig) -> Result<()> {
    let mut canvas = Canvas::new(config);
    canvas.frame();

    let range = Range::covering(series.iter().flat_map(|s| s.iter().copied()));
    for (i, values) in series.iter().enumerate() {
        plot_series(&mut canvas, values, range, PALETTE[i % PALETTE.len()]);
    }

    canvas.save(path)
}

/// Horizontal bars, first value at the top.
pub fn bar_chart(path: &Path, values: &[f64], config: &ChartConfig) -> Result<()> {
    let mut canvas = Canvas::new(config);
    // Vertical gridlines suit horizontal bars.
    for i in 1..GRID_LINES {
        let x = canvas.x(i as f64 / GRID_LINES as f64);
        let (top, bottom) = (canvas.top, canvas.bottom);
        canvas.line((x, top), (x, bottom), GRID);
    }

    let range = Range::covering(values.iter().copied());
    let slot = (canvas.bottom - canvas.top) as f64 / values.len().max(1) as f64;
    let gap = (slot * 0.15).round() as i64;

    for (i, value) in values.iter().enumerate() {
        let y0 = canvas.top + (i as f64 * slot).round() as i64 + gap;
        let y1 = canvas.top + ((i + 1) as f64 * slot).round() as i64 - gap;
        let x0 = canvas.x(range.fraction(0.0));
        let x1 = canvas.x(range.fraction(*value));
        canvas.fill_rect(x0, y0, x1, y1.max(y0), BAR_COLOR);
    }

    let (l, t, b) = (canvas.left, canvas.top, canvas.bottom);
    canvas.line((l, t), (l, b), AXIS);
    canvas.save(path)
}

/// Axis scale of a scatter chart, applied to both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scale {
    /// Range always includes zero.
    #[default]
    Linear,
    /// Base-10 logarithmic; points with a non-positive coordinate are not drawn.
    Log,
}

impl Scale {
    fn project(self, value: f64) -> Option<f64> {
        match self {
            Scale::Linear => Some(value),
            Scale::Log => (value > 0.0).then(|| value.log10()),
        }
    }

    fn range(self, values: impl IntoIterator<Item = f64>) -> Range {
        match self {
            Scale::Linear => Range::covering(values),
            Scale::Log => Range::spanning(values),
        }
    }
}

/// A coloured point of a scatter chart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScatterPoint {
    pub x: f64,
    pub y: f64,
    pub color: [u8; 3],
}

/// Scatter plot with optional dashed threshold lines at `(x, y)`.
pub fn scatter_chart(
    path: &Path,
    points: &[ScatterPoint],
    thresholds: Option<(f64, f64)>,
    scale: Scale,
    config: &ChartConfig,
) -> Result<()> {
    let mut canvas = Canvas::new(config);
    canvas.frame();

    let projected: Vec<(f64, f64, [u8; 3])> = points
        .iter()
        .filter_map(|p| Some((scale.project(p.x)?, scale.project(p.y)?, p.color)))
        .collect();
    if projected.len() < points.len() {
        debug!(
            skipped = points.len() - projected.len(),
            ?scale,
            "Scatter points outside the axis domain"
        );
    }

    let x_range = scale.range(projected.iter().map(|p| p.0));
    let y_range = scale.range(projected.iter().map(|p| p.1));

    if let Some((tx, ty)) = thresholds {
        let (l, t, r, b) = (canvas.left, canvas.top, canvas.right, canvas.bottom);
        if let Some(tx) = scale.project(tx) {
            let x = canvas.x(x_range.fraction(tx));
            canvas.dashed_line((x, t), (x, b), THRESHOLD);
        }
        if let Some(ty) = scale.project(ty) {
            let y = canvas.y(y_range.fraction(ty));
            canvas.dashed_line((l, y), (r, y), THRESHOLD);
        }
    }

    for (x, y, color) in projected {
        let x = canvas.x(x_range.fraction(x));
        let y = canvas.y(y_range.fraction(y));
        canvas.dot(x, y, color);
    }

    canvas.save(path)
}
