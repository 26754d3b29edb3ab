//! Kernel density estimate of predicted scores, rendered to PNG.

use std::io::Cursor;

use font8x8::{BASIC_FONTS, UnicodeFonts};
use image::{ImageFormat, Rgb, RgbImage};

use super::error::{PipelineError, PipelineResult};

/// Number of evaluation points on the density grid.
pub const GRID_POINTS: usize = 512;

/// Bandwidth used when the sample has no spread.
const FALLBACK_BANDWIDTH: f64 = 0.05;

const WIDTH: u32 = 640;
const HEIGHT: u32 = 480;
const MARGIN_LEFT: u32 = 50;
const MARGIN_RIGHT: u32 = 20;
const MARGIN_TOP: u32 = 40;
const MARGIN_BOTTOM: u32 = 48;
const TICKS: u32 = 5;

pub const TITLE: &str = "Predicted score density";
/// Glyphs are 8x8, drawn at twice their size.
const TEXT_SCALE: u32 = 2;
const GLYPH: u32 = 8;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([0, 0, 0]);
const GRID: Rgb<u8> = Rgb([225, 225, 225]);
const CURVE: Rgb<u8> = Rgb([31, 119, 180]);

/// Density sampled on an evenly spaced grid.
#[derive(Debug, Clone)]
pub struct DensityCurve {
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
    pub bandwidth: f64,
}

impl DensityCurve {
    /// No points; renders as bare axes.
    pub fn empty() -> Self {
        Self {
            xs: Vec::new(),
            ys: Vec::new(),
            bandwidth: 0.0,
        }
    }
}

/// Gaussian KDE with Scott's rule bandwidth, `σ·n^(-1/5)`.
///
/// The grid spans half the sample range beyond each extreme. Returns `None`
/// for an empty sample or fewer than two grid points.
pub fn gaussian_kde(samples: &[f64], points: usize) -> Option<DensityCurve> {
    let finite: Vec<f64> = samples.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() || points < 2 {
        return None;
    }

    let n = finite.len() as f64;
    let bandwidth = match sample_std(&finite) {
        Some(std) if std > 0.0 => std * n.powf(-0.2),
        _ => FALLBACK_BANDWIDTH,
    };

    let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let pad = if max > min { (max - min) / 2.0 } else { 0.5 };
    let (lo, hi) = (min - pad, max + pad);

    let norm = 1.0 / (n * bandwidth * (2.0 * std::f64::consts::PI).sqrt());
    let step = (hi - lo) / (points - 1) as f64;

    let xs: Vec<f64> = (0..points).map(|i| lo + step * i as f64).collect();
    let ys = xs
        .iter()
        .map(|&x| {
            let sum: f64 = finite
                .iter()
                .map(|&xi| {
                    let z = (x - xi) / bandwidth;
                    (-0.5 * z * z).exp()
                })
                .sum();
            sum * norm
        })
        .collect();

    Some(DensityCurve { xs, ys, bandwidth })
}

/// Unbiased standard deviation; `None` below two samples.
fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(var.sqrt())
}

/// Draw the curve as a titled line plot with axes and encode it as PNG.
///
/// `x_label` is printed centered under the x axis.
pub fn render_png(curve: &DensityCurve, x_label: &str) -> PipelineResult<Vec<u8>> {
    let mut img = RgbImage::from_pixel(WIDTH, HEIGHT, BACKGROUND);
    let text_height = GLYPH * TEXT_SCALE;
    draw_text_centered(&mut img, TITLE, (MARGIN_TOP - text_height) / 2);
    draw_text_centered(&mut img, x_label, HEIGHT - text_height - 6);

    let plot_w = WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_h = HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
    let x0 = MARGIN_LEFT as i64;
    let y0 = (HEIGHT - MARGIN_BOTTOM) as i64;

    // Grid lines and ticks
    for t in 0..=TICKS {
        let gx = x0 + (plot_w * t / TICKS) as i64;
        let gy = y0 - (plot_h * t / TICKS) as i64;
        draw_line(&mut img, (gx, MARGIN_TOP as i64), (gx, y0), GRID);
        draw_line(&mut img, (x0, gy), (x0 + plot_w as i64, gy), GRID);
        draw_line(&mut img, (gx, y0), (gx, y0 + 5), AXIS);
        draw_line(&mut img, (x0 - 5, gy), (x0, gy), AXIS);
    }

    draw_line(&mut img, (x0, y0), (x0 + plot_w as i64, y0), AXIS);
    draw_line(&mut img, (x0, y0), (x0, MARGIN_TOP as i64), AXIS);

    let (Some(&x_min), Some(&x_max)) = (curve.xs.first(), curve.xs.last()) else {
        return encode(img);
    };
    let y_max = curve.ys.iter().copied().fold(0.0, f64::max);
    let x_span = (x_max - x_min).max(f64::EPSILON);
    let y_span = if y_max > 0.0 { y_max * 1.05 } else { 1.0 };

    let to_pixel = |x: f64, y: f64| -> (i64, i64) {
        let px = x0 + ((x - x_min) / x_span * plot_w as f64).round() as i64;
        let py = y0 - (y / y_span * plot_h as f64).round() as i64;
        (px, py)
    };

    let pixels: Vec<(i64, i64)> = curve
        .xs
        .iter()
        .zip(&curve.ys)
        .map(|(&x, &y)| to_pixel(x, y))
        .collect();

    for pair in pixels.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        draw_line(&mut img, a, b, CURVE);
        // Second pass one pixel up for a 2px stroke
        draw_line(&mut img, (a.0, a.1 - 1), (b.0, b.1 - 1), CURVE);
    }

    encode(img)
}

fn encode(img: RgbImage) -> PipelineResult<Vec<u8>> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| PipelineError::Encode {
            artifact: "density plot",
            reason: e.to_string(),
        })?;
    Ok(buf)
}

/// Horizontally centered text with its top edge at `top`.
///
/// Characters without a glyph are drawn as blanks. Text wider than the
/// image is clipped.
fn draw_text_centered(img: &mut RgbImage, text: &str, top: u32) {
    let advance = GLYPH * TEXT_SCALE;
    let width = text.chars().count() as u32 * advance;
    let left = WIDTH.saturating_sub(width) / 2;

    for (i, ch) in text.chars().enumerate() {
        let Some(rows) = BASIC_FONTS.get(ch) else {
            continue;
        };
        let origin_x = left + i as u32 * advance;
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH {
                if bits & (1 << col) == 0 {
                    continue;
                }
                for dy in 0..TEXT_SCALE {
                    for dx in 0..TEXT_SCALE {
                        let px = origin_x + col * TEXT_SCALE + dx;
                        let py = top + row as u32 * TEXT_SCALE + dy;
                        if px < img.width() && py < img.height() {
                            img.put_pixel(px, py, AXIS);
                        }
                    }
                }
            }
        }
    }
}

/// Bresenham line, clipped to the image bounds.
fn draw_line(img: &mut RgbImage, from: (i64, i64), to: (i64, i64), color: Rgb<u8>) {
    let (mut x, mut y) = from;
    let dx = (to.0 - x).abs();
    let dy = -(to.1 - y).abs();
    let sx = if x < to.0 { 1 } else { -1 };
    let sy = if y < to.1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
            img.put_pixel(x as u32, y as u32, color);
        }
        if x == to.0 && y == to.1 {
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
