//! Circular apertures and sky annuli over a pixel grid.
//!
//! The measurement aperture uses deterministic sub-pixel area
//! weighting: every pixel overlapping the aperture boundary is weighted
//! by the fraction of a fixed [`SUBPIXELS`]x[`SUBPIXELS`] grid of
//! sample points falling inside the radius, so the effective aperture
//! area approaches the geometric area and the sum is reproducible. The
//! sky annulus uses plain center-method inclusion: the annulus
//! population feeds a robust clipped estimator, which does not benefit
//! from fractional pixels.

use ndarray::ArrayView2;

/// Sub-pixel sampling grid edge length for boundary pixels.
pub const SUBPIXELS: usize = 5;

/// A circular measurement aperture at a sub-pixel centroid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircularAperture {
    /// Center x-coordinate (column).
    pub x: f64,
    /// Center y-coordinate (row).
    pub y: f64,
    /// Radius in pixels.
    pub radius: f64,
}

impl CircularAperture {
    /// Geometric area of the aperture in square pixels.
    pub fn area(&self) -> f64 {
        std::f64::consts::PI * self.radius * self.radius
    }
}

/// Result of a sub-pixel-weighted aperture sum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApertureSum {
    /// Weighted sum of pixel values.
    pub sum: f64,
    /// Effective area: the sum of pixel weights.
    pub area: f64,
    /// Number of pixels with non-zero weight.
    pub n_pixels: usize,
}

/// Fraction of the pixel centered at `(px, py)` covered by the aperture.
///
/// Pixels whose center lies more than half a pixel diagonal inside
/// (outside) the radius are fully included (excluded) without sampling;
/// only boundary pixels pay for the sub-pixel grid.
fn pixel_weight(aperture: &CircularAperture, px: f64, py: f64) -> f64 {
    // Half-diagonal of a unit pixel.
    const HALF_DIAGONAL: f64 = std::f64::consts::SQRT_2 / 2.0;

    let dx = px - aperture.x;
    let dy = py - aperture.y;
    let dist = (dx * dx + dy * dy).sqrt();

    if dist <= aperture.radius - HALF_DIAGONAL {
        return 1.0;
    }
    if dist >= aperture.radius + HALF_DIAGONAL {
        return 0.0;
    }

    let n = SUBPIXELS as f64;
    let r_sq = aperture.radius * aperture.radius;
    let mut inside = 0usize;
    for i in 0..SUBPIXELS {
        for j in 0..SUBPIXELS {
            let sx = px - 0.5 + (j as f64 + 0.5) / n;
            let sy = py - 0.5 + (i as f64 + 0.5) / n;
            let ddx = sx - aperture.x;
            let ddy = sy - aperture.y;
            if ddx * ddx + ddy * ddy <= r_sq {
                inside += 1;
            }
        }
    }

    inside as f64 / (n * n)
}

/// Sum pixel values inside a circular aperture with sub-pixel weighting.
///
/// Non-finite pixels are skipped and contribute neither value nor area.
/// Apertures extending past the frame edge are clipped; an aperture
/// entirely off-frame returns a zero-area sum.
pub fn weighted_aperture_sum(image: &ArrayView2<f64>, aperture: &CircularAperture) -> ApertureSum {
    let (height, width) = image.dim();
    let reach = aperture.radius + 1.0;

    let x_min = ((aperture.x - reach).floor().max(0.0)) as usize;
    let y_min = ((aperture.y - reach).floor().max(0.0)) as usize;
    let x_max = (((aperture.x + reach).ceil() as isize + 1).min(width as isize)).max(0) as usize;
    let y_max = (((aperture.y + reach).ceil() as isize + 1).min(height as isize)).max(0) as usize;

    let mut sum = 0.0;
    let mut area = 0.0;
    let mut n_pixels = 0usize;

    for y in y_min..y_max {
        for x in x_min..x_max {
            let value = image[[y, x]];
            if !value.is_finite() {
                continue;
            }
            let weight = pixel_weight(aperture, x as f64, y as f64);
            if weight > 0.0 {
                sum += weight * value;
                area += weight;
                n_pixels += 1;
            }
        }
    }

    ApertureSum {
        sum,
        area,
        n_pixels,
    }
}

/// Collect finite pixel values from the annulus between `r_in` and `r_out`.
///
/// A pixel belongs to the annulus when its center distance from
/// `(x, y)` satisfies `r_in <= d <= r_out`. Regions outside the frame
/// are clipped.
pub fn collect_annulus_pixels(
    image: &ArrayView2<f64>,
    x: f64,
    y: f64,
    r_in: f64,
    r_out: f64,
) -> Vec<f64> {
    let (height, width) = image.dim();

    let x_min = ((x - r_out).floor().max(0.0)) as usize;
    let y_min = ((y - r_out).floor().max(0.0)) as usize;
    let x_max = (((x + r_out).ceil() as isize + 1).min(width as isize)).max(0) as usize;
    let y_max = (((y + r_out).ceil() as isize + 1).min(height as isize)).max(0) as usize;

    let mut pixels = Vec::new();

    for py in y_min..y_max {
        for px in x_min..x_max {
            let dx = px as f64 - x;
            let dy = py as f64 - y;
            let dist = (dx * dx + dy * dy).sqrt();

            if dist >= r_in && dist <= r_out {
                let value = image[[py, px]];
                if value.is_finite() {
                    pixels.push(value);
                }
            }
        }
    }

    pixels
}
