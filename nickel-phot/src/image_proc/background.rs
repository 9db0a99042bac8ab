//! Sigma-clipped background statistics over a full frame.

use ndarray::ArrayView2;
use nickel_math::stats::{ClippedStats, SigmaClip, StatsError};
use thiserror::Error;

/// Errors from background estimation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackgroundError {
    /// The unmasked pixel population was empty or entirely non-finite.
    #[error(transparent)]
    Stats(#[from] StatsError),

    /// Mask dimensions must match the image.
    #[error("mask dimensions {mask_height}x{mask_width} do not match image {height}x{width}")]
    MaskShape {
        /// Mask height.
        mask_height: usize,
        /// Mask width.
        mask_width: usize,
        /// Image height.
        height: usize,
        /// Image width.
        width: usize,
    },
}

/// Robust background statistics of a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackgroundEstimate {
    /// Sigma-clipped mean of the background population.
    pub mean: f64,
    /// Sigma-clipped median of the background population.
    pub median: f64,
    /// Standard deviation of the clipped population.
    pub std_dev: f64,
    /// Pixels surviving the clip.
    pub n_valid: usize,
    /// Rejection iterations performed.
    pub iterations: usize,
}

impl From<ClippedStats> for BackgroundEstimate {
    fn from(stats: ClippedStats) -> Self {
        Self {
            mean: stats.mean,
            median: stats.median,
            std_dev: stats.std_dev,
            n_valid: stats.n_used,
            iterations: stats.iterations,
        }
    }
}

/// Estimate frame background statistics by iterative sigma-clipping.
///
/// Stars and cosmic rays are iteratively rejected from the pixel
/// population; the converged mean/median/stddev characterize the sky.
/// A `true` entry in the optional mask excludes that pixel from the
/// population (bad columns, vignetted corners).
///
/// # Errors
///
/// Returns [`BackgroundError::MaskShape`] on a mask/image shape
/// mismatch and [`BackgroundError::Stats`] when no usable pixels
/// remain.
pub fn estimate_background(
    image: &ArrayView2<f64>,
    clip: &SigmaClip,
    mask: Option<&ArrayView2<bool>>,
) -> Result<BackgroundEstimate, BackgroundError> {
    let (height, width) = image.dim();

    if let Some(mask) = mask {
        let (mask_height, mask_width) = mask.dim();
        if (mask_height, mask_width) != (height, width) {
            return Err(BackgroundError::MaskShape {
                mask_height,
                mask_width,
                height,
                width,
            });
        }
    }

    let population: Vec<f64> = match mask {
        Some(mask) => image
            .iter()
            .zip(mask.iter())
            .filter(|(_, &excluded)| !excluded)
            .map(|(&v, _)| v)
            .collect(),
        None => image.iter().copied().collect(),
    };

    let stats = clip.clip(&population)?;
    Ok(stats.into())
}
