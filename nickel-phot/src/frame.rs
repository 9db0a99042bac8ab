//! Calibrated CCD frame with the detector metadata photometry needs.

use std::time::Duration;

use ndarray::{Array2, ArrayView2};
use thiserror::Error;

/// Errors from frame construction.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrameError {
    /// Frames must have at least one pixel.
    #[error("frame has zero-size dimensions {height}x{width}")]
    EmptyFrame {
        /// Frame height in pixels.
        height: usize,
        /// Frame width in pixels.
        width: usize,
    },

    /// Exposure time must be strictly positive to define count rates.
    #[error("exposure time must be positive, got {0:?}")]
    NonPositiveExposure(Duration),

    /// Gain must be strictly positive (electrons per count).
    #[error("gain must be positive, got {0} e-/count")]
    NonPositiveGain(f64),

    /// Read noise cannot be negative.
    #[error("read noise must be non-negative, got {0} e-")]
    NegativeReadNoise(f64),
}

/// A calibrated CCD frame.
///
/// Holds the pixel grid in counts together with the exposure time,
/// detector gain, and read noise needed to turn aperture sums into
/// instrumental magnitudes with uncertainties. Bias, flat, bad-pixel,
/// and cosmic-ray corrections happen upstream; frames are immutable
/// once constructed.
#[derive(Debug, Clone)]
pub struct CcdFrame {
    pixels: Array2<f64>,
    exposure: Duration,
    gain: f64,
    read_noise: f64,
}

impl CcdFrame {
    /// Construct a frame, validating the detector metadata.
    ///
    /// # Arguments
    /// * `pixels` - calibrated counts, indexed `[[y, x]]`
    /// * `exposure` - exposure time, must be positive
    /// * `gain` - detector gain in electrons per count, must be positive
    /// * `read_noise` - detector read noise in electrons RMS
    ///
    /// # Errors
    ///
    /// Returns [`FrameError`] when any metadata value is out of range.
    pub fn new(
        pixels: Array2<f64>,
        exposure: Duration,
        gain: f64,
        read_noise: f64,
    ) -> Result<Self, FrameError> {
        let (height, width) = pixels.dim();
        if height == 0 || width == 0 {
            return Err(FrameError::EmptyFrame { height, width });
        }
        if exposure.is_zero() {
            return Err(FrameError::NonPositiveExposure(exposure));
        }
        if !(gain > 0.0) {
            return Err(FrameError::NonPositiveGain(gain));
        }
        if !(read_noise >= 0.0) {
            return Err(FrameError::NegativeReadNoise(read_noise));
        }

        Ok(Self {
            pixels,
            exposure,
            gain,
            read_noise,
        })
    }

    /// View of the pixel grid.
    pub fn pixels(&self) -> ArrayView2<'_, f64> {
        self.pixels.view()
    }

    /// Exposure time.
    pub fn exposure(&self) -> Duration {
        self.exposure
    }

    /// Exposure time in seconds.
    pub fn exposure_seconds(&self) -> f64 {
        self.exposure.as_secs_f64()
    }

    /// Detector gain in electrons per count.
    pub fn gain(&self) -> f64 {
        self.gain
    }

    /// Detector read noise in electrons RMS.
    pub fn read_noise(&self) -> f64 {
        self.read_noise
    }

    /// Frame width in pixels (columns).
    pub fn width(&self) -> usize {
        self.pixels.dim().1
    }

    /// Frame height in pixels (rows).
    pub fn height(&self) -> usize {
        self.pixels.dim().0
    }
}
