//! Image-domain processing: background statistics and aperture photometry.
//!
//! Everything in this module is pure computation over an immutable
//! pixel grid. Per-source failures are reported per row and never
//! abort a batch.

pub mod aperture;
pub mod background;
pub mod photometer;
pub mod test_patterns;

pub use aperture::{collect_annulus_pixels, weighted_aperture_sum, ApertureSum, CircularAperture};
pub use background::{estimate_background, BackgroundError, BackgroundEstimate};
pub use photometer::{
    CcdNoiseModel, NoiseModel, PhotometerConfig, PhotometryConfigError, PhotometryError,
    SourcePhotometer,
};
