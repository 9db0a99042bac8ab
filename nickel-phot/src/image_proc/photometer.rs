//! Aperture photometry of detected sources.
//!
//! For each source the photometer sums counts in a circular aperture,
//! estimates the local sky from a sigma-clipped annulus population,
//! subtracts the sky contribution scaled by the effective aperture
//! area, and converts the result to an instrumental magnitude with a
//! CCD-noise uncertainty. Failures are per-row: one saturated or
//! sky-dominated source never aborts the batch.

use nickel_math::stats::SigmaClip;
use thiserror::Error;

use super::aperture::{collect_annulus_pixels, weighted_aperture_sum, CircularAperture};
use crate::frame::CcdFrame;
use crate::records::{PhotometryRecord, SourceRecord};

/// Minimum usable annulus population for a sky estimate.
pub const MIN_ANNULUS_PIXELS: usize = 10;

/// Errors from photometer configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PhotometryConfigError {
    /// The aperture radius must be positive.
    #[error("aperture radius must be positive, got {0}")]
    NonPositiveAperture(f64),

    /// The annulus radii must satisfy 0 < inner < outer.
    #[error("annulus radii must satisfy 0 < inner < outer, got inner {inner}, outer {outer}")]
    InvalidAnnulus {
        /// Inner annulus radius.
        inner: f64,
        /// Outer annulus radius.
        outer: f64,
    },
}

/// Per-source photometry failures.
///
/// These are recorded per row by [`SourcePhotometer::measure_all`];
/// they mark a single measurement invalid and never abort the batch.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PhotometryError {
    /// Aperture covered no usable pixels (source off frame, or all NaN).
    #[error("aperture at ({x:.1}, {y:.1}) contains no usable pixels")]
    EmptyAperture {
        /// Source x-coordinate.
        x: f64,
        /// Source y-coordinate.
        y: f64,
    },

    /// Too few annulus pixels for a sky estimate; the sky level for
    /// this source is undefined, not zero.
    #[error(
        "sky annulus at ({x:.1}, {y:.1}) has {count} usable pixels, need at least {required}"
    )]
    EmptyAnnulus {
        /// Source x-coordinate.
        x: f64,
        /// Source y-coordinate.
        y: f64,
        /// Usable annulus pixels found.
        count: usize,
        /// Minimum required population.
        required: usize,
    },

    /// Sky subtraction left nothing; the magnitude is undefined.
    #[error("non-positive sky-subtracted flux {flux:.1} at ({x:.1}, {y:.1})")]
    NonPositiveFlux {
        /// Source x-coordinate.
        x: f64,
        /// Source y-coordinate.
        y: f64,
        /// The non-positive flux value.
        flux: f64,
    },
}

/// CCD noise collaborator.
///
/// The photometer treats uncertainty estimation as an external,
/// parameterized model: it hands over the aperture-aggregated signal
/// in counts, the background RMS aggregated over the aperture area,
/// and the detector gain, and receives a one-sigma flux uncertainty in
/// counts.
pub trait NoiseModel {
    /// One-sigma uncertainty for a measured value.
    fn error(&self, pixel_value: f64, background_rms: f64, gain: f64) -> f64;
}

/// Standard CCD error model: shot noise, background noise, read noise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CcdNoiseModel {
    /// Detector read noise in electrons RMS.
    pub read_noise: f64,
}

impl NoiseModel for CcdNoiseModel {
    fn error(&self, pixel_value: f64, background_rms: f64, gain: f64) -> f64 {
        // Work in counts: Poisson variance of N electrons is N, so the
        // variance of the signal in counts is signal/gain.
        let shot_var = pixel_value.max(0.0) / gain;
        let read_var = (self.read_noise / gain).powi(2);
        (shot_var + background_rms * background_rms + read_var).sqrt()
    }
}

/// Aperture and sky-annulus geometry for a photometric run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhotometerConfig {
    /// Measurement aperture radius in pixels.
    pub aperture_radius: f64,
    /// Inner sky annulus radius in pixels.
    pub annulus_inner: f64,
    /// Outer sky annulus radius in pixels.
    pub annulus_outer: f64,
    /// Clipping applied to the annulus population.
    pub sky_clip: SigmaClip,
}

impl Default for PhotometerConfig {
    fn default() -> Self {
        Self {
            aperture_radius: 5.0,
            annulus_inner: 8.0,
            annulus_outer: 12.0,
            sky_clip: SigmaClip::default(),
        }
    }
}

impl PhotometerConfig {
    /// Validated constructor.
    ///
    /// # Errors
    ///
    /// Returns [`PhotometryConfigError`] when the aperture radius is
    /// non-positive or the annulus radii are not strictly ordered.
    pub fn new(
        aperture_radius: f64,
        annulus_inner: f64,
        annulus_outer: f64,
    ) -> Result<Self, PhotometryConfigError> {
        if !(aperture_radius > 0.0) {
            return Err(PhotometryConfigError::NonPositiveAperture(aperture_radius));
        }
        if !(annulus_inner > 0.0) || !(annulus_outer > annulus_inner) {
            return Err(PhotometryConfigError::InvalidAnnulus {
                inner: annulus_inner,
                outer: annulus_outer,
            });
        }

        Ok(Self {
            aperture_radius,
            annulus_inner,
            annulus_outer,
            sky_clip: SigmaClip::default(),
        })
    }
}

/// Aperture photometer for a batch of detected sources.
pub struct SourcePhotometer<N: NoiseModel> {
    config: PhotometerConfig,
    noise_model: N,
}

impl<N: NoiseModel> SourcePhotometer<N> {
    /// Create a photometer from geometry and a noise collaborator.
    pub fn new(config: PhotometerConfig, noise_model: N) -> Self {
        Self {
            config,
            noise_model,
        }
    }

    /// Measure one source.
    ///
    /// 1. Sub-pixel-weighted aperture sum at the source centroid.
    /// 2. Sigma-clipped mean sky per pixel from the annulus population
    ///    alone, so neighbors inside the annulus are rejected.
    /// 3. Sky contribution (per-pixel level times effective aperture
    ///    area) subtracted from the raw sum.
    /// 4. Flux uncertainty from the noise model; magnitude
    ///    `-2.5 log10(flux / exposure_s)` with the first-order error
    ///    `dm = dflux / flux`.
    ///
    /// The frame is never mutated.
    ///
    /// # Errors
    ///
    /// Returns a per-row [`PhotometryError`] when the aperture is
    /// empty, the annulus population is below [`MIN_ANNULUS_PIXELS`],
    /// or the sky-subtracted flux is non-positive.
    pub fn measure(
        &self,
        frame: &CcdFrame,
        source: &SourceRecord,
    ) -> Result<PhotometryRecord, PhotometryError> {
        let image = frame.pixels();
        let aperture = CircularAperture {
            x: source.x,
            y: source.y,
            radius: self.config.aperture_radius,
        };

        let aperture_sum = weighted_aperture_sum(&image, &aperture);
        if aperture_sum.n_pixels == 0 {
            return Err(PhotometryError::EmptyAperture {
                x: source.x,
                y: source.y,
            });
        }

        let annulus = collect_annulus_pixels(
            &image,
            source.x,
            source.y,
            self.config.annulus_inner,
            self.config.annulus_outer,
        );
        if annulus.len() < MIN_ANNULUS_PIXELS {
            return Err(PhotometryError::EmptyAnnulus {
                x: source.x,
                y: source.y,
                count: annulus.len(),
                required: MIN_ANNULUS_PIXELS,
            });
        }

        // The clip cannot fail here: the annulus holds >= MIN_ANNULUS_PIXELS
        // finite values.
        let sky = self
            .config
            .sky_clip
            .clip(&annulus)
            .expect("annulus population is non-empty and finite");

        let sky_contribution = sky.mean * aperture_sum.area;
        let flux = aperture_sum.sum - sky_contribution;

        if flux <= 0.0 {
            return Err(PhotometryError::NonPositiveFlux {
                x: source.x,
                y: source.y,
                flux,
            });
        }

        let background_rms = sky.std_dev * aperture_sum.area.sqrt();
        let flux_err = self
            .noise_model
            .error(aperture_sum.sum, background_rms, frame.gain());

        let mag_inst = -2.5 * (flux / frame.exposure_seconds()).log10();
        // First-order linear propagation, deliberately not the full
        // logarithmic form.
        let mag_err = flux_err / flux;

        Ok(PhotometryRecord {
            id: source.id,
            x: source.x,
            y: source.y,
            aperture_sum: aperture_sum.sum,
            aperture_area: aperture_sum.area,
            sky_per_pixel: sky.mean,
            sky_rms: sky.std_dev,
            flux,
            flux_err,
            mag_inst,
            mag_err,
            sky: None,
        })
    }

    /// Measure a batch of sources.
    ///
    /// Returns one result per input source, index-aligned. Per-row
    /// failures are logged and reported in place; they never abort the
    /// remaining sources.
    pub fn measure_all(
        &self,
        frame: &CcdFrame,
        sources: &[SourceRecord],
    ) -> Vec<Result<PhotometryRecord, PhotometryError>> {
        sources
            .iter()
            .map(|source| {
                let result = self.measure(frame, source);
                if let Err(err) = &result {
                    log::warn!("photometry failed for source {}: {err}", source.id);
                }
                result
            })
            .collect()
    }
}
