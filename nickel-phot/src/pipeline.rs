//! Per-band reduction pipeline.
//!
//! Composes the stages in a fixed order: background statistics,
//! aperture photometry, astrometric mapping, catalog cross-match,
//! zero-point estimation, and calibration. All state for a band lives
//! in its [`BandObservation`] and the returned [`BandSolution`];
//! nothing leaks between bands or frames.

use std::time::Duration;

use nickel_math::stats::SigmaClip;
use nickel_math::Angle;
use thiserror::Error;

use crate::astrometry::{attach_sky_coords, CoordinateTransformError, SkyTransform, TangentPlane};
use crate::calibration::color::match_bands;
use crate::calibration::crossmatch::{cross_match, DEFAULT_MATCH_TOLERANCE_ARCSEC};
use crate::calibration::zeropoint::{
    apply_zero_point, estimate_zero_point, SaturationFilter, ZeroPoint, ZeroPointError,
    MIN_CALIBRATION_MATCHES,
};
use crate::calibration::DEFAULT_COLOR_TOLERANCE_ARCSEC;
use crate::frame::CcdFrame;
use crate::image_proc::background::{estimate_background, BackgroundError, BackgroundEstimate};
use crate::image_proc::photometer::{NoiseModel, PhotometerConfig, SourcePhotometer};
use crate::records::{Band, CalibratedRecord, ColorRecord, PhotometryRecord, SourceRecord};
use crate::services::{
    CatalogQueryError, PlateSolveError, PlateSolver, ReferenceCatalog,
    DEFAULT_PLATE_SOLVE_TIMEOUT,
};

/// Errors that abort a band's pipeline run.
///
/// Per-source photometry and mapping failures are not here: those are
/// isolated per row and only counted. Everything below is fatal for
/// the band being processed, and only for it.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Frame background statistics could not be computed.
    #[error("background estimation failed: {0}")]
    Background(#[from] BackgroundError),

    /// No astrometric solution could be obtained.
    #[error("plate solve failed: {0}")]
    PlateSolve(#[from] PlateSolveError),

    /// The astrometric solution was missing or unusable.
    #[error("coordinate transform failed: {0}")]
    Transform(#[from] CoordinateTransformError),

    /// The reference catalog could not be queried.
    #[error("catalog query failed: {0}")]
    Catalog(#[from] CatalogQueryError),

    /// No zero point could be estimated and no fallback was supplied.
    #[error("zero-point estimation failed: {0}")]
    ZeroPoint(#[from] ZeroPointError),
}

/// Everything the pipeline needs about one band of one field.
///
/// Replaces ad-hoc shared state between reduction steps: each band's
/// frame, detections, and optional header astrometry travel together.
#[derive(Debug, Clone)]
pub struct BandObservation {
    /// Photometric band of the frame.
    pub band: Band,
    /// The calibrated frame.
    pub frame: CcdFrame,
    /// Detections from the upstream detector.
    pub sources: Vec<SourceRecord>,
    /// Astrometric solution from the frame header, if one exists.
    /// When absent the pipeline asks its plate solver.
    pub wcs: Option<TangentPlane>,
}

/// Tuning knobs for a reduction run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Aperture and annulus geometry.
    pub photometer: PhotometerConfig,
    /// Clipping for whole-frame background statistics.
    pub background_clip: SigmaClip,
    /// Catalog cross-match tolerance.
    pub match_tolerance: Angle,
    /// Catalog query radius around the field center.
    pub search_radius: Angle,
    /// Saturation filter for zero-point estimation.
    pub saturation: SaturationFilter,
    /// Minimum surviving matches for a zero point.
    pub min_matches: usize,
    /// Plate-solve timeout.
    pub solve_timeout: Duration,
    /// Explicit fallback zero point applied when too few matches
    /// survive. `None` makes insufficient matches fatal.
    pub fallback_zero_point: Option<f64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            photometer: PhotometerConfig::default(),
            background_clip: SigmaClip::default(),
            match_tolerance: Angle::from_arcsec(DEFAULT_MATCH_TOLERANCE_ARCSEC),
            search_radius: Angle::from_degrees(0.3),
            saturation: SaturationFilter::default(),
            min_matches: MIN_CALIBRATION_MATCHES,
            solve_timeout: DEFAULT_PLATE_SOLVE_TIMEOUT,
            fallback_zero_point: None,
        }
    }
}

/// Result of reducing one band.
#[derive(Debug, Clone)]
pub struct BandSolution {
    /// Band that was reduced.
    pub band: Band,
    /// Whole-frame background statistics.
    pub background: BackgroundEstimate,
    /// Zero point applied to the table.
    pub zero_point: ZeroPoint,
    /// The calibrated photometry table.
    pub records: Vec<CalibratedRecord>,
    /// Cross-matched pairs that fed the zero point before filtering.
    pub n_matched: usize,
    /// Sources dropped by per-row photometry failures.
    pub n_invalid_photometry: usize,
    /// Measured sources the transform could not map.
    pub n_unmapped: usize,
}

/// The per-band reduction pipeline.
pub struct ReductionPipeline<'a, N: NoiseModel> {
    config: PipelineConfig,
    photometer: SourcePhotometer<N>,
    solver: Option<&'a dyn PlateSolver>,
    catalog: &'a dyn ReferenceCatalog,
}

impl<'a, N: NoiseModel> ReductionPipeline<'a, N> {
    /// Assemble a pipeline from configuration and collaborators.
    ///
    /// `solver` may be omitted when every observation carries header
    /// astrometry; an observation without either fails with
    /// [`CoordinateTransformError::MissingTransform`].
    pub fn new(
        config: PipelineConfig,
        noise_model: N,
        solver: Option<&'a dyn PlateSolver>,
        catalog: &'a dyn ReferenceCatalog,
    ) -> Self {
        let photometer = SourcePhotometer::new(config.photometer, noise_model);
        Self {
            config,
            photometer,
            solver,
            catalog,
        }
    }

    /// Reduce one band to a calibrated photometry table.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] when a whole-band stage fails; the
    /// error aborts this band only and corrupts nothing already
    /// computed for other bands.
    pub fn run_band(&self, observation: &BandObservation) -> Result<BandSolution, PipelineError> {
        let band = observation.band;
        let frame = &observation.frame;

        let background =
            estimate_background(&frame.pixels(), &self.config.background_clip, None)?;
        log::info!(
            "{band}: background median {:.1}, sigma {:.2} over {} px",
            background.median,
            background.std_dev,
            background.n_valid
        );

        let measurements = self.photometer.measure_all(frame, &observation.sources);
        let n_invalid_photometry = measurements.iter().filter(|r| r.is_err()).count();
        let mut records: Vec<PhotometryRecord> =
            measurements.into_iter().filter_map(Result::ok).collect();
        log::info!(
            "{band}: photometered {} of {} sources",
            records.len(),
            observation.sources.len()
        );

        let transform: Box<dyn SkyTransform> = match &observation.wcs {
            Some(wcs) => Box::new(wcs.clone()),
            None => match self.solver {
                Some(solver) => solver.solve(
                    &observation.sources,
                    frame.width(),
                    frame.height(),
                    self.config.solve_timeout,
                )?,
                None => return Err(CoordinateTransformError::MissingTransform.into()),
            },
        };

        let n_unmapped = attach_sky_coords(&mut records, transform.as_ref());

        let center = transform.pixel_to_sky(
            (frame.width() as f64 - 1.0) / 2.0,
            (frame.height() as f64 - 1.0) / 2.0,
        )?;
        let catalog_stars = self.catalog.query_region(&center, self.config.search_radius)?;
        log::info!(
            "{band}: {} catalog stars within {:.2} deg of field center",
            catalog_stars.len(),
            self.config.search_radius.as_degrees()
        );

        let matches = cross_match(
            &records,
            &catalog_stars,
            band,
            self.config.match_tolerance,
        );

        let zero_point = match estimate_zero_point(
            &matches,
            band,
            &self.config.saturation,
            self.config.min_matches,
        ) {
            Ok(zp) => zp,
            Err(err @ ZeroPointError::InsufficientMatches { .. }) => {
                match self.config.fallback_zero_point {
                    Some(value) => {
                        log::warn!("{band}: {err}; using fallback zero point {value}");
                        ZeroPoint::fallback(band, value)
                    }
                    None => return Err(err.into()),
                }
            }
        };
        log::info!(
            "{band}: zero point {:.3} from {} matches{}",
            zero_point.value,
            zero_point.n_matches,
            if zero_point.is_fallback { " (fallback)" } else { "" }
        );

        let records = apply_zero_point(&records, &zero_point);

        Ok(BandSolution {
            band,
            background,
            zero_point,
            records,
            n_matched: matches.len(),
            n_invalid_photometry,
            n_unmapped,
        })
    }
}

/// Build a color-magnitude table from two reduced bands.
///
/// Thin wrapper over [`match_bands`] with the conventional tolerance;
/// the color is `table_a - table_b` (B as `a` and V as `b` gives B-V).
pub fn color_table(
    a: &BandSolution,
    b: &BandSolution,
    tolerance: Option<Angle>,
) -> Vec<ColorRecord> {
    let tolerance =
        tolerance.unwrap_or_else(|| Angle::from_arcsec(DEFAULT_COLOR_TOLERANCE_ARCSEC));
    match_bands(&a.records, &b.records, tolerance)
}
