//! Zero-point estimation and application.
//!
//! The zero point for a band is the median of
//! `catalog_mag - instrumental_mag` over cross-matched sources that
//! survive a caller-supplied saturation filter. The median, not the
//! mean, absorbs residual mismatches and variables.

use nickel_math::stats::median;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::records::{Band, CalibratedRecord, CrossMatchRecord, PhotometryRecord};

/// Minimum surviving matches for a trustworthy zero point.
pub const MIN_CALIBRATION_MATCHES: usize = 3;

/// Errors from zero-point estimation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ZeroPointError {
    /// Too few matches survived filtering to estimate a zero point.
    /// The caller may substitute an explicit fallback via
    /// [`ZeroPoint::fallback`], never a fabricated value.
    #[error("only {surviving} cross-matched sources survive filtering, need at least {required}")]
    InsufficientMatches {
        /// Matches surviving the saturation filter.
        surviving: usize,
        /// Minimum required.
        required: usize,
    },
}

/// Filter excluding saturated or otherwise unreliable matched pairs
/// from the zero-point estimate.
///
/// All bounds are optional; an empty filter accepts everything.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SaturationFilter {
    /// Reject pairs with `delta_mag` below this value.
    pub delta_min: Option<f64>,
    /// Reject pairs with `delta_mag` above this value.
    pub delta_max: Option<f64>,
    /// Reject pairs whose instrumental magnitude is numerically below
    /// this limit (too bright, likely saturated).
    pub bright_limit: Option<f64>,
}

impl SaturationFilter {
    /// Accept a delta-magnitude range, rejecting pairs outside it.
    pub fn delta_range(min: f64, max: f64) -> Self {
        Self {
            delta_min: Some(min),
            delta_max: Some(max),
            bright_limit: None,
        }
    }

    /// Whether a matched pair passes the filter.
    pub fn accepts(&self, pair: &CrossMatchRecord) -> bool {
        let delta = pair.delta_mag();
        if let Some(min) = self.delta_min {
            if delta < min {
                return false;
            }
        }
        if let Some(max) = self.delta_max {
            if delta > max {
                return false;
            }
        }
        if let Some(limit) = self.bright_limit {
            if pair.photometry.mag_inst < limit {
                return false;
            }
        }
        true
    }
}

/// A per-band photometric zero point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZeroPoint {
    /// Band the zero point calibrates.
    pub band: Band,
    /// Additive offset from instrumental to calibrated magnitudes.
    pub value: f64,
    /// Matches the estimate was computed from (zero for fallbacks).
    pub n_matches: usize,
    /// Whether this is a caller-supplied fallback constant rather than
    /// an estimate from this frame.
    pub is_fallback: bool,
}

impl ZeroPoint {
    /// An explicit, externally supplied fallback zero point.
    pub fn fallback(band: Band, value: f64) -> Self {
        Self {
            band,
            value,
            n_matches: 0,
            is_fallback: true,
        }
    }
}

/// Estimate a band's zero point from cross-matched pairs.
///
/// Filters the pairs through `filter`, then takes the median of the
/// surviving `catalog - instrumental` offsets.
///
/// # Errors
///
/// Returns [`ZeroPointError::InsufficientMatches`] when fewer than
/// `min_matches` pairs survive.
pub fn estimate_zero_point(
    matches: &[CrossMatchRecord],
    band: Band,
    filter: &SaturationFilter,
    min_matches: usize,
) -> Result<ZeroPoint, ZeroPointError> {
    let deltas: Vec<f64> = matches
        .iter()
        .filter(|pair| filter.accepts(pair))
        .map(|pair| pair.delta_mag())
        .collect();

    if deltas.len() < min_matches.max(1) {
        return Err(ZeroPointError::InsufficientMatches {
            surviving: deltas.len(),
            required: min_matches,
        });
    }

    // Deltas are finite by construction, so the median cannot fail on
    // a non-empty slice.
    let value = median(&deltas).expect("delta population is non-empty and finite");

    Ok(ZeroPoint {
        band,
        value,
        n_matches: deltas.len(),
        is_fallback: false,
    })
}

/// Apply a zero point uniformly to a band's photometry table.
///
/// Every record receives `mag_inst + zero_point`, including sources
/// that took no part in the cross-match; the calibration extrapolates
/// over the whole table.
pub fn apply_zero_point(records: &[PhotometryRecord], zero_point: &ZeroPoint) -> Vec<CalibratedRecord> {
    records
        .iter()
        .map(|record| CalibratedRecord {
            photometry: record.clone(),
            band: zero_point.band,
            mag_calibrated: record.mag_inst + zero_point.value,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nickel_math::{Angle, Equatorial};

    fn pair(id: usize, mag_inst: f64, catalog_mag: f64) -> CrossMatchRecord {
        CrossMatchRecord {
            photometry: record(id, mag_inst),
            catalog_index: id,
            catalog_mag,
            separation: Angle::from_arcsec(0.5),
        }
    }

    fn record(id: usize, mag_inst: f64) -> PhotometryRecord {
        PhotometryRecord {
            id,
            x: id as f64,
            y: id as f64,
            aperture_sum: 10_000.0,
            aperture_area: 78.5,
            sky_per_pixel: 100.0,
            sky_rms: 3.0,
            flux: 5_000.0,
            flux_err: 80.0,
            mag_inst,
            mag_err: 0.016,
            sky: Some(Equatorial::from_degrees(180.0, 35.0)),
        }
    }

    #[test]
    fn test_constant_offset_recovered_exactly() {
        // Five sources, constant catalog - instrumental offset of 2.5.
        let insts = [18.0, 19.0, 20.0, 21.0, 22.0];
        let pairs: Vec<CrossMatchRecord> = insts
            .iter()
            .enumerate()
            .map(|(id, &m)| pair(id, m, m + 2.5))
            .collect();

        let zp = estimate_zero_point(
            &pairs,
            Band::V,
            &SaturationFilter::default(),
            MIN_CALIBRATION_MATCHES,
        )
        .unwrap();
        assert_eq!(zp.value, 2.5);
        assert_eq!(zp.n_matches, 5);
        assert!(!zp.is_fallback);

        let records: Vec<PhotometryRecord> =
            insts.iter().enumerate().map(|(id, &m)| record(id, m)).collect();
        let calibrated = apply_zero_point(&records, &zp);
        let expected = [20.5, 21.5, 22.5, 23.5, 24.5];
        for (cal, want) in calibrated.iter().zip(expected) {
            assert_eq!(cal.mag_calibrated, want);
        }
    }

    #[test]
    fn test_saturation_filter_excludes_outlier() {
        // Source 1's delta is an outlier at 0.1; a range mask cutting
        // below 2.0 must leave the median of the remaining four at 2.5.
        let insts = [18.0, 19.0, 20.0, 21.0, 22.0];
        let pairs: Vec<CrossMatchRecord> = insts
            .iter()
            .enumerate()
            .map(|(id, &m)| {
                let delta = if id == 0 { 0.1 } else { 2.5 };
                pair(id, m, m + delta)
            })
            .collect();

        let filter = SaturationFilter::delta_range(2.0, 3.0);
        let zp =
            estimate_zero_point(&pairs, Band::V, &filter, MIN_CALIBRATION_MATCHES).unwrap();
        assert_eq!(zp.value, 2.5);
        assert_eq!(zp.n_matches, 4);
    }

    #[test]
    fn test_median_resists_unfiltered_outlier() {
        let pairs = vec![
            pair(0, 18.0, 20.5),
            pair(1, 19.0, 21.5),
            pair(2, 20.0, 22.5),
            pair(3, 21.0, 23.5),
            pair(4, 22.0, 30.0), // wild mismatch, delta 8.0
        ];
        let zp = estimate_zero_point(
            &pairs,
            Band::V,
            &SaturationFilter::default(),
            MIN_CALIBRATION_MATCHES,
        )
        .unwrap();
        assert_relative_eq!(zp.value, 2.5);
    }

    #[test]
    fn test_bright_limit_rejects_saturated() {
        let pairs = vec![
            pair(0, 9.0, 11.0), // saturated, wrong delta
            pair(1, 18.0, 20.5),
            pair(2, 19.0, 21.5),
            pair(3, 20.0, 22.5),
        ];
        let filter = SaturationFilter {
            bright_limit: Some(15.0),
            ..Default::default()
        };
        let zp =
            estimate_zero_point(&pairs, Band::V, &filter, MIN_CALIBRATION_MATCHES).unwrap();
        assert_eq!(zp.n_matches, 3);
        assert_relative_eq!(zp.value, 2.5);
    }

    #[test]
    fn test_insufficient_matches() {
        let pairs = vec![pair(0, 18.0, 20.5), pair(1, 19.0, 21.5)];
        let err = estimate_zero_point(
            &pairs,
            Band::V,
            &SaturationFilter::default(),
            MIN_CALIBRATION_MATCHES,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ZeroPointError::InsufficientMatches {
                surviving: 2,
                required: MIN_CALIBRATION_MATCHES
            }
        );
    }

    #[test]
    fn test_fallback_zero_point() {
        let zp = ZeroPoint::fallback(Band::B, 23.1);
        assert!(zp.is_fallback);
        assert_eq!(zp.n_matches, 0);

        let records = vec![record(0, 18.0)];
        let calibrated = apply_zero_point(&records, &zp);
        assert_relative_eq!(calibrated[0].mag_calibrated, 41.1);
    }

    #[test]
    fn test_zero_offset_is_identity() {
        let records = vec![record(0, 18.0), record(1, 21.3)];
        let zp = ZeroPoint {
            band: Band::V,
            value: 0.0,
            n_matches: 5,
            is_fallback: false,
        };
        for (cal, orig) in apply_zero_point(&records, &zp).iter().zip(&records) {
            assert_eq!(cal.mag_calibrated, orig.mag_inst);
        }
    }

    #[test]
    fn test_application_is_additive_shift() {
        let records = vec![record(0, 18.25), record(1, 20.75), record(2, 16.5)];
        let zp = ZeroPoint {
            band: Band::V,
            value: 4.37,
            n_matches: 8,
            is_fallback: false,
        };
        let calibrated = apply_zero_point(&records, &zp);

        for i in 0..records.len() {
            for j in 0..records.len() {
                assert_relative_eq!(
                    calibrated[i].mag_calibrated - calibrated[j].mag_calibrated,
                    records[i].mag_inst - records[j].mag_inst,
                    epsilon = 1e-12
                );
            }
        }
    }

    #[test]
    fn test_application_covers_unmatched_records() {
        // Calibration extrapolates: records that never cross-matched
        // still get the shift.
        let mut unmatched = record(7, 23.9);
        unmatched.sky = None;
        let zp = ZeroPoint {
            band: Band::V,
            value: 2.0,
            n_matches: 5,
            is_fallback: false,
        };
        let calibrated = apply_zero_point(&[unmatched], &zp);
        assert_relative_eq!(calibrated[0].mag_calibrated, 25.9);
    }
}
