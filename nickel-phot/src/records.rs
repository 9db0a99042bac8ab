//! Record types carried between pipeline stages.
//!
//! Each stage consumes the previous stage's record type and produces
//! its own, so the fields required at every boundary are fixed at
//! compile time instead of living in a dynamically grown table.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use nickel_math::{Angle, Equatorial, Locatable2d};
use serde::{Deserialize, Serialize};

/// Photometric band of an observation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Band {
    /// Johnson B (blue).
    B,
    /// Johnson V (visual).
    V,
    /// Cousins R (red).
    R,
    /// Cousins I (near infrared).
    I,
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Band::B => "B",
            Band::V => "V",
            Band::R => "R",
            Band::I => "I",
        };
        write!(f, "{name}")
    }
}

impl FromStr for Band {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "B" | "b" => Ok(Band::B),
            "V" | "v" => Ok(Band::V),
            "R" | "r" => Ok(Band::R),
            "I" | "i" => Ok(Band::I),
            other => Err(format!("unknown band '{other}', expected one of B, V, R, I")),
        }
    }
}

/// One detected source, as produced by the upstream detector.
///
/// The detection flux is whatever statistic the detector ranked
/// candidates by; it is carried only for ordering and never enters a
/// photometric measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Detector-assigned identifier, unique within one frame.
    pub id: usize,
    /// Centroid x-coordinate (column) with sub-pixel precision.
    pub x: f64,
    /// Centroid y-coordinate (row) with sub-pixel precision.
    pub y: f64,
    /// Raw detection flux, for ranking only.
    pub detection_flux: f64,
}

impl Locatable2d for SourceRecord {
    fn x(&self) -> f64 {
        self.x
    }

    fn y(&self) -> f64 {
        self.y
    }
}

/// One photometric measurement.
///
/// Constructed only for sources that yielded a positive sky-subtracted
/// flux; rows that did not are reported as per-row errors by the
/// photometer, so every field here is finite by construction. The sky
/// position is absent until the astrometric mapper fills it in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotometryRecord {
    /// Identifier of the measured source.
    pub id: usize,
    /// Centroid x-coordinate (column).
    pub x: f64,
    /// Centroid y-coordinate (row).
    pub y: f64,
    /// Raw sub-pixel-weighted sum of counts inside the aperture.
    pub aperture_sum: f64,
    /// Effective aperture area in pixels (sum of sub-pixel weights).
    pub aperture_area: f64,
    /// Sigma-clipped sky level per pixel from the annulus.
    pub sky_per_pixel: f64,
    /// Standard deviation of the clipped annulus population.
    pub sky_rms: f64,
    /// Sky-subtracted flux in counts. Always positive.
    pub flux: f64,
    /// Flux uncertainty from the CCD noise model, in counts.
    pub flux_err: f64,
    /// Instrumental magnitude, `-2.5 log10(flux / exposure_s)`.
    pub mag_inst: f64,
    /// Instrumental magnitude uncertainty.
    pub mag_err: f64,
    /// Equatorial position, attached by the astrometric mapper.
    pub sky: Option<Equatorial>,
}

impl Locatable2d for PhotometryRecord {
    fn x(&self) -> f64 {
        self.x
    }

    fn y(&self) -> f64 {
        self.y
    }
}

/// One entry of a reference catalog, with per-band magnitudes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogStar {
    /// Catalog position.
    pub position: Equatorial,
    /// Calibrated magnitude per band. Bands the catalog does not cover
    /// are simply absent.
    pub magnitudes: BTreeMap<Band, f64>,
}

impl CatalogStar {
    /// Catalog magnitude in the given band, if covered.
    pub fn magnitude(&self, band: Band) -> Option<f64> {
        self.magnitudes.get(&band).copied()
    }
}

/// A local source paired with its nearest catalog counterpart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossMatchRecord {
    /// The local photometric measurement.
    pub photometry: PhotometryRecord,
    /// Row index of the matched star in the queried catalog table.
    pub catalog_index: usize,
    /// Catalog magnitude in the band being calibrated.
    pub catalog_mag: f64,
    /// Angular separation of the accepted match.
    pub separation: Angle,
}

impl CrossMatchRecord {
    /// Zero-point sample contributed by this pair:
    /// catalog magnitude minus instrumental magnitude.
    pub fn delta_mag(&self) -> f64 {
        self.catalog_mag - self.photometry.mag_inst
    }
}

/// A photometric measurement with its calibrated magnitude.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibratedRecord {
    /// The underlying measurement.
    pub photometry: PhotometryRecord,
    /// Band the calibration applies to.
    pub band: Band,
    /// Calibrated magnitude, `mag_inst + zero_point`.
    pub mag_calibrated: f64,
}

/// A pair of calibrated magnitudes in two bands for one sky position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorRecord {
    /// Identifier of the first-band record.
    pub id_a: usize,
    /// Identifier of the matched second-band record.
    pub id_b: usize,
    /// Sky position of the first-band record.
    pub position: Equatorial,
    /// Calibrated magnitude in the first band.
    pub mag_a: f64,
    /// Calibrated magnitude in the second band.
    pub mag_b: f64,
    /// Color index, `mag_a - mag_b`.
    pub color: f64,
    /// Angular separation of the cross-band match.
    pub separation: Angle,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_round_trip() {
        for band in [Band::B, Band::V, Band::R, Band::I] {
            let parsed: Band = band.to_string().parse().unwrap();
            assert_eq!(parsed, band);
        }
    }

    #[test]
    fn test_band_parse_rejects_unknown() {
        assert!("U".parse::<Band>().is_err());
        assert!("".parse::<Band>().is_err());
    }

    #[test]
    fn test_catalog_star_band_lookup() {
        let mut magnitudes = BTreeMap::new();
        magnitudes.insert(Band::B, 13.2);
        magnitudes.insert(Band::V, 12.7);
        let star = CatalogStar {
            position: Equatorial::from_degrees(10.0, 20.0),
            magnitudes,
        };

        assert_eq!(star.magnitude(Band::B), Some(13.2));
        assert_eq!(star.magnitude(Band::V), Some(12.7));
        assert_eq!(star.magnitude(Band::R), None);
    }
}
