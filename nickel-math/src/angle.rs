//! Angular quantities and equatorial sky coordinates.
//!
//! Cross-matching and field queries work in small angular separations
//! (arcseconds), while coordinate transforms work in radians. The
//! [`Angle`] newtype keeps the unit conversions in one place, and
//! [`Equatorial`] provides the angular-distance metric used by every
//! positional match in the pipeline.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// An angle stored internally in radians.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Angle {
    radians: f64,
}

impl Angle {
    /// Create an angle from radians.
    pub fn from_radians(radians: f64) -> Self {
        Self { radians }
    }

    /// Create an angle from degrees.
    pub fn from_degrees(degrees: f64) -> Self {
        Self {
            radians: degrees.to_radians(),
        }
    }

    /// Create an angle from arcseconds.
    pub fn from_arcsec(arcsec: f64) -> Self {
        Self::from_degrees(arcsec / 3600.0)
    }

    /// Value in radians.
    pub fn as_radians(&self) -> f64 {
        self.radians
    }

    /// Value in degrees.
    pub fn as_degrees(&self) -> f64 {
        self.radians.to_degrees()
    }

    /// Value in arcseconds.
    pub fn as_arcsec(&self) -> f64 {
        self.as_degrees() * 3600.0
    }
}

/// A position on the celestial sphere in equatorial coordinates.
///
/// Right ascension and declination are stored in radians. RA is
/// normalized to `[0, 2π)` at construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Equatorial {
    /// Right ascension in radians, in `[0, 2π)`.
    pub ra: f64,
    /// Declination in radians, in `[-π/2, π/2]`.
    pub dec: f64,
}

impl Equatorial {
    /// Create a position from RA/Dec in radians. RA is wrapped into `[0, 2π)`.
    pub fn new(ra: f64, dec: f64) -> Self {
        let two_pi = 2.0 * std::f64::consts::PI;
        Self {
            ra: ra.rem_euclid(two_pi),
            dec,
        }
    }

    /// Create a position from RA/Dec in degrees.
    pub fn from_degrees(ra_deg: f64, dec_deg: f64) -> Self {
        Self::new(ra_deg.to_radians(), dec_deg.to_radians())
    }

    /// Right ascension in degrees.
    pub fn ra_degrees(&self) -> f64 {
        self.ra.to_degrees()
    }

    /// Declination in degrees.
    pub fn dec_degrees(&self) -> f64 {
        self.dec.to_degrees()
    }

    /// Unit vector on the celestial sphere (x toward RA=0 on the
    /// equator, z toward the north celestial pole).
    pub fn unit_vector(&self) -> Vector3<f64> {
        let cos_dec = self.dec.cos();
        Vector3::new(
            cos_dec * self.ra.cos(),
            cos_dec * self.ra.sin(),
            self.dec.sin(),
        )
    }

    /// Build a position from a direction vector (need not be normalized).
    pub fn from_vector(v: &Vector3<f64>) -> Self {
        let norm = v.norm();
        Self::new(v.y.atan2(v.x), (v.z / norm).asin())
    }

    /// Great-circle angular separation between two positions.
    ///
    /// Uses the haversine form, which stays accurate for the
    /// arcsecond-scale separations cross-matching cares about.
    pub fn angular_distance(&self, other: &Equatorial) -> Angle {
        let sin_half_ddec = ((other.dec - self.dec) / 2.0).sin();
        let sin_half_dra = ((other.ra - self.ra) / 2.0).sin();

        let h = sin_half_ddec * sin_half_ddec
            + self.dec.cos() * other.dec.cos() * sin_half_dra * sin_half_dra;

        Angle::from_radians(2.0 * h.sqrt().min(1.0).asin())
    }
}
