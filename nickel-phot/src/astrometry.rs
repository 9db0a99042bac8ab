//! Pixel-to-sky coordinate mapping.
//!
//! The pipeline consumes an astrometric solution as an opaque
//! [`SkyTransform`]; where it comes from (FITS header metadata or a
//! plate-solving service) is not this module's concern. The concrete
//! [`TangentPlane`] implementation provides the gnomonic transform the
//! fixtures and demos use.
//!
//! # Pixel convention
//!
//! All pixel coordinates here are zero-based, with `(0.0, 0.0)` at the
//! center of the corner pixel, matching the detection and photometry
//! stages. A transform built from a one-based source must be shifted
//! by its producer before it gets here.

use nalgebra::{Matrix3, Vector3};
use nickel_math::Equatorial;
use thiserror::Error;

use crate::records::PhotometryRecord;

/// Errors from coordinate transformation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoordinateTransformError {
    /// No astrometric solution is available for the frame.
    #[error("no astrometric solution available for this frame")]
    MissingTransform,

    /// The pixel does not map to a valid sky position.
    #[error("pixel ({x:.1}, {y:.1}) does not map to a valid sky position")]
    UnmappablePixel {
        /// Pixel x-coordinate.
        x: f64,
        /// Pixel y-coordinate.
        y: f64,
    },

    /// The sky position projects behind the tangent plane.
    #[error("sky position (ra {ra_deg:.4} deg, dec {dec_deg:.4} deg) is behind the projection")]
    BehindProjection {
        /// Right ascension in degrees.
        ra_deg: f64,
        /// Declination in degrees.
        dec_deg: f64,
    },
}

/// A two-way mapping between detector pixels and the celestial sphere.
pub trait SkyTransform: std::fmt::Debug {
    /// Map a pixel position to equatorial coordinates.
    fn pixel_to_sky(&self, x: f64, y: f64) -> Result<Equatorial, CoordinateTransformError>;

    /// Map equatorial coordinates to a pixel position.
    ///
    /// The result may lie outside the physical detector; callers that
    /// care about bounds check them against the frame dimensions.
    fn sky_to_pixel(&self, position: &Equatorial)
        -> Result<(f64, f64), CoordinateTransformError>;
}

/// Gnomonic (tangent-plane) transform about a field center.
///
/// The camera frame is built exactly like a detector projection:
/// Z-axis toward the field center, Y-axis toward celestial north
/// projected on the tangent plane, X-axis completing the right-handed
/// system. The field center maps to the detector center.
#[derive(Debug, Clone)]
pub struct TangentPlane {
    center: Equatorial,
    radians_per_pixel: f64,
    width: usize,
    height: usize,
    /// Columns are the camera basis vectors expressed in celestial
    /// coordinates, so `v_cel = R * v_cam` and `v_cam = R^T * v_cel`.
    rotation: Matrix3<f64>,
}

impl TangentPlane {
    /// Build a transform from a field center, pixel scale, and
    /// detector geometry.
    pub fn new(
        center: &Equatorial,
        radians_per_pixel: f64,
        width: usize,
        height: usize,
    ) -> Self {
        // Z-axis points to the field center.
        let z = center.unit_vector();

        // Y-axis toward celestial north, X-axis eastward.
        let north = Vector3::new(0.0, 0.0, 1.0);
        let east = north.cross(&z).normalize();
        let y = z.cross(&east).normalize();
        let x = y.cross(&z).normalize();

        let rotation = Matrix3::from_columns(&[x, y, z]);

        Self {
            center: *center,
            radians_per_pixel,
            width,
            height,
            rotation,
        }
    }

    /// The field center this transform is built around.
    pub fn center(&self) -> Equatorial {
        self.center
    }

    /// Angular pixel scale in radians per pixel.
    pub fn radians_per_pixel(&self) -> f64 {
        self.radians_per_pixel
    }

    fn detector_center(&self) -> (f64, f64) {
        (
            (self.width as f64 - 1.0) / 2.0,
            (self.height as f64 - 1.0) / 2.0,
        )
    }
}

impl SkyTransform for TangentPlane {
    fn pixel_to_sky(&self, x: f64, y: f64) -> Result<Equatorial, CoordinateTransformError> {
        if !x.is_finite() || !y.is_finite() {
            return Err(CoordinateTransformError::UnmappablePixel { x, y });
        }

        let (cx, cy) = self.detector_center();
        let tan_x = (x - cx) * self.radians_per_pixel;
        let tan_y = (y - cy) * self.radians_per_pixel;

        let v_cam = Vector3::new(tan_x, tan_y, 1.0).normalize();
        let v_cel = self.rotation * v_cam;

        Ok(Equatorial::from_vector(&v_cel))
    }

    fn sky_to_pixel(
        &self,
        position: &Equatorial,
    ) -> Result<(f64, f64), CoordinateTransformError> {
        let v_cam = self.rotation.transpose() * position.unit_vector();

        // The gnomonic projection is undefined for the hemisphere
        // behind the tangent plane.
        if v_cam.z <= 0.0 {
            return Err(CoordinateTransformError::BehindProjection {
                ra_deg: position.ra_degrees(),
                dec_deg: position.dec_degrees(),
            });
        }

        let tan_x = v_cam.x / v_cam.z;
        let tan_y = v_cam.y / v_cam.z;

        let (cx, cy) = self.detector_center();
        Ok((
            cx + tan_x / self.radians_per_pixel,
            cy + tan_y / self.radians_per_pixel,
        ))
    }
}

/// Map a batch of photometry centroids to sky coordinates.
///
/// Returns one result per record, index-aligned, so a centroid the
/// transform cannot map fails alone.
pub fn map_centroids(
    transform: &dyn SkyTransform,
    records: &[PhotometryRecord],
) -> Vec<Result<Equatorial, CoordinateTransformError>> {
    records
        .iter()
        .map(|record| transform.pixel_to_sky(record.x, record.y))
        .collect()
}

/// Attach sky coordinates to photometry records in place.
///
/// Records the transform cannot map keep `sky = None` and are counted;
/// the caller decides whether a non-zero count is tolerable.
pub fn attach_sky_coords(
    records: &mut [PhotometryRecord],
    transform: &dyn SkyTransform,
) -> usize {
    let mut failures = 0;
    for record in records.iter_mut() {
        match transform.pixel_to_sky(record.x, record.y) {
            Ok(position) => record.sky = Some(position),
            Err(err) => {
                log::warn!("no sky position for source {}: {err}", record.id);
                record.sky = None;
                failures += 1;
            }
        }
    }
    failures
}
