//! Aperture photometry and photometric calibration for Nickel CCD frames.
//!
//! This crate takes a calibrated CCD frame and a list of detected
//! sources (both produced upstream) and carries them through to
//! catalog-calibrated magnitudes:
//!
//! 1. **Background estimation** - sigma-clipped frame statistics
//! 2. **Aperture photometry** - sky-subtracted fluxes and instrumental
//!    magnitudes with CCD-noise uncertainties
//! 3. **Astrometric mapping** - pixel centroids to equatorial
//!    coordinates through a tangent-plane transform
//! 4. **Calibration** - catalog cross-match, median zero point, and
//!    calibrated magnitudes
//! 5. **Color matching** - cross-band pairing into a color-magnitude
//!    table
//!
//! Frame calibration (bias/flat/cosmic-ray), source detection, plate
//! solving, and the reference catalog itself are external
//! collaborators; the latter two are consumed through the traits in
//! [`services`] so everything here runs against in-memory fixtures.

pub mod astrometry;
pub mod calibration;
pub mod frame;
pub mod image_proc;
pub mod pipeline;
pub mod records;
pub mod services;

pub use frame::CcdFrame;
pub use records::{
    Band, CalibratedRecord, CatalogStar, ColorRecord, CrossMatchRecord, PhotometryRecord,
    SourceRecord,
};
