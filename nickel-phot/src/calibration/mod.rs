//! Photometric calibration: catalog cross-matching, zero points, and
//! cross-band color tables.

pub mod color;
pub mod crossmatch;
pub mod zeropoint;

pub use color::{match_bands, DEFAULT_COLOR_TOLERANCE_ARCSEC};
pub use crossmatch::{cross_match, DEFAULT_MATCH_TOLERANCE_ARCSEC};
pub use zeropoint::{
    apply_zero_point, estimate_zero_point, SaturationFilter, ZeroPoint, ZeroPointError,
    MIN_CALIBRATION_MATCHES,
};
