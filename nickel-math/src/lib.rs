//! nickel-math - Numerical support for the Nickel photometric reduction pipeline
//!
//! This crate provides the small mathematical core shared by the
//! photometry and calibration stages:
//!
//! - **Statistics** - robust estimators (median, MAD, iterative sigma-clipping)
//! - **Angles** - angular quantities and equatorial sky coordinates with
//!   angular separation
//! - **Locatable2d** - trait for anything carrying a 2D pixel position
//!
//! # Example
//!
//! ```
//! use nickel_math::stats::{median, SigmaClip};
//!
//! let mut values = vec![10.0; 20];
//! values.push(500.0); // cosmic ray
//! let clipped = SigmaClip::default().clip(&values).unwrap();
//! assert_eq!(clipped.mean, 10.0); // outlier rejected
//! assert_eq!(median(&[1.0, 2.0, 3.0]).unwrap(), 2.0);
//! ```

pub mod angle;
pub mod stats;

pub use angle::{Angle, Equatorial};
pub use stats::{median, median_abs_deviation, SigmaClip, StatsError};

/// Trait for objects that have a 2D pixel location.
pub trait Locatable2d {
    /// Returns the x-coordinate of the object.
    fn x(&self) -> f64;

    /// Returns the y-coordinate of the object.
    fn y(&self) -> f64;
}

impl Locatable2d for (f64, f64) {
    fn x(&self) -> f64 {
        self.0
    }

    fn y(&self) -> f64 {
        self.1
    }
}
