//! External service boundaries: plate solving and the reference catalog.
//!
//! Both services sit behind traits with a single blocking call so the
//! pipeline can run against in-memory fixtures, decoupled from network
//! availability. Timeouts are caller-specified; a timeout or transport
//! failure is fatal for the frame being processed and is surfaced, not
//! retried.

use std::time::Duration;

use nickel_math::{Angle, Equatorial};
use thiserror::Error;

use crate::astrometry::{SkyTransform, TangentPlane};
use crate::records::{CatalogStar, SourceRecord};

/// Default plate-solve timeout.
pub const DEFAULT_PLATE_SOLVE_TIMEOUT: Duration = Duration::from_secs(120);

/// Errors from the plate-solving service.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlateSolveError {
    /// The solve did not complete within the caller's timeout.
    #[error("plate solve did not complete within {limit:?}")]
    Timeout {
        /// The timeout that elapsed.
        limit: Duration,
    },

    /// The service failed or returned an unusable solution.
    #[error("plate solve service failure: {0}")]
    Service(String),

    /// Not enough sources to attempt a solve.
    #[error("plate solve needs at least {required} sources, got {provided}")]
    TooFewSources {
        /// Sources provided.
        provided: usize,
        /// Sources required.
        required: usize,
    },
}

/// Errors from the reference catalog service.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CatalogQueryError {
    /// The query did not complete within the caller's timeout.
    #[error("catalog query did not complete within {limit:?}")]
    Timeout {
        /// The timeout that elapsed.
        limit: Duration,
    },

    /// The service failed or returned an unreadable response.
    #[error("catalog service failure: {0}")]
    Service(String),
}

/// Astrometric plate-solving service.
///
/// One blocking request per frame: detected source centroids and the
/// frame geometry go in, a pixel-to-sky transform comes out.
pub trait PlateSolver {
    /// Solve the field for the given detections.
    fn solve(
        &self,
        sources: &[SourceRecord],
        width: usize,
        height: usize,
        timeout: Duration,
    ) -> Result<Box<dyn SkyTransform>, PlateSolveError>;
}

/// Sky-region query into an all-sky photometric catalog.
pub trait ReferenceCatalog {
    /// Return catalog stars within `radius` of `center`.
    ///
    /// An empty result is a valid response (nothing in the region),
    /// not an error.
    fn query_region(
        &self,
        center: &Equatorial,
        radius: Angle,
    ) -> Result<Vec<CatalogStar>, CatalogQueryError>;
}

/// Plate solver fixture returning a pre-built solution.
///
/// Stands in for the network service in tests and demos; still
/// enforces the source-count precondition a real solver has.
#[derive(Debug, Clone)]
pub struct FixturePlateSolver {
    /// The solution handed to every request.
    pub solution: TangentPlane,
    /// Minimum number of sources a request must carry.
    pub min_sources: usize,
}

impl FixturePlateSolver {
    /// Fixture around a known solution, requiring 5 sources like a
    /// real solver would.
    pub fn new(solution: TangentPlane) -> Self {
        Self {
            solution,
            min_sources: 5,
        }
    }
}

impl PlateSolver for FixturePlateSolver {
    fn solve(
        &self,
        sources: &[SourceRecord],
        _width: usize,
        _height: usize,
        _timeout: Duration,
    ) -> Result<Box<dyn SkyTransform>, PlateSolveError> {
        if sources.len() < self.min_sources {
            return Err(PlateSolveError::TooFewSources {
                provided: sources.len(),
                required: self.min_sources,
            });
        }
        Ok(Box::new(self.solution.clone()))
    }
}

/// Plate solver fixture that always times out.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeoutPlateSolver;

impl PlateSolver for TimeoutPlateSolver {
    fn solve(
        &self,
        _sources: &[SourceRecord],
        _width: usize,
        _height: usize,
        timeout: Duration,
    ) -> Result<Box<dyn SkyTransform>, PlateSolveError> {
        Err(PlateSolveError::Timeout { limit: timeout })
    }
}

/// In-memory reference catalog fixture.
#[derive(Debug, Clone, Default)]
pub struct FixtureCatalog {
    /// The catalog rows, in table order.
    pub stars: Vec<CatalogStar>,
}

impl FixtureCatalog {
    /// Build a fixture from catalog rows.
    pub fn new(stars: Vec<CatalogStar>) -> Self {
        Self { stars }
    }
}

impl ReferenceCatalog for FixtureCatalog {
    fn query_region(
        &self,
        center: &Equatorial,
        radius: Angle,
    ) -> Result<Vec<CatalogStar>, CatalogQueryError> {
        Ok(self
            .stars
            .iter()
            .filter(|star| star.position.angular_distance(center) <= radius)
            .cloned()
            .collect())
    }
}
