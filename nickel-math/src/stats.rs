//! Robust statistics for astronomical pixel populations.
//!
//! Sigma-clipping and rank-based estimators used throughout the
//! reduction pipeline: the background estimator clips the full frame,
//! the photometer clips sky-annulus populations, and the calibration
//! resolver takes the median of zero-point offsets.

use thiserror::Error;

/// Conversion factor from median absolute deviation to Gaussian sigma.
pub const MAD_TO_SIGMA: f64 = 1.4826;

/// Errors from statistical computations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatsError {
    /// The population contained no usable (finite) values.
    #[error("insufficient data to compute statistic: {total} values, {valid} usable")]
    InsufficientData {
        /// Number of values supplied.
        total: usize,
        /// Number of values that were finite.
        valid: usize,
    },
}

/// Calculate the median of a slice of f64 values.
///
/// Non-finite values (NaN, ±inf) are filtered before ranking. For
/// even-length data, returns the average of the two middle values.
///
/// # Errors
///
/// Returns [`StatsError::InsufficientData`] if no finite values remain.
pub fn median(values: &[f64]) -> Result<f64, StatsError> {
    let mut valid: Vec<f64> = values.iter().filter(|v| v.is_finite()).copied().collect();

    if valid.is_empty() {
        return Err(StatsError::InsufficientData {
            total: values.len(),
            valid: 0,
        });
    }

    valid.sort_by(|a, b| a.partial_cmp(b).expect("finite values are ordered"));

    let mid = valid.len() / 2;
    let median_value = if valid.len() % 2 == 0 {
        (valid[mid - 1] + valid[mid]) / 2.0
    } else {
        valid[mid]
    };

    Ok(median_value)
}

/// Median absolute deviation from the median.
///
/// Multiply by [`MAD_TO_SIGMA`] for a robust estimate of Gaussian sigma.
///
/// # Errors
///
/// Returns [`StatsError::InsufficientData`] if no finite values remain.
pub fn median_abs_deviation(values: &[f64]) -> Result<f64, StatsError> {
    let center = median(values)?;
    let deviations: Vec<f64> = values
        .iter()
        .filter(|v| v.is_finite())
        .map(|v| (v - center).abs())
        .collect();
    median(&deviations)
}

fn mean_and_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Converged statistics of a sigma-clipped population.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClippedStats {
    /// Mean of the surviving population.
    pub mean: f64,
    /// Median of the surviving population.
    pub median: f64,
    /// Population standard deviation of the surviving population.
    pub std_dev: f64,
    /// Number of values that survived clipping.
    pub n_used: usize,
    /// Number of rejection iterations performed before convergence.
    pub iterations: usize,
}

/// Iterative sigma-clipping configuration.
///
/// Repeatedly computes the mean and standard deviation of the surviving
/// population and rejects values farther than `sigma` standard
/// deviations from the mean, until no further values are rejected or
/// `max_iters` is reached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SigmaClip {
    /// Rejection threshold in standard deviations.
    pub sigma: f64,
    /// Iteration cap for the rejection loop.
    pub max_iters: usize,
}

impl Default for SigmaClip {
    fn default() -> Self {
        Self {
            sigma: 3.0,
            max_iters: 10,
        }
    }
}

impl SigmaClip {
    /// Create a clipping configuration with the given threshold and cap.
    pub fn new(sigma: f64, max_iters: usize) -> Self {
        Self { sigma, max_iters }
    }

    /// Sigma-clip a population and return converged statistics.
    ///
    /// Non-finite values are excluded before the first iteration. A
    /// rejection round that would empty the population terminates the
    /// loop with the previous population's statistics, so the result is
    /// always computed over at least one value.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::InsufficientData`] if no finite values are
    /// supplied.
    pub fn clip(&self, values: &[f64]) -> Result<ClippedStats, StatsError> {
        let mut surviving: Vec<f64> = values.iter().filter(|v| v.is_finite()).copied().collect();

        if surviving.is_empty() {
            return Err(StatsError::InsufficientData {
                total: values.len(),
                valid: 0,
            });
        }

        let mut iterations = 0;
        let (mut mean, mut std_dev) = mean_and_std(&surviving);

        while iterations < self.max_iters && std_dev > 0.0 {
            let threshold = self.sigma * std_dev;
            let retained: Vec<f64> = surviving
                .iter()
                .filter(|v| (*v - mean).abs() <= threshold)
                .copied()
                .collect();

            // A threshold below the tightest spacing can reject everything;
            // keep the previous population in that case.
            if retained.is_empty() || retained.len() == surviving.len() {
                break;
            }

            surviving = retained;
            (mean, std_dev) = mean_and_std(&surviving);
            iterations += 1;
        }

        let median = median(&surviving)?;

        Ok(ClippedStats {
            mean,
            median,
            std_dev,
            n_used: surviving.len(),
            iterations,
        })
    }
}
