//! Synthetic frame generation for validation and demos.
//!
//! Deterministic star fields with known injected fluxes and a flat sky
//! let photometry be checked against ground truth without any real
//! detector data. Used by the unit tests, the integration tests, and
//! the `calibrate_field` demo binary.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

/// Create a frame filled with a flat sky level.
pub fn flat_frame(shape: (usize, usize), level: f64) -> Array2<f64> {
    Array2::from_elem(shape, level)
}

/// Add seeded Gaussian noise to every pixel.
///
/// Deterministic for a given seed so test assertions stay stable.
pub fn add_gaussian_noise(image: &mut Array2<f64>, sigma: f64, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal =
        Normal::new(0.0, sigma).expect("noise sigma must be positive and finite");
    for value in image.iter_mut() {
        *value += normal.sample(&mut rng);
    }
}

/// Inject a circular Gaussian point source of known total flux.
///
/// The profile is sampled at pixel centers with amplitude
/// `total_flux / (2 pi sigma^2)`, so the pixel sum converges to
/// `total_flux` for profiles well inside the frame. Only pixels within
/// five sigma of the center are touched.
pub fn inject_gaussian_source(
    image: &mut Array2<f64>,
    x: f64,
    y: f64,
    total_flux: f64,
    sigma: f64,
) {
    let (height, width) = image.dim();
    let amplitude = total_flux / (2.0 * std::f64::consts::PI * sigma * sigma);
    let reach = 5.0 * sigma;

    let x_min = ((x - reach).floor().max(0.0)) as usize;
    let y_min = ((y - reach).floor().max(0.0)) as usize;
    let x_max = (((x + reach).ceil() as isize + 1).min(width as isize)).max(0) as usize;
    let y_max = (((y + reach).ceil() as isize + 1).min(height as isize)).max(0) as usize;

    for py in y_min..y_max {
        for px in x_min..x_max {
            let dx = px as f64 - x;
            let dy = py as f64 - y;
            let r_sq = dx * dx + dy * dy;
            image[[py, px]] += amplitude * (-r_sq / (2.0 * sigma * sigma)).exp();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_flat_frame() {
        let frame = flat_frame((10, 12), 500.0);
        assert_eq!(frame.dim(), (10, 12));
        assert!(frame.iter().all(|&v| v == 500.0));
    }

    #[test]
    fn test_noise_is_deterministic() {
        let mut a = flat_frame((16, 16), 100.0);
        let mut b = flat_frame((16, 16), 100.0);
        add_gaussian_noise(&mut a, 5.0, 99);
        add_gaussian_noise(&mut b, 5.0, 99);
        assert_eq!(a, b);

        let mut c = flat_frame((16, 16), 100.0);
        add_gaussian_noise(&mut c, 5.0, 100);
        assert_ne!(a, c);
    }

    #[test]
    fn test_noise_statistics() {
        let mut image = flat_frame((128, 128), 0.0);
        add_gaussian_noise(&mut image, 10.0, 42);
        let n = image.len() as f64;
        let mean = image.iter().sum::<f64>() / n;
        let var = image.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

        assert!(mean.abs() < 0.5, "noise mean {mean} should be near zero");
        assert_relative_eq!(var.sqrt(), 10.0, max_relative = 0.05);
    }

    #[test]
    fn test_injected_source_conserves_flux() {
        let mut image = flat_frame((64, 64), 0.0);
        inject_gaussian_source(&mut image, 32.0, 32.0, 25_000.0, 2.0);
        let total: f64 = image.iter().sum();
        // Pixel-center sampling inside 5 sigma captures essentially all flux.
        assert_relative_eq!(total, 25_000.0, max_relative = 0.01);
    }

    #[test]
    fn test_injected_source_peak_position() {
        let mut image = flat_frame((64, 64), 0.0);
        inject_gaussian_source(&mut image, 20.0, 40.0, 10_000.0, 1.5);

        let mut peak = (0, 0);
        let mut peak_value = f64::MIN;
        for ((py, px), &v) in image.indexed_iter() {
            if v > peak_value {
                peak_value = v;
                peak = (py, px);
            }
        }
        assert_eq!(peak, (40, 20));
    }

    #[test]
    fn test_injection_near_edge_is_clipped() {
        let mut image = flat_frame((32, 32), 0.0);
        inject_gaussian_source(&mut image, 1.0, 1.0, 10_000.0, 2.0);
        let total: f64 = image.iter().sum();
        // Part of the profile falls off-frame.
        assert!(total > 0.0);
        assert!(total < 10_000.0);
    }
}
