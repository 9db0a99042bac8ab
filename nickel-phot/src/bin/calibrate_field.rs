//! End-to-end calibration demo on a synthetic two-band field.
//!
//! Generates a deterministic star field with known fluxes and a flat
//! sky, builds a reference catalog from the injected truth plus
//! per-band zero-point offsets, then runs the full reduction pipeline
//! for both bands and prints the calibrated tables and the resulting
//! color-magnitude table.
//!
//! Because the catalog is derived from the injected truth, the
//! recovered zero points should land on the configured offsets to
//! within the aperture losses, which makes this binary a quick sanity
//! check of the whole chain.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use nickel_math::{Angle, Equatorial};
use nickel_phot::astrometry::{SkyTransform, TangentPlane};
use nickel_phot::calibration::SaturationFilter;
use nickel_phot::image_proc::photometer::{CcdNoiseModel, PhotometerConfig};
use nickel_phot::image_proc::test_patterns::{add_gaussian_noise, inject_gaussian_source};
use nickel_phot::pipeline::{
    color_table, BandObservation, BandSolution, PipelineConfig, ReductionPipeline,
};
use nickel_phot::services::{FixtureCatalog, FixturePlateSolver};
use nickel_phot::{Band, CatalogStar, CcdFrame, SourceRecord};

#[derive(Parser, Debug)]
#[command(
    name = "calibrate_field",
    about = "Runs the reduction pipeline end-to-end on a synthetic two-band field",
    long_about = None
)]
struct Args {
    /// Random seed for the synthetic field
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Number of injected stars
    #[arg(long, default_value_t = 25)]
    stars: usize,

    /// Frame width and height in pixels
    #[arg(long, default_value_t = 512)]
    frame_size: usize,

    /// Flat sky level in counts
    #[arg(long, default_value_t = 600.0)]
    sky_level: f64,

    /// Per-pixel Gaussian noise sigma in counts
    #[arg(long, default_value_t = 3.0)]
    noise_sigma: f64,

    /// Measurement aperture radius in pixels
    #[arg(long, default_value_t = 5.0)]
    aperture_radius: f64,

    /// Inner sky annulus radius in pixels
    #[arg(long, default_value_t = 8.0)]
    annulus_inner: f64,

    /// Outer sky annulus radius in pixels
    #[arg(long, default_value_t = 12.0)]
    annulus_outer: f64,

    /// True zero point injected for the B band
    #[arg(long, default_value_t = 23.0)]
    b_zero_point: f64,

    /// True zero point injected for the V band
    #[arg(long, default_value_t = 22.5)]
    v_zero_point: f64,

    /// Cross-match tolerance in arcseconds
    #[arg(long, default_value_t = 2.0)]
    match_tolerance: f64,

    /// Rows of the color table to print
    #[arg(long, default_value_t = 15)]
    print_rows: usize,
}

/// One injected star: position and per-band total fluxes.
struct TrueStar {
    x: f64,
    y: f64,
    flux_b: f64,
    flux_v: f64,
}

const PSF_SIGMA: f64 = 1.6;
const EXPOSURE: Duration = Duration::from_secs(30);
const GAIN: f64 = 1.8;
const READ_NOISE: f64 = 10.0;

fn generate_truth(args: &Args) -> Vec<TrueStar> {
    let mut rng = StdRng::seed_from_u64(args.seed);
    let margin = 20.0;
    let span = args.frame_size as f64 - 2.0 * margin;

    (0..args.stars)
        .map(|_| {
            let x = margin + rng.gen::<f64>() * span;
            let y = margin + rng.gen::<f64>() * span;
            // Flux range covers ~5 magnitudes of brightness.
            let flux_v = 20_000.0 * 10.0_f64.powf(rng.gen::<f64>() * 2.0);
            // A modest color spread around B-V = 0.
            let color = (rng.gen::<f64>() - 0.5) * 1.2;
            let flux_b = flux_v * 10.0_f64.powf(-0.4 * color);
            TrueStar {
                x,
                y,
                flux_b,
                flux_v,
            }
        })
        .collect()
}

fn render_band(args: &Args, truth: &[TrueStar], band: Band) -> anyhow::Result<BandObservation> {
    let size = args.frame_size;
    let mut image = Array2::from_elem((size, size), args.sky_level);
    // Different noise realization per band.
    let band_seed = args.seed.wrapping_add(match band {
        Band::B => 1,
        Band::V => 2,
        Band::R => 3,
        Band::I => 4,
    });
    add_gaussian_noise(&mut image, args.noise_sigma, band_seed);

    for star in truth {
        let flux = match band {
            Band::B => star.flux_b,
            _ => star.flux_v,
        };
        inject_gaussian_source(&mut image, star.x, star.y, flux, PSF_SIGMA);
    }

    let frame = CcdFrame::new(image, EXPOSURE, GAIN, READ_NOISE)
        .context("synthetic frame construction failed")?;

    let sources = truth
        .iter()
        .enumerate()
        .map(|(id, star)| SourceRecord {
            id,
            x: star.x,
            y: star.y,
            detection_flux: star.flux_v,
        })
        .collect();

    Ok(BandObservation {
        band,
        frame,
        sources,
        wcs: None,
    })
}

fn build_catalog(args: &Args, truth: &[TrueStar], transform: &TangentPlane) -> FixtureCatalog {
    let exposure_s = EXPOSURE.as_secs_f64();
    let stars = truth
        .iter()
        .filter_map(|star| {
            let position = transform.pixel_to_sky(star.x, star.y).ok()?;
            let mut magnitudes = BTreeMap::new();
            magnitudes.insert(
                Band::B,
                -2.5 * (star.flux_b / exposure_s).log10() + args.b_zero_point,
            );
            magnitudes.insert(
                Band::V,
                -2.5 * (star.flux_v / exposure_s).log10() + args.v_zero_point,
            );
            Some(CatalogStar {
                position,
                magnitudes,
            })
        })
        .collect();
    FixtureCatalog::new(stars)
}

fn print_band(solution: &BandSolution) {
    println!();
    println!(
        "{} band: zero point {:.3} ({} matches{}), background median {:.1}, {} calibrated rows",
        solution.band,
        solution.zero_point.value,
        solution.n_matched,
        if solution.zero_point.is_fallback {
            ", fallback"
        } else {
            ""
        },
        solution.background.median,
        solution.records.len(),
    );
    println!(
        "{:>4} {:>8} {:>8} {:>12} {:>10} {:>10} {:>10}",
        "id", "x", "y", "flux", "m_inst", "m_cal", "m_err"
    );
    for record in &solution.records {
        let p = &record.photometry;
        println!(
            "{:>4} {:>8.2} {:>8.2} {:>12.1} {:>10.3} {:>10.3} {:>10.4}",
            p.id, p.x, p.y, p.flux, p.mag_inst, record.mag_calibrated, p.mag_err
        );
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    println!("Synthetic Field Calibration");
    println!("===========================");
    println!(
        "{} stars on a {}x{} frame, sky {:.0} +/- {:.1} counts",
        args.stars, args.frame_size, args.frame_size, args.sky_level, args.noise_sigma
    );
    println!(
        "injected zero points: B = {:.2}, V = {:.2}",
        args.b_zero_point, args.v_zero_point
    );

    let truth = generate_truth(&args);

    // Nickel-like plate scale, arbitrary field center.
    let solution = TangentPlane::new(
        &Equatorial::from_degrees(180.0, 35.0),
        Angle::from_arcsec(0.37).as_radians(),
        args.frame_size,
        args.frame_size,
    );
    let catalog = build_catalog(&args, &truth, &solution);
    let solver = FixturePlateSolver::new(solution);

    let mut config = PipelineConfig::default();
    config.photometer =
        PhotometerConfig::new(args.aperture_radius, args.annulus_inner, args.annulus_outer)?;
    config.match_tolerance = Angle::from_arcsec(args.match_tolerance);
    // Exclude implausible offsets from the zero-point fit.
    config.saturation = SaturationFilter::delta_range(
        args.v_zero_point.min(args.b_zero_point) - 2.0,
        args.v_zero_point.max(args.b_zero_point) + 2.0,
    );

    let noise = CcdNoiseModel {
        read_noise: READ_NOISE,
    };
    let pipeline = ReductionPipeline::new(config, noise, Some(&solver), &catalog);

    let b_solution = pipeline
        .run_band(&render_band(&args, &truth, Band::B)?)
        .context("B band reduction failed")?;
    let v_solution = pipeline
        .run_band(&render_band(&args, &truth, Band::V)?)
        .context("V band reduction failed")?;

    print_band(&b_solution);
    print_band(&v_solution);

    let colors = color_table(&b_solution, &v_solution, None);
    println!();
    println!("color-magnitude table ({} pairs):", colors.len());
    println!(
        "{:>4} {:>10} {:>10} {:>8} {:>10}",
        "id", "B", "V", "B-V", "sep\""
    );
    for color in colors.iter().take(args.print_rows) {
        println!(
            "{:>4} {:>10.3} {:>10.3} {:>8.3} {:>10.3}",
            color.id_a,
            color.mag_a,
            color.mag_b,
            color.color,
            color.separation.as_arcsec()
        );
    }
    if colors.len() > args.print_rows {
        println!("... {} more rows", colors.len() - args.print_rows);
    }

    println!();
    println!(
        "recovered zero points: B = {:.3} (true {:.2}), V = {:.3} (true {:.2})",
        b_solution.zero_point.value,
        args.b_zero_point,
        v_solution.zero_point.value,
        args.v_zero_point
    );

    Ok(())
}
