//! Cross-band matching into a color-magnitude table.

use nickel_math::Angle;

use crate::records::{CalibratedRecord, ColorRecord};

/// Default cross-band match tolerance in arcseconds.
pub const DEFAULT_COLOR_TOLERANCE_ARCSEC: f64 = 3.0;

/// Pair two calibrated band tables into color records.
///
/// For every record in `table_a`, finds the nearest record in
/// `table_b` by angular separation and keeps the pair when the
/// separation is within `tolerance`. The color index is
/// `mag_a - mag_b` (so B as `table_a` and V as `table_b` gives B-V).
///
/// This is a one-sided nearest-neighbor join: it is neither symmetric
/// nor bijective, and a `table_b` record may be claimed by more than
/// one `table_a` record. No deduplication is performed on the B side;
/// that asymmetry is intentional and should be kept in mind when the
/// two tables have very different depths.
pub fn match_bands(
    table_a: &[CalibratedRecord],
    table_b: &[CalibratedRecord],
    tolerance: Angle,
) -> Vec<ColorRecord> {
    let mut colors = Vec::new();

    for a in table_a {
        let Some(sky_a) = a.photometry.sky else {
            continue;
        };

        let mut best: Option<(&CalibratedRecord, Angle)> = None;
        for b in table_b {
            let Some(sky_b) = b.photometry.sky else {
                continue;
            };
            let separation = sky_a.angular_distance(&sky_b);
            let closer = match &best {
                Some((_, best_sep)) => separation < *best_sep,
                None => true,
            };
            if closer {
                best = Some((b, separation));
            }
        }

        if let Some((b, separation)) = best {
            if separation <= tolerance {
                colors.push(ColorRecord {
                    id_a: a.photometry.id,
                    id_b: b.photometry.id,
                    position: sky_a,
                    mag_a: a.mag_calibrated,
                    mag_b: b.mag_calibrated,
                    color: a.mag_calibrated - b.mag_calibrated,
                    separation,
                });
            }
        }
    }

    colors
}
