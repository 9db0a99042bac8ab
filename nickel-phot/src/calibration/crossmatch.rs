//! Nearest-neighbor cross-match of local photometry against a catalog.

use nickel_math::Angle;

use crate::records::{Band, CatalogStar, CrossMatchRecord, PhotometryRecord};

/// Default match tolerance in arcseconds.
pub const DEFAULT_MATCH_TOLERANCE_ARCSEC: f64 = 2.0;

/// Match photometered sources against catalog stars by sky position.
///
/// Each local record is paired with its nearest catalog star by
/// angular separation; the pair is kept only when the separation is
/// within `tolerance` and the catalog star carries a magnitude in
/// `band`. Locals without a sky position or without a counterpart are
/// dropped (inner join). When two catalog rows tie at exactly the same
/// separation, the lower row index wins; the ordering is arbitrary and
/// carries no meaning beyond determinism.
pub fn cross_match(
    records: &[PhotometryRecord],
    catalog: &[CatalogStar],
    band: Band,
    tolerance: Angle,
) -> Vec<CrossMatchRecord> {
    let mut matches = Vec::new();

    for record in records {
        let Some(sky) = record.sky else {
            continue;
        };

        let mut best: Option<(usize, f64, Angle)> = None;
        for (index, star) in catalog.iter().enumerate() {
            let Some(catalog_mag) = star.magnitude(band) else {
                continue;
            };
            let separation = sky.angular_distance(&star.position);
            // Strict less-than keeps the earliest row on exact ties.
            let closer = match &best {
                Some((_, _, best_sep)) => separation < *best_sep,
                None => true,
            };
            if closer {
                best = Some((index, catalog_mag, separation));
            }
        }

        if let Some((catalog_index, catalog_mag, separation)) = best {
            if separation <= tolerance {
                matches.push(CrossMatchRecord {
                    photometry: record.clone(),
                    catalog_index,
                    catalog_mag,
                    separation,
                });
            }
        }
    }

    matches
}
