#![allow(dead_code)]

use itertools::Itertools;
use ordered_float::OrderedFloat;
use photstat::{PhotStat, PhotStatParams, PhotometryPoint};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

pub const NOW: f64 = 60000.0;

pub const FILTERS: [&str; 3] = ["ztfg", "ztfr", "ztfi"];

/// A shuffled light curve with distinct MJDs, mixing detections, flux-error limits and
/// externally supplied limits.
pub fn random_light_curve(seed: u64, n: usize) -> Vec<PhotometryPoint> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut points: Vec<PhotometryPoint> = (0..n)
        .map(|i| {
            let filter = FILTERS[rng.random_range(0..FILTERS.len())];
            let mjd = 59000.0 + i as f64 + rng.random_range(0.0..0.9);
            let flux_err = rng.random_range(1.0..5.0);
            match rng.random_range(0..4) {
                0 => PhotometryPoint::new(filter, mjd, Some(rng.random_range(-1.0..2.0) * flux_err), Some(flux_err)),
                1 => PhotometryPoint::new(filter, mjd, None, None)
                    .with_limiting_mag(Some(rng.random_range(19.0..21.5))),
                _ => PhotometryPoint::new(filter, mjd, Some(rng.random_range(20.0..500.0)), Some(flux_err)),
            }
        })
        .collect();
    points.shuffle(&mut rng);
    points
}

/// A shuffled light curve on a coarse grid: MJDs repeat across filters and fluxes repeat, so
/// first/last detections, peaks and limits all see ties.
pub fn tied_light_curve(seed: u64, n: usize) -> Vec<PhotometryPoint> {
    let mut rng = StdRng::seed_from_u64(seed);
    let nights = (n / 3).max(1);
    let mut points: Vec<PhotometryPoint> = (0..n)
        .map(|_| {
            let filter = FILTERS[rng.random_range(0..FILTERS.len())];
            let mjd = 59000.0 + rng.random_range(0..nights) as f64;
            match rng.random_range(0..3) {
                0 => PhotometryPoint::new(filter, mjd, None, None)
                    .with_limiting_mag(Some([19.5, 20.0, 20.5][rng.random_range(0..3)])),
                _ => PhotometryPoint::new(filter, mjd, Some([50.0, 100.0, 200.0][rng.random_range(0..3)]), Some(2.0)),
            }
        })
        .collect();
    points.shuffle(&mut rng);
    points
}

/// Fold `points` one by one, in ascending MJD order, into a fresh record.
pub fn add_in_mjd_order(obj_id: &str, points: &[PhotometryPoint], params: &PhotStatParams) -> PhotStat {
    let mut stat = PhotStat::new(obj_id);
    for point in points.iter().sorted_by_key(|p| OrderedFloat(p.mjd)) {
        stat.add_point(point, params, NOW);
    }
    stat
}

/// Rebuild a fresh record from `points` in one call.
pub fn recompute(obj_id: &str, points: &[PhotometryPoint], params: &PhotStatParams) -> PhotStat {
    let mut stat = PhotStat::new(obj_id);
    stat.full_recompute(points, params, NOW);
    stat
}

pub fn assert_phot_stat_close(actual: &PhotStat, expected: &PhotStat, tol: f64) {
    let diffs = actual.diff(expected, tol);
    assert!(diffs.is_empty(), "PhotStat mismatch:\n{}", diffs.join("\n"));
}

/// Every stored float is finite and every invariant holds.
pub fn assert_valid(stat: &PhotStat) {
    if let Err(err) = stat.check_consistency() {
        panic!("invalid PhotStat {}: {err}", stat.obj_id);
    }
}
