//! Full recomputation of a [`PhotStat`] from a complete set of points.
//!
//! This is the source of truth whenever points are deleted or edited, and the bulk path used to
//! seed or backfill records. The input order does not matter: points are classified with the same
//! rule as [`PhotStat::add_point`], malformed ones are dropped, and the rest are visited in stable
//! ascending MJD order so that ties resolve exactly as the incremental path does.
//!
//! Means and RMS are computed directly as population statistics over the detections rather than
//! through the running updates.
use std::collections::HashMap;

use itertools::Itertools;
use ordered_float::OrderedFloat;
use tracing::{debug, warn};

use super::{color_key, PhotStat};
use crate::constants::{Magnitude, MJD};
use crate::params::PhotStatParams;
use crate::photometry::{PhotometryPoint, PointKind};
use crate::running_stats::{population_mean, population_rms};

/// A classified, well-formed point.
struct Classified<'a> {
    filter: &'a str,
    mjd: MJD,
    kind: PointKind,
}

impl PhotStat {
    /// Rebuild every statistic from `points`.
    ///
    /// Arguments
    /// -----------------
    /// * `points`: the complete photometry of the object, in any order.
    /// * `params`: detection threshold.
    /// * `now`: UTC MJD stamped into both `last_update` and `last_full_update`.
    ///
    /// Return
    /// ----------
    /// * The number of malformed points that were skipped.
    ///
    /// An empty input resets the record to "no data"; this is not an error.
    pub fn full_recompute<'a, I>(&mut self, points: I, params: &PhotStatParams, now: MJD) -> usize
    where
        I: IntoIterator<Item = &'a PhotometryPoint>,
    {
        let mut skipped = 0usize;
        let valid: Vec<Classified<'a>> = points
            .into_iter()
            .filter_map(|p| {
                let kind = p.classify(params);
                if let PointKind::Malformed(reason) = kind {
                    warn!(
                        obj_id = %self.obj_id,
                        filter = %p.filter,
                        mjd = p.mjd,
                        ?reason,
                        "skipping malformed photometry point"
                    );
                    skipped += 1;
                    return None;
                }
                Some(Classified {
                    filter: p.filter.as_str(),
                    mjd: p.mjd,
                    kind,
                })
            })
            .sorted_by_key(|c| OrderedFloat(c.mjd))
            .collect();

        self.reset();

        for c in valid.iter() {
            *self
                .num_obs_per_filter
                .entry(c.filter.to_string())
                .or_insert(0) += 1;
        }
        self.num_obs_global = valid.len() as u32;
        self.recent_obs_mjd = valid.last().map(|c| c.mjd);

        let detections: Vec<(&str, MJD, Magnitude)> = valid
            .iter()
            .filter_map(|c| match c.kind {
                PointKind::Detection { mag } => Some((c.filter, c.mjd, mag)),
                _ => None,
            })
            .collect();
        let non_detections: Vec<(&str, MJD, Magnitude)> = valid
            .iter()
            .filter_map(|c| match c.kind {
                PointKind::NonDetection { limit } => Some((c.filter, c.mjd, limit)),
                _ => None,
            })
            .collect();

        self.fill_detections(&detections);
        self.fill_non_detections(&non_detections);

        self.update_rates();
        self.update_time_to_non_detection();
        self.last_update = Some(now);
        self.last_full_update = Some(now);

        debug!(
            obj_id = %self.obj_id,
            num_obs = self.num_obs_global,
            num_det = self.num_det_global,
            skipped,
            "photometric statistics recomputed"
        );
        skipped
    }

    fn fill_detections(&mut self, detections: &[(&str, MJD, Magnitude)]) {
        // detections are sorted by MJD: the earliest seen is first, the latest seen is last
        if let Some((filter, mjd, mag)) = detections.first() {
            self.first_detected_mjd = Some(*mjd);
            self.first_detected_mag = Some(*mag);
            self.first_detected_filter = Some(filter.to_string());
        }
        if let Some((filter, mjd, mag)) = detections.last() {
            self.last_detected_mjd = Some(*mjd);
            self.last_detected_mag = Some(*mag);
            self.last_detected_filter = Some(filter.to_string());
        }

        let mags: Vec<Magnitude> = detections.iter().map(|(_, _, m)| *m).collect();
        self.num_det_global = mags.len() as u32;
        self.mean_mag_global = population_mean(&mags);
        self.mag_rms_global = population_rms(&mags);

        // min_by keeps the first minimum, i.e. the earliest brightest point
        if let Some((_, mjd, mag)) = detections.iter().min_by(|a, b| a.2.total_cmp(&b.2)) {
            self.peak_mag_global = Some(*mag);
            self.peak_mjd_global = Some(*mjd);
        }
        self.faintest_mag_global = mags.iter().copied().max_by(f64::total_cmp);

        let by_filter: HashMap<&str, Vec<(MJD, Magnitude)>> = detections
            .iter()
            .map(|(filter, mjd, mag)| (*filter, (*mjd, *mag)))
            .into_group_map();

        for (filter, points) in by_filter {
            let mags: Vec<Magnitude> = points.iter().map(|(_, m)| *m).collect();
            let key = filter.to_string();

            self.num_det_per_filter
                .insert(key.clone(), mags.len() as u32);
            if let (Some(mean), Some(rms)) = (population_mean(&mags), population_rms(&mags)) {
                self.mean_mag_per_filter.insert(key.clone(), mean);
                self.mag_rms_per_filter.insert(key.clone(), rms);
            }
            if let Some((mjd, mag)) = points.iter().min_by(|a, b| a.1.total_cmp(&b.1)) {
                self.peak_mag_per_filter.insert(key.clone(), *mag);
                self.peak_mjd_per_filter.insert(key.clone(), *mjd);
            }
            if let Some(faintest) = mags.iter().copied().max_by(f64::total_cmp) {
                self.faintest_mag_per_filter.insert(key, faintest);
            }
        }

        for (f1, f2) in self
            .mean_mag_per_filter
            .iter()
            .tuple_combinations::<(_, _)>()
        {
            let (c12, c21) = (f1.1 - f2.1, f2.1 - f1.1);
            self.mean_color.insert(color_key(f1.0, f2.0), c12);
            self.mean_color.insert(color_key(f2.0, f1.0), c21);
        }
    }

    fn fill_non_detections(&mut self, non_detections: &[(&str, MJD, Magnitude)]) {
        for (filter, _, limit) in non_detections {
            if self.deepest_limit_global.is_none_or(|d| *limit > d) {
                self.deepest_limit_global = Some(*limit);
            }
            let deepest = self
                .deepest_limit_per_filter
                .entry(filter.to_string())
                .or_insert(*limit);
            if *limit > *deepest {
                *deepest = *limit;
            }
        }

        // already sorted by MJD
        let first_detection = self.first_detected_mjd;
        self.predetection_mjds = non_detections
            .iter()
            .map(|(_, mjd, _)| *mjd)
            .filter(|mjd| first_detection.is_none_or(|first| *mjd < first))
            .collect();
        self.last_non_detection_mjd = self.predetection_mjds.last().copied();
    }
}
