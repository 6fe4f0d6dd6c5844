//! Incremental update of a [`PhotStat`] from one new photometry point.
//!
//! The update only reads the stored aggregates, never the past points, which makes it O(1) in
//! the length of the light curve (the per-filter maps and the color refresh scale with the number
//! of filters, not of points).
//!
//! ## Why incremental updates are sound
//!
//! Every extremum kept by the record (first/last detection, peak, faintest, deepest limit) can
//! only be extended or left unchanged by a new point, and the means/RMS follow Welford's update.
//! The converse does not hold: removing a point cannot tell whether it was the extremum, so
//! deletions and edits go through [`PhotStat::full_recompute`] instead.
//!
//! ## Tie policy
//!
//! * first detection: replaced only by a strictly earlier detection,
//! * last detection: replaced by any detection at or after the stored one,
//! * peak, faintest and deepest limit: replaced only on strict improvement.
//!
//! The full recomputation visits points in stable MJD order with the same comparisons, so the two
//! paths agree.
use tracing::{debug, warn};

use super::PhotStat;
use crate::constants::{Magnitude, MJD};
use crate::params::PhotStatParams;
use crate::photometry::{PhotometryPoint, PointKind};
use crate::running_stats::{update_average, update_scatter};

impl PhotStat {
    /// Fold a single photometry point into the aggregates.
    ///
    /// Arguments
    /// -----------------
    /// * `point`: the new measurement.
    /// * `params`: detection threshold.
    /// * `now`: UTC MJD stamped into `last_update`.
    ///
    /// Return
    /// ----------
    /// * The [`PointKind`] the point was classified as. A [`PointKind::Malformed`] point leaves
    ///   the record untouched.
    pub fn add_point(&mut self, point: &PhotometryPoint, params: &PhotStatParams, now: MJD) -> PointKind {
        let kind = point.classify(params);

        match kind {
            PointKind::Malformed(reason) => {
                warn!(
                    obj_id = %self.obj_id,
                    filter = %point.filter,
                    mjd = point.mjd,
                    ?reason,
                    "skipping malformed photometry point"
                );
                return kind;
            }
            PointKind::Detection { mag } => self.add_detection(&point.filter, point.mjd, mag),
            PointKind::NonDetection { limit } => {
                self.add_non_detection(&point.filter, point.mjd, limit)
            }
        }

        *self
            .num_obs_per_filter
            .entry(point.filter.clone())
            .or_insert(0) += 1;
        self.num_obs_global += 1;

        self.update_time_to_non_detection();
        self.recent_obs_mjd = Some(self.recent_obs_mjd.map_or(point.mjd, |m| m.max(point.mjd)));
        self.last_update = Some(now);

        debug!(
            obj_id = %self.obj_id,
            filter = %point.filter,
            mjd = point.mjd,
            detection = kind.is_detection(),
            "photometry point added"
        );
        kind
    }

    fn add_detection(&mut self, filter: &str, mjd: MJD, mag: Magnitude) {
        if self.first_detected_mjd.is_none_or(|first| mjd < first) {
            self.first_detected_mjd = Some(mjd);
            self.first_detected_mag = Some(mag);
            self.first_detected_filter = Some(filter.to_string());
        }
        if self.last_detected_mjd.is_none_or(|last| mjd >= last) {
            self.last_detected_mjd = Some(mjd);
            self.last_detected_mag = Some(mag);
            self.last_detected_filter = Some(filter.to_string());
        }

        // moments, with the detection counts taken before this point
        let n_filter = self.num_det_per_filter.get(filter).copied().unwrap_or(0);
        let mean_filter = self.mean_mag_per_filter.get(filter).copied().unwrap_or(0.0);
        let rms_filter = self.mag_rms_per_filter.get(filter).copied().unwrap_or(0.0);
        self.mag_rms_per_filter.insert(
            filter.to_string(),
            update_scatter(rms_filter, mean_filter, n_filter, mag),
        );
        self.mean_mag_per_filter
            .insert(filter.to_string(), update_average(mean_filter, n_filter, mag));

        let n_global = self.num_det_global;
        let mean_global = self.mean_mag_global.unwrap_or(0.0);
        let rms_global = self.mag_rms_global.unwrap_or(0.0);
        self.mag_rms_global = Some(update_scatter(rms_global, mean_global, n_global, mag));
        self.mean_mag_global = Some(update_average(mean_global, n_global, mag));

        self.update_colors_for(filter);

        // extrema
        if self.peak_mag_global.is_none_or(|peak| mag < peak) {
            self.peak_mag_global = Some(mag);
            self.peak_mjd_global = Some(mjd);
        }
        if self
            .peak_mag_per_filter
            .get(filter)
            .is_none_or(|peak| mag < *peak)
        {
            self.peak_mag_per_filter.insert(filter.to_string(), mag);
            self.peak_mjd_per_filter.insert(filter.to_string(), mjd);
        }
        if self.faintest_mag_global.is_none_or(|faintest| mag > faintest) {
            self.faintest_mag_global = Some(mag);
        }
        if self
            .faintest_mag_per_filter
            .get(filter)
            .is_none_or(|faintest| mag > *faintest)
        {
            self.faintest_mag_per_filter.insert(filter.to_string(), mag);
        }

        // non-detections at or after a detection are no longer "pre"-detection
        self.predetection_mjds.retain(|m| *m < mjd);
        self.last_non_detection_mjd = self.predetection_mjds.last().copied();

        *self
            .num_det_per_filter
            .entry(filter.to_string())
            .or_insert(0) += 1;
        self.num_det_global += 1;

        self.update_rates();
    }

    fn add_non_detection(&mut self, filter: &str, mjd: MJD, limit: Magnitude) {
        if self.deepest_limit_global.is_none_or(|deepest| limit > deepest) {
            self.deepest_limit_global = Some(limit);
        }
        if self
            .deepest_limit_per_filter
            .get(filter)
            .is_none_or(|deepest| limit > *deepest)
        {
            self.deepest_limit_per_filter
                .insert(filter.to_string(), limit);
        }

        if self.first_detected_mjd.is_none_or(|first| mjd < first) {
            let idx = self.predetection_mjds.partition_point(|m| *m <= mjd);
            self.predetection_mjds.insert(idx, mjd);
            self.last_non_detection_mjd = self.predetection_mjds.last().copied();
        }
    }
}

#[cfg(test)]
mod test_add_point {
    use super::*;
    use crate::photometry::MalformedReason;
    use approx::assert_relative_eq;

    const NOW: MJD = 60000.0;

    fn det(filter: &str, mjd: MJD, flux: f64) -> PhotometryPoint {
        PhotometryPoint::new(filter, mjd, Some(flux), Some(1.0))
    }

    fn non_det(filter: &str, mjd: MJD, limit: f64) -> PhotometryPoint {
        PhotometryPoint::new(filter, mjd, None, None).with_limiting_mag(Some(limit))
    }

    fn mag(flux: f64) -> f64 {
        -2.5 * flux.log10() + 23.9
    }

    #[test]
    fn test_first_detection_seeds_everything() {
        let params = PhotStatParams::default();
        let mut ps = PhotStat::new("obj");
        let kind = ps.add_point(&det("ztfg", 59000.0, 100.0), &params, NOW);

        assert!(kind.is_detection());
        let m = mag(100.0);
        assert_eq!(ps.num_obs_global, 1);
        assert_eq!(ps.num_det_global, 1);
        assert_eq!(ps.first_detected_mag, Some(m));
        assert_eq!(ps.last_detected_mag, Some(m));
        assert_eq!(ps.peak_mag_global, Some(m));
        assert_eq!(ps.faintest_mag_global, Some(m));
        assert_eq!(ps.mean_mag_global, Some(m));
        assert_eq!(ps.mag_rms_global, Some(0.0));
        assert_eq!(ps.rise_rate, None);
        assert_eq!(ps.decay_rate, None);
        assert_eq!(ps.recent_obs_mjd, Some(59000.0));
        assert_eq!(ps.last_update, Some(NOW));
        assert_eq!(ps.last_full_update, None);
        ps.check_consistency().unwrap();
    }

    #[test]
    fn test_first_non_detection_seeds_limits() {
        let params = PhotStatParams::default();
        let mut ps = PhotStat::new("obj");
        ps.add_point(&non_det("ztfr", 58990.0, 20.5), &params, NOW);

        assert_eq!(ps.num_obs_global, 1);
        assert_eq!(ps.num_det_global, 0);
        assert_eq!(ps.deepest_limit_global, Some(20.5));
        assert_eq!(ps.deepest_limit_per_filter.get("ztfr"), Some(&20.5));
        assert_eq!(ps.predetection_mjds, vec![58990.0]);
        assert_eq!(ps.last_non_detection_mjd, Some(58990.0));
        assert_eq!(ps.time_to_non_detection, None);
        ps.check_consistency().unwrap();
    }

    #[test]
    fn test_time_to_non_detection() {
        let params = PhotStatParams::default();
        let mut ps = PhotStat::new("obj");
        ps.add_point(&non_det("ztfr", 58990.0, 20.5), &params, NOW);
        ps.add_point(&non_det("ztfg", 58995.0, 20.1), &params, NOW);
        ps.add_point(&det("ztfr", 59000.0, 100.0), &params, NOW);
        // after the first detection, limits are no longer predetections
        ps.add_point(&non_det("ztfg", 59010.0, 21.0), &params, NOW);

        assert_eq!(ps.predetection_mjds, vec![58990.0, 58995.0]);
        assert_eq!(ps.last_non_detection_mjd, Some(58995.0));
        assert_eq!(ps.time_to_non_detection, Some(5.0));
        assert_eq!(ps.deepest_limit_global, Some(21.0));
        assert_eq!(ps.num_obs_global, 4);
        ps.check_consistency().unwrap();
    }

    #[test]
    fn test_out_of_order_detection_prunes_predetections() {
        let params = PhotStatParams::default();
        let mut ps = PhotStat::new("obj");
        ps.add_point(&non_det("ztfr", 58990.0, 20.5), &params, NOW);
        ps.add_point(&non_det("ztfr", 59005.0, 20.5), &params, NOW);
        ps.add_point(&det("ztfr", 59010.0, 100.0), &params, NOW);
        assert_eq!(ps.predetection_mjds, vec![58990.0, 59005.0]);

        // an earlier detection arrives late
        ps.add_point(&det("ztfr", 59000.0, 50.0), &params, NOW);
        assert_eq!(ps.first_detected_mjd, Some(59000.0));
        assert_eq!(ps.predetection_mjds, vec![58990.0]);
        assert_eq!(ps.last_non_detection_mjd, Some(58990.0));
        assert_eq!(ps.time_to_non_detection, Some(10.0));
        ps.check_consistency().unwrap();
    }

    #[test]
    fn test_rise_and_decay_rates() {
        let params = PhotStatParams::default();
        let mut ps = PhotStat::new("obj");
        ps.add_point(&det("ztfg", 59000.0, 100.0), &params, NOW);
        ps.add_point(&det("ztfg", 59010.0, 1000.0), &params, NOW);

        // rising by 2.5 mag over 10 days, nothing after the peak yet
        assert_relative_eq!(ps.rise_rate.unwrap(), 0.25, epsilon = 1e-12);
        assert_eq!(ps.decay_rate, None);

        ps.add_point(&det("ztfg", 59030.0, 10.0), &params, NOW);
        assert_relative_eq!(ps.rise_rate.unwrap(), 0.25, epsilon = 1e-12);
        assert_relative_eq!(ps.decay_rate.unwrap(), 5.0 / 20.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rates_follow_endpoint_filter() {
        let params = PhotStatParams::default();
        let mut ps = PhotStat::new("obj");
        ps.add_point(&det("ztfg", 59000.0, 100.0), &params, NOW);
        // a brighter peak in another filter does not define the g-band rise
        ps.add_point(&det("ztfr", 59005.0, 10000.0), &params, NOW);
        assert_eq!(ps.rise_rate, None);
        assert_eq!(ps.peak_mjd_global, Some(59005.0));

        // the last detection is in r, whose peak is the last point itself
        assert_eq!(ps.decay_rate, None);

        ps.add_point(&det("ztfr", 59015.0, 100.0), &params, NOW);
        assert_relative_eq!(ps.decay_rate.unwrap(), 5.0 / 10.0, epsilon = 1e-12);
        assert_eq!(ps.rise_rate, None);
    }

    #[test]
    fn test_colors_are_antisymmetric() {
        let params = PhotStatParams::default();
        let mut ps = PhotStat::new("obj");
        ps.add_point(&det("ztfg", 59000.0, 100.0), &params, NOW);
        ps.add_point(&det("ztfr", 59001.0, 150.0), &params, NOW);
        ps.add_point(&det("ztfi", 59002.0, 170.0), &params, NOW);
        ps.add_point(&det("ztfg", 59003.0, 120.0), &params, NOW);

        assert_eq!(ps.mean_color.len(), 6);
        for (a, b) in [("ztfg", "ztfr"), ("ztfg", "ztfi"), ("ztfr", "ztfi")] {
            let ab = ps.mean_color[&format!("{a}-{b}")];
            let ba = ps.mean_color[&format!("{b}-{a}")];
            assert_eq!(ab, -ba);
            assert_relative_eq!(
                ab,
                ps.mean_mag_per_filter[a] - ps.mean_mag_per_filter[b],
                epsilon = 1e-12
            );
        }
        ps.check_consistency().unwrap();
    }

    #[test]
    fn test_malformed_point_is_ignored() {
        let params = PhotStatParams::default();
        let mut ps = PhotStat::new("obj");
        ps.add_point(&det("ztfg", 59000.0, 100.0), &params, NOW);
        let before = ps.clone();

        let bad = PhotometryPoint::new("ztfg", 59001.0, Some(100.0), None);
        let kind = ps.add_point(&bad, &params, NOW + 1.0);

        assert_eq!(kind, PointKind::Malformed(MalformedReason::NoLimitSource));
        assert_eq!(ps, before);
    }

    #[test]
    fn test_extrema_only_tighten() {
        let params = PhotStatParams::default();
        let mut ps = PhotStat::new("obj");
        for (mjd, flux) in [(59000.0, 100.0), (59001.0, 400.0), (59002.0, 50.0), (59003.0, 200.0)] {
            ps.add_point(&det("ztfr", mjd, flux), &params, NOW);
            let m = mag(flux);
            assert!(ps.peak_mag_per_filter["ztfr"] <= m);
            assert!(ps.faintest_mag_per_filter["ztfr"] >= m);
        }
        assert_eq!(ps.peak_mag_global, Some(mag(400.0)));
        assert_eq!(ps.peak_mjd_global, Some(59001.0));
        assert_eq!(ps.faintest_mag_global, Some(mag(50.0)));
    }

    #[test]
    fn test_first_point_keeps_full_update_stamp() {
        let params = PhotStatParams::default();
        let mut ps = PhotStat::new("obj");
        ps.full_recompute(Vec::<PhotometryPoint>::new().iter(), &params, NOW);

        ps.add_point(&det("ztfg", 59000.0, 100.0), &params, NOW + 1.0);

        assert_eq!(ps.num_obs_global, 1);
        assert_eq!(ps.last_full_update, Some(NOW));
        assert_eq!(ps.last_update, Some(NOW + 1.0));
    }
}
