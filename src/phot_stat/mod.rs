//! # Photometric statistics of one object
//!
//! [`PhotStat`] is the running aggregate kept for every astronomical object that has
//! photometry. It summarizes detections and non-detections, globally and per filter, so that
//! queries never have to scan the full light curve.
//!
//! ## Update paths
//!
//! * [`PhotStat::add_point`] – O(1) fold of a single new point into the stored aggregates
//!   (see [`add_point`](crate::phot_stat::add_point)).
//! * [`PhotStat::full_recompute`] – O(n log n) rebuild from a complete set of points
//!   (see [`full_recompute`](crate::phot_stat::full_recompute)). This is the only correct path
//!   after a point is deleted or edited, since extrema cannot be "un-included".
//!
//! Both paths agree: folding the points one by one in ascending MJD order yields the same record
//! as a single full recomputation, up to floating-point rounding of the means and RMS.
//!
//! ## Invariants
//!
//! After every update ([`PhotStat::check_consistency`] verifies them):
//!
//! * `num_obs_global == Σ num_obs_per_filter` and `num_det_global == Σ num_det_per_filter`,
//! * `first_detected_mjd <= last_detected_mjd`,
//! * `peak_mag_global == min(peak_mag_per_filter)` (peak = brightest = lowest magnitude),
//! * `deepest_limit_global == max(deepest_limit_per_filter)`,
//! * `mean_color["a-b"] == -mean_color["b-a"]`,
//! * no stored value is NaN.
//!
//! ## Serialization
//!
//! Field names are part of the JSON contract consumed by the HTTP layer and must stay stable.
//! Undefined scalars serialize as `null`, per-filter maps as string-keyed objects.
pub mod add_point;
pub mod display;
pub mod full_recompute;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::constants::{Filter, Magnitude, ObjectId, PerFilter, MJD};
use crate::photstat_errors::PhotStatError;

/// Aggregated photometric statistics of one object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotStat {
    pub obj_id: ObjectId,

    // --- observation counters ---
    pub num_obs_global: u32,
    pub num_obs_per_filter: PerFilter<u32>,
    pub num_det_global: u32,
    pub num_det_per_filter: PerFilter<u32>,
    pub recent_obs_mjd: Option<MJD>,

    // --- detection endpoints ---
    pub first_detected_mjd: Option<MJD>,
    pub first_detected_mag: Option<Magnitude>,
    pub first_detected_filter: Option<Filter>,
    pub last_detected_mjd: Option<MJD>,
    pub last_detected_mag: Option<Magnitude>,
    pub last_detected_filter: Option<Filter>,

    // --- non-detections before the first detection ---
    pub predetection_mjds: Vec<MJD>,
    pub last_non_detection_mjd: Option<MJD>,
    pub time_to_non_detection: Option<f64>,

    // --- magnitude moments ---
    pub mean_mag_global: Option<Magnitude>,
    pub mean_mag_per_filter: PerFilter,
    pub mean_color: PerFilter,
    pub mag_rms_global: Option<f64>,
    pub mag_rms_per_filter: PerFilter,

    // --- extrema ---
    pub peak_mag_global: Option<Magnitude>,
    pub peak_mjd_global: Option<MJD>,
    pub peak_mag_per_filter: PerFilter,
    pub peak_mjd_per_filter: PerFilter,
    pub faintest_mag_global: Option<Magnitude>,
    pub faintest_mag_per_filter: PerFilter,
    pub deepest_limit_global: Option<Magnitude>,
    pub deepest_limit_per_filter: PerFilter,

    // --- light-curve slopes (mag/day) ---
    pub rise_rate: Option<f64>,
    pub decay_rate: Option<f64>,

    // --- bookkeeping (UTC MJD) ---
    pub last_update: Option<MJD>,
    pub last_full_update: Option<MJD>,
}

/// Key of the `mean_color` map for the ordered pair `(f1, f2)`.
pub fn color_key(f1: &str, f2: &str) -> String {
    format!("{f1}-{f2}")
}

impl PhotStat {
    /// Create an empty record ("no data") for the given object.
    pub fn new(obj_id: impl Into<ObjectId>) -> Self {
        PhotStat {
            obj_id: obj_id.into(),
            num_obs_global: 0,
            num_obs_per_filter: PerFilter::new(),
            num_det_global: 0,
            num_det_per_filter: PerFilter::new(),
            recent_obs_mjd: None,
            first_detected_mjd: None,
            first_detected_mag: None,
            first_detected_filter: None,
            last_detected_mjd: None,
            last_detected_mag: None,
            last_detected_filter: None,
            predetection_mjds: Vec::new(),
            last_non_detection_mjd: None,
            time_to_non_detection: None,
            mean_mag_global: None,
            mean_mag_per_filter: PerFilter::new(),
            mean_color: PerFilter::new(),
            mag_rms_global: None,
            mag_rms_per_filter: PerFilter::new(),
            peak_mag_global: None,
            peak_mjd_global: None,
            peak_mag_per_filter: PerFilter::new(),
            peak_mjd_per_filter: PerFilter::new(),
            faintest_mag_global: None,
            faintest_mag_per_filter: PerFilter::new(),
            deepest_limit_global: None,
            deepest_limit_per_filter: PerFilter::new(),
            rise_rate: None,
            decay_rate: None,
            last_update: None,
            last_full_update: None,
        }
    }

    /// Reset every statistic to "no data", keeping the object identity.
    pub fn reset(&mut self) {
        let obj_id = std::mem::replace(&mut self.obj_id, ObjectId::from(""));
        *self = PhotStat::new(obj_id);
    }

    pub fn has_detections(&self) -> bool {
        self.num_det_global > 0
    }

    pub fn to_json(&self) -> Result<serde_json::Value, PhotStatError> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn to_json_string(&self) -> Result<String, PhotStatError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(value: serde_json::Value) -> Result<Self, PhotStatError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Rise and decay rates, derived from the stored endpoint detections.
    ///
    /// The rates are scoped to the filter of the endpoint: the rise uses the peak of the
    /// first-detected filter, the decay the peak of the last-detected filter, never the global
    /// peak. Both paths call this after their extrema are settled.
    ///
    /// ```text
    /// rise  = -(peak_f - first_mag) / (peak_mjd_f - first_mjd)   if peak_mjd_f > first_mjd
    /// decay =  (last_mag - peak_f) / (last_mjd - peak_mjd_f)     if peak_mjd_f < last_mjd
    /// ```
    pub(crate) fn update_rates(&mut self) {
        self.rise_rate = match (
            self.first_detected_mjd,
            self.first_detected_mag,
            self.first_detected_filter.as_deref(),
        ) {
            (Some(mjd), Some(mag), Some(filter)) => self
                .filter_peak(filter)
                .filter(|(_, peak_mjd)| *peak_mjd > mjd)
                .map(|(peak_mag, peak_mjd)| -(peak_mag - mag) / (peak_mjd - mjd)),
            _ => None,
        };

        self.decay_rate = match (
            self.last_detected_mjd,
            self.last_detected_mag,
            self.last_detected_filter.as_deref(),
        ) {
            (Some(mjd), Some(mag), Some(filter)) => self
                .filter_peak(filter)
                .filter(|(_, peak_mjd)| *peak_mjd < mjd)
                .map(|(peak_mag, peak_mjd)| (mag - peak_mag) / (mjd - peak_mjd)),
            _ => None,
        };
    }

    fn filter_peak(&self, filter: &str) -> Option<(Magnitude, MJD)> {
        Some((
            *self.peak_mag_per_filter.get(filter)?,
            *self.peak_mjd_per_filter.get(filter)?,
        ))
    }

    pub(crate) fn update_time_to_non_detection(&mut self) {
        self.time_to_non_detection = self
            .first_detected_mjd
            .zip(self.last_non_detection_mjd)
            .map(|(det, non_det)| det - non_det);
    }

    /// Refresh both directions of every color involving `filter`.
    pub(crate) fn update_colors_for(&mut self, filter: &str) {
        let Some(mean) = self.mean_mag_per_filter.get(filter).copied() else {
            return;
        };
        for (other, other_mean) in self.mean_mag_per_filter.iter() {
            if other == filter {
                continue;
            }
            self.mean_color
                .insert(color_key(filter, other), mean - other_mean);
            self.mean_color
                .insert(color_key(other, filter), other_mean - mean);
        }
    }

    /// All optional scalar statistics, by JSON name.
    pub fn scalar_fields(&self) -> [(&'static str, Option<f64>); 15] {
        [
            ("recent_obs_mjd", self.recent_obs_mjd),
            ("first_detected_mjd", self.first_detected_mjd),
            ("first_detected_mag", self.first_detected_mag),
            ("last_detected_mjd", self.last_detected_mjd),
            ("last_detected_mag", self.last_detected_mag),
            ("last_non_detection_mjd", self.last_non_detection_mjd),
            ("time_to_non_detection", self.time_to_non_detection),
            ("mean_mag_global", self.mean_mag_global),
            ("mag_rms_global", self.mag_rms_global),
            ("peak_mag_global", self.peak_mag_global),
            ("peak_mjd_global", self.peak_mjd_global),
            ("faintest_mag_global", self.faintest_mag_global),
            ("deepest_limit_global", self.deepest_limit_global),
            ("rise_rate", self.rise_rate),
            ("decay_rate", self.decay_rate),
        ]
    }

    /// All floating-point per-filter maps, by JSON name.
    pub fn per_filter_fields(&self) -> [(&'static str, &PerFilter); 7] {
        [
            ("mean_mag_per_filter", &self.mean_mag_per_filter),
            ("mag_rms_per_filter", &self.mag_rms_per_filter),
            ("peak_mag_per_filter", &self.peak_mag_per_filter),
            ("peak_mjd_per_filter", &self.peak_mjd_per_filter),
            ("faintest_mag_per_filter", &self.faintest_mag_per_filter),
            ("deepest_limit_per_filter", &self.deepest_limit_per_filter),
            ("mean_color", &self.mean_color),
        ]
    }

    /// Verify the record invariants.
    ///
    /// Return
    /// ----------
    /// * `Ok(())` when every invariant holds,
    /// * `Err(PhotStatError::InconsistentPhotStat)` naming the first violated invariant.
    pub fn check_consistency(&self) -> Result<(), PhotStatError> {
        let fail = |msg: String| Err(PhotStatError::InconsistentPhotStat(msg));

        for (name, value) in self.scalar_fields() {
            if value.is_some_and(|v| !v.is_finite()) {
                return fail(format!("{name} is not finite"));
            }
        }
        for (name, map) in self.per_filter_fields() {
            if let Some((key, _)) = map.iter().find(|(_, v)| !v.is_finite()) {
                return fail(format!("{name}[{key}] is not finite"));
            }
        }
        if self.predetection_mjds.iter().any(|m| !m.is_finite()) {
            return fail("predetection_mjds holds a non-finite value".into());
        }

        let obs_sum: u32 = self.num_obs_per_filter.values().sum();
        if obs_sum != self.num_obs_global {
            return fail(format!(
                "num_obs_global = {} but per-filter sum = {obs_sum}",
                self.num_obs_global
            ));
        }
        let det_sum: u32 = self.num_det_per_filter.values().sum();
        if det_sum != self.num_det_global {
            return fail(format!(
                "num_det_global = {} but per-filter sum = {det_sum}",
                self.num_det_global
            ));
        }
        for (filter, det) in self.num_det_per_filter.iter() {
            if *det > self.num_obs_per_filter.get(filter).copied().unwrap_or(0) {
                return fail(format!("more detections than observations in {filter}"));
            }
        }

        if let (Some(first), Some(last)) = (self.first_detected_mjd, self.last_detected_mjd) {
            if first > last {
                return fail(format!("first_detected_mjd {first} > last_detected_mjd {last}"));
            }
        }

        let min_peak = self
            .peak_mag_per_filter
            .values()
            .copied()
            .min_by(f64::total_cmp);
        if self.peak_mag_global != min_peak {
            return fail(format!(
                "peak_mag_global {:?} differs from per-filter minimum {min_peak:?}",
                self.peak_mag_global
            ));
        }

        let max_limit = self
            .deepest_limit_per_filter
            .values()
            .copied()
            .max_by(f64::total_cmp);
        if self.deepest_limit_global != max_limit {
            return fail(format!(
                "deepest_limit_global {:?} differs from per-filter maximum {max_limit:?}",
                self.deepest_limit_global
            ));
        }

        let n_filters = self.mean_mag_per_filter.len();
        if self.mean_color.len() != n_filters * n_filters.saturating_sub(1) {
            return fail(format!(
                "{} colors for {n_filters} filters with a mean magnitude",
                self.mean_color.len()
            ));
        }
        for (f1, f2) in self
            .mean_mag_per_filter
            .keys()
            .tuple_combinations::<(_, _)>()
        {
            let forward = self.mean_color.get(&color_key(f1, f2));
            let backward = self.mean_color.get(&color_key(f2, f1));
            match (forward, backward) {
                (Some(a), Some(b)) if *a == -*b => {}
                _ => return fail(format!("mean_color[{f1}-{f2}] is not antisymmetric")),
            }
        }

        Ok(())
    }

    /// Field-by-field comparison of two records, ignoring bookkeeping timestamps.
    ///
    /// Arguments
    /// -----------------
    /// * `other`: the record to compare with.
    /// * `tol`: absolute tolerance applied to floating-point values.
    ///
    /// Return
    /// ----------
    /// * The names of the fields that differ (empty when the records agree).
    pub fn diff(&self, other: &PhotStat, tol: f64) -> Vec<String> {
        let close = |a: f64, b: f64| (a - b).abs() <= tol;
        let mut out = Vec::new();

        if self.obj_id != other.obj_id {
            out.push("obj_id".to_string());
        }
        if self.num_obs_global != other.num_obs_global {
            out.push("num_obs_global".to_string());
        }
        if self.num_det_global != other.num_det_global {
            out.push("num_det_global".to_string());
        }
        if self.num_obs_per_filter != other.num_obs_per_filter {
            out.push("num_obs_per_filter".to_string());
        }
        if self.num_det_per_filter != other.num_det_per_filter {
            out.push("num_det_per_filter".to_string());
        }
        if self.first_detected_filter != other.first_detected_filter {
            out.push("first_detected_filter".to_string());
        }
        if self.last_detected_filter != other.last_detected_filter {
            out.push("last_detected_filter".to_string());
        }

        for ((name, a), (_, b)) in self.scalar_fields().into_iter().zip(other.scalar_fields()) {
            let same = match (a, b) {
                (None, None) => true,
                (Some(a), Some(b)) => close(a, b),
                _ => false,
            };
            if !same {
                out.push(name.to_string());
            }
        }

        for ((name, a), (_, b)) in self
            .per_filter_fields()
            .into_iter()
            .zip(other.per_filter_fields())
        {
            let same = a.len() == b.len()
                && a.iter()
                    .zip(b.iter())
                    .all(|((ka, va), (kb, vb))| ka == kb && close(*va, *vb));
            if !same {
                out.push(name.to_string());
            }
        }

        let same_predetection = self.predetection_mjds.len() == other.predetection_mjds.len()
            && self
                .predetection_mjds
                .iter()
                .zip(other.predetection_mjds.iter())
                .all(|(a, b)| close(*a, *b));
        if !same_predetection {
            out.push("predetection_mjds".to_string());
        }

        out
    }

    /// `true` when [`PhotStat::diff`] finds no difference.
    pub fn is_consistent_with(&self, other: &PhotStat, tol: f64) -> bool {
        self.diff(other, tol).is_empty()
    }
}
