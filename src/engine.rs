//! # Photometric statistics engine
//!
//! [`PhotStatEngine`] is the single entry point through which every photometry mutation must be
//! routed. It owns a [`PhotStatStore`], the [`PhotStatParams`] used to classify points, and a
//! registry of per-object locks.
//!
//! ## Event routing
//! -----------------
//! * [`PhotometryEvent::PointInserted`] → [`PhotStatEngine::on_point_inserted`]: O(1)
//!   [`PhotStat::add_point`] when a record exists, otherwise a record is seeded with
//!   [`PhotStat::full_recompute`] over the single point.
//! * [`PhotometryEvent::PointsChanged`] → [`PhotStatEngine::on_points_changed`]: full
//!   recomputation over the remaining points (covers deletions and edits).
//!
//! ## Administrative operations
//! -----------------
//! * [`PhotStatEngine::get_phot_stat`] / [`PhotStatEngine::delete_phot_stat`] – read or drop a
//!   record; unknown objects yield [`PhotStatError::NotFound`]. Deleting never touches photometry.
//! * [`PhotStatEngine::recompute_missing`] / [`PhotStatEngine::recompute_all`] – backfills over a
//!   [`PhotometrySource`], restricted by a [`RecomputeFilter`].
//!
//! ## Concurrency
//! -----------------
//! Each read-modify-write of one object's record runs under that object's mutex, so two
//! mutations of the same object are serialized and an incremental add never sees a stale
//! count. Different objects never share a lock and proceed in parallel.
//!
//! ## Feature Flags
//! -----------------
//! * `progress`: renders an `indicatif` progress bar during bulk recomputes.
use std::collections::HashMap;
use std::sync::Arc;

use ahash::RandomState;
use hifitime::Epoch;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[cfg(feature = "progress")]
use indicatif::{ProgressBar, ProgressStyle};

use crate::constants::{ObjectId, Photometry, PhotometrySet, MJD};
use crate::params::PhotStatParams;
use crate::phot_stat::PhotStat;
use crate::photometry::{PhotometryPoint, PointKind};
use crate::photstat_errors::PhotStatError;
use crate::store::{InMemoryPhotStatStore, PhotStatStore};

/// A photometry mutation reported by the layer that owns the photometry tables.
#[derive(Debug, Clone, PartialEq)]
pub enum PhotometryEvent {
    /// One new point was inserted for the object.
    PointInserted {
        obj_id: ObjectId,
        point: PhotometryPoint,
    },
    /// Points were deleted or edited; `remaining` is the full current photometry.
    PointsChanged {
        obj_id: ObjectId,
        remaining: Photometry,
    },
}

/// An object known to the photometry source, with its creation time (UTC MJD).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub obj_id: ObjectId,
    pub created_at: MJD,
}

/// Read access to the objects and their photometry, used by the bulk recomputes.
pub trait PhotometrySource {
    /// Every known object.
    fn objects(&self) -> Result<Vec<ObjectRecord>, PhotStatError>;

    /// The complete photometry of one object.
    fn photometry(&self, obj_id: &ObjectId) -> Result<Photometry, PhotStatError>;
}

/// [`PhotometrySource`] over an in-memory [`PhotometrySet`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryPhotometry {
    set: PhotometrySet,
    created_at: HashMap<ObjectId, MJD, RandomState>,
}

impl InMemoryPhotometry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a set, giving every object the same creation time.
    pub fn from_set(set: PhotometrySet, created_at: MJD) -> Self {
        let created_at = set.keys().map(|k| (k.clone(), created_at)).collect();
        InMemoryPhotometry { set, created_at }
    }

    /// Register (or replace) the photometry of one object.
    pub fn insert(&mut self, obj_id: ObjectId, created_at: MJD, photometry: Photometry) {
        self.created_at.insert(obj_id.clone(), created_at);
        self.set.insert(obj_id, photometry);
    }

    pub fn set(&self) -> &PhotometrySet {
        &self.set
    }
}

impl PhotometrySource for InMemoryPhotometry {
    fn objects(&self) -> Result<Vec<ObjectRecord>, PhotStatError> {
        let mut objects: Vec<ObjectRecord> = self
            .created_at
            .iter()
            .map(|(obj_id, created_at)| ObjectRecord {
                obj_id: obj_id.clone(),
                created_at: *created_at,
            })
            .collect();
        objects.sort_by(|a, b| a.obj_id.cmp(&b.obj_id));
        Ok(objects)
    }

    fn photometry(&self, obj_id: &ObjectId) -> Result<Photometry, PhotStatError> {
        Ok(self.set.get(obj_id).cloned().unwrap_or_default())
    }
}

/// Time-range criteria selecting objects for a bulk recompute.
///
/// All bounds are inclusive UTC MJDs and optional. Creation bounds apply to
/// [`ObjectRecord::created_at`]; full/quick update bounds apply to the existing record's
/// `last_full_update` / `last_update`, so an object without a record never matches an update
/// bound. `max_objects` caps how many objects are recomputed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecomputeFilter {
    pub created_after: Option<MJD>,
    pub created_before: Option<MJD>,
    pub full_update_after: Option<MJD>,
    pub full_update_before: Option<MJD>,
    pub quick_update_after: Option<MJD>,
    pub quick_update_before: Option<MJD>,
    pub max_objects: Option<usize>,
}

fn within(value: Option<MJD>, after: Option<MJD>, before: Option<MJD>) -> bool {
    if after.is_none() && before.is_none() {
        return true;
    }
    let Some(v) = value else {
        return false;
    };
    after.is_none_or(|a| v >= a) && before.is_none_or(|b| v <= b)
}

impl RecomputeFilter {
    /// `true` if the object passes every configured bound.
    pub fn matches(&self, object: &ObjectRecord, existing: Option<&PhotStat>) -> bool {
        within(Some(object.created_at), self.created_after, self.created_before)
            && within(
                existing.and_then(|s| s.last_full_update),
                self.full_update_after,
                self.full_update_before,
            )
            && within(
                existing.and_then(|s| s.last_update),
                self.quick_update_after,
                self.quick_update_before,
            )
    }
}

/// Current time as a UTC MJD.
pub fn utc_now_mjd() -> Result<MJD, PhotStatError> {
    Ok(Epoch::now()?.to_mjd_utc_days())
}

/// Orchestration layer owning the statistics store.
pub struct PhotStatEngine<S: PhotStatStore = InMemoryPhotStatStore> {
    store: S,
    params: PhotStatParams,
    locks: Mutex<HashMap<ObjectId, Arc<Mutex<()>>, RandomState>>,
}

impl PhotStatEngine<InMemoryPhotStatStore> {
    /// Engine over a fresh in-memory store.
    pub fn in_memory(params: PhotStatParams) -> Self {
        PhotStatEngine::new(InMemoryPhotStatStore::new(), params)
    }
}

impl<S: PhotStatStore> PhotStatEngine<S> {
    pub fn new(store: S, params: PhotStatParams) -> Self {
        PhotStatEngine {
            store,
            params,
            locks: Mutex::new(HashMap::default()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn params(&self) -> &PhotStatParams {
        &self.params
    }

    /// The mutex serializing updates of `obj_id`, created on first use.
    fn object_lock(&self, obj_id: &ObjectId) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .entry(obj_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the registry entry of `obj_id` unless another caller still holds its mutex.
    fn release_object_lock(&self, obj_id: &ObjectId, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock();
        // the registry and `lock` are the only owners
        if Arc::strong_count(&lock) == 2 {
            locks.remove(obj_id);
        }
    }

    /// Route one photometry event.
    pub fn handle(&self, event: PhotometryEvent) -> Result<(), PhotStatError> {
        match event {
            PhotometryEvent::PointInserted { obj_id, point } => {
                self.on_point_inserted(&obj_id, &point)?;
            }
            PhotometryEvent::PointsChanged { obj_id, remaining } => {
                self.on_points_changed(&obj_id, &remaining)?;
            }
        }
        Ok(())
    }

    /// A point was inserted for `obj_id`.
    ///
    /// Return
    /// ----------
    /// * How the point was classified. A malformed point never alters an existing record; for an
    ///   object without a record it still creates an empty one.
    pub fn on_point_inserted(
        &self,
        obj_id: &ObjectId,
        point: &PhotometryPoint,
    ) -> Result<PointKind, PhotStatError> {
        let lock = self.object_lock(obj_id);
        let _guard = lock.lock();
        let now = utc_now_mjd()?;

        match self.store.get(obj_id)? {
            Some(mut stat) => {
                let kind = stat.add_point(point, &self.params, now);
                if !kind.is_malformed() {
                    self.store.upsert(stat)?;
                }
                Ok(kind)
            }
            None => {
                debug!(obj_id = %obj_id, "seeding photometric statistics");
                let mut stat = PhotStat::new(obj_id.clone());
                stat.full_recompute(std::iter::once(point), &self.params, now);
                self.store.upsert(stat)?;
                Ok(point.classify(&self.params))
            }
        }
    }

    /// Points of `obj_id` were deleted or edited; rebuild from the remaining ones.
    ///
    /// Return
    /// ----------
    /// * The rebuilt record, which is also persisted.
    pub fn on_points_changed<'a, I>(&self, obj_id: &ObjectId, remaining: I) -> Result<PhotStat, PhotStatError>
    where
        I: IntoIterator<Item = &'a PhotometryPoint>,
    {
        let lock = self.object_lock(obj_id);
        let _guard = lock.lock();
        let now = utc_now_mjd()?;

        let mut stat = self
            .store
            .get(obj_id)?
            .unwrap_or_else(|| PhotStat::new(obj_id.clone()));
        stat.full_recompute(remaining, &self.params, now);
        self.store.upsert(stat.clone())?;
        Ok(stat)
    }

    pub fn get_phot_stat(&self, obj_id: &ObjectId) -> Result<PhotStat, PhotStatError> {
        self.store
            .get(obj_id)?
            .ok_or_else(|| PhotStatError::NotFound(obj_id.clone()))
    }

    /// Drop the record of `obj_id`. The photometry itself is not affected.
    pub fn delete_phot_stat(&self, obj_id: &ObjectId) -> Result<(), PhotStatError> {
        let lock = self.object_lock(obj_id);
        let removed = {
            let _guard = lock.lock();
            self.store.remove(obj_id)
        };
        self.release_object_lock(obj_id, lock);

        match removed? {
            Some(_) => {
                debug!(obj_id = %obj_id, "photometric statistics deleted");
                Ok(())
            }
            None => Err(PhotStatError::NotFound(obj_id.clone())),
        }
    }

    /// Full recompute for every matching object that has no record yet.
    ///
    /// Return
    /// ----------
    /// * The number of records written.
    pub fn recompute_missing<P: PhotometrySource>(
        &self,
        source: &P,
        filter: &RecomputeFilter,
    ) -> Result<usize, PhotStatError> {
        self.recompute_matching(source, filter, true)
    }

    /// Full recompute for every matching object, whether or not it has a record.
    ///
    /// Return
    /// ----------
    /// * The number of records written.
    pub fn recompute_all<P: PhotometrySource>(
        &self,
        source: &P,
        filter: &RecomputeFilter,
    ) -> Result<usize, PhotStatError> {
        self.recompute_matching(source, filter, false)
    }

    fn select_objects<P: PhotometrySource>(
        &self,
        source: &P,
        filter: &RecomputeFilter,
        only_missing: bool,
    ) -> Result<Vec<ObjectId>, PhotStatError> {
        let mut selected = Vec::new();
        for object in source.objects()? {
            let existing = self.store.get(&object.obj_id)?;
            if only_missing && existing.is_some() {
                continue;
            }
            if filter.matches(&object, existing.as_ref()) {
                selected.push(object.obj_id);
            }
        }
        if let Some(max) = filter.max_objects {
            selected.truncate(max);
        }
        Ok(selected)
    }

    /// Recompute one object from the source; `Ok(false)` when its photometry could not be read.
    fn recompute_one<P: PhotometrySource>(&self, source: &P, obj_id: &ObjectId) -> Result<bool, PhotStatError> {
        match source.photometry(obj_id) {
            Ok(points) => {
                self.on_points_changed(obj_id, &points)?;
                Ok(true)
            }
            Err(err) => {
                warn!(obj_id = %obj_id, error = %err, "cannot read photometry, skipping");
                Ok(false)
            }
        }
    }

    #[cfg(not(feature = "progress"))]
    fn recompute_matching<P: PhotometrySource>(
        &self,
        source: &P,
        filter: &RecomputeFilter,
        only_missing: bool,
    ) -> Result<usize, PhotStatError> {
        let selected = self.select_objects(source, filter, only_missing)?;
        let mut written = 0;
        for obj_id in selected.iter() {
            if self.recompute_one(source, obj_id)? {
                written += 1;
            }
        }
        info!(
            selected = selected.len(),
            written, only_missing, "bulk photometric statistics recompute done"
        );
        Ok(written)
    }

    #[cfg(feature = "progress")]
    fn recompute_matching<P: PhotometrySource>(
        &self,
        source: &P,
        filter: &RecomputeFilter,
        only_missing: bool,
    ) -> Result<usize, PhotStatError> {
        let selected = self.select_objects(source, filter, only_missing)?;

        let pb = ProgressBar::new(selected.len().max(1) as u64);
        if let Ok(style) = ProgressStyle::with_template(
            "{bar:40.cyan/blue} {pos}/{len} ({percent:>3}%) | {per_sec} | ETA {eta_precise} | {msg}",
        ) {
            pb.set_style(style.progress_chars("=>-"));
        }

        let mut written = 0;
        for obj_id in selected.iter() {
            pb.set_message(obj_id.to_string());
            if self.recompute_one(source, obj_id)? {
                written += 1;
            }
            pb.inc(1);
        }
        pb.finish_and_clear();

        info!(
            selected = selected.len(),
            written, only_missing, "bulk photometric statistics recompute done"
        );
        Ok(written)
    }
}
