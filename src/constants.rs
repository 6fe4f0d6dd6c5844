//! # Constants and type definitions for photstat
//!
//! This module centralizes the **photometric constants** and the **common type definitions**
//! used throughout the crate, together with the container types that group photometry by
//! astronomical object.
//!
//! ## Overview
//!
//! - Photometric calibration constants (AB zeropoint, default detection threshold)
//! - Core type aliases (MJD, magnitudes, fluxes, filter names, per-filter maps)
//! - The [`ObjectId`] identifier of an astronomical object
//! - Container types for storing the photometry of one or many objects
//!
//! Fluxes handled by the engine are always expressed in the **AB system with a zeropoint of
//! 23.9**, i.e. in micro-Jansky. Readers convert other zeropoints on ingestion.

use crate::photometry::PhotometryPoint;
use ahash::RandomState;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::{BTreeMap, HashMap};

// -------------------------------------------------------------------------------------------------
// Photometric constants
// -------------------------------------------------------------------------------------------------

/// AB zeropoint of the internal flux system (fluxes in µJy)
pub const PHOT_ZP: f64 = 23.9;

/// Default signal-to-noise ratio above which a point counts as a detection
pub const DEFAULT_DETECTION_THRESHOLD: f64 = 3.0;

/// Pogson ratio, `2.5 / ln(10)`, used to propagate flux errors into magnitude errors
pub const POGSON: f64 = 2.5 / std::f64::consts::LN_10;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Modified Julian Date (days)
pub type MJD = f64;
/// AB magnitude
pub type Magnitude = f64;
/// Flux in the internal AB (zp = 23.9) system
pub type Flux = f64;
/// Name of a bandpass (e.g. `"ztfg"`, `"ztfr"`)
pub type Filter = String;

/// Mapping from filter name to a per-filter statistic.
///
/// A `BTreeMap` keeps the JSON key order deterministic. A missing key means
/// "no data for that filter yet".
pub type PerFilter<T = f64> = BTreeMap<Filter, T>;

// -------------------------------------------------------------------------------------------------
// Identifiers and data containers
// -------------------------------------------------------------------------------------------------

/// Opaque identifier of the astronomical object owning a photometry series
/// (e.g. `"ZTF21aaqjmps"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ObjectId {
    fn from(s: String) -> Self {
        ObjectId(s)
    }
}

impl From<&str> for ObjectId {
    fn from(s: &str) -> Self {
        ObjectId(s.to_string())
    }
}

/// A small, inline-optimized container for the photometry of a single object.
pub type Photometry = SmallVec<[PhotometryPoint; 8]>;

/// The photometry of many objects, keyed by [`ObjectId`].
///
/// Uses [`ahash`](https://docs.rs/ahash) for fast hashing.
pub type PhotometrySet = HashMap<ObjectId, Photometry, RandomState>;
