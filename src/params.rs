//! # Photometric statistics parameters
//!
//! This module defines the [`PhotStatParams`] configuration struct and its builder. The
//! parameters control how a photometry point is classified before it reaches the running
//! aggregates of a [`PhotStat`](crate::phot_stat::PhotStat):
//!
//! - `detection_threshold` – signal-to-noise ratio a point must **exceed** to count as a
//!   detection (nominally 3σ). Points at or below it are non-detections and contribute a
//!   limiting magnitude instead.
//!
//! The flux system is not configurable: the engine always works in the AB system of zeropoint
//! [`PHOT_ZP`](crate::constants::PHOT_ZP), and readers convert other zeropoints on ingestion.
//!
//! ## Example
//!
//! ```rust
//! use photstat::params::PhotStatParams;
//!
//! let params = PhotStatParams::builder()
//!     .detection_threshold(5.0)
//!     .build()
//!     .unwrap();
//! assert_eq!(params.detection_threshold, 5.0);
//! ```
use crate::constants::DEFAULT_DETECTION_THRESHOLD;
use crate::photstat_errors::PhotStatError;
use serde::{Deserialize, Serialize};

/// Configuration of the photometric statistics engine.
///
/// Defaults
/// -----------------
/// * `detection_threshold`: 3.0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotStatParams {
    pub detection_threshold: f64,
}

impl PhotStatParams {
    /// Construct a new [`PhotStatParams`] with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new [`PhotStatParamsBuilder`] initialized with default values.
    pub fn builder() -> PhotStatParamsBuilder {
        PhotStatParamsBuilder::new()
    }
}

impl Default for PhotStatParams {
    fn default() -> Self {
        PhotStatParams {
            detection_threshold: DEFAULT_DETECTION_THRESHOLD,
        }
    }
}

/// Builder for [`PhotStatParams`], with validation.
#[derive(Debug, Clone, Default)]
pub struct PhotStatParamsBuilder {
    params: PhotStatParams,
}

impl PhotStatParamsBuilder {
    pub fn new() -> Self {
        Self {
            params: PhotStatParams::default(),
        }
    }

    pub fn detection_threshold(mut self, v: f64) -> Self {
        self.params.detection_threshold = v;
        self
    }

    /// Finalize the builder and produce a [`PhotStatParams`] instance.
    ///
    /// Validation rules
    /// -----------------
    /// * `detection_threshold` must be finite and strictly positive.
    ///
    /// Returns
    /// -----------------
    /// * `Ok(PhotStatParams)` if all values are valid.
    /// * `Err(PhotStatError::InvalidParameter)` naming the first rule that failed.
    pub fn build(self) -> Result<PhotStatParams, PhotStatError> {
        let p = &self.params;

        if !(p.detection_threshold.is_finite() && p.detection_threshold > 0.0) {
            return Err(PhotStatError::InvalidParameter(
                "detection_threshold must be finite and > 0".into(),
            ));
        }

        Ok(self.params)
    }
}
