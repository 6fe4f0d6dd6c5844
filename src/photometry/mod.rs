//! # Photometry points and the detection rule
//!
//! A [`PhotometryPoint`] is one flux measurement of an object in a given bandpass. It is the
//! read-only input of the statistics engine: the engine never stores points, it only folds them
//! into a [`PhotStat`](crate::phot_stat::PhotStat).
//!
//! ## Detection rule
//!
//! With `snr = flux / flux_err`, a point is a **detection** iff the SNR is defined and
//! `snr > detection_threshold`. Every other point is a **non-detection** that contributes a
//! limiting magnitude, taken from the externally supplied `limiting_mag` when it is finite, or
//! derived from the flux error otherwise:
//!
//! ```text
//! limit = -2.5 log10(threshold × flux_err) + zp
//! ```
//!
//! Points carrying a NaN or infinite flux, and points for which neither a magnitude nor a limit
//! can be computed, are [`PointKind::Malformed`] and must be ignored by every aggregate. Magnitudes are only defined for **positive** flux.
pub mod photometry_file;

use serde::{Deserialize, Serialize};

use crate::constants::{Filter, Flux, Magnitude, MJD, PHOT_ZP, POGSON};
use crate::params::PhotStatParams;

/// A single photometric measurement.
///
/// # Fields
///
/// * `filter` - The bandpass of the measurement
/// * `mjd` - The epoch of the measurement
/// * `flux` - The flux in the internal AB (zp = 23.9) system, `None` for pure upper limits
/// * `flux_err` - The 1σ flux uncertainty in the same system
/// * `limiting_mag` - An optional limiting magnitude supplied with the original data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotometryPoint {
    pub filter: Filter,
    pub mjd: MJD,
    pub flux: Option<Flux>,
    pub flux_err: Option<Flux>,
    pub limiting_mag: Option<Magnitude>,
}

/// Why a point was excluded from the aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedReason {
    /// The epoch is NaN or infinite.
    InvalidMjd,
    /// A flux value is present but NaN or infinite.
    InvalidFlux,
    /// The point is below threshold and carries neither a usable flux error nor a finite
    /// limiting magnitude.
    NoLimitSource,
}

/// Outcome of the detection rule for one point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointKind {
    Detection { mag: Magnitude },
    NonDetection { limit: Magnitude },
    Malformed(MalformedReason),
}

impl PointKind {
    pub fn is_detection(&self) -> bool {
        matches!(self, PointKind::Detection { .. })
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, PointKind::Malformed(_))
    }
}

/// Keep a value only if it is finite.
#[inline]
fn finite(x: Option<f64>) -> Option<f64> {
    x.filter(|v| v.is_finite())
}

/// Convert a positive flux to a magnitude; `None` for non-positive or non-finite flux.
#[inline]
pub fn flux_to_mag(flux: Flux, zeropoint: f64) -> Option<Magnitude> {
    (flux.is_finite() && flux > 0.0).then(|| -2.5 * flux.log10() + zeropoint)
}

/// Convert a magnitude to a flux in the system of the given zeropoint.
#[inline]
pub fn mag_to_flux(mag: Magnitude, zeropoint: f64) -> Flux {
    10f64.powf(-0.4 * (mag - zeropoint))
}

impl PhotometryPoint {
    /// Create a new point from a flux and its error, both in the internal AB system.
    pub fn new(filter: impl Into<Filter>, mjd: MJD, flux: Option<Flux>, flux_err: Option<Flux>) -> Self {
        PhotometryPoint {
            filter: filter.into(),
            mjd,
            flux,
            flux_err,
            limiting_mag: None,
        }
    }

    /// Attach an externally supplied limiting magnitude.
    pub fn with_limiting_mag(mut self, limiting_mag: Option<Magnitude>) -> Self {
        self.limiting_mag = limiting_mag;
        self
    }

    /// Create a point from fluxes expressed with an arbitrary zeropoint.
    ///
    /// Both the flux and its error are rescaled into the AB system of zeropoint 23.9, so the
    /// SNR is unchanged:
    ///
    /// ```text
    /// flux_ab = flux × 10^(-0.4 (zp - 23.9))
    /// ```
    pub fn from_zeropoint(
        filter: impl Into<Filter>,
        mjd: MJD,
        flux: Option<Flux>,
        flux_err: Option<Flux>,
        zp: f64,
    ) -> Self {
        let factor = 10f64.powf(-0.4 * (zp - PHOT_ZP));
        PhotometryPoint::new(filter, mjd, flux.map(|f| f * factor), flux_err.map(|e| e * factor))
    }

    /// Create a point from magnitude-space data.
    ///
    /// * With a magnitude, the flux is `10^(-0.4 (mag - 23.9))` and the flux error is
    ///   propagated from `mag_err` (`σ_f = σ_m × f / 1.0857`).
    /// * Without a magnitude the point is an upper limit: the flux is `None` and the flux error
    ///   is chosen so that the limit sits exactly at `threshold` σ.
    pub fn from_magnitude(
        filter: impl Into<Filter>,
        mjd: MJD,
        mag: Option<Magnitude>,
        mag_err: Option<Magnitude>,
        limiting_mag: Option<Magnitude>,
        threshold: f64,
    ) -> Self {
        let (flux, flux_err) = match finite(mag) {
            Some(m) => {
                let flux = mag_to_flux(m, PHOT_ZP);
                (Some(flux), finite(mag_err).map(|e| e * flux / POGSON))
            }
            None => (
                None,
                finite(limiting_mag).map(|lim| mag_to_flux(lim, PHOT_ZP) / threshold),
            ),
        };
        PhotometryPoint::new(filter, mjd, flux, flux_err).with_limiting_mag(limiting_mag)
    }

    /// Magnitude of the point, defined only for a finite and positive flux.
    pub fn mag(&self, zeropoint: f64) -> Option<Magnitude> {
        finite(self.flux).and_then(|f| flux_to_mag(f, zeropoint))
    }

    /// Signal-to-noise ratio, defined only for a finite flux and a finite, positive error.
    pub fn snr(&self) -> Option<f64> {
        let flux = finite(self.flux)?;
        let err = finite(self.flux_err).filter(|e| *e > 0.0)?;
        Some(flux / err)
    }

    /// Limiting magnitude at `threshold` σ, preferring the supplied value.
    pub fn limiting_mag(&self, threshold: f64, zeropoint: f64) -> Option<Magnitude> {
        finite(self.limiting_mag).or_else(|| {
            finite(self.flux_err)
                .filter(|e| *e > 0.0)
                .and_then(|e| flux_to_mag(threshold * e, zeropoint))
        })
    }

    /// Apply the detection rule.
    ///
    /// Arguments
    /// -----------------
    /// * `params`: detection threshold. Magnitudes are always computed in the AB 23.9 system.
    ///
    /// Return
    /// ----------
    /// * [`PointKind::Detection`] with the magnitude if `snr > threshold`,
    /// * [`PointKind::NonDetection`] with the limiting magnitude otherwise,
    /// * [`PointKind::Malformed`] if the point cannot contribute any finite value.
    pub fn classify(&self, params: &PhotStatParams) -> PointKind {
        if !self.mjd.is_finite() {
            return PointKind::Malformed(MalformedReason::InvalidMjd);
        }
        if self.flux.is_some_and(|f| !f.is_finite()) {
            return PointKind::Malformed(MalformedReason::InvalidFlux);
        }

        if let Some(snr) = self.snr() {
            if snr > params.detection_threshold {
                // snr > 0 implies a positive flux, so the magnitude exists
                if let Some(mag) = self.mag(PHOT_ZP) {
                    return PointKind::Detection { mag };
                }
            }
        }

        match self.limiting_mag(params.detection_threshold, PHOT_ZP) {
            Some(limit) => PointKind::NonDetection { limit },
            None => PointKind::Malformed(MalformedReason::NoLimitSource),
        }
    }
}
