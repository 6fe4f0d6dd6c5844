//! # CSV photometry reader
//!
//! Builds a [`PhotometrySet`] (photometry grouped by object) from CSV files or any reader.
//!
//! ## Columns
//! -----------------
//! * required: `obj_id`, `mjd`, `filter`
//! * flux space: `flux`, `fluxerr`, optional `zp` (defaults to 23.9)
//! * magnitude space: `mag`, `magerr`
//! * optional in both: `limiting_mag`
//!
//! Empty cells are read as missing values. A row is flux space as soon as it has a `flux` or a
//! `fluxerr` cell, magnitude space otherwise. Fluxes are rescaled into the AB 23.9 system and
//! magnitude rows are converted with [`PhotometryPoint::from_magnitude`].
//!
//! ## Error Handling
//! -----------------
//! I/O and CSV decoding failures are propagated. Rows carrying no flux, magnitude or limit at all,
//! or an empty filter name, are rejected with [`PhotStatError::InvalidPhotometryRow`] naming the
//! 1-based data row. Rows whose values are merely non-finite are kept: the statistics engine
//! classifies them as malformed and skips them.
use std::io::Read;

use camino::Utf8Path;
use serde::Deserialize;

use crate::constants::{ObjectId, PhotometrySet, PHOT_ZP};
use crate::params::PhotStatParams;
use crate::photometry::PhotometryPoint;
use crate::photstat_errors::PhotStatError;

#[derive(Debug, Deserialize)]
struct PhotometryRow {
    obj_id: String,
    mjd: f64,
    filter: String,
    #[serde(default)]
    flux: Option<f64>,
    #[serde(default)]
    fluxerr: Option<f64>,
    #[serde(default)]
    zp: Option<f64>,
    #[serde(default)]
    mag: Option<f64>,
    #[serde(default)]
    magerr: Option<f64>,
    #[serde(default)]
    limiting_mag: Option<f64>,
}

impl PhotometryRow {
    fn into_point(self, row: usize, params: &PhotStatParams) -> Result<(ObjectId, PhotometryPoint), PhotStatError> {
        let invalid = |reason: &str| PhotStatError::InvalidPhotometryRow {
            row,
            reason: reason.to_string(),
        };

        if self.obj_id.trim().is_empty() {
            return Err(invalid("empty obj_id"));
        }
        let filter = self.filter.trim();
        if filter.is_empty() {
            return Err(invalid("empty filter"));
        }

        let point = if self.flux.is_some() || self.fluxerr.is_some() {
            PhotometryPoint::from_zeropoint(
                filter,
                self.mjd,
                self.flux,
                self.fluxerr,
                self.zp.unwrap_or(PHOT_ZP),
            )
            .with_limiting_mag(self.limiting_mag)
        } else if self.mag.is_some() || self.limiting_mag.is_some() {
            PhotometryPoint::from_magnitude(
                filter,
                self.mjd,
                self.mag,
                self.magerr,
                self.limiting_mag,
                params.detection_threshold,
            )
        } else {
            return Err(invalid("no flux, magnitude or limiting magnitude"));
        };

        Ok((ObjectId::from(self.obj_id.trim()), point))
    }
}

/// Read every row of a CSV source and append the points to `set`.
///
/// Return
/// ----------
/// * The number of points read.
pub fn read_photometry<R: Read>(
    reader: R,
    params: &PhotStatParams,
    set: &mut PhotometrySet,
) -> Result<usize, PhotStatError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut count = 0;
    for (idx, record) in csv_reader.deserialize::<PhotometryRow>().enumerate() {
        let (obj_id, point) = record?.into_point(idx + 1, params)?;
        set.entry(obj_id).or_default().push(point);
        count += 1;
    }
    Ok(count)
}

/// Constructors and appenders of a [`PhotometrySet`] from CSV sources.
pub trait PhotometryFile {
    /// Build a new set from a CSV file.
    fn new_from_csv(path: &Utf8Path, params: &PhotStatParams) -> Result<Self, PhotStatError>
    where
        Self: Sized;

    /// Append the content of a CSV file to an existing set.
    fn add_from_csv(&mut self, path: &Utf8Path, params: &PhotStatParams) -> Result<usize, PhotStatError>;

    /// Build a new set from any reader producing CSV text.
    fn from_reader<R: Read>(reader: R, params: &PhotStatParams) -> Result<Self, PhotStatError>
    where
        Self: Sized;
}

impl PhotometryFile for PhotometrySet {
    fn new_from_csv(path: &Utf8Path, params: &PhotStatParams) -> Result<Self, PhotStatError> {
        let mut set = PhotometrySet::default();
        set.add_from_csv(path, params)?;
        Ok(set)
    }

    fn add_from_csv(&mut self, path: &Utf8Path, params: &PhotStatParams) -> Result<usize, PhotStatError> {
        let file = std::fs::File::open(path)?;
        let count = read_photometry(file, params, self)?;
        tracing::info!(path = %path, points = count, objects = self.len(), "photometry loaded");
        Ok(count)
    }

    fn from_reader<R: Read>(reader: R, params: &PhotStatParams) -> Result<Self, PhotStatError> {
        let mut set = PhotometrySet::default();
        read_photometry(reader, params, &mut set)?;
        Ok(set)
    }
}
