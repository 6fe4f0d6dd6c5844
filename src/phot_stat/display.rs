//! # Tabular display for photometric statistics
//!
//! [`PhotStatDisplay`] borrows a [`PhotStat`] and renders it with
//! [`comfy-table`](https://crates.io/crates/comfy-table) as two tables:
//!
//! - a **summary** table with the global scalars (counts, endpoints, moments, extrema, rates),
//! - a **per-filter** table with one row per filter seen in the record.
//!
//! Undefined values print as `-`. `Display` on [`PhotStat`] uses the default precision.
//!
//! ```rust,ignore
//! println!("{}", phot_stat);
//! println!("{}", phot_stat.show().with_precision(5));
//! ```
use std::collections::BTreeSet;
use std::fmt;

use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, ContentArrangement, Table};

use super::PhotStat;

/// Display adaptor for a [`PhotStat`].
pub struct PhotStatDisplay<'a> {
    stat: &'a PhotStat,
    /// Fractional digits printed for floating-point values (default = 3).
    precision: usize,
}

impl<'a> PhotStatDisplay<'a> {
    pub fn new(stat: &'a PhotStat) -> Self {
        PhotStatDisplay { stat, precision: 3 }
    }

    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    fn fmt_opt(&self, v: Option<f64>) -> String {
        v.map_or_else(|| "-".to_string(), |v| format!("{v:.*}", self.precision))
    }

    fn summary_table(&self) -> Table {
        let s = self.stat;
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![Cell::new(format!("PhotStat {}", s.obj_id)), Cell::new("value")]);

        let filter_of = |f: &Option<String>| f.clone().unwrap_or_else(|| "-".to_string());
        let mut rows: Vec<(String, String)> = vec![
            ("num_obs_global".into(), s.num_obs_global.to_string()),
            ("num_det_global".into(), s.num_det_global.to_string()),
            ("first_detected_filter".into(), filter_of(&s.first_detected_filter)),
            ("last_detected_filter".into(), filter_of(&s.last_detected_filter)),
            ("predetection_mjds".into(), s.predetection_mjds.len().to_string()),
        ];
        rows.extend(
            s.scalar_fields()
                .into_iter()
                .map(|(name, v)| (name.to_string(), self.fmt_opt(v))),
        );
        rows.push(("last_update".into(), self.fmt_opt(s.last_update)));
        rows.push(("last_full_update".into(), self.fmt_opt(s.last_full_update)));

        for (name, value) in rows {
            table.add_row(vec![
                Cell::new(name),
                Cell::new(value).set_alignment(CellAlignment::Right),
            ]);
        }
        table
    }

    fn per_filter_table(&self) -> Table {
        let s = self.stat;
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                "filter", "n_obs", "n_det", "mean", "rms", "peak", "peak MJD", "faintest",
                "deepest limit",
            ]);

        let filters: BTreeSet<&String> = s
            .num_obs_per_filter
            .keys()
            .chain(s.num_det_per_filter.keys())
            .collect();

        for filter in filters {
            let count = |m: &crate::constants::PerFilter<u32>| m.get(filter).copied().unwrap_or(0);
            let value = |m: &crate::constants::PerFilter| self.fmt_opt(m.get(filter).copied());
            let cells = vec![
                Cell::new(filter),
                Cell::new(count(&s.num_obs_per_filter)),
                Cell::new(count(&s.num_det_per_filter)),
                Cell::new(value(&s.mean_mag_per_filter)),
                Cell::new(value(&s.mag_rms_per_filter)),
                Cell::new(value(&s.peak_mag_per_filter)),
                Cell::new(value(&s.peak_mjd_per_filter)),
                Cell::new(value(&s.faintest_mag_per_filter)),
                Cell::new(value(&s.deepest_limit_per_filter)),
            ];
            table.add_row(
                cells
                    .into_iter()
                    .enumerate()
                    .map(|(i, c)| {
                        if i == 0 {
                            c
                        } else {
                            c.set_alignment(CellAlignment::Right)
                        }
                    })
                    .collect::<Vec<_>>(),
            );
        }
        table
    }
}

impl fmt::Display for PhotStatDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.summary_table())?;
        if !self.stat.num_obs_per_filter.is_empty() {
            writeln!(f, "{}", self.per_filter_table())?;
        }
        if !self.stat.mean_color.is_empty() {
            let colors = self
                .stat
                .mean_color
                .iter()
                .map(|(k, v)| format!("{k}: {v:.*}", self.precision))
                .collect::<Vec<_>>()
                .join(", ");
            writeln!(f, "mean colors: {colors}")?;
        }
        Ok(())
    }
}

impl PhotStat {
    /// Borrowing table renderer, see [`PhotStatDisplay`].
    pub fn show(&self) -> PhotStatDisplay<'_> {
        PhotStatDisplay::new(self)
    }
}

impl fmt::Display for PhotStat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.show())
    }
}
