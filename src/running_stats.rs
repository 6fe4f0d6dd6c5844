//! Running-aggregate primitives.
//!
//! Two families of helpers share this module:
//!
//! * **Incremental** updates ([`update_average`], [`update_scatter`]) used when a single new
//!   detection is folded into an existing mean/RMS pair. `count_so_far` is always the number of
//!   values already aggregated, i.e. *before* the new value is included.
//! * **Direct** population statistics ([`population_mean`], [`population_rms`]) used by the full
//!   recomputation path.
//!
//! Both produce the same numbers up to rounding, the incremental variance being Welford's update
//! of the population (ddof = 0) variance:
//!
//! ```text
//! var' = n/(n+1) × (var + (mean - x)² / (n+1))
//! ```

/// Mean after including `new_value` into a mean over `count_so_far` values.
#[inline]
pub fn update_average(current_mean: f64, count_so_far: u32, new_value: f64) -> f64 {
    let n = count_so_far as f64;
    (n * current_mean + new_value) / (n + 1.0)
}

/// Population RMS after including `new_value`.
///
/// Arguments
/// -----------------
/// * `current_rms`: RMS of the `count_so_far` values already aggregated.
/// * `current_mean`: mean of those values (the mean **before** the update).
/// * `count_so_far`: number of values already aggregated.
/// * `new_value`: the value to include.
///
/// Return
/// ----------
/// * The updated RMS. A first value (`count_so_far == 0`) has no scatter and yields `0.0`.
#[inline]
pub fn update_scatter(current_rms: f64, current_mean: f64, count_so_far: u32, new_value: f64) -> f64 {
    if count_so_far == 0 {
        return 0.0;
    }
    let n = count_so_far as f64;
    let delta = current_mean - new_value;
    let var = n / (n + 1.0) * (current_rms * current_rms + delta * delta / (n + 1.0));
    var.max(0.0).sqrt()
}

/// Arithmetic mean, `None` for an empty slice.
pub fn population_mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation (ddof = 0), `None` for an empty slice.
pub fn population_rms(values: &[f64]) -> Option<f64> {
    let mean = population_mean(values)?;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}
