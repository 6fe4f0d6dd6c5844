pub mod constants;
pub mod engine;
pub mod params;
pub mod phot_stat;
pub mod photometry;
pub mod photstat_errors;
pub mod running_stats;
pub mod store;

pub use constants::{ObjectId, Photometry, PhotometrySet};
pub use engine::{PhotStatEngine, PhotometryEvent, PhotometrySource, RecomputeFilter};
pub use params::PhotStatParams;
pub use phot_stat::PhotStat;
pub use photometry::{PhotometryPoint, PointKind};
pub use photstat_errors::PhotStatError;
pub use store::{InMemoryPhotStatStore, PhotStatStore};
