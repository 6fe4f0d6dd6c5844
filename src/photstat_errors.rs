use thiserror::Error;

use crate::constants::ObjectId;

#[derive(Error, Debug)]
pub enum PhotStatError {
    #[error("No photometric statistics found for object: {0}")]
    NotFound(ObjectId),

    #[error("Invalid photometric statistics parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid photometry row {row}: {reason}")]
    InvalidPhotometryRow { row: usize, reason: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Unable to perform file operation: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON (de)serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Inconsistent photometric statistics: {0}")]
    InconsistentPhotStat(String),

    #[error("Unable to read the system clock: {0}")]
    Clock(String),
}

impl From<hifitime::HifitimeError> for PhotStatError {
    fn from(err: hifitime::HifitimeError) -> Self {
        PhotStatError::Clock(err.to_string())
    }
}

impl PartialEq for PhotStatError {
    fn eq(&self, other: &Self) -> bool {
        use PhotStatError::*;
        match (self, other) {
            (NotFound(a), NotFound(b)) => a == b,
            (InvalidParameter(a), InvalidParameter(b)) => a == b,
            (
                InvalidPhotometryRow { row: ra, reason: a },
                InvalidPhotometryRow { row: rb, reason: b },
            ) => ra == rb && a == b,
            (InconsistentPhotStat(a), InconsistentPhotStat(b)) => a == b,
            (Clock(a), Clock(b)) => a == b,

            // Wrapped library errors are not comparable: same variant means equal
            (Csv(_), Csv(_)) => true,
            (Io(_), Io(_)) => true,
            (Json(_), Json(_)) => true,

            _ => false,
        }
    }
}
