use chrono::{DateTime, Utc};
use thiserror::Error;

/// Data errors raised while building inputs for, or running, a decision pass.
///
/// Any of these skips the current cycle; the next cycle starts from fresh data.
#[derive(Debug, Error, PartialEq)]
pub enum ScheduleError {
    #[error("forecast series is empty")]
    EmptyForecast,
    #[error("forecast timestamps not strictly increasing at index {index} ({timestamp})")]
    UnorderedForecast {
        index: usize,
        timestamp: DateTime<Utc>,
    },
    #[error("forecast has no off-peak crossing after {after}; widen the forecast window")]
    NoOffPeakCrossing { after: DateTime<Utc> },
    #[error("vehicle data is missing field `{0}`")]
    MissingField(&'static str),
    #[error("vehicle field `{field}` has unexpected value `{value}`")]
    InvalidField { field: &'static str, value: String },
}
