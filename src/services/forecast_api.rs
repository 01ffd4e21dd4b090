//! Trait for grid-load forecast providers.

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::scheduler::ForecastSeries;

/// Abstraction over a grid-load forecast source (e.g., GridStatus, or a cache
/// in front of it).
#[async_trait::async_trait]
pub trait ForecastApi: Send + Sync {
    /// Returns the forecast covering `[start, end]`.
    async fn load_forecast(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<ForecastSeries>;
}
