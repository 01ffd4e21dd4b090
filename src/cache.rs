//! CSV-backed cache in front of a forecast provider.
//!
//! The forecast is published a few times a day, so polling every few minutes
//! would mostly re-download the same rows. The cache is served while its
//! oldest interval is within `max_age` of the requested window start, which
//! for a window starting `lag` before now is the same as
//! `now - oldest < max_age + lag`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use csv::{ReaderBuilder, WriterBuilder};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::scheduler::{ForecastPoint, ForecastSeries};
use crate::services::forecast_api::ForecastApi;

pub struct CachedForecast<F> {
    inner: F,
    path: PathBuf,
    max_age: Duration,
}

impl<F: ForecastApi> CachedForecast<F> {
    pub fn new(inner: F, path: impl Into<PathBuf>, max_age: Duration) -> Self {
        Self {
            inner,
            path: path.into(),
            max_age,
        }
    }

    /// Reads the cached series, or `None` when there is no usable cache file.
    pub fn read_cached(&self) -> Option<ForecastSeries> {
        if !self.path.exists() {
            return None;
        }
        match read_series(&self.path) {
            Ok(series) => Some(series),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring unreadable forecast cache");
                None
            }
        }
    }

    fn is_fresh(&self, series: &ForecastSeries, start: DateTime<Utc>) -> bool {
        start - series.first().timestamp < self.max_age
    }
}

fn read_series(path: &Path) -> Result<ForecastSeries> {
    let mut reader = ReaderBuilder::new().from_path(path)?;
    let points = reader
        .deserialize::<ForecastPoint>()
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ForecastSeries::try_new(points)?)
}

/// Writes next to `path` and renames over it so readers never see a partial file.
fn write_series(path: &Path, series: &ForecastSeries) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp = path.with_extension("csv.tmp");
    {
        let mut writer = WriterBuilder::new().has_headers(true).from_path(&tmp)?;
        for point in series.points() {
            writer.serialize(point)?;
        }
        writer.flush()?;
    }
    fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace forecast cache {}", path.display()))?;
    Ok(())
}

#[async_trait]
impl<F: ForecastApi> ForecastApi for CachedForecast<F> {
    async fn load_forecast(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<ForecastSeries> {
        if let Some(series) = self.read_cached() {
            if self.is_fresh(&series, start) {
                debug!(points = series.len(), "Serving forecast from cache");
                return Ok(series);
            }
            debug!(oldest = %series.first().timestamp, "Forecast cache is stale");
        }

        let series = self.inner.load_forecast(start, end).await?;
        write_series(&self.path, &series)?;
        info!(path = %self.path.display(), points = series.len(), "Forecast cache refreshed");
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::env;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingForecast {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ForecastApi for CountingForecast {
        async fn load_forecast(
            &self,
            start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> Result<ForecastSeries> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(series(start, &[10.0, 20.0, 30.0]))
        }
    }

    #[tokio::test]
    async fn test_fetches_then_serves_from_cache() {
        let path = temp_path("charge_scheduler_cache_hit.csv");
        let _ = fs::remove_file(&path);

        let cache = CachedForecast::new(counting(), &path, Duration::hours(4));
        let start = t0();

        let first = cache.load_forecast(start, start + Duration::hours(72)).await.unwrap();
        let second = cache
            .load_forecast(start + Duration::hours(1), start + Duration::hours(73))
            .await
            .unwrap();

        assert_eq!(cache.inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
        assert!(!path.with_extension("csv.tmp").exists());

        fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn test_stale_cache_is_replaced() {
        let path = temp_path("charge_scheduler_cache_stale.csv");
        let _ = fs::remove_file(&path);

        let cache = CachedForecast::new(counting(), &path, Duration::hours(4));
        let start = t0();
        cache.load_forecast(start, start + Duration::hours(72)).await.unwrap();

        let later = start + Duration::hours(5);
        let refreshed = cache.load_forecast(later, later + Duration::hours(72)).await.unwrap();

        assert_eq!(cache.inner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(refreshed.first().timestamp, later);
        assert_eq!(cache.read_cached().unwrap(), refreshed);

        fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_cache_is_refetched() {
        let path = temp_path("charge_scheduler_cache_corrupt.csv");
        fs::write(&path, "timestamp,load\nnot-a-date,abc\n").unwrap();

        let cache = CachedForecast::new(counting(), &path, Duration::hours(4));
        let start = t0();
        let series = cache.load_forecast(start, start + Duration::hours(72)).await.unwrap();

        assert_eq!(cache.inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(series.loads(), vec![10.0, 20.0, 30.0]);

        fs::remove_file(&path).unwrap();
    }

    // Helper functions for tests
    fn temp_path(name: &str) -> PathBuf {
        env::temp_dir().join(name)
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

    fn counting() -> CountingForecast {
        CountingForecast {
            calls: AtomicUsize::new(0),
        }
    }

    fn series(first: DateTime<Utc>, loads: &[f64]) -> ForecastSeries {
        let points = loads
            .iter()
            .enumerate()
            .map(|(i, &load)| ForecastPoint::new(first + Duration::hours(i as i64), load))
            .collect();
        ForecastSeries::try_new(points).unwrap()
    }
}
