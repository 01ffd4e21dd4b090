//! Grid-load analysis: summary bands, the current sample, and the next
//! off-peak transition.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::scheduler::types::{ForecastPoint, ForecastSeries};
use crate::scheduler::utility::{mean, round_to, stddev};

const FACTOR_AT_UPPER_BAND: f64 = 0.25;
const FACTOR_AT_LOWER_BAND: f64 = 1.0;
const FACTOR_AT_MEAN: f64 = 0.75;

/// Summary statistics of a forecast, relative to a fixed "now".
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LoadStatistics {
    pub mean: f64,
    pub std_dev: f64,
    pub lower_band: f64,
    pub upper_band: f64,
    pub current_load: f64,
}

impl LoadStatistics {
    pub fn from_series(series: &ForecastSeries, now: DateTime<Utc>) -> Self {
        let loads = series.loads();
        let mean = mean(&loads);
        let std_dev = stddev(&loads, mean);

        LoadStatistics {
            mean,
            std_dev,
            lower_band: mean - std_dev,
            upper_band: mean + std_dev,
            current_load: nearest_point(series, now).load,
        }
    }

    /// Scales with how favourable the current load is: 1.0 at or below the
    /// lower band, 0.25 at or above the upper band.
    pub fn charge_limit_factor(&self) -> f64 {
        if self.upper_band == self.lower_band {
            return FACTOR_AT_MEAN;
        }

        if self.current_load >= self.upper_band {
            FACTOR_AT_UPPER_BAND
        } else if self.current_load <= self.lower_band {
            FACTOR_AT_LOWER_BAND
        } else {
            let position =
                (self.current_load - self.lower_band) / (self.upper_band - self.lower_band);
            round_to(FACTOR_AT_MEAN - 0.5 * position, 2)
        }
    }

    pub fn is_favourable(&self) -> bool {
        self.current_load <= self.mean
    }
}

/// Analysis result consumed by the current planner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GridOutlook {
    pub stats: LoadStatistics,
    pub off_peak_end: Option<DateTime<Utc>>,
}

impl GridOutlook {
    pub fn analyze(series: &ForecastSeries, now: DateTime<Utc>) -> Self {
        let stats = LoadStatistics::from_series(series, now);
        let off_peak_end = off_peak_end(series, stats.lower_band, now);
        GridOutlook {
            stats,
            off_peak_end,
        }
    }
}

/// The sample closest in time to `now`. Ties resolve to the earlier sample.
pub fn nearest_point(series: &ForecastSeries, now: DateTime<Utc>) -> ForecastPoint {
    let mut best = *series.first();
    let mut best_distance = (best.timestamp - now).abs();

    for point in &series.points()[1..] {
        let distance = (point.timestamp - now).abs();
        if distance < best_distance {
            best = *point;
            best_distance = distance;
        }
    }

    best
}

/// First instant at or after `now` where the load climbs back to `lower_band`
/// after being below it.
pub fn off_peak_end(
    series: &ForecastSeries,
    lower_band: f64,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    series
        .points()
        .windows(2)
        .find(|pair| pair[0].timestamp >= now && pair[0].load < lower_band && pair[1].load >= lower_band)
        .map(|pair| pair[1].timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    #[test]
    fn test_bands_surround_mean() {
        let series = hourly_series(&[10.0, 20.0, 30.0, 40.0]);
        let stats = LoadStatistics::from_series(&series, start());

        assert_eq!(stats.mean, 25.0);
        assert!(stats.lower_band < stats.mean);
        assert!(stats.upper_band > stats.mean);
        let spread = (stats.upper_band - stats.mean) - (stats.mean - stats.lower_band);
        assert!(spread.abs() < 1e-9);
    }

    #[test]
    fn test_current_load_is_nearest_sample() {
        let series = hourly_series(&[10.0, 20.0, 30.0, 40.0]);
        let now = start() + Duration::minutes(100);
        let stats = LoadStatistics::from_series(&series, now);
        assert_eq!(stats.current_load, 30.0);
    }

    #[test]
    fn test_current_load_tie_prefers_earlier() {
        let series = hourly_series(&[10.0, 20.0, 30.0, 40.0]);
        let now = start() + Duration::minutes(90);
        assert_eq!(nearest_point(&series, now).load, 20.0);
    }

    #[test]
    fn test_current_load_before_series_start() {
        let series = hourly_series(&[10.0, 20.0]);
        let now = start() - Duration::hours(3);
        assert_eq!(nearest_point(&series, now).load, 10.0);
    }

    #[test]
    fn test_factor_zero_variance() {
        let series = hourly_series(&[50.0, 50.0, 50.0]);
        let stats = LoadStatistics::from_series(&series, start());
        assert_eq!(stats.charge_limit_factor(), 0.75);
    }

    #[test]
    fn test_factor_extremes() {
        let low = stats_with_current(5.0);
        let high = stats_with_current(100.0);
        assert_eq!(low.charge_limit_factor(), 1.0);
        assert_eq!(high.charge_limit_factor(), 0.25);
    }

    #[test]
    fn test_factor_at_mean_is_midpoint() {
        let stats = stats_with_current(50.0);
        assert_eq!(stats.charge_limit_factor(), 0.5);
    }

    #[test]
    fn test_off_peak_end_finds_upward_crossing() {
        // mean 50, sample sd ~= 35.8 -> lower band ~= 14.2
        let series = hourly_series(&[90.0, 10.0, 10.0, 50.0, 90.0, 50.0]);
        let end = off_peak_end(&series, 14.2, start());
        assert_eq!(end, Some(start() + Duration::hours(3)));
    }

    #[test]
    fn test_off_peak_end_ignores_past_crossings() {
        let series = hourly_series(&[10.0, 50.0, 50.0, 10.0, 50.0]);
        let now = start() + Duration::minutes(30);
        let end = off_peak_end(&series, 20.0, now);
        assert_eq!(end, Some(start() + Duration::hours(4)));
    }

    #[test]
    fn test_off_peak_end_missing() {
        let series = hourly_series(&[50.0, 40.0, 10.0, 10.0]);
        assert_eq!(off_peak_end(&series, 20.0, start()), None);
    }

    #[test]
    fn test_outlook_combines_stats_and_crossing() {
        let series = hourly_series(&[90.0, 10.0, 10.0, 50.0, 90.0, 50.0]);
        let outlook = GridOutlook::analyze(&series, start());
        assert_eq!(outlook.stats.current_load, 90.0);
        assert_eq!(outlook.off_peak_end, Some(start() + Duration::hours(3)));
    }

    proptest! {
        #[test]
        fn prop_bands_ordered(loads in prop::collection::vec(0.0f64..100_000.0, 1..64)) {
            let series = hourly_series(&loads);
            let stats = LoadStatistics::from_series(&series, start());
            prop_assert!(stats.lower_band <= stats.mean);
            prop_assert!(stats.mean <= stats.upper_band);
        }

        #[test]
        fn prop_factor_bounded_and_non_increasing(a in 0.0f64..120.0, b in 0.0f64..120.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let f_lo = stats_with_current(lo).charge_limit_factor();
            let f_hi = stats_with_current(hi).charge_limit_factor();
            prop_assert!((0.25..=1.0).contains(&f_lo));
            prop_assert!((0.25..=1.0).contains(&f_hi));
            prop_assert!(f_hi <= f_lo);
        }
    }

    // Helper functions for tests
    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

    fn hourly_series(loads: &[f64]) -> ForecastSeries {
        let points = loads
            .iter()
            .enumerate()
            .map(|(i, load)| ForecastPoint::new(start() + Duration::hours(i as i64), *load))
            .collect();
        ForecastSeries::try_new(points).unwrap()
    }

    fn stats_with_current(current_load: f64) -> LoadStatistics {
        LoadStatistics {
            mean: 50.0,
            std_dev: 20.0,
            lower_band: 30.0,
            upper_band: 70.0,
            current_load,
        }
    }
}
