//! Sizes the day's charging need from upcoming calendar commitments.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::debug;

use crate::services::calendar_api::CalendarEvent;
use crate::services::directions_api::{DirectionsApi, Route};

/// Events closer than this many minutes of driving don't affect charging.
pub const RELEVANT_DRIVE_MINUTES: f64 = 15.0;
/// Slack added in front of every drive when computing departure times.
pub const DEPARTURE_BUFFER_MINUTES: i64 = 30;

/// A calendar event enriched with the drive needed to reach it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TravelEvent {
    pub id: String,
    pub summary: String,
    pub location: Option<String>,
    pub start_time: DateTime<Utc>,
    pub distance_miles: f64,
    pub drive_minutes: f64,
}

impl TravelEvent {
    pub fn is_relevant(&self) -> bool {
        self.drive_minutes > RELEVANT_DRIVE_MINUTES
    }

    /// Latest time to leave home and still arrive with the buffer to spare.
    pub fn required_departure(&self) -> DateTime<Utc> {
        let drive = Duration::milliseconds((self.drive_minutes * 60_000.0).round() as i64);
        self.start_time - drive - Duration::minutes(DEPARTURE_BUFFER_MINUTES)
    }
}

/// Relevant travel for the lookahead window. Empty when nothing needs a drive.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TravelEstimate {
    pub relevant_events: Vec<TravelEvent>,
}

impl TravelEstimate {
    pub fn from_events(events: Vec<TravelEvent>) -> Self {
        TravelEstimate {
            relevant_events: events.into_iter().filter(TravelEvent::is_relevant).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.relevant_events.is_empty()
    }

    /// The most distant relevant event; the first one wins ties.
    pub fn farthest(&self) -> Option<&TravelEvent> {
        self.relevant_events.iter().fold(None, |best, event| match best {
            Some(b) if b.distance_miles >= event.distance_miles => Some(b),
            _ => Some(event),
        })
    }

    pub fn farthest_distance_miles(&self) -> f64 {
        self.farthest().map(|e| e.distance_miles).unwrap_or(0.0)
    }

    pub fn earliest_required_departure(&self) -> Option<DateTime<Utc>> {
        self.relevant_events
            .iter()
            .map(TravelEvent::required_departure)
            .min()
    }
}

/// Conference links and other URLs in the location field are not places to
/// drive to.
pub fn is_drivable_location(location: &str) -> bool {
    let location = location.trim().to_ascii_lowercase();
    !location.is_empty() && !location.contains("://") && !location.starts_with("www.")
}

/// Looks up the drive from `home` to each event with a usable location.
///
/// Lookup failures degrade to a zero-length drive, which the relevance filter
/// then drops.
pub async fn enrich_events(
    events: &[CalendarEvent],
    home: &str,
    directions: &dyn DirectionsApi,
) -> Vec<TravelEvent> {
    let mut enriched = Vec::new();

    for event in events {
        let Some(location) = event.location.as_deref().filter(|l| is_drivable_location(l)) else {
            debug!(event_id = %event.id, "Skipping event without a drivable location");
            continue;
        };

        let route = match directions.route(home, location).await {
            Ok(route) => route,
            Err(e) => {
                debug!(event_id = %event.id, error = %e, "Directions lookup failed, assuming no drive");
                Route::default()
            }
        };

        enriched.push(TravelEvent {
            id: event.id.clone(),
            summary: event.summary.clone(),
            location: Some(location.to_string()),
            start_time: event.start,
            distance_miles: route.distance_miles,
            drive_minutes: route.drive_minutes,
        });
    }

    enriched
}

/// Enriches and filters in one step.
pub async fn estimate_travel(
    events: &[CalendarEvent],
    home: &str,
    directions: &dyn DirectionsApi,
) -> TravelEstimate {
    TravelEstimate::from_events(enrich_events(events, home, directions).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::HashMap;

    struct FixedDirections(HashMap<&'static str, Route>);

    #[async_trait]
    impl DirectionsApi for FixedDirections {
        async fn route(&self, _origin: &str, destination: &str) -> Result<Route> {
            self.0
                .get(destination)
                .copied()
                .ok_or_else(|| anyhow!("no route to {destination}"))
        }
    }

    #[test]
    fn test_drivable_location() {
        assert!(is_drivable_location("1600 Amphitheatre Pkwy"));
        assert!(!is_drivable_location("   "));
        assert!(!is_drivable_location("https://meet.example.com/abc"));
        assert!(!is_drivable_location("WWW.example.com/room"));
    }

    #[test]
    fn test_relevance_threshold_is_exclusive() {
        let estimate = TravelEstimate::from_events(vec![
            travel_event("a", 10.0, 15.0, 9),
            travel_event("b", 12.0, 15.1, 9),
        ]);
        assert_eq!(estimate.relevant_events.len(), 1);
        assert_eq!(estimate.relevant_events[0].id, "b");
    }

    #[test]
    fn test_farthest_first_wins_ties() {
        let estimate = TravelEstimate::from_events(vec![
            travel_event("a", 40.0, 50.0, 9),
            travel_event("b", 80.0, 90.0, 12),
            travel_event("c", 80.0, 95.0, 15),
        ]);
        assert_eq!(estimate.farthest().unwrap().id, "b");
        assert_eq!(estimate.farthest_distance_miles(), 80.0);
    }

    #[test]
    fn test_earliest_required_departure() {
        let estimate = TravelEstimate::from_events(vec![
            travel_event("late", 80.0, 90.0, 15),
            travel_event("early", 20.0, 30.0, 10),
        ]);
        // 10:00 - 30 min drive - 30 min buffer
        assert_eq!(
            estimate.earliest_required_departure(),
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_empty_estimate_defaults() {
        let estimate = TravelEstimate::default();
        assert!(estimate.is_empty());
        assert_eq!(estimate.farthest_distance_miles(), 0.0);
        assert_eq!(estimate.earliest_required_departure(), None);
    }

    #[tokio::test]
    async fn test_enrich_skips_and_degrades() {
        let directions = FixedDirections(HashMap::from([(
            "Office",
            Route {
                distance_miles: 25.0,
                drive_minutes: 35.0,
            },
        )]));
        let events = vec![
            calendar_event("office", Some("Office")),
            calendar_event("call", Some("https://zoom.us/j/1")),
            calendar_event("nowhere", None),
            calendar_event("unknown", Some("Atlantis")),
        ];

        let enriched = enrich_events(&events, "Home", &directions).await;
        assert_eq!(enriched.len(), 2);
        assert_eq!(enriched[0].distance_miles, 25.0);
        assert_eq!(enriched[1].id, "unknown");
        assert_eq!(enriched[1].drive_minutes, 0.0);

        let estimate = TravelEstimate::from_events(enriched);
        assert_eq!(estimate.relevant_events.len(), 1);
        assert_eq!(estimate.farthest().unwrap().id, "office");
    }

    // Helper functions for tests
    fn travel_event(id: &str, miles: f64, minutes: f64, hour: u32) -> TravelEvent {
        TravelEvent {
            id: id.to_string(),
            summary: format!("event {id}"),
            location: Some("somewhere".to_string()),
            start_time: Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap(),
            distance_miles: miles,
            drive_minutes: minutes,
        }
    }

    fn calendar_event(id: &str, location: Option<&str>) -> CalendarEvent {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        CalendarEvent {
            id: id.to_string(),
            summary: format!("event {id}"),
            location: location.map(str::to_string),
            start,
            end: start + Duration::hours(1),
        }
    }
}
