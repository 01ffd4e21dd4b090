//! Trait and types for reading upcoming calendar events.

use anyhow::Result;
use chrono::{DateTime, Utc};

/// A calendar entry before any travel enrichment.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarEvent {
    pub id: String,
    pub summary: String,
    pub location: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Abstraction over a calendar provider (e.g., Google Calendar).
#[async_trait::async_trait]
pub trait CalendarApi: Send + Sync {
    /// Returns events starting within the next `hours`, ordered by start time
    /// and capped at `max_results`.
    async fn upcoming_events(&self, hours: u32, max_results: u32) -> Result<Vec<CalendarEvent>>;
}
