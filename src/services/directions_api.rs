//! Trait and types for driving distance lookups.

use anyhow::Result;

/// Driving distance and duration between two places.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Route {
    pub distance_miles: f64,
    pub drive_minutes: f64,
}

/// Abstraction over a routing provider (e.g., Google Maps Directions).
#[async_trait::async_trait]
pub trait DirectionsApi: Send + Sync {
    async fn route(&self, origin: &str, destination: &str) -> Result<Route>;
}
