//! Google Calendar and Google Maps Directions providers.

mod calendar;
mod maps;

pub use calendar::{
    DEFAULT_BASE_URL as CALENDAR_BASE_URL, DEFAULT_TOKEN_URL, GoogleCalendarClient,
    GoogleCredentials,
};
pub use maps::{DEFAULT_BASE_URL as MAPS_BASE_URL, GoogleMapsClient};
