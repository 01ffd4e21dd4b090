//! GridStatus (gridstatus.io) load-forecast provider.

mod client;

pub use client::{DEFAULT_BASE_URL, GridStatusClient};
