//! Provider traits the cycle runner talks to.
//!
//! Each external service sits behind one async trait so the cycle can be
//! driven by real HTTP clients from [`crate::infra`] or by in-memory fakes.

pub mod calendar_api;
pub mod directions_api;
pub mod forecast_api;
pub mod vehicle_api;
