mod client;
mod dto;

pub use client::{DEFAULT_AUTH_URL, DEFAULT_BASE_URL, TeslaClient};
