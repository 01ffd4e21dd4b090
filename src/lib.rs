pub mod cache;
pub mod config;
pub mod cycle;
pub mod executor;
pub mod fetch;
pub mod infra;
pub mod output;
pub mod scheduler;
pub mod services;
pub mod sync;
