//! Concrete provider clients behind the traits in [`crate::services`].

pub mod gridstatus;
pub mod google;
pub mod tesla;
