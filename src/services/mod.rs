//! Business logic services

pub mod delivery;
pub mod eta_schedule;
pub mod geo;
pub mod job_lock;
pub mod routing;
pub mod sequencing;
