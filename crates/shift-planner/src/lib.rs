//! Vacation capacity planning and adjudication for hierarchical teams.

pub mod config;
pub mod error;
pub mod planning;
pub mod telemetry;
