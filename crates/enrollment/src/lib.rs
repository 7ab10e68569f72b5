//! Capacity allocation engine for course enrollments and public event registrations.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
