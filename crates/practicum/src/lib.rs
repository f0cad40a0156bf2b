//! Internship placement core: offers, applications, internships and their rubric evaluations.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
