//! Violation challenge triage and persistence engine.
//!
//! The `workflows::dataq` module scores recorded violations for challenge
//! potential, projects their regulatory and insurance impact, and tracks filed
//! challenges through a multi-round lifecycle.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
