#![forbid(unsafe_code)]

//! Core domain model and storage for the Vitals health journal.
//!
//! This crate provides:
//! - Domain types (health records, inputs, date ranges)
//! - Derived metrics (BMI, blood-pressure classification)
//! - The persistent record store (upsert by date, range queries, delete)
//! - Configuration and logging setup

pub mod types;
pub mod error;
pub mod metrics;
pub mod config;
pub mod logging;
pub mod store;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use metrics::{compute_bmi, is_blood_pressure_normal, BloodPressureStatus};
pub use config::Config;
pub use store::RecordStore;
