//! Training lifecycle and certification engine for a vocational training
//! organization: schedule conflict validation, course progress tracking,
//! certificate eligibility and renewal, and renewal history reconstruction.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
