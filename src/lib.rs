//! Safety monitoring for group hikes: checkpoint check-ins, GPS track
//! ingestion, anomaly detection and the alert lifecycle.

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod geo;
pub mod kafka;
pub mod models;
pub mod processor;
pub mod scheduler;
pub mod store;

pub use error::{SafetyError, SafetyResult};
