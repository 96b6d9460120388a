// ABOUTME: Core types and errors for the Benchwatch performance observatory
//! This crate contains the shared types and error definitions used across
//! the Benchwatch analytics pipeline. It defines the benchmark ingest model,
//! the persisted historic-run and time-series shapes, baselines, regressions,
//! trend analysis results, and notification events.

pub mod baseline;
pub mod benchmark;
pub mod config;
pub mod error;
pub mod events;
pub mod historic;
pub mod regression;
pub mod trend;

pub use baseline::*;
pub use benchmark::*;
pub use config::*;
pub use error::*;
pub use events::*;
pub use historic::*;
pub use regression::*;
pub use trend::*;
