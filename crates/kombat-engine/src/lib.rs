//! # Kombat Engine
//!
//! Headless host for the combat core: configuration file, frame pacing and a
//! CPU-vs-CPU match runner.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod app;
pub mod config;
pub mod timing;

pub use app::{run, MatchReport, RunMode};
pub use config::EngineConfig;
