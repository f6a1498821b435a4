//! Core library for `hsb`: keeps the external HearthSim repositories in sync and
//! stages per-build extraction directories for the data pipeline.
//!
//! Configuration lives in [`config::HsbConfig`], external commands go through
//! [`exec::CommandRunner`], and failures are reported as [`error::HsbError`].

pub mod config;
pub mod error;
pub mod exec;
pub mod patch;
pub mod repos;

pub use config::HsbConfig;
pub use error::HsbError;
pub use exec::{CommandOutput, CommandRunner, CommandSpec, SystemRunner};
