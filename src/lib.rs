// src/lib.rs - Library interface for the cleaning core

#![allow(non_snake_case)]

pub mod axis_names;
pub mod config;
pub mod constants;
pub mod data_analysis;
pub mod data_input;
pub mod data_output;
pub mod error;
pub mod pipeline;
pub mod quality;
pub mod types;

pub use config::CleaningConfig;
pub use error::CleaningError;
pub use pipeline::{clean_trial, CleanedTrial, TrialReport};
pub use quality::RecordingContext;

// Git-derived version when VERGEN_GIT_SEMVER is set at build time, else the package version.
pub fn crate_version() -> &'static str {
    option_env!("VERGEN_GIT_SEMVER").unwrap_or(env!("CARGO_PKG_VERSION"))
}
