//! # Tickwire CLI
//!
//! Loads a manifest file (worker declarations, wiring rules and runtime
//! settings) and hands the parsed collections to the core crates.

pub mod commands;
pub mod manifest;

pub use manifest::{Manifest, ManifestError};
