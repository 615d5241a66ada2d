//! # Tickwire Shared
//!
//! Common types used across all Tickwire crates: identifiers, worker
//! declarations, wiring rules, runtime configuration and the error taxonomy.

pub mod config;
pub mod declaration;
pub mod error;
pub mod ids;
pub mod rule;

// Re-exports
pub use config::*;
pub use declaration::*;
pub use error::*;
pub use ids::*;
pub use rule::*;
