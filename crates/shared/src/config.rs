//! Runtime configuration for Tickwire
//!
//! Both structs deserialize from the `bus` / `scheduler` sections of a
//! manifest. Missing fields fall back to the defaults below.

use serde::{Deserialize, Serialize};

/// Event bus settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BusConfig {
    /// How many non-critical failures the bus keeps for inspection
    pub failure_log_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            failure_log_capacity: 256,
        }
    }
}

/// Execution scheduler settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchedulerConfig {
    /// Run the components of one level on separate threads
    pub parallel_levels: bool,

    /// Warn when a component finishes without writing a declared output
    pub verify_outputs: bool,

    /// Publish `cycle:*` lifecycle events on the bus
    pub publish_lifecycle: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            parallel_levels: false,
            verify_outputs: true,
            publish_lifecycle: true,
        }
    }
}
