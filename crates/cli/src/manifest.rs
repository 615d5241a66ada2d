//! Manifest - Wiring file loader
//!
//! ```yaml
//! workers:
//!   - componentId: feed
//!     produces: [quotes]
//!   - componentId: pricer
//!     requires: [quotes]
//! wiring:
//!   - sourceComponentId: feed
//!     sourceEventName: quotes.ready
//!     targetComponentId: pricer
//!     targetHandlerName: on_quotes
//! scheduler:
//!   parallelLevels: true
//! groups: [desk-a, desk-b]
//! ```

use serde::{Deserialize, Serialize};
use shared::{BusConfig, GroupId, SchedulerConfig, WiringRule, WorkerDeclaration};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Failed to read manifest {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON manifest: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid YAML manifest: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Parsed manifest
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default)]
    pub workers: Vec<WorkerDeclaration>,

    #[serde(default, alias = "rules")]
    pub wiring: Vec<WiringRule>,

    #[serde(default)]
    pub bus: BusConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Processing groups to simulate; none means one global pipeline
    #[serde(default)]
    pub groups: Vec<GroupId>,
}

impl Manifest {
    /// Load from a `.json`, `.yaml` or `.yml` file
    ///
    /// Files with any other extension are parsed as YAML, which also accepts
    /// plain JSON.
    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_yaml_str(&content)
        }
    }

    pub fn from_json_str(content: &str) -> Result<Self, ManifestError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ManifestError> {
        Ok(serde_yaml::from_str(content)?)
    }
}
