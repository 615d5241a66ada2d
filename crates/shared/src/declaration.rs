//! Worker declarations
//!
//! A declaration states which artifacts a worker produces and which it
//! requires. Declarations come from an external manifest loader and are
//! immutable for the lifetime of a wiring session.

use crate::{ArtifactType, ComponentId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Produced/required artifact contract of one worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerDeclaration {
    /// Unique worker id
    #[serde(alias = "componentId")]
    pub component_id: ComponentId,

    /// Artifact types this worker writes each cycle
    #[serde(default)]
    pub produces: BTreeSet<ArtifactType>,

    /// Artifact types this worker reads each cycle
    #[serde(default)]
    pub requires: BTreeSet<ArtifactType>,
}

impl WorkerDeclaration {
    /// Create a declaration with no inputs or outputs
    pub fn new(component_id: impl Into<ComponentId>) -> Self {
        Self {
            component_id: component_id.into(),
            produces: BTreeSet::new(),
            requires: BTreeSet::new(),
        }
    }

    /// Builder: add a produced artifact type
    pub fn producing(mut self, artifact: impl Into<ArtifactType>) -> Self {
        self.produces.insert(artifact.into());
        self
    }

    /// Builder: add a required artifact type
    pub fn requiring(mut self, artifact: impl Into<ArtifactType>) -> Self {
        self.requires.insert(artifact.into());
        self
    }

    pub fn id(&self) -> &ComponentId {
        &self.component_id
    }

    pub fn produces_type(&self, artifact: &ArtifactType) -> bool {
        self.produces.contains(artifact)
    }

    pub fn requires_type(&self, artifact: &ArtifactType) -> bool {
        self.requires.contains(artifact)
    }

    /// A source worker reads nothing from the cache
    pub fn is_source(&self) -> bool {
        self.requires.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let decl = WorkerDeclaration::new("pricer")
            .requiring("quotes")
            .producing("prices")
            .producing("prices");

        assert_eq!(decl.id().as_str(), "pricer");
        assert_eq!(decl.produces.len(), 1);
        assert!(decl.requires_type(&ArtifactType::new("quotes")));
        assert!(decl.produces_type(&ArtifactType::new("prices")));
        assert!(!decl.is_source());
    }

    #[test]
    fn test_manifest_parsing_accepts_both_casings() {
        let yaml = r#"
- component_id: feed
  produces: [quotes]
- componentId: pricer
  produces: [prices]
  requires: [quotes]
"#;

        let decls: Vec<WorkerDeclaration> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(decls.len(), 2);
        assert!(decls[0].is_source());
        assert_eq!(decls[1].component_id.as_str(), "pricer");
    }
}
