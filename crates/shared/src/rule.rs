//! Wiring rules
//!
//! A rule is a plain routing fact: "when `source` emits `source_event_name`,
//! deliver it to `target`'s handler `target_handler_name`". Rules carry no
//! filtering logic; visibility is decided by subscription scopes.

use crate::ComponentId;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WiringRule {
    #[serde(alias = "sourceComponentId")]
    pub source_component_id: ComponentId,

    #[serde(alias = "sourceEventName")]
    pub source_event_name: String,

    #[serde(alias = "targetComponentId")]
    pub target_component_id: ComponentId,

    #[serde(alias = "targetHandlerName")]
    pub target_handler_name: String,
}

impl WiringRule {
    pub fn new(
        source_component_id: impl Into<ComponentId>,
        source_event_name: impl Into<String>,
        target_component_id: impl Into<ComponentId>,
        target_handler_name: impl Into<String>,
    ) -> Self {
        Self {
            source_component_id: source_component_id.into(),
            source_event_name: source_event_name.into(),
            target_component_id: target_component_id.into(),
            target_handler_name: target_handler_name.into(),
        }
    }

    /// Both endpoints of the rule
    pub fn endpoints(&self) -> [&ComponentId; 2] {
        [&self.source_component_id, &self.target_component_id]
    }
}

impl fmt::Display for WiringRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} -> {}.{}",
            self.source_component_id,
            self.source_event_name,
            self.target_component_id,
            self.target_handler_name
        )
    }
}
