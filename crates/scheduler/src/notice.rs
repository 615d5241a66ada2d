//! CycleNotice - Payload the scheduler publishes on the bus

use serde::Serialize;
use shared::{ArtifactType, ComponentId, CycleId, GroupId};

/// Published when a cycle starts
pub const CYCLE_STARTED: &str = "cycle:started";
/// Published after the last level of a cycle finished
pub const CYCLE_COMPLETED: &str = "cycle:completed";
/// Published when a cycle stops on an error
pub const CYCLE_ABORTED: &str = "cycle:aborted";

/// Notification carried by scheduler events
///
/// Component notices name the component that just finished and the
/// artifacts it wrote. Lifecycle notices have no component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleNotice {
    pub cycle_id: CycleId,
    pub group: Option<GroupId>,
    pub component_id: Option<ComponentId>,
    pub produced: Vec<ArtifactType>,
    /// Abort reason, only set on `cycle:aborted`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl CycleNotice {
    /// Notice for a lifecycle event
    pub fn lifecycle(cycle_id: CycleId, group: Option<GroupId>) -> Self {
        Self {
            cycle_id,
            group,
            component_id: None,
            produced: Vec::new(),
            reason: None,
        }
    }

    /// Notice for a finished component
    pub fn component(
        cycle_id: CycleId,
        group: Option<GroupId>,
        component_id: ComponentId,
        produced: Vec<ArtifactType>,
    ) -> Self {
        Self {
            cycle_id,
            group,
            component_id: Some(component_id),
            produced,
            reason: None,
        }
    }

    /// Builder: attach an abort reason
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}
