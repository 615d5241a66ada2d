//! Cycle errors

use shared::{
    ComponentId, CriticalHandlerError, CycleId, ExecutionOrderViolationError, TickwireError,
};
use thiserror::Error;

/// Why a cycle did not complete
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("Scheduler is already running {cycle_id}")]
    AlreadyRunning { cycle_id: CycleId },

    #[error("Worker '{component_id}' failed in {cycle_id}: {source:#}")]
    Worker {
        cycle_id: CycleId,
        component_id: ComponentId,
        #[source]
        source: anyhow::Error,
    },

    #[error("Notification for {cycle_id} aborted: {source}")]
    Notify {
        cycle_id: CycleId,
        #[source]
        source: CriticalHandlerError,
    },
}

impl CycleError {
    pub fn cycle_id(&self) -> CycleId {
        match self {
            CycleError::AlreadyRunning { cycle_id }
            | CycleError::Worker { cycle_id, .. }
            | CycleError::Notify { cycle_id, .. } => *cycle_id,
        }
    }

    /// The failing component, when a worker caused the abort
    pub fn component_id(&self) -> Option<&ComponentId> {
        match self {
            CycleError::Worker { component_id, .. } => Some(component_id),
            _ => None,
        }
    }

    /// The read-before-write violation behind a worker failure, if that is
    /// what stopped the cycle
    pub fn execution_order_violation(&self) -> Option<&ExecutionOrderViolationError> {
        let CycleError::Worker { source, .. } = self else {
            return None;
        };
        if let Some(violation) = source.downcast_ref::<ExecutionOrderViolationError>() {
            return Some(violation);
        }
        match source.downcast_ref::<TickwireError>() {
            Some(TickwireError::ExecutionOrder(violation)) => Some(violation),
            _ => None,
        }
    }
}
