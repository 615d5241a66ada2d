//! Error types for Tickwire
//!
//! Configuration-time errors (scope, cycle, dependency violation) are always
//! surfaced to the caller that asked for the subscription or validation.
//! Runtime critical failures abort the current publish or cycle. Nothing here
//! is retried automatically.

use crate::{ArtifactType, ComponentId, CycleId, SubscriptionId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Boxed cause carried by handler failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Malformed subscription scope, rejected at subscribe time
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid subscription scope '{scope}': {reason}")]
pub struct ScopeConfigurationError {
    pub scope: String,
    pub reason: String,
}

/// A handler flagged critical failed during publish
///
/// Delivery to the remaining subscribers of that publish call was skipped.
#[derive(Debug, Error)]
#[error("Critical handler {subscription_id} failed on event '{event_name}': {source}")]
pub struct CriticalHandlerError {
    pub event_name: String,
    pub subscription_id: SubscriptionId,
    #[source]
    pub source: BoxError,
}

/// Record of a non-critical handler failure
///
/// Logged and kept in the bus failure log; never returned to the publisher
/// as an error.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NonCriticalHandlerFailure {
    pub event_name: String,
    pub subscription_id: SubscriptionId,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

impl fmt::Display for NonCriticalHandlerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Handler {} failed on event '{}': {}",
            self.subscription_id, self.event_name, self.message
        )
    }
}

/// Producer/consumer dependencies form a loop
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Circular dependency detected: {}", render_cycle(.cycle))]
pub struct CircularDependencyError {
    /// Components on the loop, in edge order
    pub cycle: Vec<ComponentId>,
}

fn render_cycle(cycle: &[ComponentId]) -> String {
    let mut parts: Vec<&str> = cycle.iter().map(|c| c.as_str()).collect();
    if let Some(first) = cycle.first() {
        parts.push(first.as_str());
    }
    parts.join(" -> ")
}

/// A wired consumer requires an artifact no wired producer supplies
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "Component '{consumer}' requires '{artifact}' but no wired component produces it{}",
    render_unwired(.unwired_producers)
)]
pub struct DependencyViolationError {
    pub consumer: ComponentId,
    pub artifact: ArtifactType,
    /// Declared producers of the artifact that no rule wires in
    pub unwired_producers: Vec<ComponentId>,
}

fn render_unwired(producers: &[ComponentId]) -> String {
    if producers.is_empty() {
        return String::new();
    }
    let names: Vec<&str> = producers.iter().map(|p| p.as_str()).collect();
    format!(" (declared but not wired: {})", names.join(", "))
}

/// Two declarations share a component id
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Component '{component_id}' is declared more than once")]
pub struct DuplicateComponentError {
    pub component_id: ComponentId,
}

/// A wiring rule names a component that has no declaration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Wiring rule '{rule}' references undeclared component '{component_id}'")]
pub struct UnknownComponentError {
    pub component_id: ComponentId,
    pub rule: String,
}

/// A wiring rule targets a handler nobody registered
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("No handler '{handler_name}' registered for component '{component_id}'")]
pub struct UnboundHandlerError {
    pub component_id: ComponentId,
    pub handler_name: String,
}

/// A planned component has no worker implementation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("No worker registered for planned component '{component_id}'")]
pub struct MissingWorkerError {
    pub component_id: ComponentId,
}

/// A read was issued before the matching write in the same cycle
///
/// Static validation should make this impossible, so seeing it means the
/// plan and the cache disagree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Execution order violated in {cycle_id}: '{component_id}' read '{artifact}' before it was written")]
pub struct ExecutionOrderViolationError {
    pub cycle_id: CycleId,
    pub component_id: ComponentId,
    pub artifact: ArtifactType,
}

/// Direction of a cache access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactAccess {
    Read,
    Write,
}

impl fmt::Display for ArtifactAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactAccess::Read => write!(f, "read"),
            ArtifactAccess::Write => write!(f, "write"),
        }
    }
}

/// A worker touched an artifact outside its declaration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Component '{component_id}' attempted to {access} undeclared artifact '{artifact}'")]
pub struct UndeclaredArtifactError {
    pub component_id: ComponentId,
    pub artifact: ArtifactType,
    pub access: ArtifactAccess,
}

/// Tick artifact cache errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("Artifact '{artifact}' not found in {cycle_id}")]
    NotFound {
        cycle_id: CycleId,
        artifact: ArtifactType,
    },

    #[error("Access to {requested} rejected: cache is scoped to {}", render_current(.current))]
    StaleCycle {
        requested: CycleId,
        current: Option<CycleId>,
    },
}

fn render_current(current: &Option<CycleId>) -> String {
    match current {
        Some(cycle_id) => cycle_id.to_string(),
        None => "no cycle".to_string(),
    }
}

/// One problem found while validating a wiring
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WiringIssue {
    #[error(transparent)]
    DuplicateComponent(#[from] DuplicateComponentError),

    #[error(transparent)]
    CircularDependency(#[from] CircularDependencyError),

    #[error(transparent)]
    UnknownComponent(#[from] UnknownComponentError),

    #[error(transparent)]
    DependencyViolation(#[from] DependencyViolationError),
}

/// Every problem found while validating a wiring
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationReport {
    pub issues: Vec<WiringIssue>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, issue: impl Into<WiringIssue>) {
        self.issues.push(issue.into());
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// The cycle that made validation fail, if any
    pub fn cycle(&self) -> Option<&CircularDependencyError> {
        self.issues.iter().find_map(|issue| match issue {
            WiringIssue::CircularDependency(e) => Some(e),
            _ => None,
        })
    }

    pub fn violations(&self) -> impl Iterator<Item = &DependencyViolationError> {
        self.issues.iter().filter_map(|issue| match issue {
            WiringIssue::DependencyViolation(e) => Some(e),
            _ => None,
        })
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Wiring validation failed with {} issue(s)", self.issues.len())?;
        for issue in &self.issues {
            write!(f, "\n  - {}", issue)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationReport {}

/// General Tickwire error type
#[derive(Debug, Error)]
pub enum TickwireError {
    #[error(transparent)]
    Scope(#[from] ScopeConfigurationError),

    #[error(transparent)]
    CriticalHandler(#[from] CriticalHandlerError),

    #[error(transparent)]
    Validation(#[from] ValidationReport),

    #[error(transparent)]
    DuplicateComponent(#[from] DuplicateComponentError),

    #[error(transparent)]
    CircularDependency(#[from] CircularDependencyError),

    #[error(transparent)]
    UnboundHandler(#[from] UnboundHandlerError),

    #[error(transparent)]
    MissingWorker(#[from] MissingWorkerError),

    #[error(transparent)]
    ExecutionOrder(#[from] ExecutionOrderViolationError),

    #[error(transparent)]
    UndeclaredArtifact(#[from] UndeclaredArtifactError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

pub type Result<T> = std::result::Result<T, TickwireError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_closes_the_loop() {
        let err = CircularDependencyError {
            cycle: vec![
                ComponentId::new("a"),
                ComponentId::new("b"),
                ComponentId::new("c"),
            ],
        };
        assert_eq!(err.to_string(), "Circular dependency detected: a -> b -> c -> a");
    }

    #[test]
    fn test_violation_message_names_unwired_producers() {
        let err = DependencyViolationError {
            consumer: ComponentId::new("pricer"),
            artifact: ArtifactType::new("quotes"),
            unwired_producers: vec![ComponentId::new("feed")],
        };
        let message = err.to_string();
        assert!(message.contains("'pricer' requires 'quotes'"));
        assert!(message.contains("declared but not wired: feed"));
    }

    #[test]
    fn test_report_lists_every_issue() {
        let mut report = ValidationReport::new();
        report.push(DependencyViolationError {
            consumer: ComponentId::new("a"),
            artifact: ArtifactType::new("z"),
            unwired_producers: vec![],
        });
        report.push(UnknownComponentError {
            component_id: ComponentId::new("ghost"),
            rule: "ghost.tick -> a.on_tick".to_string(),
        });

        assert_eq!(report.len(), 2);
        assert!(report.cycle().is_none());
        assert_eq!(report.violations().count(), 1);

        let rendered = report.to_string();
        assert!(rendered.starts_with("Wiring validation failed with 2 issue(s)"));
        assert!(rendered.contains("ghost"));
    }

    #[test]
    fn test_stale_cycle_message() {
        let err = CacheError::StaleCycle {
            requested: CycleId::new(3),
            current: None,
        };
        assert_eq!(
            err.to_string(),
            "Access to cycle-3 rejected: cache is scoped to no cycle"
        );
    }

    #[test]
    fn test_critical_error_keeps_source() {
        let cause: BoxError = "disk full".into();
        let err = CriticalHandlerError {
            event_name: "ledger.update".to_string(),
            subscription_id: SubscriptionId::generate(),
            source: cause,
        };
        assert!(err.to_string().ends_with("disk full"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
