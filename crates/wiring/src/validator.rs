//! WiringValidator - Proves a wiring before dispatch
//!
//! Validation runs in three passes:
//!
//! 1. Build the dependency graph over every declaration. Duplicate ids and
//!    cycles are fatal and stop validation.
//! 2. Collect the *active* components: every component a wiring rule names
//!    as source or target. A rule naming an undeclared component is an issue.
//! 3. Check that each active consumer has an active producer for every
//!    artifact it requires. Producers that are declared but not wired count
//!    as absent.
//!
//! All issues of passes 2 and 3 are collected into one [`ValidationReport`].
//! When the report is empty the leveled order of the active subgraph becomes
//! the [`ExecutionPlan`].

use crate::graph::DependencyGraph;
use crate::plan::ExecutionPlan;
use shared::{
    ComponentId, DependencyViolationError, UnknownComponentError, ValidationReport,
    WiringRule, WorkerDeclaration,
};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Static wiring validator
///
/// Stateless; calling `validate` twice with the same input yields the same
/// result.
#[derive(Debug, Clone, Copy, Default)]
pub struct WiringValidator;

impl WiringValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate declarations against wiring rules
    pub fn validate(
        &self,
        declarations: &[WorkerDeclaration],
        rules: &[WiringRule],
    ) -> Result<ExecutionPlan, ValidationReport> {
        let mut report = ValidationReport::new();

        let graph = match DependencyGraph::build(declarations) {
            Ok(graph) => graph,
            Err(duplicate) => {
                warn!(component = %duplicate.component_id, "Duplicate component declaration");
                report.push(duplicate);
                return Err(report);
            }
        };

        if let Err(cycle) = graph.topological_order() {
            warn!(error = %cycle, "Wiring rejected");
            report.push(cycle);
            return Err(report);
        }

        let active = self.active_components(&graph, rules, &mut report);
        debug!(
            declared = graph.node_count(),
            active = active.len(),
            rules = rules.len(),
            "Collected active components"
        );

        let active_decls: Vec<&WorkerDeclaration> = active
            .iter()
            .filter_map(|id| graph.declaration(id))
            .collect();

        // Ids were checked for duplicates above, so this cannot fail
        let subgraph = match DependencyGraph::build(active_decls) {
            Ok(subgraph) => subgraph,
            Err(duplicate) => {
                report.push(duplicate);
                return Err(report);
            }
        };

        for (consumer, missing) in subgraph.unresolved() {
            for artifact in missing {
                report.push(DependencyViolationError {
                    consumer: consumer.clone(),
                    artifact: artifact.clone(),
                    unwired_producers: graph.producers_of(artifact),
                });
            }
        }

        if !report.is_empty() {
            warn!(issues = report.len(), "Wiring rejected");
            return Err(report);
        }

        let plan = match subgraph.topological_order() {
            Ok(levels) => ExecutionPlan::new(levels),
            Err(cycle) => {
                report.push(cycle);
                return Err(report);
            }
        };

        info!(
            components = plan.len(),
            levels = plan.level_count(),
            "Wiring validated"
        );
        Ok(plan)
    }

    /// Components named by at least one rule, ascending
    fn active_components(
        &self,
        graph: &DependencyGraph,
        rules: &[WiringRule],
        report: &mut ValidationReport,
    ) -> BTreeSet<ComponentId> {
        let mut active = BTreeSet::new();
        let mut reported = BTreeSet::new();

        for rule in rules {
            for endpoint in rule.endpoints() {
                if graph.contains(endpoint) {
                    active.insert(endpoint.clone());
                } else if reported.insert(endpoint.clone()) {
                    report.push(UnknownComponentError {
                        component_id: endpoint.clone(),
                        rule: rule.to_string(),
                    });
                }
            }
        }

        active
    }
}
