//! DependencyGraph - Producer/consumer graph over worker declarations
//!
//! There is an edge `A -> B` whenever `B` requires an artifact type `A`
//! produces. A worker that requires what it produces gets a self-edge, which
//! counts as a cycle. All maps are ordered so that traversal, reports and
//! plans come out the same on every run.

use shared::{
    ArtifactType, CircularDependencyError, ComponentId, DuplicateComponentError,
    WorkerDeclaration,
};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

/// DFS node state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    declarations: BTreeMap<ComponentId, WorkerDeclaration>,
    /// Artifact type -> components producing it
    producers: BTreeMap<ArtifactType, BTreeSet<ComponentId>>,
    /// Producer -> consumer -> artifacts carried by the edge
    edges: BTreeMap<ComponentId, BTreeMap<ComponentId, BTreeSet<ArtifactType>>>,
    /// Consumer -> producers it depends on
    reverse: BTreeMap<ComponentId, BTreeSet<ComponentId>>,
    /// Consumer -> required artifacts with no producer at all
    unresolved: BTreeMap<ComponentId, BTreeSet<ArtifactType>>,
}

impl DependencyGraph {
    /// Build the graph from a set of declarations
    pub fn build<'a, I>(declarations: I) -> Result<Self, DuplicateComponentError>
    where
        I: IntoIterator<Item = &'a WorkerDeclaration>,
    {
        let mut graph = Self::default();

        for decl in declarations {
            if graph.declarations.contains_key(&decl.component_id) {
                return Err(DuplicateComponentError {
                    component_id: decl.component_id.clone(),
                });
            }
            for artifact in &decl.produces {
                graph
                    .producers
                    .entry(artifact.clone())
                    .or_default()
                    .insert(decl.component_id.clone());
            }
            graph
                .declarations
                .insert(decl.component_id.clone(), decl.clone());
        }

        for (consumer, decl) in &graph.declarations {
            for artifact in &decl.requires {
                let producers = match graph.producers.get(artifact) {
                    Some(producers) => producers,
                    None => {
                        graph
                            .unresolved
                            .entry(consumer.clone())
                            .or_default()
                            .insert(artifact.clone());
                        continue;
                    }
                };
                for producer in producers {
                    graph
                        .edges
                        .entry(producer.clone())
                        .or_default()
                        .entry(consumer.clone())
                        .or_default()
                        .insert(artifact.clone());
                    graph
                        .reverse
                        .entry(consumer.clone())
                        .or_default()
                        .insert(producer.clone());
                }
            }
        }

        Ok(graph)
    }

    pub fn node_count(&self) -> usize {
        self.declarations.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(|targets| targets.len()).sum()
    }

    pub fn contains(&self, id: &ComponentId) -> bool {
        self.declarations.contains_key(id)
    }

    pub fn declaration(&self, id: &ComponentId) -> Option<&WorkerDeclaration> {
        self.declarations.get(id)
    }

    /// Component ids in ascending order
    pub fn components(&self) -> impl Iterator<Item = &ComponentId> {
        self.declarations.keys()
    }

    /// Components declaring `artifact` as an output
    pub fn producers_of(&self, artifact: &ArtifactType) -> Vec<ComponentId> {
        self.producers
            .get(artifact)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Components that consume something `id` produces
    pub fn dependents_of(&self, id: &ComponentId) -> Vec<ComponentId> {
        self.edges
            .get(id)
            .map(|targets| targets.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Components that produce something `id` requires
    pub fn dependencies_of(&self, id: &ComponentId) -> Vec<ComponentId> {
        self.reverse
            .get(id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Required artifacts nobody in the graph produces, per consumer
    pub fn unresolved(&self) -> &BTreeMap<ComponentId, BTreeSet<ArtifactType>> {
        &self.unresolved
    }

    /// Find one dependency cycle
    ///
    /// Three-color DFS started from every white node in ascending id order.
    /// The returned path runs from the re-entered node to the node that
    /// closes the loop.
    pub fn detect_cycle(&self) -> Option<Vec<ComponentId>> {
        let mut colors: BTreeMap<&ComponentId, Color> = self
            .declarations
            .keys()
            .map(|id| (id, Color::White))
            .collect();
        let mut path: Vec<&ComponentId> = Vec::new();

        for start in self.declarations.keys() {
            if colors.get(start) != Some(&Color::White) {
                continue;
            }
            if let Some(cycle) = self.visit(start, &mut colors, &mut path) {
                return Some(cycle);
            }
        }
        None
    }

    fn visit<'a>(
        &'a self,
        node: &'a ComponentId,
        colors: &mut BTreeMap<&'a ComponentId, Color>,
        path: &mut Vec<&'a ComponentId>,
    ) -> Option<Vec<ComponentId>> {
        colors.insert(node, Color::Gray);
        path.push(node);

        if let Some(targets) = self.edges.get(node) {
            for next in targets.keys() {
                match colors.get(next).copied().unwrap_or(Color::Black) {
                    Color::White => {
                        if let Some(cycle) = self.visit(next, colors, path) {
                            return Some(cycle);
                        }
                    }
                    Color::Gray => {
                        let start = path.iter().position(|id| *id == next).unwrap_or(0);
                        return Some(path[start..].iter().map(|id| (*id).clone()).collect());
                    }
                    Color::Black => {}
                }
            }
        }

        path.pop();
        colors.insert(node, Color::Black);
        None
    }

    /// Leveled topological order
    ///
    /// Level 0 holds every component with no producers in the graph; level
    /// `n + 1` holds the components whose producers all sit in levels
    /// `0..=n`. Ids are ascending within a level.
    pub fn topological_order(&self) -> Result<Vec<Vec<ComponentId>>, CircularDependencyError> {
        let mut in_degree: BTreeMap<&ComponentId, usize> = self
            .declarations
            .keys()
            .map(|id| (id, self.reverse.get(id).map(|p| p.len()).unwrap_or(0)))
            .collect();

        let mut current: BTreeSet<&ComponentId> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| *id)
            .collect();

        let mut levels = Vec::new();
        let mut placed = 0;

        while !current.is_empty() {
            let mut next = BTreeSet::new();
            for id in &current {
                let Some(targets) = self.edges.get(*id) else {
                    continue;
                };
                for consumer in targets.keys() {
                    if let Some(degree) = in_degree.get_mut(consumer) {
                        *degree -= 1;
                        if *degree == 0 {
                            next.insert(consumer);
                        }
                    }
                }
            }
            placed += current.len();
            levels.push(current.into_iter().cloned().collect());
            current = next;
        }

        if placed != self.declarations.len() {
            return Err(CircularDependencyError {
                cycle: self.detect_cycle().unwrap_or_default(),
            });
        }

        Ok(levels)
    }

    /// Render the graph in Graphviz DOT format
    pub fn to_dot(&self) -> String {
        let mut dot = String::from("digraph wiring {\n");
        dot.push_str("  rankdir=LR;\n");
        dot.push_str("  node [shape=box];\n\n");

        for id in self.declarations.keys() {
            let _ = writeln!(dot, "  \"{}\";", id);
        }

        dot.push('\n');

        for (producer, targets) in &self.edges {
            for (consumer, artifacts) in targets {
                let label: Vec<&str> = artifacts.iter().map(|a| a.as_str()).collect();
                let _ = writeln!(
                    dot,
                    "  \"{}\" -> \"{}\" [label=\"{}\"];",
                    producer,
                    consumer,
                    label.join(", ")
                );
            }
        }

        dot.push_str("}\n");
        dot
    }
}
