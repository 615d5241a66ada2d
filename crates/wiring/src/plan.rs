//! ExecutionPlan - Leveled dispatch order for one wiring

use serde::{Deserialize, Serialize};
use shared::ComponentId;
use std::fmt;

/// Ordered execution levels
///
/// Every component of level `n` only depends on components in levels before
/// `n`. The plan is immutable and reused across cycles until the wiring
/// changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    levels: Vec<Vec<ComponentId>>,
}

impl ExecutionPlan {
    pub fn new(levels: Vec<Vec<ComponentId>>) -> Self {
        Self { levels }
    }

    pub fn levels(&self) -> &[Vec<ComponentId>] {
        &self.levels
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Number of components across all levels
    pub fn len(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Components in dispatch order
    pub fn components(&self) -> impl Iterator<Item = &ComponentId> {
        self.levels.iter().flatten()
    }

    /// Level index of a component
    pub fn position_of(&self, id: &ComponentId) -> Option<usize> {
        self.levels.iter().position(|level| level.contains(id))
    }

    pub fn contains(&self, id: &ComponentId) -> bool {
        self.position_of(id).is_some()
    }
}

impl fmt::Display for ExecutionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, level) in self.levels.iter().enumerate() {
            let names: Vec<&str> = level.iter().map(|c| c.as_str()).collect();
            if index > 0 {
                writeln!(f)?;
            }
            write!(f, "L{}: {}", index, names.join(", "))?;
        }
        Ok(())
    }
}
