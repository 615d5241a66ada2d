//! TickArtifactCache - Per-cycle artifact store
//!
//! Holds exactly one cycle's artifacts. `start_cycle` drops everything from
//! the previous cycle and re-scopes the cache; any access naming another
//! cycle is rejected with [`CacheError::StaleCycle`].

use parking_lot::RwLock;
use shared::{ArtifactType, CacheError, CycleId};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug)]
struct CacheState<P> {
    cycle: Option<CycleId>,
    entries: BTreeMap<ArtifactType, P>,
}

/// Artifact cache for one processing group
///
/// Internally synchronized, so workers of the same level may write distinct
/// artifacts concurrently.
#[derive(Debug)]
pub struct TickArtifactCache<P> {
    inner: RwLock<CacheState<P>>,
}

impl<P: Clone> TickArtifactCache<P> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(CacheState {
                cycle: None,
                entries: BTreeMap::new(),
            }),
        }
    }

    /// Clear all entries and scope the cache to `cycle_id`
    pub fn start_cycle(&self, cycle_id: CycleId) {
        let mut state = self.inner.write();
        let dropped = state.entries.len();
        state.entries.clear();
        state.cycle = Some(cycle_id);
        debug!(cycle = %cycle_id, dropped, "Cache re-scoped");
    }

    /// Store an artifact; last write wins and the previous value is returned
    pub fn put(
        &self,
        cycle_id: CycleId,
        artifact: ArtifactType,
        payload: P,
    ) -> Result<Option<P>, CacheError> {
        let mut state = self.inner.write();
        check_cycle(state.cycle, cycle_id)?;
        Ok(state.entries.insert(artifact, payload))
    }

    pub fn get(&self, cycle_id: CycleId, artifact: &ArtifactType) -> Result<P, CacheError> {
        let state = self.inner.read();
        check_cycle(state.cycle, cycle_id)?;
        state
            .entries
            .get(artifact)
            .cloned()
            .ok_or_else(|| CacheError::NotFound {
                cycle_id,
                artifact: artifact.clone(),
            })
    }

    /// Whether `artifact` was written in `cycle_id`; false for other cycles
    pub fn has(&self, cycle_id: CycleId, artifact: &ArtifactType) -> bool {
        let state = self.inner.read();
        state.cycle == Some(cycle_id) && state.entries.contains_key(artifact)
    }

    pub fn current_cycle(&self) -> Option<CycleId> {
        self.inner.read().cycle
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    /// Artifact types present in the current cycle, ascending
    pub fn artifact_types(&self) -> Vec<ArtifactType> {
        self.inner.read().entries.keys().cloned().collect()
    }
}

impl<P: Clone> Default for TickArtifactCache<P> {
    fn default() -> Self {
        Self::new()
    }
}

fn check_cycle(current: Option<CycleId>, requested: CycleId) -> Result<(), CacheError> {
    if current == Some(requested) {
        Ok(())
    } else {
        Err(CacheError::StaleCycle { requested, current })
    }
}
