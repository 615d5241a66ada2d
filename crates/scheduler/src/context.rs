//! CycleContext - What a worker sees while it runs
//!
//! Reads and writes go through the context so that both are checked against
//! the worker's declaration. A read of a declared input that is not in the
//! cache yet is an [`ExecutionOrderViolationError`]. The first violation is
//! also kept on the context, so the cycle aborts even if the worker ignores
//! the returned error.

use crate::cache::TickArtifactCache;
use parking_lot::Mutex;
use shared::{
    ArtifactAccess, ArtifactType, CacheError, ComponentId, CycleId, ExecutionOrderViolationError,
    TickwireError, UndeclaredArtifactError, WorkerDeclaration,
};
use std::collections::BTreeSet;

pub struct CycleContext<'a, P> {
    cycle_id: CycleId,
    declaration: &'a WorkerDeclaration,
    cache: &'a TickArtifactCache<P>,
    written: Mutex<BTreeSet<ArtifactType>>,
    violation: Mutex<Option<ExecutionOrderViolationError>>,
}

impl<'a, P: Clone> CycleContext<'a, P> {
    pub(crate) fn new(
        cycle_id: CycleId,
        declaration: &'a WorkerDeclaration,
        cache: &'a TickArtifactCache<P>,
    ) -> Self {
        Self {
            cycle_id,
            declaration,
            cache,
            written: Mutex::new(BTreeSet::new()),
            violation: Mutex::new(None),
        }
    }

    pub fn cycle_id(&self) -> CycleId {
        self.cycle_id
    }

    pub fn component_id(&self) -> &ComponentId {
        &self.declaration.component_id
    }

    pub fn declaration(&self) -> &WorkerDeclaration {
        self.declaration
    }

    /// Read a declared input
    pub fn get(&self, artifact: impl Into<ArtifactType>) -> Result<P, TickwireError> {
        let artifact = artifact.into();
        if !self.declaration.requires_type(&artifact) {
            return Err(self.undeclared(artifact, ArtifactAccess::Read).into());
        }

        match self.cache.get(self.cycle_id, &artifact) {
            Ok(payload) => Ok(payload),
            Err(CacheError::NotFound { .. }) => {
                let violation = ExecutionOrderViolationError {
                    cycle_id: self.cycle_id,
                    component_id: self.component_id().clone(),
                    artifact,
                };
                self.violation.lock().get_or_insert_with(|| violation.clone());
                Err(violation.into())
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Write a declared output
    pub fn put(&self, artifact: impl Into<ArtifactType>, payload: P) -> Result<(), TickwireError> {
        let artifact = artifact.into();
        if !self.declaration.produces_type(&artifact) {
            return Err(self.undeclared(artifact, ArtifactAccess::Write).into());
        }

        self.cache.put(self.cycle_id, artifact.clone(), payload)?;
        self.written.lock().insert(artifact);
        Ok(())
    }

    /// Artifacts this worker has written so far, ascending
    pub fn written(&self) -> Vec<ArtifactType> {
        self.written.lock().iter().cloned().collect()
    }

    /// First read-before-write seen by this context, if any
    pub(crate) fn take_violation(&self) -> Option<ExecutionOrderViolationError> {
        self.violation.lock().take()
    }

    fn undeclared(
        &self,
        artifact: ArtifactType,
        access: ArtifactAccess,
    ) -> UndeclaredArtifactError {
        UndeclaredArtifactError {
            component_id: self.component_id().clone(),
            artifact,
            access,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (WorkerDeclaration, TickArtifactCache<String>) {
        let decl = WorkerDeclaration::new("pricer")
            .requiring("quotes")
            .producing("prices");
        let cache = TickArtifactCache::new();
        cache.start_cycle(CycleId::new(1));
        (decl, cache)
    }

    #[test]
    fn test_declared_read_and_write() {
        let (decl, cache) = setup();
        cache
            .put(CycleId::new(1), ArtifactType::new("quotes"), "q".to_string())
            .unwrap();

        let ctx = CycleContext::new(CycleId::new(1), &decl, &cache);
        assert_eq!(ctx.get("quotes").unwrap(), "q");

        ctx.put("prices", "p".to_string()).unwrap();
        assert_eq!(ctx.written(), vec![ArtifactType::new("prices")]);
        assert!(cache.has(CycleId::new(1), &ArtifactType::new("prices")));
    }

    #[test]
    fn test_read_before_write_is_order_violation() {
        let (decl, cache) = setup();
        let ctx = CycleContext::new(CycleId::new(1), &decl, &cache);

        let err = ctx.get("quotes").unwrap_err();
        assert!(matches!(err, TickwireError::ExecutionOrder(_)));

        let kept = ctx.take_violation().unwrap();
        assert_eq!(kept.artifact, ArtifactType::new("quotes"));
        assert!(ctx.take_violation().is_none());
    }

    #[test]
    fn test_undeclared_access_rejected() {
        let (decl, cache) = setup();
        let ctx = CycleContext::new(CycleId::new(1), &decl, &cache);

        let read = ctx.get("fills").unwrap_err();
        assert!(matches!(
            read,
            TickwireError::UndeclaredArtifact(UndeclaredArtifactError {
                access: ArtifactAccess::Read,
                ..
            })
        ));

        let write = ctx.put("quotes", "x".to_string()).unwrap_err();
        assert!(write.to_string().contains("attempted to write undeclared artifact 'quotes'"));
        assert!(ctx.written().is_empty());
    }
}
