//! Worker - One unit of per-cycle processing

use crate::context::CycleContext;
use shared::ComponentId;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// A worker is called once per cycle, directly by the scheduler
///
/// It reads its declared inputs and writes its declared outputs through the
/// [`CycleContext`]. Returning an error aborts the cycle.
pub trait Worker<P>: Send + Sync {
    fn run(&self, ctx: &CycleContext<'_, P>) -> anyhow::Result<()>;
}

/// Adapter turning a closure into a [`Worker`]
pub struct FnWorker<P, F> {
    f: F,
    _payload: PhantomData<fn(P)>,
}

impl<P, F> Worker<P> for FnWorker<P, F>
where
    F: Fn(&CycleContext<'_, P>) -> anyhow::Result<()> + Send + Sync,
{
    fn run(&self, ctx: &CycleContext<'_, P>) -> anyhow::Result<()> {
        (self.f)(ctx)
    }
}

/// Wrap a closure as a worker
pub fn worker_fn<P, F>(f: F) -> FnWorker<P, F>
where
    F: Fn(&CycleContext<'_, P>) -> anyhow::Result<()> + Send + Sync,
{
    FnWorker {
        f,
        _payload: PhantomData,
    }
}

/// Worker implementations by component id
pub struct WorkerSet<P> {
    workers: BTreeMap<ComponentId, Arc<dyn Worker<P>>>,
}

impl<P> WorkerSet<P> {
    pub fn new() -> Self {
        Self {
            workers: BTreeMap::new(),
        }
    }

    /// Register a worker, replacing any earlier one with the same id
    pub fn register(&mut self, id: impl Into<ComponentId>, worker: impl Worker<P> + 'static) {
        self.workers.insert(id.into(), Arc::new(worker));
    }

    /// Builder: register a worker
    pub fn with_worker(
        mut self,
        id: impl Into<ComponentId>,
        worker: impl Worker<P> + 'static,
    ) -> Self {
        self.register(id, worker);
        self
    }

    pub fn get(&self, id: &ComponentId) -> Option<Arc<dyn Worker<P>>> {
        self.workers.get(id).cloned()
    }

    pub fn contains(&self, id: &ComponentId) -> bool {
        self.workers.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

impl<P> Default for WorkerSet<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> fmt::Debug for WorkerSet<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerSet")
            .field("workers", &self.workers.keys().collect::<Vec<_>>())
            .finish()
    }
}
