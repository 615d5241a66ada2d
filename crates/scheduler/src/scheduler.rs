//! ExecutionScheduler - Runs one processing cycle level by level
//!
//! ## Cycle
//!
//! 1. Allocate the next cycle id and re-scope the cache
//! 2. Publish `cycle:started`
//! 3. For each plan level, call every worker of the level directly. Workers
//!    of one level run in ascending id order, or on scoped threads when
//!    `parallel_levels` is set. The next level starts only after the whole
//!    level returned.
//! 4. After each worker, publish the events wiring rules source at it
//! 5. Publish `cycle:completed`, or `cycle:aborted` on the first error
//!
//! ```text
//! Idle -> Running{cycle, level} -> Complete{cycle}
//!                               -> Aborted{cycle, reason}
//! ```

use crate::cache::TickArtifactCache;
use crate::context::CycleContext;
use crate::error::CycleError;
use crate::notice::{CycleNotice, CYCLE_ABORTED, CYCLE_COMPLETED, CYCLE_STARTED};
use crate::worker::{Worker, WorkerSet};
use bus::{EventBus, PublishScope};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use shared::{
    ComponentId, CycleId, GroupId, MissingWorkerError, SchedulerConfig, TickwireError, WiringRule,
    WorkerDeclaration,
};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use wiring::{ExecutionPlan, WiringValidator};

/// Scheduler state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    Running { cycle_id: CycleId, level_index: usize },
    Complete { cycle_id: CycleId },
    Aborted { cycle_id: CycleId, reason: String },
}

impl SchedulerState {
    pub fn is_running(&self) -> bool {
        matches!(self, SchedulerState::Running { .. })
    }
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerState::Idle => write!(f, "idle"),
            SchedulerState::Running {
                cycle_id,
                level_index,
            } => write!(f, "running {} (level {})", cycle_id, level_index),
            SchedulerState::Complete { cycle_id } => write!(f, "complete {}", cycle_id),
            SchedulerState::Aborted { cycle_id, reason } => {
                write!(f, "aborted {}: {}", cycle_id, reason)
            }
        }
    }
}

/// Summary of a completed cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub cycle_id: CycleId,
    pub levels: usize,
    pub components_run: usize,
    pub notices_published: usize,
    pub duration: Duration,
}

/// Validated plan plus everything needed to dispatch it
struct Wiring {
    plan: ExecutionPlan,
    declarations: BTreeMap<ComponentId, WorkerDeclaration>,
    /// Event names each component emits when it finishes
    emits: BTreeMap<ComponentId, Vec<String>>,
}

impl Wiring {
    fn empty() -> Self {
        Self {
            plan: ExecutionPlan::default(),
            declarations: BTreeMap::new(),
            emits: BTreeMap::new(),
        }
    }
}

/// Per-group cycle executor
pub struct ExecutionScheduler<P> {
    group: Option<GroupId>,
    config: SchedulerConfig,
    bus: Arc<EventBus<CycleNotice>>,
    workers: WorkerSet<P>,
    wiring: RwLock<Arc<Wiring>>,
    cache: TickArtifactCache<P>,
    state: Mutex<SchedulerState>,
    last_cycle: Mutex<CycleId>,
}

impl<P> ExecutionScheduler<P>
where
    P: Clone + Send + Sync + 'static,
{
    /// Create an idle scheduler with an empty plan
    pub fn new(bus: Arc<EventBus<CycleNotice>>, workers: WorkerSet<P>) -> Self {
        Self {
            group: None,
            config: SchedulerConfig::default(),
            bus,
            workers,
            wiring: RwLock::new(Arc::new(Wiring::empty())),
            cache: TickArtifactCache::new(),
            state: Mutex::new(SchedulerState::Idle),
            last_cycle: Mutex::new(CycleId::new(0)),
        }
    }

    /// Builder: scope published notices to a processing group
    pub fn with_group(mut self, group: impl Into<GroupId>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate a wiring and make it the plan for the following cycles
    ///
    /// A cycle already in flight keeps the plan it started with.
    pub fn rewire(
        &self,
        declarations: &[WorkerDeclaration],
        rules: &[WiringRule],
    ) -> Result<ExecutionPlan, TickwireError> {
        let plan = WiringValidator::new().validate(declarations, rules)?;

        for component in plan.components() {
            if !self.workers.contains(component) {
                return Err(MissingWorkerError {
                    component_id: component.clone(),
                }
                .into());
            }
        }

        let mut emits: BTreeMap<ComponentId, Vec<String>> = BTreeMap::new();
        for rule in rules {
            let names = emits.entry(rule.source_component_id.clone()).or_default();
            if !names.contains(&rule.source_event_name) {
                names.push(rule.source_event_name.clone());
            }
        }

        let declarations = declarations
            .iter()
            .filter(|d| plan.contains(&d.component_id))
            .map(|d| (d.component_id.clone(), d.clone()))
            .collect();

        *self.wiring.write() = Arc::new(Wiring {
            plan: plan.clone(),
            declarations,
            emits,
        });

        info!(
            group = ?self.group,
            components = plan.len(),
            levels = plan.level_count(),
            "Scheduler rewired"
        );
        Ok(plan)
    }

    /// Run one full cycle
    pub fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        let cycle_id = {
            let mut state = self.state.lock();
            if let SchedulerState::Running { cycle_id, .. } = *state {
                return Err(CycleError::AlreadyRunning { cycle_id });
            }
            let mut last = self.last_cycle.lock();
            *last = last.next();
            *state = SchedulerState::Running {
                cycle_id: *last,
                level_index: 0,
            };
            *last
        };

        let wiring = Arc::clone(&self.wiring.read());
        let started = Instant::now();
        self.cache.start_cycle(cycle_id);
        info!(cycle = %cycle_id, group = ?self.group, "Cycle started");

        let result = self
            .notify_lifecycle(cycle_id, CYCLE_STARTED, None)
            .and_then(|_| self.run_levels(cycle_id, &wiring))
            .and_then(|notices| {
                self.notify_lifecycle(cycle_id, CYCLE_COMPLETED, None)?;
                Ok(notices)
            });

        match result {
            Ok(notices_published) => {
                *self.state.lock() = SchedulerState::Complete { cycle_id };
                let report = CycleReport {
                    cycle_id,
                    levels: wiring.plan.level_count(),
                    components_run: wiring.plan.len(),
                    notices_published,
                    duration: started.elapsed(),
                };
                info!(
                    cycle = %cycle_id,
                    components = report.components_run,
                    elapsed_ms = report.duration.as_millis() as u64,
                    "Cycle completed"
                );
                Ok(report)
            }
            Err(err) => {
                let reason = err.to_string();
                error!(cycle = %cycle_id, error = %reason, "Cycle aborted");
                *self.state.lock() = SchedulerState::Aborted {
                    cycle_id,
                    reason: reason.clone(),
                };
                if let Err(notify_err) =
                    self.notify_lifecycle(cycle_id, CYCLE_ABORTED, Some(reason))
                {
                    warn!(cycle = %cycle_id, error = %notify_err, "Abort notification failed");
                }
                Err(err)
            }
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state.lock().clone()
    }

    pub fn plan(&self) -> ExecutionPlan {
        self.wiring.read().plan.clone()
    }

    pub fn cache(&self) -> &TickArtifactCache<P> {
        &self.cache
    }

    pub fn group(&self) -> Option<&GroupId> {
        self.group.as_ref()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn bus(&self) -> &Arc<EventBus<CycleNotice>> {
        &self.bus
    }

    fn run_levels(&self, cycle_id: CycleId, wiring: &Wiring) -> Result<usize, CycleError> {
        let mut notices = 0;

        for (level_index, level) in wiring.plan.levels().iter().enumerate() {
            *self.state.lock() = SchedulerState::Running {
                cycle_id,
                level_index,
            };
            debug!(
                cycle = %cycle_id,
                level = level_index,
                width = level.len(),
                "Dispatching level"
            );

            if self.config.parallel_levels && level.len() > 1 {
                notices += self.run_level_parallel(cycle_id, wiring, level)?;
            } else {
                for component in level {
                    notices += self.run_component(cycle_id, wiring, component)?;
                }
            }
        }

        Ok(notices)
    }

    fn run_level_parallel(
        &self,
        cycle_id: CycleId,
        wiring: &Wiring,
        level: &[ComponentId],
    ) -> Result<usize, CycleError> {
        let results: Vec<Result<usize, CycleError>> = thread::scope(|scope| {
            let handles: Vec<_> = level
                .iter()
                .map(|component| {
                    scope.spawn(move || self.run_component(cycle_id, wiring, component))
                })
                .collect();

            handles
                .into_iter()
                .zip(level)
                .map(|(handle, component)| {
                    handle.join().unwrap_or_else(|_| {
                        Err(CycleError::Worker {
                            cycle_id,
                            component_id: component.clone(),
                            source: anyhow::anyhow!("worker panicked"),
                        })
                    })
                })
                .collect()
        });

        let mut notices = 0;
        for result in results {
            notices += result?;
        }
        Ok(notices)
    }

    /// Run one worker and publish its notices; returns how many were sent
    fn run_component(
        &self,
        cycle_id: CycleId,
        wiring: &Wiring,
        component: &ComponentId,
    ) -> Result<usize, CycleError> {
        let worker_error = |source: anyhow::Error| CycleError::Worker {
            cycle_id,
            component_id: component.clone(),
            source,
        };

        let declaration = wiring
            .declarations
            .get(component)
            .ok_or_else(|| worker_error(anyhow::anyhow!("component has no declaration")))?;
        let worker: Arc<dyn Worker<P>> = self.workers.get(component).ok_or_else(|| {
            worker_error(
                MissingWorkerError {
                    component_id: component.clone(),
                }
                .into(),
            )
        })?;

        let ctx = CycleContext::new(cycle_id, declaration, &self.cache);
        let outcome =
            panic::catch_unwind(AssertUnwindSafe(|| worker.run(&ctx))).unwrap_or_else(|payload| {
                Err(anyhow::anyhow!("worker panicked: {}", panic_message(&*payload)))
            });
        if let Some(violation) = ctx.take_violation() {
            return Err(worker_error(violation.into()));
        }
        outcome.map_err(worker_error)?;

        let produced = ctx.written();
        if self.config.verify_outputs {
            for artifact in &declaration.produces {
                if !produced.contains(artifact) {
                    warn!(
                        cycle = %cycle_id,
                        component = %component,
                        artifact = %artifact,
                        "Declared output not written"
                    );
                }
            }
        }
        debug!(
            cycle = %cycle_id,
            component = %component,
            written = produced.len(),
            "Component finished"
        );

        let events = match wiring.emits.get(component) {
            Some(events) => events,
            None => return Ok(0),
        };
        for event_name in events {
            let notice = CycleNotice::component(
                cycle_id,
                self.group.clone(),
                component.clone(),
                produced.clone(),
            );
            self.bus
                .publish(event_name, notice, self.publish_scope())
                .map_err(|source| CycleError::Notify { cycle_id, source })?;
        }
        Ok(events.len())
    }

    fn notify_lifecycle(
        &self,
        cycle_id: CycleId,
        event_name: &str,
        reason: Option<String>,
    ) -> Result<(), CycleError> {
        if !self.config.publish_lifecycle {
            return Ok(());
        }
        let mut notice = CycleNotice::lifecycle(cycle_id, self.group.clone());
        if let Some(reason) = reason {
            notice = notice.with_reason(reason);
        }
        self.bus
            .publish(event_name, notice, self.publish_scope())
            .map(|_| ())
            .map_err(|source| CycleError::Notify { cycle_id, source })
    }

    fn publish_scope(&self) -> PublishScope {
        match &self.group {
            Some(group) => PublishScope::Group(group.clone()),
            None => PublishScope::Global,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string payload")
}

impl<P> fmt::Debug for ExecutionScheduler<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionScheduler")
            .field("group", &self.group)
            .field("state", &*self.state.lock())
            .field("workers", &self.workers)
            .finish()
    }
}
