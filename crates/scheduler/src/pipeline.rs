//! Pipeline - One processing group wired onto a shared bus
//!
//! Each pipeline owns its own scheduler and therefore its own artifact
//! cache. Pipelines of different groups share nothing but the bus; their
//! handler bindings subscribe with an isolated scope, so a group's notices
//! never reach another group's handlers.
//!
//! ```rust,ignore
//! let bus = Arc::new(EventBus::new());
//!
//! let desk_a = Pipeline::builder("desk-a", Arc::clone(&bus))
//!     .with_worker(WorkerDeclaration::new("feed").producing("quotes"), feed)
//!     .with_worker(WorkerDeclaration::new("pricer").requiring("quotes"), pricer)
//!     .with_handler("pricer", "on_quotes", on_quotes, false)
//!     .with_rule(WiringRule::new("feed", "quotes.ready", "pricer", "on_quotes"))
//!     .build()?;
//!
//! desk_a.run_cycle()?;
//! ```

use crate::error::CycleError;
use crate::notice::CycleNotice;
use crate::routing::{bind_rules, unbind, HandlerTable};
use crate::scheduler::{CycleReport, ExecutionScheduler, SchedulerState};
use crate::worker::{Worker, WorkerSet};
use bus::{Event, EventBus, SubscriptionScope};
use shared::{
    ComponentId, GroupId, SchedulerConfig, SubscriptionId, TickwireError, WiringRule,
    WorkerDeclaration,
};
use std::sync::Arc;
use tracing::info;
use wiring::ExecutionPlan;

pub struct PipelineBuilder<P> {
    group: GroupId,
    bus: Arc<EventBus<CycleNotice>>,
    config: SchedulerConfig,
    declarations: Vec<WorkerDeclaration>,
    workers: WorkerSet<P>,
    handlers: HandlerTable<CycleNotice>,
    rules: Vec<WiringRule>,
}

impl<P> PipelineBuilder<P>
where
    P: Clone + Send + Sync + 'static,
{
    pub fn with_config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// Declare a worker and provide its implementation
    pub fn with_worker(
        mut self,
        declaration: WorkerDeclaration,
        worker: impl Worker<P> + 'static,
    ) -> Self {
        self.workers.register(declaration.component_id.clone(), worker);
        self.declarations.push(declaration);
        self
    }

    /// Declare a worker without an implementation
    ///
    /// Enough for components that only appear as rule targets; validation
    /// fails if such a component ends up in the plan.
    pub fn with_declaration(mut self, declaration: WorkerDeclaration) -> Self {
        self.declarations.push(declaration);
        self
    }

    pub fn with_handler<F>(
        mut self,
        component_id: impl Into<ComponentId>,
        handler_name: impl Into<String>,
        handler: F,
        is_critical: bool,
    ) -> Self
    where
        F: Fn(&Event<CycleNotice>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.handlers
            .register(component_id, handler_name, handler, is_critical);
        self
    }

    pub fn with_rule(mut self, rule: WiringRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_rules(mut self, rules: impl IntoIterator<Item = WiringRule>) -> Self {
        self.rules.extend(rules);
        self
    }

    /// Validate the wiring, bind handlers and return a ready pipeline
    pub fn build(self) -> Result<Pipeline<P>, TickwireError> {
        let scheduler = ExecutionScheduler::new(Arc::clone(&self.bus), self.workers)
            .with_group(self.group.clone())
            .with_config(self.config);
        scheduler.rewire(&self.declarations, &self.rules)?;

        let subscriptions = bind_rules(
            &self.bus,
            &self.rules,
            &self.handlers,
            SubscriptionScope::Isolated(self.group.clone()),
        )?;

        info!(
            group = %self.group,
            components = scheduler.plan().len(),
            bindings = subscriptions.len(),
            "Pipeline ready"
        );

        Ok(Pipeline {
            group: self.group,
            bus: self.bus,
            scheduler,
            subscriptions,
        })
    }
}

/// A wired processing group
pub struct Pipeline<P>
where
    P: Clone + Send + Sync + 'static,
{
    group: GroupId,
    bus: Arc<EventBus<CycleNotice>>,
    scheduler: ExecutionScheduler<P>,
    subscriptions: Vec<SubscriptionId>,
}

impl<P> Pipeline<P>
where
    P: Clone + Send + Sync + 'static,
{
    pub fn builder(
        group: impl Into<GroupId>,
        bus: Arc<EventBus<CycleNotice>>,
    ) -> PipelineBuilder<P> {
        PipelineBuilder {
            group: group.into(),
            bus,
            config: SchedulerConfig::default(),
            declarations: Vec::new(),
            workers: WorkerSet::new(),
            handlers: HandlerTable::new(),
            rules: Vec::new(),
        }
    }

    pub fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        self.scheduler.run_cycle()
    }

    pub fn group(&self) -> &GroupId {
        &self.group
    }

    pub fn plan(&self) -> ExecutionPlan {
        self.scheduler.plan()
    }

    pub fn state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    pub fn scheduler(&self) -> &ExecutionScheduler<P> {
        &self.scheduler
    }

    pub fn subscriptions(&self) -> &[SubscriptionId] {
        &self.subscriptions
    }

    /// Unsubscribe every handler binding; safe to call more than once
    pub fn shutdown(&mut self) {
        if self.subscriptions.is_empty() {
            return;
        }
        unbind(&self.bus, &self.subscriptions);
        info!(group = %self.group, bindings = self.subscriptions.len(), "Pipeline shut down");
        self.subscriptions.clear();
    }
}

impl<P> Drop for Pipeline<P>
where
    P: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CycleContext;
    use crate::worker::worker_fn;
    use parking_lot::Mutex;
    use shared::ArtifactType;

    type Log = Arc<Mutex<Vec<String>>>;

    fn desk(group: &str, bus: &Arc<EventBus<CycleNotice>>, log: &Log) -> Pipeline<String> {
        let label = group.to_string();
        let sink = Arc::clone(log);

        Pipeline::builder(group, Arc::clone(bus))
            .with_worker(
                WorkerDeclaration::new("feed").producing("quotes"),
                worker_fn(move |ctx: &CycleContext<'_, String>| {
                    ctx.put("quotes", label.clone())?;
                    Ok(())
                }),
            )
            .with_worker(
                WorkerDeclaration::new("pricer").requiring("quotes"),
                worker_fn(|ctx: &CycleContext<'_, String>| {
                    ctx.get("quotes")?;
                    Ok(())
                }),
            )
            .with_handler(
                "pricer",
                "on_quotes",
                move |event: &Event<CycleNotice>| {
                    let group = event.payload().group.as_ref().map(|g| g.to_string());
                    sink.lock().push(group.unwrap_or_default());
                    Ok(())
                },
                false,
            )
            .with_rule(WiringRule::new("feed", "quotes.ready", "pricer", "on_quotes"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_pipeline_runs_and_routes_notices() {
        let bus = Arc::new(EventBus::new());
        let log: Log = Arc::default();
        let pipeline = desk("desk-a", &bus, &log);

        let report = pipeline.run_cycle().unwrap();

        assert_eq!(report.components_run, 2);
        assert_eq!(*log.lock(), vec!["desk-a"]);
        assert_eq!(
            pipeline
                .scheduler()
                .cache()
                .get(report.cycle_id, &ArtifactType::new("quotes"))
                .unwrap(),
            "desk-a"
        );
    }

    #[test]
    fn test_groups_do_not_share_caches_or_notices() {
        let bus = Arc::new(EventBus::new());
        let log_a: Log = Arc::default();
        let log_b: Log = Arc::default();
        let desk_a = desk("desk-a", &bus, &log_a);
        let desk_b = desk("desk-b", &bus, &log_b);

        desk_a.run_cycle().unwrap();
        desk_a.run_cycle().unwrap();
        desk_b.run_cycle().unwrap();

        assert_eq!(*log_a.lock(), vec!["desk-a", "desk-a"]);
        assert_eq!(*log_b.lock(), vec!["desk-b"]);
        assert_eq!(desk_a.scheduler().cache().current_cycle().map(|c| c.value()), Some(2));
        assert_eq!(desk_b.scheduler().cache().current_cycle().map(|c| c.value()), Some(1));
    }

    #[test]
    fn test_shutdown_unsubscribes_bindings() {
        let bus = Arc::new(EventBus::new());
        let log: Log = Arc::default();
        let mut pipeline = desk("desk-a", &bus, &log);
        assert_eq!(bus.subscribers_for("quotes.ready"), 1);

        pipeline.shutdown();
        pipeline.shutdown();
        assert_eq!(bus.subscription_count(), 0);

        drop(pipeline);
        let _other = desk("desk-b", &bus, &log);
        assert_eq!(bus.subscription_count(), 1);
    }

    #[test]
    fn test_build_fails_on_unbound_handler() {
        let bus = Arc::new(EventBus::new());
        let result = Pipeline::builder("desk-a", Arc::clone(&bus))
            .with_worker(
                WorkerDeclaration::new("feed").producing("quotes"),
                worker_fn(|_ctx: &CycleContext<'_, u32>| Ok(())),
            )
            .with_worker(
                WorkerDeclaration::new("pricer").requiring("quotes"),
                worker_fn(|_ctx: &CycleContext<'_, u32>| Ok(())),
            )
            .with_rule(WiringRule::new("feed", "quotes.ready", "pricer", "on_quotes"))
            .build();

        assert!(matches!(result, Err(TickwireError::UnboundHandler(_))));
        assert_eq!(bus.subscription_count(), 0);
    }
}
