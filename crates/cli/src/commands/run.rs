//! tickwire run command
//!
//! Simulates cycles of a manifest. Every worker writes a small JSON marker
//! for each artifact it produces after reading all of its inputs, and every
//! rule target gets a handler that counts deliveries.

use crate::manifest::Manifest;
use bus::{EventBus, SubscriptionScope};
use clap::Args;
use console::style;
use parking_lot::Mutex;
use scheduler::{
    worker_fn, CycleContext, CycleNotice, CycleReport, Pipeline, Worker, CYCLE_ABORTED,
};
use serde_json::{json, Value};
use shared::{ComponentId, GroupId, WorkerDeclaration};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Args)]
pub struct RunCommand {
    /// Manifest file (JSON or YAML)
    pub manifest: PathBuf,

    /// Number of cycles per group
    #[arg(short, long, default_value_t = 1)]
    pub cycles: u64,

    /// Processing group to run; repeat for several. Overrides the manifest.
    #[arg(short, long = "group")]
    pub groups: Vec<String>,

    /// Run the components of a level on separate threads
    #[arg(long)]
    pub parallel: bool,
}

/// Outcome of a simulation
#[derive(Debug, Default)]
pub struct SimulationSummary {
    pub reports: Vec<(GroupId, CycleReport)>,
    /// Handler deliveries per `component.handler`
    pub deliveries: BTreeMap<String, usize>,
}

impl RunCommand {
    pub fn run(&self) -> anyhow::Result<()> {
        let mut manifest = Manifest::from_file(&self.manifest)?;
        if !self.groups.is_empty() {
            manifest.groups = self.groups.iter().map(|g| GroupId::new(g.as_str())).collect();
        }
        if self.parallel {
            manifest.scheduler.parallel_levels = true;
        }

        let summary = simulate(&manifest, self.cycles)?;

        for (group, report) in &summary.reports {
            println!(
                "{} {} {}: {} components, {} notices, {:?}",
                style("✓").green(),
                style(group).cyan(),
                report.cycle_id,
                report.components_run,
                report.notices_published,
                report.duration
            );
        }
        if !summary.deliveries.is_empty() {
            println!("{}", style("Deliveries:").bold());
            for (handler, count) in &summary.deliveries {
                println!("  {:<32} {}", handler, count);
            }
        }
        Ok(())
    }
}

/// Run `cycles` cycles for every group of the manifest on one shared bus
pub fn simulate(manifest: &Manifest, cycles: u64) -> anyhow::Result<SimulationSummary> {
    let bus: Arc<EventBus<CycleNotice>> = Arc::new(EventBus::with_config(&manifest.bus));
    let deliveries: Arc<Mutex<BTreeMap<String, usize>>> = Arc::default();

    bus.subscribe(
        CYCLE_ABORTED,
        |event| {
            warn!(
                cycle = %event.payload().cycle_id,
                reason = event.payload().reason.as_deref().unwrap_or("unknown"),
                "Cycle aborted"
            );
            Ok(())
        },
        SubscriptionScope::all_groups(),
        false,
    )?;

    let groups = if manifest.groups.is_empty() {
        vec![GroupId::new("default")]
    } else {
        manifest.groups.clone()
    };

    let mut pipelines = Vec::with_capacity(groups.len());
    for group in groups {
        pipelines.push(build_pipeline(manifest, group, &bus, &deliveries)?);
    }

    let mut summary = SimulationSummary::default();
    for _ in 0..cycles {
        for pipeline in &pipelines {
            let report = pipeline.run_cycle()?;
            summary.reports.push((pipeline.group().clone(), report));
        }
    }

    let failures = bus.failure_stats();
    if failures.total_recorded > 0 {
        warn!(
            failures = failures.total_recorded,
            "Non-critical handler failures during simulation"
        );
    }

    summary.deliveries = deliveries.lock().clone();
    Ok(summary)
}

fn build_pipeline(
    manifest: &Manifest,
    group: GroupId,
    bus: &Arc<EventBus<CycleNotice>>,
    deliveries: &Arc<Mutex<BTreeMap<String, usize>>>,
) -> anyhow::Result<Pipeline<Value>> {
    let mut builder = Pipeline::builder(group, Arc::clone(bus))
        .with_config(manifest.scheduler.clone())
        .with_rules(manifest.wiring.iter().cloned());

    for declaration in &manifest.workers {
        builder = builder.with_worker(declaration.clone(), marker_worker(declaration));
    }

    for rule in &manifest.wiring {
        let key = format!("{}.{}", rule.target_component_id, rule.target_handler_name);
        let sink = Arc::clone(deliveries);
        builder = builder.with_handler(
            rule.target_component_id.clone(),
            rule.target_handler_name.clone(),
            move |event| {
                debug!(handler = %key, event = event.name(), "Delivered");
                *sink.lock().entry(key.clone()).or_default() += 1;
                Ok(())
            },
            false,
        );
    }

    Ok(builder.build()?)
}

/// Worker that reads every input and writes a marker for every output
fn marker_worker(declaration: &WorkerDeclaration) -> impl Worker<Value> {
    let component: ComponentId = declaration.component_id.clone();
    let requires = declaration.requires.clone();
    let produces = declaration.produces.clone();

    worker_fn(move |ctx: &CycleContext<'_, Value>| {
        let mut inputs = serde_json::Map::new();
        for artifact in &requires {
            inputs.insert(artifact.to_string(), ctx.get(artifact.clone())?);
        }
        for artifact in &produces {
            ctx.put(
                artifact.clone(),
                json!({
                    "component": component.as_str(),
                    "cycle": ctx.cycle_id().value(),
                    "inputs": inputs.len(),
                }),
            )?;
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::WiringRule;

    fn manifest() -> Manifest {
        Manifest {
            workers: vec![
                WorkerDeclaration::new("feed").producing("quotes"),
                WorkerDeclaration::new("pricer").requiring("quotes").producing("prices"),
                WorkerDeclaration::new("risk").requiring("prices"),
            ],
            wiring: vec![
                WiringRule::new("feed", "quotes.ready", "pricer", "on_quotes"),
                WiringRule::new("pricer", "prices.ready", "risk", "on_prices"),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_simulation_runs_every_cycle() {
        let summary = simulate(&manifest(), 3).unwrap();

        assert_eq!(summary.reports.len(), 3);
        assert_eq!(summary.reports[2].1.cycle_id.value(), 3);
        assert_eq!(summary.reports[0].1.components_run, 3);
        assert_eq!(summary.deliveries.get("pricer.on_quotes"), Some(&3));
        assert_eq!(summary.deliveries.get("risk.on_prices"), Some(&3));
    }

    #[test]
    fn test_groups_get_their_own_pipelines() {
        let mut manifest = manifest();
        manifest.groups = vec![GroupId::new("desk-a"), GroupId::new("desk-b")];
        manifest.scheduler.parallel_levels = true;

        let summary = simulate(&manifest, 2).unwrap();

        assert_eq!(summary.reports.len(), 4);
        // Each group's handlers only hear their own group's notices
        assert_eq!(summary.deliveries.get("pricer.on_quotes"), Some(&4));
    }

    #[test]
    fn test_invalid_manifest_does_not_run() {
        let mut manifest = manifest();
        manifest.workers.remove(0);

        assert!(simulate(&manifest, 1).is_err());
    }
}
