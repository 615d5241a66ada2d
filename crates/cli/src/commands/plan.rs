//! tickwire plan command

use crate::manifest::Manifest;
use clap::{Args, ValueEnum};
use console::style;
use std::path::PathBuf;
use wiring::{DependencyGraph, WiringValidator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PlanFormat {
    /// One line per level
    Text,
    /// The plan as JSON
    Json,
    /// The full dependency graph in Graphviz DOT
    Dot,
}

#[derive(Debug, Args)]
pub struct PlanCommand {
    /// Manifest file (JSON or YAML)
    pub manifest: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: PlanFormat,
}

impl PlanCommand {
    pub fn run(&self) -> anyhow::Result<()> {
        let manifest = Manifest::from_file(&self.manifest)?;
        println!("{}", self.render(&manifest)?);
        Ok(())
    }

    fn render(&self, manifest: &Manifest) -> anyhow::Result<String> {
        if self.format == PlanFormat::Dot {
            return Ok(DependencyGraph::build(&manifest.workers)?.to_dot());
        }

        let plan = WiringValidator::new().validate(&manifest.workers, &manifest.wiring)?;

        match self.format {
            PlanFormat::Json => Ok(serde_json::to_string_pretty(&plan)?),
            _ => {
                let mut out = format!(
                    "{}\n",
                    style(format!(
                        "Execution plan: {} components, {} levels",
                        plan.len(),
                        plan.level_count()
                    ))
                    .bold()
                );
                out.push_str(&plan.to_string());
                Ok(out)
            }
        }
    }
}
