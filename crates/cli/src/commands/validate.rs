//! tickwire validate command

use crate::manifest::Manifest;
use clap::Args;
use console::style;
use std::path::PathBuf;
use wiring::WiringValidator;

#[derive(Debug, Args)]
pub struct ValidateCommand {
    /// Manifest file (JSON or YAML)
    pub manifest: PathBuf,
}

impl ValidateCommand {
    pub fn run(&self) -> anyhow::Result<()> {
        let manifest = Manifest::from_file(&self.manifest)?;

        match WiringValidator::new().validate(&manifest.workers, &manifest.wiring) {
            Ok(plan) => {
                println!(
                    "{} {} components in {} levels",
                    style("✓ Wiring is valid:").green().bold(),
                    plan.len(),
                    plan.level_count()
                );
                Ok(())
            }
            Err(report) => {
                println!(
                    "{}",
                    style(format!("✗ {} issue(s) found", report.len())).red().bold()
                );
                for issue in &report.issues {
                    println!("  - {}", issue);
                }
                Err(report.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    fn manifest_file(yaml: &str) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_valid_manifest_passes() {
        let file = manifest_file(
            r#"
workers:
  - componentId: feed
    produces: [quotes]
  - componentId: pricer
    requires: [quotes]
wiring:
  - { sourceComponentId: feed, sourceEventName: quotes.ready, targetComponentId: pricer, targetHandlerName: on_quotes }
"#,
        );

        let cmd = ValidateCommand {
            manifest: file.path().to_path_buf(),
        };
        assert!(cmd.run().is_ok());
    }

    #[test]
    fn test_missing_producer_fails() {
        let file = manifest_file(
            r#"
workers:
  - componentId: clock
  - componentId: pricer
    requires: [quotes]
wiring:
  - { sourceComponentId: clock, sourceEventName: tick, targetComponentId: pricer, targetHandlerName: on_tick }
"#,
        );

        let cmd = ValidateCommand {
            manifest: file.path().to_path_buf(),
        };
        let err = cmd.run().unwrap_err();
        assert!(err.to_string().contains("requires 'quotes'"));
    }
}
