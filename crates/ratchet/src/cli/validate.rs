use anyhow::Result;
use clap::Parser;
use console::style;
use ratchet_core::config::TargetConfig;
use ratchet_runtime::{drivers, load_migrations_from_dir};

use super::CommonArgs;

/// Check the configuration and migration files without connecting.
#[derive(Parser)]
pub struct ValidateCommand {
    #[command(flatten)]
    pub common: CommonArgs,
}

impl ValidateCommand {
    pub async fn execute(self) -> Result<()> {
        let config = self.common.init()?;
        let mut failures = 0;

        for target in &config.targets {
            match summarize(target, config.fixtures) {
                Ok(summary) => println!(
                    "  {} {} {}",
                    style("✓").green(),
                    style(&target.name).cyan(),
                    style(summary).dim()
                ),
                Err(e) => {
                    failures += 1;
                    println!(
                        "  {} {} {}",
                        style("✗").red(),
                        style(&target.name).cyan(),
                        style(e).red()
                    );
                }
            }
        }

        if failures > 0 {
            anyhow::bail!("{} target(s) are invalid", failures);
        }

        println!();
        println!("  {} Configuration is valid", style("✓").green());
        Ok(())
    }
}

/// Resolve the driver and load the migration set of one target.
fn summarize(target: &TargetConfig, fixtures: bool) -> ratchet_core::Result<String> {
    let dialect = drivers::from_config(target)?.dialect();
    let migrations = load_migrations_from_dir(&target.source, fixtures)?;

    let mut summary = format!(
        "{} migration(s) up to version {} ({})",
        migrations.len(),
        migrations.latest_version(),
        dialect
    );
    if fixtures {
        summary.push_str(&format!(", {} fixture(s)", migrations.fixtures().count()));
    }
    Ok(summary)
}
