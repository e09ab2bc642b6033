use anyhow::Result;
use clap::Parser;
use console::style;
use ratchet_core::config::TargetConfig;
use ratchet_core::logging::UnitLogger;
use ratchet_runtime::migrations::{load_migrations_from_dir, MigrationRunner, MigrationStatus};
use ratchet_runtime::{drivers, RunContext};
use tokio_util::sync::CancellationToken;

use super::CommonArgs;

/// Show current and pending versions per target.
#[derive(Parser)]
pub struct StatusCommand {
    #[command(flatten)]
    pub common: CommonArgs,
}

impl StatusCommand {
    pub async fn execute(self) -> Result<()> {
        let config = self.common.init()?;

        println!();
        println!(
            "  {}  {} Migration Status",
            style("⚙").bold(),
            style("ratchet").bold().cyan()
        );
        println!();

        let mut failures = 0;
        for target in &config.targets {
            let ctx = RunContext::with_timeout(CancellationToken::new(), config.timeout());
            match target_status(target, config.fixtures, &ctx).await {
                Ok(status) => print_status(&target.name, &status),
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
            println!();
        }

        if failures > 0 {
            anyhow::bail!("could not read status of {} target(s)", failures);
        }
        Ok(())
    }
}

async fn target_status(
    target: &TargetConfig,
    fixtures: bool,
    ctx: &RunContext,
) -> ratchet_core::Result<MigrationStatus> {
    let mut driver = drivers::from_config(target)?;
    let migrations = load_migrations_from_dir(&target.source, fixtures)?;
    let logger = UnitLogger::new(target.name.as_str());

    MigrationRunner::new(driver.as_mut(), &logger)
        .status(&migrations, ctx)
        .await
}

fn print_status(name: &str, status: &MigrationStatus) {
    let marker = if status.is_up_to_date() {
        style("✓").green()
    } else {
        style("○").yellow()
    };
    println!(
        "  {} {} {}",
        marker,
        style(name).cyan(),
        style(format!(
            "at version {} of {}",
            status.current_version, status.latest_version
        ))
        .dim()
    );

    for migration in &status.pending {
        let fixture = if migration.fixtures_sql.is_some() {
            style(" +fixture").dim().to_string()
        } else {
            String::new()
        };
        println!(
            "    {} {} {}{}",
            style("→").dim(),
            migration.version,
            style(&migration.name).yellow(),
            fixture
        );
    }
}
