use anyhow::Result;
use clap::Parser;
use console::style;
use ratchet_runtime::Executor;
use tokio_util::sync::CancellationToken;

use super::CommonArgs;

/// Apply pending migrations to every target.
#[derive(Parser)]
pub struct MigrateCommand {
    #[command(flatten)]
    pub common: CommonArgs,
}

impl MigrateCommand {
    pub async fn execute(self) -> Result<()> {
        let config = self.common.init()?;

        println!();
        println!(
            "  {}  {} v{}",
            style("⚙").bold(),
            style("ratchet").bold().cyan(),
            env!("CARGO_PKG_VERSION")
        );
        println!();
        println!(
            "  {} Migrating {} target(s)...",
            style("→").dim(),
            config.targets.len()
        );
        println!();

        let shutdown = CancellationToken::new();
        let signal = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, cancelling migrations");
                signal.cancel();
            }
        });

        let report = Executor::new(config).execute_all(shutdown).await;

        for outcome in &report.outcomes {
            match &outcome.result {
                Ok(applied) => println!(
                    "  {} {} {}",
                    style("✓").green(),
                    style(&outcome.target).cyan(),
                    style(format!("{} applied", applied)).dim()
                ),
                Err(e) => println!(
                    "  {} {} {}",
                    style("✗").red(),
                    style(&outcome.target).cyan(),
                    style(e).red()
                ),
            }
        }
        println!();

        let failed = report.failed_targets();
        if !failed.is_empty() {
            anyhow::bail!("{} target(s) failed: {}", failed.len(), failed.join(", "));
        }

        println!(
            "  {} Migrations complete ({} applied)",
            style("✓").green(),
            report.total_applied()
        );
        println!();
        Ok(())
    }
}
