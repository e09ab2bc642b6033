//! Runs every configured target concurrently.
//!
//! Each target gets its own unit: resolve the driver, load the migrations,
//! then run them with retries inside one deadline. Units never affect each
//! other; the executor waits for all of them before reporting.

mod report;

pub use report::{ExecutionReport, TargetOutcome};

use std::sync::Arc;

use futures::future::join_all;
use ratchet_core::config::{RunConfig, TargetConfig};
use ratchet_core::error::{RatchetError, Result};
use ratchet_core::logging::UnitLogger;
use tokio_util::sync::CancellationToken;

use crate::context::RunContext;
use crate::drivers::{self, DriverFactory};
use crate::migrations::{load_migrations_from_dir, MigrationRunner};

/// Concurrent multi-target executor.
pub struct Executor {
    config: Arc<RunConfig>,
    factory: Arc<dyn DriverFactory>,
}

impl Executor {
    /// Create an executor that builds drivers from each target's configuration.
    pub fn new(config: RunConfig) -> Self {
        Self::with_factory(config, drivers::from_config)
    }

    /// Create an executor with a custom driver factory.
    pub fn with_factory(config: RunConfig, factory: impl DriverFactory + 'static) -> Self {
        Self {
            config: Arc::new(config),
            factory: Arc::new(factory),
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run every target and wait for all of them.
    ///
    /// Cancelling `shutdown` stops every unit at its next step.
    pub async fn execute_all(&self, shutdown: CancellationToken) -> ExecutionReport {
        tracing::info!(
            targets = self.config.targets.len(),
            timeout = ?self.config.timeout(),
            max_attempts = self.config.max_attempts(),
            "Starting migrations"
        );

        let handles: Vec<_> = self
            .config
            .targets
            .iter()
            .cloned()
            .map(|target| {
                let config = self.config.clone();
                let factory = self.factory.clone();
                let token = shutdown.child_token();
                tokio::spawn(async move { execute_target(&config, factory.as_ref(), target, token).await })
            })
            .collect();

        let outcomes = join_all(handles)
            .await
            .into_iter()
            .zip(&self.config.targets)
            .map(|(joined, target)| {
                joined.unwrap_or_else(|e| TargetOutcome {
                    target: target.name.clone(),
                    attempts: 0,
                    result: Err(RatchetError::Internal(format!("Task join error: {}", e))),
                })
            })
            .collect();

        let report = ExecutionReport { outcomes };
        if report.all_succeeded() {
            tracing::info!(applied = report.total_applied(), "All targets migrated");
        } else {
            tracing::error!(failed = ?report.failed_targets(), "Some targets failed to migrate");
        }
        report
    }
}

/// Run every target in `config`; true only if all of them succeed.
pub async fn execute_all(config: &RunConfig, shutdown: CancellationToken) -> bool {
    Executor::new(config.clone())
        .execute_all(shutdown)
        .await
        .all_succeeded()
}

async fn execute_target(
    config: &RunConfig,
    factory: &dyn DriverFactory,
    target: TargetConfig,
    token: CancellationToken,
) -> TargetOutcome {
    let logger = UnitLogger::new(target.name.as_str());
    let (attempts, result) = run_unit(config, factory, &target, token, &logger).await;

    match &result {
        Ok(applied) => logger.info(format_args!(
            "Migrated successfully ({} applied, {} attempt(s))",
            applied, attempts
        )),
        Err(e) => logger.error(format_args!("giving up after {} attempt(s): {}", attempts, e)),
    }

    TargetOutcome {
        target: target.name,
        attempts,
        result,
    }
}

async fn run_unit(
    config: &RunConfig,
    factory: &dyn DriverFactory,
    target: &TargetConfig,
    token: CancellationToken,
    logger: &UnitLogger,
) -> (u32, Result<usize>) {
    // The deadline covers driver resolution and loading as well as every attempt.
    let ctx = RunContext::with_timeout(token, config.timeout());

    // Configuration and load errors fail the same way every time: no retries.
    let mut driver = match factory.create(target) {
        Ok(driver) => driver,
        Err(e) => return (0, Err(e)),
    };

    let migrations = match load_migrations_from_dir(&target.source, config.fixtures) {
        Ok(migrations) => migrations,
        Err(e) => return (0, Err(e.into())),
    };

    logger.debug(format_args!(
        "Loaded {} migration(s) and {} fixture(s) from {}",
        migrations.len(),
        migrations.fixtures().count(),
        target.source
    ));
    let max_attempts = config.max_attempts();
    let mut attempt = 0;

    loop {
        attempt += 1;
        let attempt_logger = logger.for_attempt(attempt);

        let result = MigrationRunner::new(driver.as_mut(), &attempt_logger)
            .run(&migrations, &ctx)
            .await;

        let err = match result {
            Ok(applied) => return (attempt, Ok(applied)),
            Err(e) => e,
        };

        if !err.is_retryable() || attempt >= max_attempts {
            return (attempt, Err(err));
        }

        attempt_logger.warn(format_args!(
            "{}; retrying in {:?}",
            err,
            config.retry_delay()
        ));

        if let Err(e) = ctx.sleep(config.retry_delay()).await {
            return (attempt, Err(e));
        }
    }
}
