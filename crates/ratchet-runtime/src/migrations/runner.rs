//! Sequential, resumable migration runner.
//!
//! The ledger's highest version is used as an offset into the sorted set:
//! entry `i` is version `i + 1`, so a ledger at version `v` skips the first
//! `v` entries. This holds because migrations apply strictly in order and the
//! first failure stops the run, so the ledger never has gaps.

use std::time::Duration;

use ratchet_core::driver::MigrationDriver;
use ratchet_core::error::{RatchetError, Result};
use ratchet_core::logging::UnitLogger;
use ratchet_core::migration::{Migration, MigrationSet};

use crate::context::RunContext;

/// Upper bound on releasing the connection at the end of a run.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Pending work for one target.
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    /// Highest version recorded in the ledger.
    pub current_version: i64,
    /// Highest version in the migration set.
    pub latest_version: i64,
    /// Migrations a run would apply, in order.
    pub pending: Vec<Migration>,
}

impl MigrationStatus {
    pub fn is_up_to_date(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Applies a migration set to one target through its driver.
pub struct MigrationRunner<'a> {
    driver: &'a mut dyn MigrationDriver,
    logger: &'a UnitLogger,
    close_timeout: Duration,
}

impl<'a> MigrationRunner<'a> {
    pub fn new(driver: &'a mut dyn MigrationDriver, logger: &'a UnitLogger) -> Self {
        Self {
            driver,
            logger,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }

    /// Override how long `close` may take before it is abandoned.
    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    /// Apply every pending migration and return how many were applied.
    ///
    /// Stops at the first failure; everything before it stays committed.
    pub async fn run(&mut self, migrations: &MigrationSet, ctx: &RunContext) -> Result<usize> {
        let migrations = self.prepare(migrations);

        self.connect(ctx).await?;
        let result = self.apply_pending(&migrations, ctx).await;
        self.close().await;

        result
    }

    /// Report current and pending versions without applying anything.
    ///
    /// Read-only: a target without a ledger table reports version 0 and the
    /// table is not created.
    pub async fn status(
        &mut self,
        migrations: &MigrationSet,
        ctx: &RunContext,
    ) -> Result<MigrationStatus> {
        let migrations = self.prepare(migrations);

        self.connect(ctx).await?;
        let result = self.ledger_version(ctx).await;
        self.close().await;

        let current_version = result?;
        Ok(MigrationStatus {
            current_version,
            latest_version: migrations.latest_version(),
            pending: pending(&migrations, current_version).to_vec(),
        })
    }

    fn prepare(&self, migrations: &MigrationSet) -> MigrationSet {
        let sorted = migrations.sorted();
        if !sorted.is_contiguous() {
            self.logger.warn(
                "Migration versions are not contiguous from 1; pending migrations are \
                 selected by position, not by version",
            );
        }
        sorted
    }

    async fn connect(&mut self, ctx: &RunContext) -> Result<()> {
        ctx.check()?;
        self.logger
            .debug(format_args!("Connecting ({})", self.driver.dialect()));

        let driver = &mut *self.driver;
        ctx.guard(async { driver.connect().await.map_err(RatchetError::from) })
            .await
    }

    async fn close(&mut self) {
        let limit = self.close_timeout;
        match tokio::time::timeout(limit, self.driver.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => self.logger.warn(format_args!("{}", e)),
            Err(_) => self.logger.warn(format_args!(
                "Closing the connection did not finish within {:?}; abandoning it",
                limit
            )),
        }
    }

    async fn ledger_version(&mut self, ctx: &RunContext) -> Result<i64> {
        let driver = &mut *self.driver;
        ctx.guard(async {
            if !driver
                .migrations_table_exists()
                .await
                .map_err(RatchetError::from)?
            {
                return Ok(0);
            }
            driver.current_version().await.map_err(RatchetError::from)
        })
        .await
    }

    async fn current_version(&mut self, ctx: &RunContext) -> Result<i64> {
        let driver = &mut *self.driver;
        ctx.guard(async {
            driver
                .ensure_migrations_table()
                .await
                .map_err(RatchetError::from)?;
            driver.current_version().await.map_err(RatchetError::from)
        })
        .await
    }

    async fn apply_pending(&mut self, migrations: &MigrationSet, ctx: &RunContext) -> Result<usize> {
        let current = self.current_version(ctx).await?;

        self.logger.info(format_args!(
            "Current version: {}, latest version: {}",
            current,
            migrations.latest_version()
        ));

        let mut applied = 0;
        for migration in pending(migrations, current) {
            ctx.check()?;

            self.logger.info(format_args!(
                "Applying migration: '{}' (version: {})",
                migration.name, migration.version
            ));

            let started = std::time::Instant::now();
            let driver = &mut *self.driver;
            ctx.guard(async {
                driver
                    .apply_migration(migration)
                    .await
                    .map_err(RatchetError::from)
            })
            .await?;
            applied += 1;

            self.logger.debug(format_args!(
                "Migration {} applied in {:?}",
                migration.version,
                started.elapsed()
            ));
        }

        Ok(applied)
    }
}

/// The entries after the first `current` ones of a sorted set.
fn pending(migrations: &MigrationSet, current: i64) -> &[Migration] {
    let skip = usize::try_from(current).unwrap_or(0);
    migrations.as_slice().get(skip..).unwrap_or(&[])
}
