//! Dialect drivers and configuration-driven driver selection.

mod postgres;
mod sqlite;

pub use postgres::PostgresDriver;
pub use sqlite::SqliteDriver;

use ratchet_core::config::{DriverSelection, TargetConfig};
use ratchet_core::driver::MigrationDriver;
use ratchet_core::error::{RatchetError, Result};

/// Builds the driver for a target.
pub trait DriverFactory: Send + Sync {
    fn create(&self, target: &TargetConfig) -> Result<Box<dyn MigrationDriver>>;
}

impl<F> DriverFactory for F
where
    F: Fn(&TargetConfig) -> Result<Box<dyn MigrationDriver>> + Send + Sync,
{
    fn create(&self, target: &TargetConfig) -> Result<Box<dyn MigrationDriver>> {
        self(target)
    }
}

/// Pick the driver named by the target's configuration.
pub fn from_config(target: &TargetConfig) -> Result<Box<dyn MigrationDriver>> {
    match target.driver() {
        Some(DriverSelection::Postgres(config)) => Ok(Box::new(PostgresDriver::new(config))),
        Some(DriverSelection::Sqlite(config)) => Ok(Box::new(SqliteDriver::new(config))),
        None => Err(RatchetError::Config(format!(
            "[{}] failed to resolve driver: exactly one driver must be configured",
            target.name
        ))),
    }
}
