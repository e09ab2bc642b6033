//! Core types for ratchet: the migration model, the driver capability,
//! configuration, and the error taxonomy.

pub mod config;
pub mod driver;
pub mod error;
pub mod logging;
pub mod migration;

pub use config::{DriverSelection, PostgresConfig, RunConfig, SqliteConfig, TargetConfig};
pub use driver::{MigrationDriver, DEFAULT_MIGRATIONS_TABLE};
pub use error::{BoxError, DriverError, LoadError, RatchetError, Result};
pub use logging::UnitLogger;
pub use migration::{Migration, MigrationSet};
