pub mod context;
pub mod drivers;
pub mod executor;
pub mod migrations;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use context::RunContext;
pub use drivers::{DriverFactory, PostgresDriver, SqliteDriver};
pub use executor::{execute_all, ExecutionReport, Executor, TargetOutcome};
pub use migrations::{
    load_migrations, load_migrations_from_dir, DirSource, MemorySource, MigrationRunner,
    MigrationSource, MigrationStatus,
};
