//! ratchet: forward-only versioned SQL migrations for many databases at once.
//!
//! Migrations are plain `<version>_<name>.sql` files. Every configured target
//! runs concurrently under its own deadline and retry budget, and each
//! applied file is recorded in a ledger table so later runs resume where the
//! last one stopped.

pub use ratchet_core;
pub use ratchet_runtime;

pub use ratchet_core::{
    Migration, MigrationDriver, MigrationSet, RatchetError, Result, RunConfig, TargetConfig,
};
pub use ratchet_runtime::{
    execute_all, load_migrations_from_dir, ExecutionReport, Executor, MigrationRunner, RunContext,
};
