//! The capability every database dialect must provide.

use async_trait::async_trait;

use crate::error::DriverError;
use crate::migration::Migration;

/// Default ledger table name.
pub const DEFAULT_MIGRATIONS_TABLE: &str = "ratchet_migrations";

/// Dialect-specific half of a migration run.
///
/// The runner calls `connect` exactly once per run before anything else, and
/// `close` on every exit path after a successful `connect`.
#[async_trait]
pub trait MigrationDriver: Send {
    /// Short dialect name used in log output.
    fn dialect(&self) -> &'static str;

    /// Open the connection.
    async fn connect(&mut self) -> Result<(), DriverError>;

    /// Create the ledger table if it does not exist yet.
    async fn ensure_migrations_table(&mut self) -> Result<(), DriverError>;

    /// Whether the ledger table exists, without creating it.
    async fn migrations_table_exists(&mut self) -> Result<bool, DriverError>;

    /// Highest applied version, 0 when the ledger is empty.
    async fn current_version(&mut self) -> Result<i64, DriverError>;

    /// Run the migration SQL and record it in the ledger as one atomic unit.
    ///
    /// On failure no ledger row for `migration.version` may be visible.
    async fn apply_migration(&mut self, migration: &Migration) -> Result<(), DriverError>;

    /// Release the connection. Safe to call when not connected.
    async fn close(&mut self) -> Result<(), DriverError>;
}
