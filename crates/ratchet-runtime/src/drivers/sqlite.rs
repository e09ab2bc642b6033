use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteConnection;
use sqlx::Connection;

use ratchet_core::config::SqliteConfig;
use ratchet_core::driver::MigrationDriver;
use ratchet_core::error::DriverError;
use ratchet_core::migration::Migration;

/// SQLite driver over a single sqlx connection.
pub struct SqliteDriver {
    dsn: String,
    table: String,
    conn: Option<SqliteConnection>,
}

impl SqliteDriver {
    pub fn new(config: &SqliteConfig) -> Self {
        Self {
            dsn: config.dsn.clone(),
            table: config.table.clone(),
            conn: None,
        }
    }

    fn conn(&mut self) -> Result<&mut SqliteConnection, DriverError> {
        self.conn.as_mut().ok_or(DriverError::NotConnected)
    }
}

#[async_trait]
impl MigrationDriver for SqliteDriver {
    fn dialect(&self) -> &'static str {
        "sqlite"
    }

    async fn connect(&mut self) -> Result<(), DriverError> {
        let conn = SqliteConnection::connect(&self.dsn)
            .await
            .map_err(|e| DriverError::Connection(e.into()))?;
        self.conn = Some(conn);
        Ok(())
    }

    async fn ensure_migrations_table(&mut self) -> Result<(), DriverError> {
        let ddl = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL
            )
            "#,
            self.table
        );

        sqlx::query(&ddl)
            .execute(self.conn()?)
            .await
            .map_err(|e| DriverError::TableSetup(e.into()))?;
        Ok(())
    }

    async fn migrations_table_exists(&mut self) -> Result<bool, DriverError> {
        let table = self.table.clone();
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table)
        .fetch_one(self.conn()?)
        .await
        .map_err(|e| DriverError::VersionQuery(e.into()))?;
        Ok(count > 0)
    }

    async fn current_version(&mut self) -> Result<i64, DriverError> {
        let query = format!("SELECT COALESCE(MAX(version), 0) FROM {}", self.table);

        sqlx::query_scalar::<_, i64>(&query)
            .fetch_one(self.conn()?)
            .await
            .map_err(|e| DriverError::VersionQuery(e.into()))
    }

    async fn apply_migration(&mut self, migration: &Migration) -> Result<(), DriverError> {
        let record = format!(
            "INSERT INTO {} (version, name, applied_at) VALUES (?, ?, ?)",
            self.table
        );

        let mut tx = self
            .conn()?
            .begin()
            .await
            .map_err(|e| DriverError::apply(migration, e))?;

        sqlx::Executor::execute(&mut *tx, sqlx::raw_sql(&migration.sql))
            .await
            .map_err(|e| DriverError::apply(migration, e))?;

        sqlx::query(&record)
            .bind(migration.version)
            .bind(&migration.name)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await
            .map_err(|e| DriverError::apply(migration, e))?;

        tx.commit()
            .await
            .map_err(|e| DriverError::apply(migration, e))
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        match self.conn.take() {
            Some(conn) => conn.close().await.map_err(|e| DriverError::Close(e.into())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn driver_for(dir: &TempDir) -> SqliteDriver {
        let path = dir.path().join("ledger.db");
        SqliteDriver::new(&SqliteConfig::new(format!(
            "sqlite://{}?mode=rwc",
            path.display()
        )))
    }

    async fn table_exists(driver: &mut SqliteDriver, name: &str) -> bool {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(name)
        .fetch_one(driver.conn().unwrap())
        .await
        .unwrap();
        count > 0
    }

    #[tokio::test]
    async fn test_ensure_table_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut driver = driver_for(&dir);

        driver.connect().await.unwrap();
        driver.ensure_migrations_table().await.unwrap();
        driver.ensure_migrations_table().await.unwrap();
        assert_eq!(driver.current_version().await.unwrap(), 0);
        driver.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_apply_records_version() {
        let dir = TempDir::new().unwrap();
        let mut driver = driver_for(&dir);

        driver.connect().await.unwrap();
        driver.ensure_migrations_table().await.unwrap();
        driver
            .apply_migration(&Migration::new(
                1,
                "create_users.sql",
                "CREATE TABLE users (id INTEGER PRIMARY KEY); CREATE INDEX idx_users ON users(id);",
            ))
            .await
            .unwrap();

        assert_eq!(driver.current_version().await.unwrap(), 1);
        assert!(table_exists(&mut driver, "users").await);

        let name: String = sqlx::query_scalar("SELECT name FROM ratchet_migrations WHERE version = 1")
            .fetch_one(driver.conn().unwrap())
            .await
            .unwrap();
        assert_eq!(name, "create_users.sql");
        driver.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_apply_leaves_nothing_behind() {
        let dir = TempDir::new().unwrap();
        let mut driver = driver_for(&dir);

        driver.connect().await.unwrap();
        driver.ensure_migrations_table().await.unwrap();

        let broken = Migration::new(
            1,
            "half_done.sql",
            "CREATE TABLE half_done (id INTEGER); INSERT INTO missing_table VALUES (1);",
        );
        let err = driver.apply_migration(&broken).await.unwrap_err();
        assert_eq!(err.failed_version(), Some(1));
        driver.close().await.unwrap();

        // A fresh connection sees neither the table nor a ledger row.
        driver.connect().await.unwrap();
        assert_eq!(driver.current_version().await.unwrap(), 0);
        assert!(!table_exists(&mut driver, "half_done").await);
        driver.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_table_exists_check_does_not_create() {
        let dir = TempDir::new().unwrap();
        let mut driver = driver_for(&dir);

        driver.connect().await.unwrap();
        assert!(!driver.migrations_table_exists().await.unwrap());
        assert!(!driver.migrations_table_exists().await.unwrap());
        assert!(!table_exists(&mut driver, "ratchet_migrations").await);

        driver.ensure_migrations_table().await.unwrap();
        assert!(driver.migrations_table_exists().await.unwrap());
        driver.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_ledger_survives_reconnect() {
        let dir = TempDir::new().unwrap();
        let mut driver = driver_for(&dir);

        driver.connect().await.unwrap();
        driver.ensure_migrations_table().await.unwrap();
        for v in 1..=3 {
            driver
                .apply_migration(&Migration::new(v, format!("m{}.sql", v), "SELECT 1;"))
                .await
                .unwrap();
        }
        driver.close().await.unwrap();

        driver.connect().await.unwrap();
        assert_eq!(driver.current_version().await.unwrap(), 3);
        driver.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_close_without_connect() {
        let dir = TempDir::new().unwrap();
        let mut driver = driver_for(&dir);
        assert!(driver.close().await.is_ok());
    }

    #[tokio::test]
    async fn test_connect_failure() {
        let mut driver = SqliteDriver::new(&SqliteConfig::new(
            "sqlite:///nonexistent/dir/ledger.db?mode=ro",
        ));
        assert!(matches!(
            driver.connect().await,
            Err(DriverError::Connection(_))
        ));
    }
}
