use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgConnection;
use sqlx::Connection;

use ratchet_core::config::PostgresConfig;
use ratchet_core::driver::MigrationDriver;
use ratchet_core::error::DriverError;
use ratchet_core::migration::Migration;

/// PostgreSQL driver over a single sqlx connection.
pub struct PostgresDriver {
    dsn: String,
    table: String,
    conn: Option<PgConnection>,
}

impl PostgresDriver {
    pub fn new(config: &PostgresConfig) -> Self {
        Self {
            dsn: config.dsn.clone(),
            table: config.table.clone(),
            conn: None,
        }
    }

    /// Ledger table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    fn conn(&mut self) -> Result<&mut PgConnection, DriverError> {
        self.conn.as_mut().ok_or(DriverError::NotConnected)
    }
}

#[async_trait]
impl MigrationDriver for PostgresDriver {
    fn dialect(&self) -> &'static str {
        "postgres"
    }

    async fn connect(&mut self) -> Result<(), DriverError> {
        let conn = PgConnection::connect(&self.dsn)
            .await
            .map_err(|e| DriverError::Connection(e.into()))?;
        self.conn = Some(conn);
        Ok(())
    }

    async fn ensure_migrations_table(&mut self) -> Result<(), DriverError> {
        let ddl = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                version BIGINT PRIMARY KEY,
                name VARCHAR(255) NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
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
        sqlx::query_scalar::<_, bool>("SELECT to_regclass($1) IS NOT NULL")
            .bind(table)
            .fetch_one(self.conn()?)
            .await
            .map_err(|e| DriverError::VersionQuery(e.into()))
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
            "INSERT INTO {} (version, name, applied_at) VALUES ($1, $2, $3)",
            self.table
        );

        // Schema change and ledger row commit together; dropping `tx` rolls back.
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
