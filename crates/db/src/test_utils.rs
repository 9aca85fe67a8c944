//! Test utilities for database operations.
//!
//! [`TestDatabase::sqlite`] gives every test its own migrated in-memory
//! database. [`TestDatabase::sqlite_file`] backs it with a WAL-mode file so a
//! pool of connections can race each other. [`TestDatabase::postgres`]
//! targets a real server configured through `TEST_DB_*` environment
//! variables.

use std::path::PathBuf;
use std::sync::Arc;

use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, DbErr,
    Statement,
};
use sea_orm_migration::MigratorTrait;
use tracing::info;
use vidshare_common::IdGenerator;

use crate::migrations::Migrator;

/// Tables in delete order (children first).
const TABLES: [&str; 5] = ["reaction", "watch_history", "comment", "video", "user"];

/// Test database configuration.
#[derive(Debug, Clone)]
pub struct TestDbConfig {
    /// Database host.
    pub host: String,
    /// Database port.
    pub port: u16,
    /// Database username.
    pub username: String,
    /// Database password.
    pub password: String,
    /// Database name.
    pub database: String,
}

impl Default for TestDbConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("TEST_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("TEST_DB_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5433),
            username: std::env::var("TEST_DB_USER")
                .unwrap_or_else(|_| "vidshare_test".to_string()),
            password: std::env::var("TEST_DB_PASSWORD")
                .unwrap_or_else(|_| "vidshare_test".to_string()),
            database: std::env::var("TEST_DB_NAME")
                .unwrap_or_else(|_| "vidshare_test".to_string()),
        }
    }
}

impl TestDbConfig {
    /// Get the database URL.
    #[must_use]
    pub fn database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database
        )
    }
}

/// A migrated database for tests.
pub struct TestDatabase {
    conn: Arc<DatabaseConnection>,
    /// Backing file, removed on drop
    file: Option<PathBuf>,
}

impl TestDatabase {
    /// Fresh in-memory `SQLite` database with all migrations applied.
    ///
    /// The pool holds exactly one connection so every query sees the same
    /// in-memory database; concurrent transactions queue on it.
    pub async fn sqlite() -> Result<Self, DbErr> {
        let mut opt = ConnectOptions::new("sqlite::memory:");
        opt.max_connections(1)
            .min_connections(1)
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;
        Migrator::up(&conn, None).await?;

        Ok(Self {
            conn: Arc::new(conn),
            file: None,
        })
    }

    /// Fresh file-backed `SQLite` database served by up to `connections`
    /// pooled connections.
    ///
    /// The file is switched to WAL so readers don't block the writer; writers
    /// still serialize, waiting on the driver's busy timeout. Each connection
    /// runs its own transactions, so concurrent callers genuinely interleave.
    pub async fn sqlite_file(connections: u32) -> Result<Self, DbErr> {
        let path = std::env::temp_dir().join(format!(
            "vidshare-test-{}.db",
            IdGenerator::new().generate()
        ));
        let url = format!("sqlite://{}?mode=rwc", path.display());

        // Journal mode is stored in the file, so set it up once before pooling.
        let mut setup = ConnectOptions::new(url.clone());
        setup.max_connections(1).min_connections(1).sqlx_logging(false);
        let conn = Database::connect(setup).await?;
        conn.query_one(Statement::from_string(
            DatabaseBackend::Sqlite,
            "PRAGMA journal_mode=WAL".to_string(),
        ))
        .await?;
        Migrator::up(&conn, None).await?;
        conn.close().await?;

        let mut opt = ConnectOptions::new(url);
        opt.max_connections(connections.max(1))
            .min_connections(1)
            .sqlx_logging(false);
        let conn = Database::connect(opt).await?;

        Ok(Self {
            conn: Arc::new(conn),
            file: Some(path),
        })
    }

    /// Connect to the configured `PostgreSQL` test database and migrate it.
    pub async fn postgres(config: &TestDbConfig) -> Result<Self, DbErr> {
        let conn = Database::connect(&config.database_url()).await?;
        Migrator::up(&conn, None).await?;

        info!(database = %config.database, "Connected to test database");

        Ok(Self {
            conn: Arc::new(conn),
            file: None,
        })
    }

    /// Get the database connection.
    #[must_use]
    pub fn connection(&self) -> &DatabaseConnection {
        self.conn.as_ref()
    }

    /// Shared handle, as repositories expect it.
    #[must_use]
    pub fn shared(&self) -> Arc<DatabaseConnection> {
        Arc::clone(&self.conn)
    }

    /// Delete every row, keeping the schema.
    pub async fn cleanup(&self) -> Result<(), DbErr> {
        let backend = self.conn.get_database_backend();
        for table in TABLES {
            let sql = format!("DELETE FROM \"{table}\"");
            self.conn
                .execute(sea_orm::Statement::from_string(backend, sql))
                .await?;
        }
        info!("Cleaned up test database");
        Ok(())
    }
}

impl Drop for TestDatabase {
    fn drop(&mut self) {
        if let Some(path) = self.file.take() {
            for suffix in ["", "-wal", "-shm"] {
                let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
            }
        }
    }
}
