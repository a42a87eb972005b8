pub mod alerts;
pub mod costs;
pub mod settings;

pub use alerts::AlertRepo;
pub use costs::CostRepo;
pub use settings::SettingsRepo;

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

/// How long a writer waits for the single SQLite write lock before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens the on-disk store, creating its directory and file when missing.
///
/// WAL mode lets readers proceed while one writer commits; concurrent writers
/// queue on the busy timeout.
pub async fn open(path: &Path) -> anyhow::Result<SqlitePool> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

/// Every connection to `sqlite::memory:` is its own database, so the pool holds exactly one.
#[cfg(test)]
pub async fn open_in_memory() -> Result<SqlitePool, sqlx::Error> {
    let options: SqliteConnectOptions = "sqlite::memory:".parse()?;
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(include_str!("../../migrations/001_initial_schema.sql"))
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    open_in_memory().await.expect("in-memory store")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_creates_file_and_is_reopenable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("data.db");

        let pool = open(&path).await.unwrap();
        SettingsRepo::set(&pool, "subscription", "sub-1").await.unwrap();
        pool.close().await;
        assert!(path.exists());

        let reopened = open(&path).await.unwrap();
        assert_eq!(
            SettingsRepo::get(&reopened, "subscription").await.unwrap().as_deref(),
            Some("sub-1")
        );
    }
}
