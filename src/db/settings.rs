use sqlx::SqlitePool;

use crate::config::AppConfig;
use crate::errors::CostResult;

/// Key/value overrides consulted before the file and environment configuration.
pub struct SettingsRepo;

impl SettingsRepo {
    pub async fn get(pool: &SqlitePool, key: &str) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>("SELECT value FROM config WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await
    }

    /// Raw write with no key validation; callers go through [`SettingsRepo::store_override`].
    #[cfg(test)]
    pub async fn set(pool: &SqlitePool, key: &str, value: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"INSERT INTO config (key, value, updated_at)
               VALUES (?, ?, CURRENT_TIMESTAMP)
               ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP"#,
        )
        .bind(key)
        .bind(value)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Validates and stores an override under its canonical key, dropping alias rows.
    /// Returns the key the value was stored under.
    pub async fn store_override(pool: &SqlitePool, key: &str, value: &str) -> CostResult<String> {
        AppConfig::validate_override(key, value)?;
        let canonical = AppConfig::canonical_key(key);

        let mut tx = pool.begin().await?;
        sqlx::query(
            r#"INSERT INTO config (key, value, updated_at)
               VALUES (?, ?, CURRENT_TIMESTAMP)
               ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP"#,
        )
        .bind(canonical)
        .bind(value)
        .execute(&mut *tx)
        .await?;
        if canonical != key {
            sqlx::query("DELETE FROM config WHERE key = ?")
                .bind(key)
                .execute(&mut *tx)
                .await?;
        } else if canonical == "azure.subscription_id" {
            sqlx::query("DELETE FROM config WHERE key = 'subscription'")
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Ok(canonical.to_string())
    }

    pub async fn all(pool: &SqlitePool) -> Result<Vec<(String, String)>, sqlx::Error> {
        sqlx::query_as::<_, (String, String)>("SELECT key, value FROM config ORDER BY key")
            .fetch_all(pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn test_missing_key_is_none() {
        let pool = test_pool().await;
        assert_eq!(SettingsRepo::get(&pool, "subscription").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let pool = test_pool().await;
        SettingsRepo::set(&pool, "subscription", "first").await.unwrap();
        SettingsRepo::set(&pool, "subscription", "second").await.unwrap();
        SettingsRepo::set(&pool, "aws.region", "us-east-1").await.unwrap();

        assert_eq!(SettingsRepo::get(&pool, "subscription").await.unwrap().as_deref(), Some("second"));
        assert_eq!(
            SettingsRepo::all(&pool).await.unwrap(),
            vec![
                ("aws.region".to_string(), "us-east-1".to_string()),
                ("subscription".to_string(), "second".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_subscription_alias_collapses_to_one_row() {
        let pool = test_pool().await;
        SettingsRepo::set(&pool, "subscription", "legacy").await.unwrap();

        let key = SettingsRepo::store_override(&pool, "azure.subscription_id", "newer").await.unwrap();
        assert_eq!(key, "azure.subscription_id");
        assert_eq!(
            SettingsRepo::all(&pool).await.unwrap(),
            vec![("azure.subscription_id".to_string(), "newer".to_string())]
        );

        SettingsRepo::store_override(&pool, "subscription", "latest").await.unwrap();
        assert_eq!(SettingsRepo::get(&pool, "subscription").await.unwrap(), None);
        assert_eq!(
            SettingsRepo::get(&pool, "azure.subscription_id").await.unwrap().as_deref(),
            Some("latest")
        );
    }

    #[tokio::test]
    async fn test_store_override_rejects_bad_values() {
        let pool = test_pool().await;
        assert!(SettingsRepo::store_override(&pool, "trend.history_months", "six").await.is_err());
        assert!(SettingsRepo::store_override(&pool, "unknown.key", "x").await.is_err());
        assert!(SettingsRepo::all(&pool).await.unwrap().is_empty());
    }
}
