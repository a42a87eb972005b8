use sqlx::SqlitePool;

use crate::models::{Alert, CreateAlertRequest};

pub struct AlertRepo;

impl AlertRepo {
    pub async fn list(pool: &SqlitePool) -> Result<Vec<Alert>, sqlx::Error> {
        sqlx::query_as::<_, Alert>(
            "SELECT id, name, threshold, subscription_id, enabled FROM alerts ORDER BY id",
        )
        .fetch_all(pool)
        .await
    }

    pub async fn create(pool: &SqlitePool, req: &CreateAlertRequest, subscription_id: &str) -> Result<Alert, sqlx::Error> {
        sqlx::query_as::<_, Alert>(
            r#"INSERT INTO alerts (name, threshold, subscription_id, enabled)
               VALUES (?, ?, ?, ?)
               RETURNING id, name, threshold, subscription_id, enabled"#,
        )
        .bind(&req.name)
        .bind(req.threshold)
        .bind(subscription_id)
        .bind(req.enabled)
        .fetch_one(pool)
        .await
    }

    /// Removes every alert with this name. Deleting an unknown name succeeds with 0 rows.
    pub async fn delete_by_name(pool: &SqlitePool, name: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM alerts WHERE name = ?")
            .bind(name)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn set_enabled(pool: &SqlitePool, name: &str, enabled: bool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE alerts SET enabled = ? WHERE name = ?")
            .bind(enabled)
            .bind(name)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
