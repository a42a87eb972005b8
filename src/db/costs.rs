use std::collections::BTreeMap;

use chrono::NaiveDate;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use crate::models::{CostFilter, CostRecord, GroupBy, MonthlyCost, NewCostRecord, DEFAULT_CURRENCY, UNASSIGNED};

pub struct CostRepo;

/// Appends the filter's predicates. Unset fields impose no constraint.
fn push_conditions(qb: &mut QueryBuilder<'_, Sqlite>, filter: &CostFilter) {
    qb.push(" WHERE 1=1");
    if let Some(start) = filter.start_date {
        qb.push(" AND date >= ").push_bind(start);
    }
    if let Some(end) = filter.end_date {
        qb.push(" AND date <= ").push_bind(end);
    }
    if let Some(service) = &filter.service_name {
        qb.push(" AND service_name = ").push_bind(service.clone());
    }
}

async fn insert_record(conn: &mut SqliteConnection, record: &NewCostRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO cost_records (subscription_id, resource_group, service_name, cost, currency, date)
           VALUES (?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&record.subscription_id)
    .bind(&record.resource_group)
    .bind(&record.service_name)
    .bind(record.cost)
    .bind(&record.currency)
    .bind(record.date)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

impl CostRepo {
    /// Inserts the whole batch in one transaction; any failed row rolls back every row.
    #[allow(dead_code)]
    pub async fn create_batch(pool: &SqlitePool, records: &[NewCostRecord]) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;
        for record in records {
            insert_record(&mut *tx, record).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Replaces one account's rows within `[start, end]` with `records`, atomically.
    pub async fn replace_period(
        pool: &SqlitePool,
        subscription_id: &str,
        start: NaiveDate,
        end: NaiveDate,
        records: &[NewCostRecord],
    ) -> Result<u64, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let removed = sqlx::query(
            "DELETE FROM cost_records WHERE subscription_id = ? AND date >= ? AND date <= ?",
        )
        .bind(subscription_id)
        .bind(start)
        .bind(end)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        for record in records {
            insert_record(&mut *tx, record).await?;
        }
        tx.commit().await?;
        Ok(removed)
    }

    pub async fn get_records(pool: &SqlitePool, filter: &CostFilter) -> Result<Vec<CostRecord>, sqlx::Error> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT id, subscription_id, resource_group, service_name, cost, currency, date FROM cost_records",
        );
        push_conditions(&mut qb, filter);
        qb.push(" ORDER BY date DESC, id DESC");
        qb.build_query_as::<CostRecord>().fetch_all(pool).await
    }

    /// Grouped `SUM(cost)` over the filter's dimension (service name when unset).
    pub async fn aggregate(pool: &SqlitePool, filter: &CostFilter) -> Result<BTreeMap<String, f64>, sqlx::Error> {
        let col = filter.group_by.unwrap_or(GroupBy::ServiceName).column();
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT COALESCE(NULLIF({col}, ''), '{UNASSIGNED}') AS name, SUM(cost) AS total FROM cost_records"
        ));
        push_conditions(&mut qb, filter);
        qb.push(" GROUP BY name");

        let rows: Vec<(String, f64)> = qb.build_query_as().fetch_all(pool).await?;
        Ok(rows.into_iter().collect())
    }

    pub async fn period_total(pool: &SqlitePool, filter: &CostFilter) -> Result<f64, sqlx::Error> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COALESCE(SUM(cost), 0.0) FROM cost_records");
        push_conditions(&mut qb, filter);
        qb.build_query_scalar::<f64>().fetch_one(pool).await
    }

    pub async fn daily_totals(pool: &SqlitePool, filter: &CostFilter) -> Result<Vec<(NaiveDate, f64)>, sqlx::Error> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT date, SUM(cost) AS total FROM cost_records");
        push_conditions(&mut qb, filter);
        qb.push(" GROUP BY date ORDER BY date");
        qb.build_query_as().fetch_all(pool).await
    }

    pub async fn monthly_totals(pool: &SqlitePool, filter: &CostFilter) -> Result<Vec<MonthlyCost>, sqlx::Error> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT substr(date, 1, 7) AS month, SUM(cost) AS total_cost, MAX(currency) AS currency FROM cost_records",
        );
        push_conditions(&mut qb, filter);
        qb.push(" GROUP BY month ORDER BY month");

        let rows: Vec<(String, f64, Option<String>)> = qb.build_query_as().fetch_all(pool).await?;
        Ok(rows
            .into_iter()
            .map(|(month, total_cost, currency)| MonthlyCost {
                month,
                total_cost,
                currency: currency.unwrap_or_else(|| DEFAULT_CURRENCY.into()),
            })
            .collect())
    }

    /// Currency of the most recent matching record.
    pub async fn latest_currency(pool: &SqlitePool, filter: &CostFilter) -> Result<Option<String>, sqlx::Error> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT currency FROM cost_records");
        push_conditions(&mut qb, filter);
        qb.push(" ORDER BY date DESC, id DESC LIMIT 1");
        qb.build_query_scalar::<String>().fetch_optional(pool).await
    }
}
