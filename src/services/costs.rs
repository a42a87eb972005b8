//! Fetch, persist and derive cost views.
//!
//! Every operation reads from the store; only `fetch_and_store_costs` and
//! `get_current_costs` call the provider's actual-cost query.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use sqlx::SqlitePool;

use super::alerts;
use crate::cloud::BillingClient;
use crate::config::TrendConfig;
use crate::db::{AlertRepo, CostRepo};
use crate::errors::{CostError, CostResult};
use crate::ml::{forecast, trend};
use crate::models::{
    Alert, AlertCheck, AlertStatus, CostFilter, CostReport, CostSummary, CreateAlertRequest, Forecast,
    ForecastSource, Granularity, GroupBy, ServiceCost, TrendAnalysis, DEFAULT_CURRENCY,
};
use crate::period::{self, DateRange};

const LOCAL_FORECAST_WINDOW_DAYS: i64 = 90;
const TOP_SERVICES: usize = 5;

pub struct CostService {
    pool: SqlitePool,
    billing: Arc<dyn BillingClient>,
    trend: TrendConfig,
}

impl CostService {
    pub fn new(pool: SqlitePool, billing: Arc<dyn BillingClient>, trend: TrendConfig) -> Self {
        Self { pool, billing, trend }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn account_id(&self) -> &str {
        self.billing.account_id()
    }

    /// Pulls `[start, end]` from the provider and replaces the stored rows for that period.
    pub async fn fetch_and_store_costs(&self, start: NaiveDate, end: NaiveDate) -> CostResult<usize> {
        let subscription_id = self.billing.account_id().to_string();
        tracing::debug!(phase = "fetching", %subscription_id, %start, %end);
        let result = self.billing.query_costs(start, end, GroupBy::ServiceName).await?;

        tracing::debug!(phase = "normalizing", count = result.records.len());
        let records: Vec<_> = result
            .records
            .into_iter()
            .map(|line| line.into_record(&subscription_id))
            .collect();

        tracing::debug!(phase = "persisting", count = records.len());
        let replaced = CostRepo::replace_period(&self.pool, &subscription_id, start, end, &records).await?;

        tracing::info!(
            %subscription_id,
            count = records.len(),
            replaced,
            total_cost = result.total_cost,
            "stored cost records"
        );
        Ok(records.len())
    }

    pub async fn get_cost_summary(&self, filter: &CostFilter) -> CostResult<CostSummary> {
        tracing::debug!(phase = "aggregating", period = %filter.period_label());
        let by_service = CostRepo::aggregate(&self.pool, &filter.grouped(GroupBy::ServiceName)).await?;
        let by_resource_group = CostRepo::aggregate(&self.pool, &filter.grouped(GroupBy::ResourceGroup)).await?;
        let currency = CostRepo::latest_currency(&self.pool, filter)
            .await?
            .unwrap_or_else(|| DEFAULT_CURRENCY.into());

        Ok(CostSummary {
            period: filter.period_label(),
            total_cost: by_service.values().sum(),
            currency,
            by_service,
            by_resource_group,
            forecast: None,
            monthly_breakdown: None,
            trend: None,
        })
    }

    pub async fn get_current_costs(&self) -> CostResult<CostSummary> {
        self.current_costs_at(period::today()).await
    }

    /// Refreshes the month containing `today`, then summarizes it with a best-effort forecast.
    pub async fn current_costs_at(&self, today: NaiveDate) -> CostResult<CostSummary> {
        let month = period::current_month_range(today);
        self.fetch_and_store_costs(month.start, month.last_day()).await?;

        let mut summary = self.get_cost_summary(&range_filter(month)).await?;
        summary.forecast = self.best_effort_forecast().await;
        tracing::debug!(phase = "done", total_cost = summary.total_cost);
        Ok(summary)
    }

    pub async fn get_forecast(&self) -> CostResult<Forecast> {
        let result = self.billing.forecast(Granularity::Monthly).await?;
        Ok(Forecast {
            next_month: result.total_cost,
            confidence: "medium".into(),
            source: Some(ForecastSource::Provider),
        })
    }

    async fn best_effort_forecast(&self) -> Option<Forecast> {
        match self.get_forecast().await {
            Ok(forecast) => Some(forecast),
            Err(e) => {
                tracing::warn!(error = %e, "forecast unavailable");
                None
            }
        }
    }

    pub async fn get_local_forecast(&self) -> CostResult<Forecast> {
        self.local_forecast_at(period::today()).await
    }

    /// ETS forecast of next month from the stored daily totals of the trailing window.
    pub async fn local_forecast_at(&self, today: NaiveDate) -> CostResult<Forecast> {
        let window = DateRange {
            start: today - Duration::days(LOCAL_FORECAST_WINDOW_DAYS - 1),
            end: today + Duration::days(1),
        };
        let points = CostRepo::daily_totals(&self.pool, &range_filter(window)).await?;
        if points.is_empty() {
            return Err(forecast::ForecastError::InsufficientData {
                have: 0,
                need: forecast::MIN_DATA_POINTS,
            }
            .into());
        }

        let start = forecast::history_start(&points, window.start);
        let series = forecast::fill_daily_gaps(&points, start, window.end);
        let horizon = period::next_month_range(today).days() as usize;
        tracing::debug!(days = series.len(), horizon, "fitting local forecast");

        let result = forecast::generate_forecast(&series, horizon)?;
        Ok(Forecast {
            next_month: result.total(),
            confidence: result.confidence_label().into(),
            source: Some(ForecastSource::Local),
        })
    }

    pub async fn get_cost_history(&self, days: u32) -> CostResult<CostSummary> {
        self.history_at(period::today(), days).await
    }

    pub async fn history_at(&self, today: NaiveDate, days: u32) -> CostResult<CostSummary> {
        let filter = range_filter(period::last_n_days(today, days));
        let mut summary = self.get_cost_summary(&filter).await?;
        summary.monthly_breakdown = Some(CostRepo::monthly_totals(&self.pool, &filter).await?);
        summary.trend = Some(self.trend_at(today).await?);
        Ok(summary)
    }

    pub async fn get_trend_analysis(&self) -> CostResult<TrendAnalysis> {
        self.trend_at(period::today()).await
    }

    pub async fn trend_at(&self, today: NaiveDate) -> CostResult<TrendAnalysis> {
        let current = CostRepo::period_total(&self.pool, &range_filter(period::current_month_range(today))).await?;
        let previous = CostRepo::period_total(&self.pool, &range_filter(period::previous_month_range(today))).await?;

        let history = period::trailing_months(today, self.trend.history_months);
        let monthly: Vec<f64> = CostRepo::monthly_totals(&self.pool, &range_filter(history))
            .await?
            .into_iter()
            .map(|m| m.total_cost)
            .collect();

        let analysis = trend::analyze(current, previous, &monthly, self.trend.stable_band_pct);
        tracing::debug!(current, previous, change = analysis.change_percent, trend = %analysis.trend);
        Ok(analysis)
    }

    pub async fn generate_report(&self) -> CostResult<CostReport> {
        self.report_at(period::today()).await
    }

    pub async fn report_at(&self, today: NaiveDate) -> CostResult<CostReport> {
        let filter = range_filter(period::trailing_months(today, self.trend.history_months));
        let summary = self.get_cost_summary(&filter).await?;
        let monthly_data = CostRepo::monthly_totals(&self.pool, &filter).await?;

        let mut top_services: Vec<ServiceCost> = summary
            .by_service
            .into_iter()
            .map(|(service, cost)| ServiceCost { service, cost })
            .collect();
        top_services.sort_by(|a, b| b.cost.total_cmp(&a.cost));
        top_services.truncate(TOP_SERVICES);

        Ok(CostReport {
            generated_at: Utc::now().to_rfc3339(),
            period: summary.period,
            total_cost: summary.total_cost,
            currency: summary.currency,
            forecast: self.best_effort_forecast().await.map(|f| f.next_month),
            top_services,
            monthly_data,
        })
    }

    pub async fn check_alerts(&self) -> CostResult<AlertCheck> {
        self.check_alerts_at(period::today()).await
    }

    /// Evaluates enabled alerts against the stored current-month total, without fetching.
    pub async fn check_alerts_at(&self, today: NaiveDate) -> CostResult<AlertCheck> {
        let summary = self.get_cost_summary(&range_filter(period::current_month_range(today))).await?;
        let stored = AlertRepo::list(&self.pool).await?;
        let evaluations = alerts::evaluate(&stored, summary.total_cost);

        for eval in evaluations.iter().filter(|e| e.status == AlertStatus::Triggered) {
            tracing::warn!(
                alert = %eval.name,
                threshold = eval.threshold,
                total_cost = eval.total_cost,
                "cost alert triggered"
            );
        }

        Ok(AlertCheck {
            period: summary.period,
            total_cost: summary.total_cost,
            currency: summary.currency,
            evaluations,
        })
    }

    pub async fn create_alert(&self, req: &CreateAlertRequest) -> CostResult<Alert> {
        if req.name.trim().is_empty() {
            return Err(CostError::Configuration("alert name must not be empty".into()));
        }
        alerts::validate_threshold(req.threshold)?;

        let subscription_id = req
            .subscription_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| self.billing.account_id());
        let alert = AlertRepo::create(&self.pool, req, subscription_id).await?;
        tracing::info!(alert = %alert.name, threshold = alert.threshold, "created alert");
        Ok(alert)
    }
}

/// Store filter over the inclusive days of a half-open range.
fn range_filter(range: DateRange) -> CostFilter {
    CostFilter::between(range.start, range.last_day())
}
