use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::types::{ForecastSource, GroupBy, TrendDirection};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct CostRecord {
    pub id: i64,
    pub subscription_id: String,
    pub resource_group: Option<String>,
    pub service_name: String,
    pub cost: f64,
    pub currency: String,
    pub date: NaiveDate,
}

/// A normalized line item that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCostRecord {
    pub subscription_id: String,
    pub resource_group: Option<String>,
    pub service_name: String,
    pub cost: f64,
    pub currency: String,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub service_name: Option<String>,
    pub group_by: Option<GroupBy>,
}

impl CostFilter {
    pub fn between(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date: Some(start_date),
            end_date: Some(end_date),
            ..Default::default()
        }
    }

    pub fn grouped(&self, group_by: GroupBy) -> Self {
        Self {
            group_by: Some(group_by),
            ..self.clone()
        }
    }

    pub fn period_label(&self) -> String {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => format!("{start} to {end}"),
            (Some(start), None) => format!("since {start}"),
            (None, Some(end)) => format!("until {end}"),
            (None, None) => "all time".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostSummary {
    pub period: String,
    pub total_cost: f64,
    pub currency: String,
    pub by_service: BTreeMap<String, f64>,
    pub by_resource_group: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forecast: Option<Forecast>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_breakdown: Option<Vec<MonthlyCost>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend: Option<TrendAnalysis>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub next_month: f64,
    pub confidence: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<ForecastSource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendAnalysis {
    pub current_month: f64,
    pub previous_month: f64,
    pub change_percent: f64,
    pub trend: TrendDirection,
    pub average_monthly: f64,
    pub projection: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyCost {
    /// `YYYY-MM`
    pub month: String,
    pub total_cost: f64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceCost {
    pub service: String,
    pub cost: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostReport {
    pub generated_at: String,
    pub period: String,
    pub total_cost: f64,
    pub currency: String,
    pub forecast: Option<f64>,
    pub top_services: Vec<ServiceCost>,
    pub monthly_data: Vec<MonthlyCost>,
}

#[derive(Debug, Deserialize)]
pub struct CostQueryParams {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub service: Option<String>,
    pub days: Option<u32>,
    pub local: Option<bool>,
}

impl CostQueryParams {
    pub fn filter(&self) -> CostFilter {
        CostFilter {
            start_date: self.start_date,
            end_date: self.end_date,
            service_name: self.service.clone(),
            group_by: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FetchRequest {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_label() {
        let d = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        assert_eq!(
            CostFilter::between(d("2024-01-01"), d("2024-01-31")).period_label(),
            "2024-01-01 to 2024-01-31"
        );
        assert_eq!(CostFilter::default().period_label(), "all time");
        let since = CostFilter {
            start_date: Some(d("2024-02-01")),
            ..Default::default()
        };
        assert_eq!(since.period_label(), "since 2024-02-01");
    }

    #[test]
    fn test_summary_omits_absent_optionals() {
        let summary = CostSummary {
            period: "all time".into(),
            total_cost: 0.0,
            currency: "USD".into(),
            by_service: BTreeMap::new(),
            by_resource_group: BTreeMap::new(),
            forecast: None,
            monthly_breakdown: None,
            trend: None,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert!(json.get("forecast").is_none());
        assert!(json.get("trend").is_none());
        assert_eq!(json["currency"], "USD");
    }
}
