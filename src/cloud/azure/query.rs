//! Cost Management query bodies and response normalization.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::cloud::{CostLine, CostQueryResult};
use crate::models::{Granularity, GroupBy, DEFAULT_CURRENCY, UNASSIGNED};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryType {
    ActualCost,
    Forecast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timeframe {
    Custom,
    BillingMonthToDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostQueryRequest {
    #[serde(rename = "type")]
    pub query_type: QueryType,
    pub timeframe: Timeframe,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_period: Option<TimePeriod>,
    pub dataset: Dataset,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimePeriod {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub granularity: Granularity,
    pub aggregation: BTreeMap<String, Aggregation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub grouping: Vec<Grouping>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    pub name: String,
    pub function: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grouping {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
}

fn cost_total() -> BTreeMap<String, Aggregation> {
    BTreeMap::from([(
        "costTotal".to_string(),
        Aggregation {
            name: "Cost".into(),
            function: "Sum".into(),
        },
    )])
}

impl CostQueryRequest {
    /// Daily actual cost between two inclusive dates, grouped by one dimension.
    pub fn actual_cost(start: NaiveDate, end: NaiveDate, dimension: GroupBy) -> Self {
        Self {
            query_type: QueryType::ActualCost,
            timeframe: Timeframe::Custom,
            time_period: Some(TimePeriod {
                from: start.format("%Y-%m-%d").to_string(),
                to: end.format("%Y-%m-%d").to_string(),
            }),
            dataset: Dataset {
                granularity: Granularity::Daily,
                aggregation: cost_total(),
                grouping: vec![Grouping {
                    kind: "Dimension".into(),
                    name: dimension.as_str().into(),
                }],
            },
        }
    }

    /// Forecast for the billing period; no time range and no grouping.
    pub fn forecast(granularity: Granularity) -> Self {
        Self {
            query_type: QueryType::Forecast,
            timeframe: Timeframe::BillingMonthToDate,
            time_period: None,
            dataset: Dataset {
                granularity,
                aggregation: cost_total(),
                grouping: Vec::new(),
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CostQueryResponse {
    #[serde(default)]
    pub value: Vec<CostItem>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CostItem {
    #[serde(default)]
    pub name: NameProperty,
    #[serde(default)]
    pub properties: CostProperties,
}

#[derive(Debug, Default, Deserialize)]
pub struct NameProperty {
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostProperties {
    #[serde(default)]
    pub cost: f64,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub usage_date: UsageDate,
    #[serde(default)]
    pub service_name: Option<String>,
    #[serde(default)]
    pub resource_group: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UsageDate {
    /// Either `"YYYY-MM-DD..."` or a `YYYYMMDD` number, depending on the API version.
    #[serde(default)]
    pub value: Option<serde_json::Value>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

pub fn normalize_usage_date(raw: &serde_json::Value) -> Option<NaiveDate> {
    let text = match raw {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => return None,
    };

    if let Some(prefix) = text.get(..10) {
        if let Ok(date) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
            return Some(date);
        }
    }
    if text.len() == 8 {
        return NaiveDate::parse_from_str(&text, "%Y%m%d").ok();
    }
    None
}

pub fn parse_cost_response(body: &str, dimension: GroupBy, fallback_date: NaiveDate) -> Result<CostQueryResult, serde_json::Error> {
    let response: CostQueryResponse = serde_json::from_str(body)?;
    Ok(normalize(response, dimension, fallback_date))
}

/// Maps provider items to cost lines.
///
/// An item without a currency inherits the last currency seen earlier in the
/// batch. The batch currency is the last non-empty one, so mixed-currency
/// responses report only the final currency.
pub fn normalize(response: CostQueryResponse, dimension: GroupBy, fallback_date: NaiveDate) -> CostQueryResult {
    let mut records = Vec::with_capacity(response.value.len());
    let mut total_cost = 0.0;
    let mut last_currency: Option<String> = None;

    for item in response.value {
        let props = item.properties;
        let label = non_empty(Some(item.name.value));

        let (service_name, resource_group) = match dimension {
            GroupBy::ServiceName => (label, non_empty(props.resource_group)),
            GroupBy::ResourceGroup => (non_empty(props.service_name), label),
        };

        if !props.currency.is_empty() {
            last_currency = Some(props.currency.clone());
        }
        let currency = last_currency.clone().unwrap_or_else(|| DEFAULT_CURRENCY.into());

        let date = props
            .usage_date
            .value
            .as_ref()
            .and_then(normalize_usage_date)
            .unwrap_or(fallback_date);

        total_cost += props.cost;
        records.push(CostLine {
            service_name: service_name.unwrap_or_else(|| UNASSIGNED.into()),
            resource_group,
            cost: props.cost,
            currency,
            date,
        });
    }

    CostQueryResult {
        records,
        total_cost,
        currency: last_currency.unwrap_or_else(|| DEFAULT_CURRENCY.into()),
    }
}
