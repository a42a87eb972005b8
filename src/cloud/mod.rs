//! Provider adapters. The cost service only sees the traits defined here.

/// AWS request signing. No billing client calls it yet.
#[allow(dead_code)]
pub mod aws;
pub mod azure;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::errors::CostResult;
use crate::models::{Granularity, GroupBy, NewCostRecord};

/// One provider line item, before it is tagged with an account.
#[derive(Debug, Clone, PartialEq)]
pub struct CostLine {
    pub service_name: String,
    pub resource_group: Option<String>,
    pub cost: f64,
    pub currency: String,
    pub date: NaiveDate,
}

impl CostLine {
    pub fn into_record(self, subscription_id: &str) -> NewCostRecord {
        NewCostRecord {
            subscription_id: subscription_id.to_string(),
            resource_group: self.resource_group,
            service_name: self.service_name,
            cost: self.cost,
            currency: self.currency,
            date: self.date,
        }
    }
}

/// Normalized result of one provider cost query.
#[derive(Debug, Clone, PartialEq)]
pub struct CostQueryResult {
    pub records: Vec<CostLine>,
    pub total_cost: f64,
    pub currency: String,
}

/// Produces a bearer token for provider API calls.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn acquire(&self) -> CostResult<String>;
}

/// A provider billing API that can report actual and forecast costs.
#[async_trait]
pub trait BillingClient: Send + Sync {
    /// Account (subscription) the client queries; stamped onto stored records.
    fn account_id(&self) -> &str;

    /// Inclusive `[start, end]` actual costs grouped by `dimension`.
    async fn query_costs(&self, start: NaiveDate, end: NaiveDate, dimension: GroupBy) -> CostResult<CostQueryResult>;

    /// Aggregate-only forecast; `records` is empty.
    async fn forecast(&self, granularity: Granularity) -> CostResult<CostQueryResult>;
}

/// Adds an authorization signature to a request in place.
#[allow(dead_code)]
pub trait RequestSigner {
    fn sign(&self, req: &mut reqwest::Request, body: &[u8]) -> CostResult<()>;
}
