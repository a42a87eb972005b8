use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use super::query::{parse_cost_response, CostQueryRequest};
use crate::cloud::{BillingClient, CostQueryResult, TokenSource};
use crate::errors::{CostError, CostResult};
use crate::models::{Granularity, GroupBy};
use crate::period;

const API_VERSION: &str = "2023-03-01";

/// Cost Management client for one subscription.
pub struct AzureCostClient {
    subscription_id: String,
    base_url: String,
    token_source: Arc<dyn TokenSource>,
    http: reqwest::Client,
}

impl AzureCostClient {
    pub fn new(
        subscription_id: impl Into<String>,
        base_url: impl Into<String>,
        token_source: Arc<dyn TokenSource>,
        timeout: Duration,
    ) -> CostResult<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            subscription_id: subscription_id.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token_source,
            http,
        })
    }

    fn query_url(&self) -> String {
        format!(
            "{}/subscriptions/{}/providers/Microsoft.CostManagement/query?api-version={API_VERSION}",
            self.base_url, self.subscription_id
        )
    }

    /// Sends one query and returns the raw response body.
    async fn submit(&self, request: &CostQueryRequest) -> CostResult<String> {
        if self.subscription_id.trim().is_empty() {
            return Err(CostError::Authentication("subscription ID not set".into()));
        }

        let token = self.token_source.acquire().await?;
        tracing::debug!(subscription = %self.subscription_id, query_type = ?request.query_type, "submitting cost query");

        let resp = self
            .http
            .post(self.query_url())
            .bearer_auth(token)
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "cost query rejected");
            return Err(CostError::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl BillingClient for AzureCostClient {
    fn account_id(&self) -> &str {
        &self.subscription_id
    }

    async fn query_costs(&self, start: NaiveDate, end: NaiveDate, dimension: GroupBy) -> CostResult<CostQueryResult> {
        let request = CostQueryRequest::actual_cost(start, end, dimension);
        let body = self.submit(&request).await?;
        let result = parse_cost_response(&body, dimension, start)?;
        tracing::debug!(records = result.records.len(), total = result.total_cost, "cost query parsed");
        Ok(result)
    }

    async fn forecast(&self, granularity: Granularity) -> CostResult<CostQueryResult> {
        let request = CostQueryRequest::forecast(granularity);
        let body = self.submit(&request).await?;
        let mut result = parse_cost_response(&body, GroupBy::ServiceName, period::today())?;
        result.records.clear();
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct StaticToken(&'static str);

    #[async_trait]
    impl TokenSource for StaticToken {
        async fn acquire(&self) -> CostResult<String> {
            Ok(self.0.to_string())
        }
    }

    struct FailingToken;

    #[async_trait]
    impl TokenSource for FailingToken {
        async fn acquire(&self) -> CostResult<String> {
            Err(CostError::Token("az not logged in".into()))
        }
    }

    const SUB: &str = "00000000-0000-0000-0000-000000000001";

    fn client(server: &MockServer, sub: &str, tokens: Arc<dyn TokenSource>) -> AzureCostClient {
        AzureCostClient::new(sub, server.uri(), tokens, Duration::from_secs(5)).unwrap()
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[tokio::test]
    async fn test_query_costs_posts_body_and_parses() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/subscriptions/{SUB}/providers/Microsoft.CostManagement/query")))
            .and(query_param("api-version", API_VERSION))
            .and(header("authorization", "Bearer tok-1"))
            .and(body_partial_json(json!({
                "type": "ActualCost",
                "timePeriod": { "from": "2024-01-01", "to": "2024-01-31" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [
                    { "id": "a", "name": { "value": "Virtual Machines" },
                      "properties": { "cost": 50.0, "currency": "USD", "usageDate": { "value": "2024-01-10" } } },
                    { "id": "b", "name": { "value": "Storage" },
                      "properties": { "cost": 30.0, "currency": "USD", "usageDate": { "value": "2024-01-11" } } }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server, SUB, Arc::new(StaticToken("tok-1")));
        let result = client
            .query_costs(d("2024-01-01"), d("2024-01-31"), GroupBy::ServiceName)
            .await
            .unwrap();

        assert_eq!(result.total_cost, 80.0);
        assert_eq!(result.records.len(), 2);
        assert_eq!(result.records[1].service_name, "Storage");
    }

    #[tokio::test]
    async fn test_upstream_error_carries_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden: no billing reader role"))
            .mount(&server)
            .await;

        let client = client(&server, SUB, Arc::new(StaticToken("tok")));
        let err = client
            .query_costs(d("2024-01-01"), d("2024-01-31"), GroupBy::ServiceName)
            .await
            .unwrap_err();

        match err {
            CostError::Upstream { status, body } => {
                assert_eq!(status, 403);
                assert!(body.contains("billing reader"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_subscription_fails_before_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = client(&server, "", Arc::new(StaticToken("tok")));
        let err = client.forecast(Granularity::Monthly).await.unwrap_err();
        assert!(matches!(err, CostError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_token_failure_is_surfaced() {
        let server = MockServer::start().await;
        let client = client(&server, SUB, Arc::new(FailingToken));
        let err = client
            .query_costs(d("2024-01-01"), d("2024-01-31"), GroupBy::ServiceName)
            .await
            .unwrap_err();
        assert!(matches!(err, CostError::Token(_)));
    }

    #[tokio::test]
    async fn test_forecast_returns_aggregate_only() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "type": "Forecast", "timeframe": "BillingMonthToDate" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [
                    { "properties": { "cost": 60.0, "currency": "EUR" } },
                    { "properties": { "cost": 40.0, "currency": "EUR" } }
                ]
            })))
            .mount(&server)
            .await;

        let client = client(&server, SUB, Arc::new(StaticToken("tok")));
        let result = client.forecast(Granularity::Monthly).await.unwrap();
        assert_eq!(result.total_cost, 100.0);
        assert_eq!(result.currency, "EUR");
        assert!(result.records.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let client = client(&server, SUB, Arc::new(StaticToken("tok")));
        let err = client.forecast(Granularity::Monthly).await.unwrap_err();
        assert!(matches!(err, CostError::Decode(_)));
    }
}
