//! HTTP adapters for the metrics backend and the DNS change API.
//!
//! Both speak JSON:
//!
//! - `POST {metrics_url}` with a [`HealthQuery`] body, answering
//!   `{"Datapoints": [...]}`
//! - `POST {dns_url}/hostedzone/{zone_id}/rrset` with a
//!   `{"ChangeBatch": ...}` body, answering `{"ChangeInfo": {...}}`

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::BackendConfig;
use crate::error::FailoverError;
use crate::health::{Datapoint, HealthQuery, MetricSource};
use crate::records::{ChangeBatch, ChangeInfo, RecordClient};

#[derive(Debug, Deserialize)]
struct MetricStatisticsResponse {
    #[serde(rename = "Datapoints", default)]
    datapoints: Vec<Datapoint>,
}

#[derive(Debug, Serialize)]
struct ChangeRequest<'a> {
    #[serde(rename = "ChangeBatch")]
    change_batch: &'a ChangeBatch,
}

#[derive(Debug, Deserialize)]
struct ChangeResponse {
    #[serde(rename = "ChangeInfo")]
    change_info: ChangeInfo,
}

/// Metric source backed by an HTTP statistics endpoint.
#[derive(Debug, Clone)]
pub struct HttpMetricSource {
    client: Client,
    url: String,
}

impl HttpMetricSource {
    /// Create a metric source posting queries to `url`.
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl MetricSource for HttpMetricSource {
    async fn get_metric_statistics(
        &self,
        query: &HealthQuery,
    ) -> Result<Vec<Datapoint>, FailoverError> {
        debug!(url = %self.url, "querying metric statistics");
        let response = self.client.post(&self.url).json(query).send().await?;
        let body: MetricStatisticsResponse = check_status(response).await?.json().await?;
        Ok(body.datapoints)
    }
}

/// Record client backed by an HTTP DNS change API.
#[derive(Debug, Clone)]
pub struct HttpRecordClient {
    client: Client,
    base_url: String,
}

impl HttpRecordClient {
    /// Create a record client for the API rooted at `base_url`.
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// URL of the change endpoint for `hosted_zone_id`.
    pub fn change_url(&self, hosted_zone_id: &str) -> String {
        format!(
            "{}/hostedzone/{}/rrset",
            self.base_url.trim_end_matches('/'),
            hosted_zone_id
        )
    }
}

#[async_trait]
impl RecordClient for HttpRecordClient {
    async fn change_resource_record_sets(
        &self,
        hosted_zone_id: &str,
        batch: &ChangeBatch,
    ) -> Result<ChangeInfo, FailoverError> {
        let url = self.change_url(hosted_zone_id);
        debug!(url = %url, "submitting change batch");
        let response = self
            .client
            .post(&url)
            .json(&ChangeRequest {
                change_batch: batch,
            })
            .send()
            .await?;
        let body: ChangeResponse = check_status(response).await?.json().await?;
        Ok(body.change_info)
    }
}

/// Build both adapters from the backend configuration, sharing one client.
pub fn clients(config: &BackendConfig) -> (HttpMetricSource, HttpRecordClient) {
    let client = Client::new();
    (
        HttpMetricSource::new(client.clone(), config.metrics_url.clone()),
        HttpRecordClient::new(client, config.dns_url.clone()),
    )
}

async fn check_status(response: Response) -> Result<Response, FailoverError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(FailoverError::Backend {
        status: status.as_u16(),
        body,
    })
}
