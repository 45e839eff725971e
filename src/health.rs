//! Region health lookups against the metrics backend.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::HealthMetricConfig;
use crate::error::FailoverError;
use crate::metrics::{self, HealthQueryResult, Timer};

/// Lookback window ending at "now", in seconds.
pub const LOOKBACK_SECS: i64 = 300;

/// Sample granularity in seconds.
pub const PERIOD_SECS: u32 = 60;

/// A sample must be strictly above this to count as healthy.
pub const HEALTHY_THRESHOLD: f64 = 0.5;

/// Aggregation requested from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Statistic {
    /// Mean over the period.
    Average,
}

/// Metric dimension filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Dimension {
    /// Dimension name.
    pub name: String,
    /// Dimension value.
    pub value: String,
}

/// A statistics query for one region's health metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HealthQuery {
    /// Metric namespace.
    pub namespace: String,
    /// Metric name.
    pub metric_name: String,
    /// Dimension filters; the region label is one of them.
    pub dimensions: Vec<Dimension>,
    /// Window start (inclusive).
    pub start_time: DateTime<Utc>,
    /// Window end.
    pub end_time: DateTime<Utc>,
    /// Granularity in seconds.
    pub period: u32,
    /// Requested statistics.
    pub statistics: Vec<Statistic>,
}

/// One datapoint returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Datapoint {
    /// Start of the period this datapoint covers.
    pub timestamp: DateTime<Utc>,
    /// Average over the period, if the backend computed one.
    #[serde(default)]
    pub average: Option<f64>,
}

/// The latest health sample for a region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthSample {
    /// When the sample was taken.
    pub timestamp: DateTime<Utc>,
    /// Average health value.
    pub value: f64,
}

impl HealthSample {
    /// Healthy iff the value is strictly above [`HEALTHY_THRESHOLD`].
    pub fn is_healthy(&self) -> bool {
        self.value > HEALTHY_THRESHOLD
    }
}

/// Backend that answers metric statistics queries.
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Fetch datapoints matching `query`.
    async fn get_metric_statistics(
        &self,
        query: &HealthQuery,
    ) -> Result<Vec<Datapoint>, FailoverError>;
}

/// Looks up the latest health sample for a region.
pub struct HealthOracle<M> {
    source: M,
    metric: HealthMetricConfig,
}

impl<M: MetricSource> HealthOracle<M> {
    /// Create an oracle over the given metric source.
    pub fn new(source: M, metric: HealthMetricConfig) -> Self {
        Self { source, metric }
    }

    /// Build the query for `region_label` over the window ending at `now`.
    pub fn query_for(&self, region_label: &str, now: DateTime<Utc>) -> HealthQuery {
        HealthQuery {
            namespace: self.metric.namespace.clone(),
            metric_name: self.metric.metric_name.clone(),
            dimensions: vec![Dimension {
                name: self.metric.dimension.clone(),
                value: region_label.to_string(),
            }],
            start_time: now - Duration::seconds(LOOKBACK_SECS),
            end_time: now,
            period: PERIOD_SECS,
            statistics: vec![Statistic::Average],
        }
    }

    /// Latest health sample for `region_label`, or `None` if the window is
    /// empty or the query fails.
    pub async fn latest_health(&self, region_label: &str) -> Option<HealthSample> {
        self.latest_health_at(region_label, Utc::now()).await
    }

    /// As [`latest_health`](Self::latest_health), with an explicit window end.
    pub async fn latest_health_at(
        &self,
        region_label: &str,
        now: DateTime<Utc>,
    ) -> Option<HealthSample> {
        let timer = Timer::start();
        let query = self.query_for(region_label, now);

        let datapoints = match self.source.get_metric_statistics(&query).await {
            Ok(datapoints) => datapoints,
            Err(e) => {
                error!(region = %region_label, error = %e, "failed to get health metric");
                metrics::record_health_query(
                    region_label,
                    HealthQueryResult::Error,
                    timer.elapsed(),
                );
                return None;
            }
        };

        let sample = latest_sample(&datapoints);
        let result = if sample.is_some() {
            HealthQueryResult::Sample
        } else {
            HealthQueryResult::NoData
        };
        metrics::record_health_query(region_label, result, timer.elapsed());
        debug!(
            region = %region_label,
            datapoints = datapoints.len(),
            sample = ?sample.map(|s| s.value),
            "health query complete"
        );

        sample
    }
}

/// Pick the datapoint with the latest timestamp.
///
/// Datapoints without an average are skipped. On equal timestamps the one
/// appearing last wins.
pub fn latest_sample(datapoints: &[Datapoint]) -> Option<HealthSample> {
    datapoints
        .iter()
        .filter_map(|d| {
            d.average.map(|value| HealthSample {
                timestamp: d.timestamp,
                value,
            })
        })
        .max_by_key(|s| s.timestamp)
}
