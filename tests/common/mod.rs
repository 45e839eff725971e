//! Shared test infrastructure for engine and adapter integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use dns_failover::config::{Endpoint, FailoverConfig, HealthMetricConfig, RegionConfig};
use dns_failover::health::{Datapoint, HealthQuery, MetricSource};
use dns_failover::records::{ChangeBatch, ChangeInfo, FailoverRole, RecordClient};
use dns_failover::{FailoverEngine, FailoverError};

// --- Constants ---

pub const PRIMARY_LABEL: &str = "east";
pub const SECONDARY_LABEL: &str = "west";
pub const PRIMARY_ALARM: &str = "RegionDown-east-example.com";
pub const SECONDARY_ALARM: &str = "RegionDown-west-example.com";
pub const HOSTED_ZONE_ID: &str = "Z0HOSTED";
pub const PRIMARY_HOSTNAME: &str = "east-lb.example.com";
pub const SECONDARY_HOSTNAME: &str = "west-lb.example.com";

// --- Config builder ---

pub fn test_failover_config() -> FailoverConfig {
    FailoverConfig {
        hosted_zone_id: HOSTED_ZONE_ID.to_string(),
        record_name: "www.example.com".to_string(),
        primary: RegionConfig {
            label: PRIMARY_LABEL.to_string(),
            set_id: "primary-set".to_string(),
            endpoint: Endpoint {
                zone_id: "ZEASTLB".to_string(),
                hostname: PRIMARY_HOSTNAME.to_string(),
            },
        },
        secondary: RegionConfig {
            label: SECONDARY_LABEL.to_string(),
            set_id: "secondary-set".to_string(),
            endpoint: Endpoint {
                zone_id: "ZWESTLB".to_string(),
                hostname: SECONDARY_HOSTNAME.to_string(),
            },
        },
        health: HealthMetricConfig::default(),
    }
}

// --- FakeMetricSource ---

/// What the fake backend answers for one region.
#[derive(Clone)]
pub enum HealthResponse {
    Datapoints(Vec<Datapoint>),
    Fail,
}

/// Metric source answering from a per-region table and recording every query.
#[derive(Clone, Default)]
pub struct FakeMetricSource {
    responses: Arc<Mutex<HashMap<String, HealthResponse>>>,
    queries: Arc<Mutex<Vec<HealthQuery>>>,
}

impl FakeMetricSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer a single datapoint with `value` for `region`.
    pub fn with_health(self, region: &str, value: f64) -> Self {
        self.with_datapoints(
            region,
            vec![Datapoint {
                timestamp: minute(0),
                average: Some(value),
            }],
        )
    }

    pub fn with_datapoints(self, region: &str, datapoints: Vec<Datapoint>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(region.to_string(), HealthResponse::Datapoints(datapoints));
        self
    }

    pub fn failing(self, region: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(region.to_string(), HealthResponse::Fail);
        self
    }

    /// Region labels queried so far, in order.
    pub fn queried_regions(&self) -> Vec<String> {
        self.queries
            .lock()
            .unwrap()
            .iter()
            .flat_map(|q| q.dimensions.iter().map(|d| d.value.clone()))
            .collect()
    }
}

#[async_trait]
impl MetricSource for FakeMetricSource {
    async fn get_metric_statistics(
        &self,
        query: &HealthQuery,
    ) -> Result<Vec<Datapoint>, FailoverError> {
        self.queries.lock().unwrap().push(query.clone());
        let region = query
            .dimensions
            .first()
            .map(|d| d.value.clone())
            .unwrap_or_default();
        match self.responses.lock().unwrap().get(&region).cloned() {
            Some(HealthResponse::Datapoints(points)) => Ok(points),
            Some(HealthResponse::Fail) => Err(FailoverError::Backend {
                status: 500,
                body: "metrics backend down".to_string(),
            }),
            None => Ok(Vec::new()),
        }
    }
}

// --- RecordingRecordClient ---

/// Record client that stores every submitted batch.
#[derive(Clone, Default)]
pub struct RecordingRecordClient {
    batches: Arc<Mutex<Vec<(String, ChangeBatch)>>>,
    fail: bool,
}

impl RecordingRecordClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// A client whose every submit is rejected.
    pub fn rejecting() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn batches(&self) -> Vec<(String, ChangeBatch)> {
        self.batches.lock().unwrap().clone()
    }

    pub fn last_batch(&self) -> Option<ChangeBatch> {
        self.batches.lock().unwrap().last().map(|(_, b)| b.clone())
    }
}

#[async_trait]
impl RecordClient for RecordingRecordClient {
    async fn change_resource_record_sets(
        &self,
        hosted_zone_id: &str,
        batch: &ChangeBatch,
    ) -> Result<ChangeInfo, FailoverError> {
        self.batches
            .lock()
            .unwrap()
            .push((hosted_zone_id.to_string(), batch.clone()));
        if self.fail {
            return Err(FailoverError::Backend {
                status: 400,
                body: "InvalidChangeBatch".to_string(),
            });
        }
        let n = self.batches.lock().unwrap().len();
        Ok(ChangeInfo {
            id: format!("/change/C{n}"),
            status: "PENDING".to_string(),
            submitted_at: None,
        })
    }
}

// --- Engine builder ---

pub fn build_engine(
    metrics: &FakeMetricSource,
    records: &RecordingRecordClient,
) -> FailoverEngine<FakeMetricSource, RecordingRecordClient> {
    FailoverEngine::new(
        Arc::new(test_failover_config()),
        metrics.clone(),
        records.clone(),
    )
}

// --- Envelope construction ---

/// Build a notification envelope around one alarm transition.
pub fn envelope(alarm_name: &str, new_state: &str) -> Vec<u8> {
    let message = json!({
        "AlarmName": alarm_name,
        "NewStateValue": new_state,
        "OldStateValue": "OK",
        "NewStateReason": "Threshold Crossed",
    });
    serde_json::to_vec(&json!({
        "Records": [{ "Sns": { "Message": message.to_string() } }]
    }))
    .unwrap()
}

// --- Assertions ---

pub fn minute(m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 12, m, 0).unwrap()
}

/// Hostname bound to the `role` slot in `batch`.
pub fn hostname_for(batch: &ChangeBatch, role: FailoverRole) -> String {
    batch
        .entry(role)
        .expect("role missing from batch")
        .alias_target
        .dns_name
        .clone()
}

/// Set id carried by the `role` slot in `batch`.
pub fn set_id_for(batch: &ChangeBatch, role: FailoverRole) -> String {
    batch
        .entry(role)
        .expect("role missing from batch")
        .set_identifier
        .clone()
}

// --- CannedServer ---

/// One-shot HTTP server on loopback answering a fixed status and JSON body.
///
/// The raw request it received is handed back by [`CannedServer::request`].
pub struct CannedServer {
    pub url: String,
    handle: JoinHandle<String>,
}

impl CannedServer {
    pub async fn start(status: u16, body: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let body = body.to_string();

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let request = read_request(&mut stream).await;
            let reason = if status < 400 { "OK" } else { "Error" };
            let response = format!(
                "HTTP/1.1 {status} {reason}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            let _ = stream.shutdown().await;
            request
        });

        Self {
            url: format!("http://{addr}"),
            handle,
        }
    }

    /// The request line, headers and body the server received.
    pub async fn request(self) -> String {
        self.handle.await.unwrap()
    }
}

async fn read_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        let Some(head_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&buf[..head_end]).to_ascii_lowercase();
        let content_length = head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if buf.len() >= head_end + 4 + content_length {
            break;
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// A loopback URL nothing is listening on.
pub async fn unreachable_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

/// HTTP client that ignores proxy settings from the environment.
pub fn direct_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
