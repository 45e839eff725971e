//! Failover record pair construction and publishing.
//!
//! The pair is two `A` alias records sharing one name. The set identifier is
//! bound to the role slot (PRIMARY or SECONDARY), not to an endpoint: a swap
//! moves the endpoints between slots and leaves the set ids where they are.
//!
//! ```text
//! primary_is_first_region = true           primary_is_first_region = false
//!   PRIMARY   primary-set   -> east-lb       PRIMARY   primary-set   -> west-lb
//!   SECONDARY secondary-set -> west-lb       SECONDARY secondary-set -> east-lb
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hickory_proto::rr::RecordType;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info};

use crate::config::{Endpoint, FailoverConfig};
use crate::error::FailoverError;
use crate::metrics::{self, Timer};

/// TTL applied to both entries, in seconds.
pub const RECORD_TTL: u32 = 60;

/// Comment attached to every change batch.
pub const BATCH_COMMENT: &str = "Failover swap by dns-failover";

/// Failover role of one entry in the pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailoverRole {
    /// Answers while healthy.
    Primary,
    /// Answers when the primary entry does not.
    Secondary,
}

impl fmt::Display for FailoverRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => f.write_str("PRIMARY"),
            Self::Secondary => f.write_str("SECONDARY"),
        }
    }
}

/// Change action. Only create-or-replace is ever issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeAction {
    /// Create the record set, or replace it if it exists.
    Upsert,
}

/// Alias target of a record entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AliasTarget {
    /// Hosted zone of the target.
    pub hosted_zone_id: String,
    /// DNS name of the target.
    #[serde(rename = "DNSName")]
    pub dns_name: String,
    /// Always false: health is judged by this controller.
    pub evaluate_target_health: bool,
}

impl From<&Endpoint> for AliasTarget {
    fn from(endpoint: &Endpoint) -> Self {
        Self {
            hosted_zone_id: endpoint.zone_id.clone(),
            dns_name: endpoint.hostname.clone(),
            evaluate_target_health: false,
        }
    }
}

/// One entry of the failover pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceRecordSet {
    /// Shared record name.
    pub name: String,
    /// Record type (always `A`).
    #[serde(rename = "Type", serialize_with = "serialize_record_type")]
    pub record_type: RecordType,
    /// Set identifier of the role slot.
    pub set_identifier: String,
    /// Role of this entry.
    pub failover: FailoverRole,
    /// TTL in seconds.
    #[serde(rename = "TTL")]
    pub ttl: u32,
    /// Endpoint bound to this slot.
    pub alias_target: AliasTarget,
}

fn serialize_record_type<S: Serializer>(
    record_type: &RecordType,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(record_type)
}

/// A single change in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Change {
    /// Action to apply.
    pub action: ChangeAction,
    /// Record set the action applies to.
    pub resource_record_set: ResourceRecordSet,
}

/// A batch of changes applied atomically by the DNS provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChangeBatch {
    /// Free-form comment.
    pub comment: String,
    /// Changes, PRIMARY entry first.
    pub changes: Vec<Change>,
}

impl ChangeBatch {
    /// Find the entry carrying `role`.
    pub fn entry(&self, role: FailoverRole) -> Option<&ResourceRecordSet> {
        self.changes
            .iter()
            .map(|c| &c.resource_record_set)
            .find(|r| r.failover == role)
    }
}

/// Provider confirmation of a submitted batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChangeInfo {
    /// Provider change id.
    pub id: String,
    /// Provider status (e.g. "PENDING", "INSYNC").
    pub status: String,
    /// When the provider accepted the change.
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Client for the DNS provider's change API.
#[async_trait]
pub trait RecordClient: Send + Sync {
    /// Apply `batch` to the hosted zone as a single atomic change.
    async fn change_resource_record_sets(
        &self,
        hosted_zone_id: &str,
        batch: &ChangeBatch,
    ) -> Result<ChangeInfo, FailoverError>;
}

/// Build the change batch for the requested orientation.
///
/// With `primary_is_first_region` the configured primary endpoint is bound to
/// the PRIMARY slot; otherwise the two endpoints trade slots. Set ids always
/// follow the slot.
pub fn build_change_batch(config: &FailoverConfig, primary_is_first_region: bool) -> ChangeBatch {
    let (primary_endpoint, secondary_endpoint) = if primary_is_first_region {
        (&config.primary.endpoint, &config.secondary.endpoint)
    } else {
        (&config.secondary.endpoint, &config.primary.endpoint)
    };

    let entry = |set_id: &str, role: FailoverRole, endpoint: &Endpoint| Change {
        action: ChangeAction::Upsert,
        resource_record_set: ResourceRecordSet {
            name: config.record_name.clone(),
            record_type: RecordType::A,
            set_identifier: set_id.to_string(),
            failover: role,
            ttl: RECORD_TTL,
            alias_target: AliasTarget::from(endpoint),
        },
    };

    ChangeBatch {
        comment: BATCH_COMMENT.to_string(),
        changes: vec![
            entry(&config.primary.set_id, FailoverRole::Primary, primary_endpoint),
            entry(
                &config.secondary.set_id,
                FailoverRole::Secondary,
                secondary_endpoint,
            ),
        ],
    }
}

/// Publishes the failover record pair.
pub struct RecordPublisher<R> {
    client: R,
    config: Arc<FailoverConfig>,
}

impl<R: RecordClient> RecordPublisher<R> {
    /// Create a publisher for the configured pair.
    pub fn new(client: R, config: Arc<FailoverConfig>) -> Self {
        Self { client, config }
    }

    /// Compute and submit the pair. Failures are returned, never retried.
    pub async fn publish(&self, primary_is_first_region: bool) -> Result<ChangeInfo, FailoverError> {
        let timer = Timer::start();
        let batch = build_change_batch(&self.config, primary_is_first_region);

        info!(
            hosted_zone_id = %self.config.hosted_zone_id,
            record_name = %self.config.record_name,
            primary_is_first_region,
            changes = ?batch.changes,
            "applying failover change batch"
        );

        let result = self
            .client
            .change_resource_record_sets(&self.config.hosted_zone_id, &batch)
            .await;
        metrics::record_publish(primary_is_first_region, result.is_ok(), timer.elapsed());

        match &result {
            Ok(change) => info!(
                change_id = %change.id,
                status = %change.status,
                "change batch accepted"
            ),
            Err(e) => error!(error = %e, "change batch rejected"),
        }

        result
    }
}

/// Record client that only logs the batch it would submit.
#[derive(Debug, Clone, Default)]
pub struct DryRunRecordClient;

#[async_trait]
impl RecordClient for DryRunRecordClient {
    async fn change_resource_record_sets(
        &self,
        hosted_zone_id: &str,
        batch: &ChangeBatch,
    ) -> Result<ChangeInfo, FailoverError> {
        let body = serde_json::to_string(batch)?;
        info!(hosted_zone_id, batch = %body, "dry run: change batch not submitted");
        Ok(ChangeInfo {
            id: "dry-run".to_string(),
            status: "DRY_RUN".to_string(),
            submitted_at: Some(Utc::now()),
        })
    }
}
