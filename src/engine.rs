//! Failover decision engine.
//!
//! One call per alarm event, no memory between calls. The health gate only
//! looks at the region about to become authoritative:
//!
//! | primary alarm state | region checked | healthy        | absent / unhealthy |
//! |---------------------|----------------|----------------|--------------------|
//! | `ALARM`             | secondary      | publish(false) | skip               |
//! | `OK`                | primary        | publish(true)  | skip               |
//! | anything else       | none           | -              | unhandled          |

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::alarm::{self, AlarmEvent, AlarmState};
use crate::config::FailoverConfig;
use crate::error::FailoverError;
use crate::health::{HealthOracle, MetricSource};
use crate::metrics;
use crate::records::{ChangeInfo, RecordClient, RecordPublisher};

/// Outcome of handling one event.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// The envelope did not decode; nothing was done.
    NoEvent,
    /// The alarm does not belong to the primary region.
    Ignored,
    /// The switch was vetoed.
    Skipped(SkipReason),
    /// Secondary endpoint now holds the PRIMARY slot.
    SwitchedToSecondary(ChangeInfo),
    /// Primary endpoint holds the PRIMARY slot again.
    RevertedToPrimary(ChangeInfo),
    /// Primary alarm moved to a state with no action attached.
    Unhandled(AlarmState),
}

impl Decision {
    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoEvent => "no_event",
            Self::Ignored => "ignored",
            Self::Skipped(SkipReason::NoSecondaryData) => "skipped_no_secondary_data",
            Self::Skipped(SkipReason::SecondaryUnhealthy(_)) => "skipped_secondary_unhealthy",
            Self::Skipped(SkipReason::PrimaryNotRecovered(_)) => "skipped_primary_not_recovered",
            Self::SwitchedToSecondary(_) => "switched_to_secondary",
            Self::RevertedToPrimary(_) => "reverted_to_primary",
            Self::Unhandled(_) => "unhandled",
        }
    }
}

/// Why a switch was vetoed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SkipReason {
    /// No secondary health sample in the window.
    NoSecondaryData,
    /// Secondary sample at or below the threshold.
    SecondaryUnhealthy(f64),
    /// Primary sample absent (`None`) or at or below the threshold.
    PrimaryNotRecovered(Option<f64>),
}

/// Turns alarm events into at most one record-pair publish.
pub struct FailoverEngine<M, R> {
    config: Arc<FailoverConfig>,
    oracle: HealthOracle<M>,
    publisher: RecordPublisher<R>,
}

impl<M: MetricSource, R: RecordClient> FailoverEngine<M, R> {
    /// Create an engine over the given collaborators.
    pub fn new(config: Arc<FailoverConfig>, source: M, client: R) -> Self {
        Self {
            oracle: HealthOracle::new(source, config.health.clone()),
            publisher: RecordPublisher::new(client, config.clone()),
            config,
        }
    }

    /// Decode a raw notification envelope and handle the alarm inside it.
    pub async fn handle_envelope(&self, raw: &[u8]) -> Result<Decision, FailoverError> {
        match alarm::interpret(raw) {
            Some(event) => self.handle(&event).await,
            None => {
                warn!("no alarm event in notification, aborting");
                metrics::record_decision(Decision::NoEvent.kind());
                Ok(Decision::NoEvent)
            }
        }
    }

    /// Handle one alarm event.
    ///
    /// Only a failed publish is returned as an error; missing telemetry and
    /// unknown states resolve to a no-op decision.
    pub async fn handle(&self, event: &AlarmEvent) -> Result<Decision, FailoverError> {
        info!(
            alarm = %event.alarm_name,
            new_state = %event.new_state,
            old_state = ?event.old_state.as_ref().map(ToString::to_string),
            reason = ?event.reason,
            "alarm state changed"
        );

        let result = self.decide(event).await;
        match &result {
            Ok(decision) => metrics::record_decision(decision.kind()),
            Err(_) => metrics::record_decision("publish_failed"),
        }
        result
    }

    async fn decide(&self, event: &AlarmEvent) -> Result<Decision, FailoverError> {
        if !alarm::is_primary_alarm(&event.alarm_name, &self.config.primary.label) {
            info!(alarm = %event.alarm_name, "alarm is not the primary alarm; ignoring");
            return Ok(Decision::Ignored);
        }

        match &event.new_state {
            AlarmState::Alarm => self.fail_over(event).await,
            AlarmState::Ok => self.revert(event).await,
            other => {
                info!(alarm = %event.alarm_name, state = %other, "unhandled alarm state");
                Ok(Decision::Unhandled(other.clone()))
            }
        }
    }

    async fn fail_over(&self, event: &AlarmEvent) -> Result<Decision, FailoverError> {
        let label = &self.config.secondary.label;
        let sample = self.oracle.latest_health(label).await;
        info!(region = %label, health = ?sample.map(|s| s.value), "secondary health");

        let sample = match sample {
            Some(sample) => sample,
            None => {
                warn!(region = %label, "no health data for secondary; skipping failover");
                return Ok(Decision::Skipped(SkipReason::NoSecondaryData));
            }
        };
        if !sample.is_healthy() {
            error!(
                region = %label,
                health = sample.value,
                "secondary appears unhealthy; aborting failover"
            );
            return Ok(Decision::Skipped(SkipReason::SecondaryUnhealthy(sample.value)));
        }

        match self.publisher.publish(false).await {
            Ok(change) => {
                info!(change_id = %change.id, "switched to secondary as PRIMARY");
                Ok(Decision::SwitchedToSecondary(change))
            }
            Err(e) => {
                error!(
                    alarm = %event.alarm_name,
                    decision = "switch_to_secondary",
                    error = %e,
                    "failed to publish failover records"
                );
                Err(e)
            }
        }
    }

    async fn revert(&self, event: &AlarmEvent) -> Result<Decision, FailoverError> {
        let label = &self.config.primary.label;
        let sample = self.oracle.latest_health(label).await;
        info!(region = %label, health = ?sample.map(|s| s.value), "primary health");

        if !sample.is_some_and(|s| s.is_healthy()) {
            warn!(region = %label, "primary not healthy enough to revert; skipping");
            return Ok(Decision::Skipped(SkipReason::PrimaryNotRecovered(
                sample.map(|s| s.value),
            )));
        }

        match self.publisher.publish(true).await {
            Ok(change) => {
                info!(change_id = %change.id, "reverted to primary as PRIMARY");
                Ok(Decision::RevertedToPrimary(change))
            }
            Err(e) => {
                error!(
                    alarm = %event.alarm_name,
                    decision = "revert_to_primary",
                    error = %e,
                    "failed to publish failover records"
                );
                Err(e)
            }
        }
    }
}
