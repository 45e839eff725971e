//! Configuration types for dns-failover.

use hickory_proto::rr::Name;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

use crate::error::FailoverError;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Failover pair configuration.
    pub failover: FailoverConfig,

    /// Backend endpoints used by the HTTP adapters.
    pub backends: BackendConfig,

    /// Telemetry configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl Config {
    /// Environment variable prefix for overrides (`DNS_FAILOVER__FAILOVER__RECORD_NAME`).
    pub const ENV_PREFIX: &'static str = "DNS_FAILOVER";

    /// Load from a TOML file with environment overrides.
    ///
    /// The result is not validated; call [`FailoverConfig::validate`] once
    /// logging is up so its warnings are not lost.
    pub fn load(path: &Path) -> Result<Self, FailoverError> {
        let config: Config = ::config::Config::builder()
            .add_source(::config::File::from(path))
            .add_source(
                ::config::Environment::with_prefix(Self::ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }
}

/// The failover record pair and the two regions behind it.
///
/// Built once at startup and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailoverConfig {
    /// Hosted zone holding the failover record pair.
    pub hosted_zone_id: String,

    /// Fully-qualified record name shared by both entries (e.g. "www.example.com").
    pub record_name: String,

    /// Region that is PRIMARY in the initial configuration.
    pub primary: RegionConfig,

    /// Region that is SECONDARY in the initial configuration.
    pub secondary: RegionConfig,

    /// Health metric location.
    #[serde(default)]
    pub health: HealthMetricConfig,
}

/// One region of the failover pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionConfig {
    /// Region label, used for alarm matching and the health metric dimension.
    pub label: String,

    /// Set identifier of the role slot this region starts in.
    /// The set id stays with the slot when endpoints swap.
    pub set_id: String,

    /// Routable target for this region.
    pub endpoint: Endpoint,
}

/// A routable alias target (typically a load balancer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Hosted zone id of the alias target.
    pub zone_id: String,

    /// DNS name of the alias target.
    pub hostname: String,
}

/// Where the per-region health metric lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthMetricConfig {
    /// Metric namespace.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Metric name.
    #[serde(default = "default_metric_name")]
    pub metric_name: String,

    /// Dimension whose value is the region label.
    #[serde(default = "default_dimension")]
    pub dimension: String,
}

impl Default for HealthMetricConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            metric_name: default_metric_name(),
            dimension: default_dimension(),
        }
    }
}

fn default_namespace() -> String {
    "MyApp/Failover".to_string()
}

fn default_metric_name() -> String {
    "RegionHealth".to_string()
}

fn default_dimension() -> String {
    "Region".to_string()
}

/// Backend endpoints for the HTTP adapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// URL accepting health metric statistics queries.
    pub metrics_url: String,

    /// Base URL of the DNS change API.
    pub dns_url: String,
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level filter (e.g., "info", "debug", "dns_failover=debug,warn").
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// OpenTelemetry configuration.
    #[serde(default)]
    pub opentelemetry: Option<OpenTelemetryConfig>,
}

/// OpenTelemetry exporter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenTelemetryConfig {
    /// OTLP endpoint (e.g., "http://localhost:4317").
    pub endpoint: String,

    /// Service name for traces.
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            opentelemetry: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "dns-failover".to_string()
}

impl FailoverConfig {
    /// Check the invariants the engine relies on.
    ///
    /// Labels and set ids must be non-empty and distinct, and every name that
    /// ends up in a DNS record must parse as a DNS name. Overlapping labels
    /// (one a substring of the other) are accepted but logged, since alarm
    /// matching is by substring.
    pub fn validate(&self) -> Result<(), FailoverError> {
        require_non_empty("failover.hosted_zone_id", &self.hosted_zone_id)?;
        require_non_empty("failover.record_name", &self.record_name)?;
        Name::from_ascii(&self.record_name)?;

        for (side, region) in [("primary", &self.primary), ("secondary", &self.secondary)] {
            require_non_empty(&format!("failover.{side}.label"), &region.label)?;
            require_non_empty(&format!("failover.{side}.set_id"), &region.set_id)?;
            require_non_empty(
                &format!("failover.{side}.endpoint.zone_id"),
                &region.endpoint.zone_id,
            )?;
            require_non_empty(
                &format!("failover.{side}.endpoint.hostname"),
                &region.endpoint.hostname,
            )?;
            Name::from_ascii(&region.endpoint.hostname)?;
        }

        if self.primary.label == self.secondary.label {
            return Err(FailoverError::Config(format!(
                "primary and secondary region labels must differ (both '{}')",
                self.primary.label
            )));
        }
        if self.primary.set_id == self.secondary.set_id {
            return Err(FailoverError::Config(format!(
                "primary and secondary set ids must differ (both '{}')",
                self.primary.set_id
            )));
        }

        if self.primary.label.contains(&self.secondary.label)
            || self.secondary.label.contains(&self.primary.label)
        {
            warn!(
                primary = %self.primary.label,
                secondary = %self.secondary.label,
                "region labels overlap; substring alarm matching may misclassify alarms"
            );
        }

        Ok(())
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<(), FailoverError> {
    if value.trim().is_empty() {
        return Err(FailoverError::Config(format!("{field} must not be empty")));
    }
    Ok(())
}
