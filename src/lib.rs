//! DNS Failover - alarm-driven switching of a DNS failover record pair.
//!
//! This crate reacts to state changes of the primary region's health alarm and
//! rewrites a pair of failover DNS records so that exactly one region holds the
//! PRIMARY slot. Before any switch, the health metric of the region about to
//! become authoritative is checked; missing or low health vetoes the switch.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          dns-failover                            │
//! │                                                                  │
//! │  notification ──▶ ┌──────────────┐    ┌───────────────────────┐  │
//! │  envelope         │    alarm     │───▶│        engine         │  │
//! │                   │ (interpret)  │    │  (decision per event) │  │
//! │                   └──────────────┘    └─────┬───────────┬─────┘  │
//! │                                             │           │        │
//! │                                             ▼           ▼        │
//! │                                   ┌──────────────┐ ┌──────────┐  │
//! │                                   │    health    │ │ records  │  │
//! │                                   │   (oracle)   │ │(publish) │  │
//! │                                   └──────┬───────┘ └────┬─────┘  │
//! └──────────────────────────────────────────┼──────────────┼────────┘
//!                                            ▼              ▼
//!                                     metrics backend   DNS change API
//! ```
//!
//! ## Decisions
//!
//! ```text
//! primary alarm -> ALARM : secondary health > 0.5 ? secondary becomes PRIMARY : skip
//! primary alarm -> OK    : primary health > 0.5   ? primary becomes PRIMARY   : skip
//! anything else          : no-op
//! ```
//!
//! The engine keeps no state between events. Every publish is a full UPSERT of
//! both entries, so repeating an event republishes the same pair.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use dns_failover::{http, Config, FailoverEngine};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::load(Path::new("dns-failover.toml")).unwrap();
//!     config.failover.validate().unwrap();
//!     let (metrics, records) = http::clients(&config.backends);
//!
//!     let engine = FailoverEngine::new(Arc::new(config.failover), metrics, records);
//!     let decision = engine.handle_envelope(br#"{"Records": []}"#).await.unwrap();
//!     println!("{}", decision.kind());
//! }
//! ```

#![warn(missing_docs)]

pub mod alarm;
pub mod config;
pub mod engine;
pub mod error;
pub mod health;
pub mod http;
pub mod metrics;
pub mod records;
pub mod telemetry;

// Re-export main types
pub use alarm::{AlarmEvent, AlarmState};
pub use config::{Config, Endpoint, FailoverConfig, RegionConfig, TelemetryConfig};
pub use engine::{Decision, FailoverEngine, SkipReason};
pub use error::FailoverError;
pub use health::{HealthOracle, HealthSample, MetricSource};
pub use records::{ChangeBatch, ChangeInfo, FailoverRole, RecordClient, RecordPublisher};
