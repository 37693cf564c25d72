//! Best-effort forwarding of accepted messages to the aggregation backend.
//!
//! Each message is POSTed once as `{"logs": [record]}`. There is no retry, backoff or
//! queue: a failed delivery is reported as [`DeliveryOutcome::Failed`] and the message
//! stays in the local store either way.

use anyhow::{anyhow, Result};
use log::{debug, warn};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::time::Duration;

use crate::config::RelayConfig;
use crate::message::{GpsFix, Message, NodeId, Urgency};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Failed(String),
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered)
    }
}

/// Record layout expected by the aggregator.
#[derive(Debug, Serialize)]
pub struct RelayRecord<'a> {
    pub source_node: &'a NodeId,
    pub current_node: &'a NodeId,
    pub message_id: &'a str,
    /// The aggregator expects `{}` rather than `null` when there is no fix.
    #[serde(serialize_with = "gps_or_empty")]
    pub gps: Option<GpsFix>,
    pub sender_name: &'a str,
    pub message: &'a str,
    pub log_id: i64,
    pub urgency: Option<Urgency>,
}

impl<'a> From<&'a Message> for RelayRecord<'a> {
    fn from(msg: &'a Message) -> Self {
        Self {
            source_node: msg.source_node(),
            current_node: msg.current_node(),
            message_id: msg.message_id(),
            gps: msg.gps(),
            sender_name: msg.sender_name(),
            message: msg.text(),
            log_id: msg.received_at().map(|t| t.timestamp()).unwrap_or_default(),
            urgency: msg.urgency(),
        }
    }
}

fn gps_or_empty<S: Serializer>(gps: &Option<GpsFix>, serializer: S) -> Result<S::Ok, S::Error> {
    match gps {
        Some(fix) => fix.serialize(serializer),
        None => serializer.serialize_map(Some(0))?.end(),
    }
}

#[derive(Debug, Serialize)]
pub struct Envelope<'a> {
    pub logs: [RelayRecord<'a>; 1],
}

impl<'a> Envelope<'a> {
    pub fn single(msg: &'a Message) -> Self {
        Self {
            logs: [RelayRecord::from(msg)],
        }
    }
}

pub struct DeliveryRelay {
    url: String,
    client: reqwest::Client,
}

impl DeliveryRelay {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow!("Failed to build relay HTTP client: {}", e))?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    /// `None` when relaying is disabled in config.
    pub fn from_config(cfg: &RelayConfig) -> Result<Option<Self>> {
        if !cfg.enabled {
            return Ok(None);
        }
        Self::new(cfg.url.clone(), Duration::from_secs(cfg.timeout_seconds)).map(Some)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Single delivery attempt. Never returns an error; failures are values.
    pub async fn deliver(&self, msg: &Message) -> DeliveryOutcome {
        let envelope = Envelope::single(msg);
        let outcome = match self.client.post(&self.url).json(&envelope).send().await {
            Ok(response) if response.status().is_success() => DeliveryOutcome::Delivered,
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                DeliveryOutcome::Failed(format!(
                    "aggregator returned {}: {}",
                    status,
                    crate::logutil::preview(&body, 120)
                ))
            }
            Err(e) if e.is_timeout() => DeliveryOutcome::Failed("request timed out".to_string()),
            Err(e) => DeliveryOutcome::Failed(e.to_string()),
        };
        match &outcome {
            DeliveryOutcome::Delivered => debug!(
                "Relayed {}/{} with urgency {:?}",
                msg.source_node(),
                msg.message_id(),
                msg.urgency()
            ),
            DeliveryOutcome::Failed(reason) => warn!(
                "Relay of {}/{} failed: {}",
                msg.source_node(),
                msg.message_id(),
                reason
            ),
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn envelope_matches_aggregator_shape() {
        let received = chrono::Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let msg = Message::new("5".into(), "!relay".into(), "0042", "Alice", "Need water")
            .with_gps(GpsFix::new(28.5, 77.25))
            .stamp(received)
            .classify_as(Urgency::Medium)
            .unwrap();
        let json = serde_json::to_value(Envelope::single(&msg)).unwrap();
        let record = &json["logs"][0];
        assert_eq!(json["logs"].as_array().unwrap().len(), 1);
        assert_eq!(record["source_node"], 5);
        assert_eq!(record["current_node"], "!relay");
        assert_eq!(record["message_id"], "0042");
        assert_eq!(record["sender_name"], "Alice");
        assert_eq!(record["message"], "Need water");
        assert_eq!(record["log_id"], received.timestamp());
        assert_eq!(record["urgency"], "MEDIUM");
        assert_eq!(record["gps"]["latitude"], 28.5);
    }

    fn record_json(line: &str) -> serde_json::Value {
        let msg = crate::frame::parse_frame(line).unwrap();
        let json = serde_json::to_value(Envelope::single(&msg)).unwrap();
        json["logs"][0].clone()
    }

    #[test]
    fn missing_gps_is_sent_as_empty_object() {
        let record = record_json("SRC=5,CUR=5,ID=1:Alice-Need water");
        assert_eq!(record["gps"], serde_json::json!({}));
    }

    #[test]
    fn leading_zero_ids_are_not_folded_into_numbers() {
        let padded = record_json("SRC=007,CUR=007,ID=1:a-b");
        let plain = record_json("SRC=7,CUR=7,ID=1:a-b");
        assert_eq!(padded["source_node"], "007");
        assert_eq!(padded["current_node"], "007");
        assert_eq!(plain["source_node"], 7);
        assert_ne!(padded["source_node"], plain["source_node"]);
    }

    #[test]
    fn json_ids_keep_their_wire_type() {
        let record = record_json(r#"{"source_node":"5","current_node":9,"message":"x"}"#);
        assert_eq!(record["source_node"], "5");
        assert_eq!(record["current_node"], 9);

        let defaults = record_json(r#"{"message":"x"}"#);
        assert_eq!(defaults["source_node"], 0);
    }

    #[test]
    fn disabled_relay_builds_nothing() {
        let cfg = RelayConfig {
            enabled: false,
            ..RelayConfig::default()
        };
        assert!(DeliveryRelay::from_config(&cfg).unwrap().is_none());
    }
}
