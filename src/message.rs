//! Core message types shared by every pipeline stage.
//!
//! A [`Message`] is produced by the frame parser, stamped with its arrival time when
//! the pipeline accepts it, and classified exactly once. Fields are private so the
//! only mutations are those two transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Urgency label attached to a message after classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Urgency {
    High,
    Medium,
    Low,
}

impl Urgency {
    /// Candidate labels in the order offered to classifiers.
    pub const LABELS: [&'static str; 3] = ["HIGH", "MEDIUM", "LOW"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::High => "HIGH",
            Urgency::Medium => "MEDIUM",
            Urgency::Low => "LOW",
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown urgency label '{0}'")]
pub struct UnknownUrgency(pub String);

impl FromStr for Urgency {
    type Err = UnknownUrgency;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HIGH" => Ok(Urgency::High),
            "MEDIUM" => Ok(Urgency::Medium),
            "LOW" => Ok(Urgency::Low),
            _ => Err(UnknownUrgency(s.to_string())),
        }
    }
}

/// Mesh node identifier.
///
/// Radios report ids either as JSON integers or as strings depending on firmware.
/// The id keeps its textual form for matching and remembers whether it arrived as a
/// number, so the relay re-emits it in the same JSON type. Equality, ordering and
/// hashing look at the text only: `5` and `"5"` name the same node.
#[derive(Debug, Clone)]
pub struct NodeId {
    id: String,
    numeric: bool,
}

impl NodeId {
    /// An id that arrived as a string. It is always re-emitted as a string.
    pub fn new(id: impl Into<String>) -> Self {
        NodeId {
            id: id.into(),
            numeric: false,
        }
    }

    /// An id read from untyped text such as a compact header. Canonical decimal
    /// integers (no sign, no leading zeros) count as numbers; `"007"` stays text.
    pub fn from_text(id: &str) -> Self {
        let canonical = !id.is_empty()
            && id.bytes().all(|b| b.is_ascii_digit())
            && (id == "0" || !id.starts_with('0'))
            && id.parse::<u64>().is_ok();
        NodeId {
            id: id.to_string(),
            numeric: canonical,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.id
    }

    /// Whether the id arrived as a JSON number.
    pub fn is_numeric(&self) -> bool {
        self.numeric
    }

    /// Numeric value when the id arrived as a non-negative integer.
    pub fn as_number(&self) -> Option<u64> {
        if !self.numeric {
            return None;
        }
        self.id.parse().ok()
    }
}

impl PartialEq for NodeId {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for NodeId {}

impl Hash for NodeId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for NodeId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NodeId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        NodeId::from_text(s)
    }
}

impl From<u64> for NodeId {
    fn from(n: u64) -> Self {
        NodeId {
            id: n.to_string(),
            numeric: true,
        }
    }
}

impl From<i64> for NodeId {
    fn from(n: i64) -> Self {
        NodeId {
            id: n.to_string(),
            numeric: true,
        }
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.numeric {
            if let Ok(n) = self.id.parse::<u64>() {
                return serializer.serialize_u64(n);
            }
            if let Ok(n) = self.id.parse::<i64>() {
                return serializer.serialize_i64(n);
            }
        }
        serializer.serialize_str(&self.id)
    }
}

/// GPS fix reported by the originating radio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsFix {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsFix {
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        valid.then_some(GpsFix {
            latitude,
            longitude,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessageError {
    #[error("message {source_node}/{message_id} is already classified as {urgency}")]
    AlreadyClassified {
        source_node: NodeId,
        message_id: String,
        urgency: Urgency,
    },
}

/// A disaster-relief message received from the mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    source_node: NodeId,
    current_node: NodeId,
    message_id: String,
    sender_name: String,
    text: String,
    gps: Option<GpsFix>,
    embedded_urgency: Option<Urgency>,
    urgency: Option<Urgency>,
    received_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn new(
        source_node: NodeId,
        current_node: NodeId,
        message_id: impl Into<String>,
        sender_name: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            source_node,
            current_node,
            message_id: message_id.into(),
            sender_name: sender_name.into(),
            text: text.into(),
            gps: None,
            embedded_urgency: None,
            urgency: None,
            received_at: None,
        }
    }

    pub fn with_gps(mut self, gps: Option<GpsFix>) -> Self {
        self.gps = gps;
        self
    }

    /// Urgency already carried by the frame, if the sender supplied one.
    pub fn with_embedded_urgency(mut self, urgency: Option<Urgency>) -> Self {
        self.embedded_urgency = urgency;
        self
    }

    /// Stamp the acceptance time. Called by the pipeline once the message passed dedup.
    pub fn stamp(mut self, received_at: DateTime<Utc>) -> Self {
        self.received_at = Some(received_at);
        self
    }

    /// Assign the classification result. A message can only be classified once.
    pub fn classify_as(mut self, urgency: Urgency) -> Result<Self, MessageError> {
        if let Some(existing) = self.urgency {
            return Err(MessageError::AlreadyClassified {
                source_node: self.source_node,
                message_id: self.message_id,
                urgency: existing,
            });
        }
        self.urgency = Some(urgency);
        Ok(self)
    }

    pub fn source_node(&self) -> &NodeId {
        &self.source_node
    }

    pub fn current_node(&self) -> &NodeId {
        &self.current_node
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn sender_name(&self) -> &str {
        &self.sender_name
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn gps(&self) -> Option<GpsFix> {
        self.gps
    }

    pub fn embedded_urgency(&self) -> Option<Urgency> {
        self.embedded_urgency
    }

    pub fn urgency(&self) -> Option<Urgency> {
        self.urgency
    }

    pub fn received_at(&self) -> Option<DateTime<Utc>> {
        self.received_at
    }

    /// Dashboard view. Key names are consumed verbatim by the web frontend.
    pub fn view(&self) -> MessageView<'_> {
        MessageView {
            src: self.source_node.as_str(),
            cur: self.current_node.as_str(),
            msg_id: &self.message_id,
            name: &self.sender_name,
            message: &self.text,
            gps: self.gps,
            urgency: self.urgency,
            received_at: self.received_at,
        }
    }
}

/// Serialized shape exposed to the presentation layer.
#[derive(Debug, Serialize)]
pub struct MessageView<'a> {
    pub src: &'a str,
    pub cur: &'a str,
    pub msg_id: &'a str,
    pub name: &'a str,
    pub message: &'a str,
    pub gps: Option<GpsFix>,
    pub urgency: Option<Urgency>,
    pub received_at: Option<DateTime<Utc>>,
}
