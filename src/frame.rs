//! Frame parser: turns one line from the radio into a [`Message`].
//!
//! Field nodes emit one of two encodings depending on firmware:
//!
//! * a JSON object, e.g.
//!   `{"source_node": 5, "current_node": 9, "message_id": "0042", "sender_name": "Alice",
//!   "message": "Need water", "gps": {"latitude": 28.6, "longitude": 77.2}}`
//!   (the older dashboard firmware uses the short keys `src`, `cur`, `msg_id`, `name`);
//! * a compact tagged line, `SRC=5,CUR=9,ID=0042:Alice-Need water`.
//!
//! Parsing is total: every input either yields a fully built message or a [`ParseError`].

use log::trace;
use serde_json::{Map, Value};

use crate::message::{GpsFix, Message, NodeId, Urgency};

pub const DEFAULT_NODE: &str = "0";
pub const DEFAULT_MESSAGE_ID: &str = "0000";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty frame")]
    Empty,

    #[error("malformed JSON frame: {0}")]
    MalformedJson(String),

    #[error("JSON frame is not an object")]
    NotAnObject,

    #[error("invalid field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("compact frame has no ':' separator")]
    MissingSeparator,

    #[error("bad compact header: {0}")]
    BadHeader(String),
}

/// Parser for incoming radio frames.
#[derive(Debug, Clone)]
pub struct FrameParser {
    default_node: String,
}

impl FrameParser {
    pub fn new() -> Self {
        Self::with_default_node(DEFAULT_NODE)
    }

    /// Use a different fallback node id for JSON frames that omit node keys.
    pub fn with_default_node(default_node: impl Into<String>) -> Self {
        Self {
            default_node: default_node.into(),
        }
    }

    pub fn parse(&self, raw: &str) -> Result<Message, ParseError> {
        let line = raw.trim();
        if line.is_empty() {
            return Err(ParseError::Empty);
        }
        if line.starts_with('{') {
            self.parse_structured(line)
        } else {
            parse_compact(line)
        }
    }

    fn parse_structured(&self, line: &str) -> Result<Message, ParseError> {
        let value: Value =
            serde_json::from_str(line).map_err(|e| ParseError::MalformedJson(e.to_string()))?;
        let obj = value.as_object().ok_or(ParseError::NotAnObject)?;

        let source = id_field(obj, "source_node", "src")?
            .unwrap_or_else(|| NodeId::from_text(&self.default_node));
        let current = id_field(obj, "current_node", "cur")?
            .unwrap_or_else(|| NodeId::from_text(&self.default_node));
        let message_id = id_field(obj, "message_id", "msg_id")?
            .map(|id| id.as_str().to_string())
            .unwrap_or_else(|| DEFAULT_MESSAGE_ID.to_string());
        let sender_name = text_field(obj, "sender_name", Some("name"))?;
        let text = text_field(obj, "message", None)?;
        let gps = gps_field(obj)?;
        // An unrecognized label is not a reason to drop the frame; it just carries no hint.
        let embedded = obj
            .get("urgency")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<Urgency>().ok());

        trace!("Parsed JSON frame {}/{}", source, message_id);
        Ok(
            Message::new(source, current, message_id, sender_name, text)
                .with_gps(gps)
                .with_embedded_urgency(embedded),
        )
    }
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse with default settings.
pub fn parse_frame(raw: &str) -> Result<Message, ParseError> {
    FrameParser::new().parse(raw)
}

fn lookup<'a>(obj: &'a Map<String, Value>, key: &str, alias: Option<&str>) -> Option<&'a Value> {
    obj.get(key)
        .or_else(|| alias.and_then(|a| obj.get(a)))
        .filter(|v| !v.is_null())
}

/// Identifier that may be sent as a string or an integer; the JSON type is kept.
fn id_field(
    obj: &Map<String, Value>,
    key: &'static str,
    alias: &str,
) -> Result<Option<NodeId>, ParseError> {
    match lookup(obj, key, Some(alias)) {
        None => Ok(None),
        Some(Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() {
                Err(ParseError::InvalidField {
                    field: key,
                    reason: "empty".into(),
                })
            } else {
                Ok(Some(NodeId::new(s)))
            }
        }
        Some(Value::Number(n)) => match (n.as_u64(), n.as_i64()) {
            (Some(u), _) => Ok(Some(NodeId::from(u))),
            (None, Some(i)) => Ok(Some(NodeId::from(i))),
            _ => Err(ParseError::InvalidField {
                field: key,
                reason: format!("expected integer, got {}", n),
            }),
        },
        Some(other) => Err(ParseError::InvalidField {
            field: key,
            reason: format!("expected string or integer, got {}", json_kind(other)),
        }),
    }
}

fn text_field(
    obj: &Map<String, Value>,
    key: &'static str,
    alias: Option<&str>,
) -> Result<String, ParseError> {
    match lookup(obj, key, alias) {
        None => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(ParseError::InvalidField {
            field: key,
            reason: format!("expected string, got {}", json_kind(other)),
        }),
    }
}

fn gps_field(obj: &Map<String, Value>) -> Result<Option<GpsFix>, ParseError> {
    let gps = match lookup(obj, "gps", None) {
        None => return Ok(None),
        Some(Value::Object(m)) if m.is_empty() => return Ok(None),
        Some(Value::Object(m)) => m,
        Some(other) => {
            return Err(ParseError::InvalidField {
                field: "gps",
                reason: format!("expected object, got {}", json_kind(other)),
            })
        }
    };
    let coord = |key: &str, alias: &str| {
        lookup(gps, key, Some(alias))
            .and_then(Value::as_f64)
            .ok_or_else(|| ParseError::InvalidField {
                field: "gps",
                reason: format!("missing or non-numeric {}", key),
            })
    };
    let latitude = coord("latitude", "lat")?;
    let longitude = coord("longitude", "lon")?;
    GpsFix::new(latitude, longitude)
        .map(Some)
        .ok_or_else(|| ParseError::InvalidField {
            field: "gps",
            reason: format!("coordinates out of range ({}, {})", latitude, longitude),
        })
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn parse_compact(line: &str) -> Result<Message, ParseError> {
    let (header, content) = line.split_once(':').ok_or(ParseError::MissingSeparator)?;

    let mut src = None;
    let mut cur = None;
    let mut id = None;
    let tokens: Vec<&str> = header.split(',').collect();
    if tokens.len() != 3 {
        return Err(ParseError::BadHeader(format!(
            "expected 3 tokens, found {}",
            tokens.len()
        )));
    }
    for token in tokens {
        let (key, value) = token
            .split_once('=')
            .ok_or_else(|| ParseError::BadHeader(format!("token '{}' is not KEY=VALUE", token.trim())))?;
        let key = key.trim();
        let value = value.trim();
        if value.is_empty() {
            return Err(ParseError::BadHeader(format!("{} has no value", key)));
        }
        let slot = match key.to_ascii_uppercase().as_str() {
            "SRC" => &mut src,
            "CUR" => &mut cur,
            "ID" => &mut id,
            _ => return Err(ParseError::BadHeader(format!("unknown key '{}'", key))),
        };
        if slot.replace(value).is_some() {
            return Err(ParseError::BadHeader(format!("duplicate key '{}'", key)));
        }
    }
    // Three unique keys out of three known ones, so all are present.
    let (Some(src), Some(cur), Some(id)) = (src, cur, id) else {
        return Err(ParseError::BadHeader("missing SRC, CUR or ID".into()));
    };

    let (name, text) = match content.split_once('-') {
        Some((name, text)) => (name.trim(), text.trim()),
        None => ("", content.trim()),
    };

    trace!("Parsed compact frame {}/{}", src, id);
    Ok(Message::new(src.into(), cur.into(), id, name, text))
}
