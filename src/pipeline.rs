//! # Ingestion pipeline
//!
//! Drives each line from the radio through
//! parse → dedup → classify → store → publish → relay.
//!
//! ```text
//!   Idle ──line──▶ Parse ──err──▶ Rejected ─┐
//!                    │                      │
//!                    ▼                      │
//!                  Dedup ──seen──▶ Duplicate┤
//!                    │                      │
//!                    ▼                      │
//!   Classify ─▶ Store ─▶ Publish ─▶ Relay ──┴──▶ Idle
//! ```
//!
//! Every failure is contained to the line that caused it. Waiting for the next line
//! is the loop's only idle point; a transport read error pauses and retries.

use anyhow::Result;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::classify::Classifier;
use crate::config::Config;
use crate::dedup::{DedupScope, Deduplicator};
use crate::frame::{FrameParser, ParseError};
use crate::logutil::{preview, MESSAGE_PREVIEW};
use crate::message::{Message, MessageError, Urgency};
use crate::meshtastic::LineSource;
use crate::metrics::Metrics;
use crate::relay::{DeliveryOutcome, DeliveryRelay};
use crate::store::{StoreReader, StoreWriter};

/// Pause after a transport read error before reading again.
pub const DEFAULT_RETRY_PAUSE: Duration = Duration::from_secs(2);

/// Accepted messages buffered per subscriber before it starts lagging.
const SUBSCRIBER_DEPTH: usize = 64;

/// What happened to a single line.
#[derive(Debug)]
pub enum LineOutcome {
    Rejected(ParseError),
    Duplicate,
    Accepted {
        urgency: Urgency,
        /// `None` when relaying is disabled.
        delivery: Option<DeliveryOutcome>,
    },
    /// The parser handed over a message that already carried an urgency. Parsed
    /// messages are never classified, so this only fires if that contract breaks;
    /// release builds drop the line instead of relabelling it.
    Failed(MessageError),
}

pub struct IngestionPipeline {
    parser: FrameParser,
    dedup: Deduplicator,
    classifier: Classifier,
    store: StoreWriter,
    relay: Option<DeliveryRelay>,
    metrics: Arc<Metrics>,
    events: broadcast::Sender<Message>,
    last_received_at: Option<DateTime<Utc>>,
    retry_pause: Duration,
}

impl IngestionPipeline {
    pub fn new(store: StoreWriter, classifier: Classifier) -> Self {
        let (events, _) = broadcast::channel(SUBSCRIBER_DEPTH);
        Self {
            parser: FrameParser::new(),
            dedup: Deduplicator::default(),
            classifier,
            store,
            relay: None,
            metrics: Arc::new(Metrics::new()),
            events,
            last_received_at: None,
            retry_pause: DEFAULT_RETRY_PAUSE,
        }
    }

    /// Assemble the pipeline described by `config` around `store`.
    pub fn from_config(config: &Config, store: StoreWriter) -> Result<Self> {
        let classifier = Classifier::from_config(&config.classifier)?;
        let relay = DeliveryRelay::from_config(&config.relay)?;
        Ok(Self::new(store, classifier)
            .with_parser(FrameParser::with_default_node(
                config.frame.default_node.clone(),
            ))
            .with_dedup_scope(config.store.dedup_scope)
            .with_relay(relay)
            .with_retry_pause(Duration::from_millis(config.meshtastic.read_retry_ms)))
    }

    pub fn with_parser(mut self, parser: FrameParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_dedup_scope(mut self, scope: DedupScope) -> Self {
        self.dedup = Deduplicator::new(scope);
        self
    }

    pub fn with_relay(mut self, relay: Option<DeliveryRelay>) -> Self {
        self.relay = relay;
        self
    }

    pub fn with_retry_pause(mut self, pause: Duration) -> Self {
        self.retry_pause = pause;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    pub fn reader(&self) -> StoreReader {
        self.store.reader()
    }

    /// Receive every accepted message after it has been stored.
    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.events.subscribe()
    }

    /// Run one line through every stage.
    pub async fn process_line(&mut self, line: &str) -> LineOutcome {
        self.metrics.inc_lines_read();

        let msg = match self.parser.parse(line) {
            Ok(msg) => msg,
            Err(e) => {
                self.metrics.inc_rejected();
                if e != ParseError::Empty {
                    debug!("Dropping frame ({}): {}", e, preview(line, 120));
                }
                return LineOutcome::Rejected(e);
            }
        };

        if self
            .store
            .inspect(|store| self.dedup.is_duplicate(store, &msg))
        {
            self.metrics.inc_duplicates();
            debug!(
                "Duplicate {}/{} via {} ignored",
                msg.source_node(),
                msg.message_id(),
                msg.current_node()
            );
            return LineOutcome::Duplicate;
        }

        let msg = msg.stamp(self.next_received_at());

        let classification = self
            .classifier
            .assess(msg.text(), msg.embedded_urgency())
            .await;
        if classification.fallback.is_some() {
            self.metrics.inc_classifier_fallbacks();
        }
        let urgency = classification.urgency;
        debug_assert!(msg.urgency().is_none(), "parser produced a classified message");
        let msg = match msg.classify_as(urgency) {
            Ok(msg) => msg,
            Err(e) => {
                error!("Dropping message: {}", e);
                return LineOutcome::Failed(e);
            }
        };

        info!(
            "[{}] {}/{} from '{}': {}",
            urgency,
            msg.source_node(),
            msg.message_id(),
            preview(msg.sender_name(), 32),
            preview(msg.text(), MESSAGE_PREVIEW)
        );

        if let Some(evicted) = self.store.append(msg.clone()) {
            self.metrics.inc_evicted();
            debug!(
                "Store full, evicted {}/{}",
                evicted.source_node(),
                evicted.message_id()
            );
        }
        self.metrics.inc_accepted();
        // No subscribers is fine
        let _ = self.events.send(msg.clone());

        let delivery = match &self.relay {
            Some(relay) => {
                let outcome = relay.deliver(&msg).await;
                if outcome.is_delivered() {
                    self.metrics.inc_delivered();
                } else {
                    self.metrics.inc_delivery_failed();
                }
                Some(outcome)
            }
            None => None,
        };

        LineOutcome::Accepted { urgency, delivery }
    }

    /// Consume `source` until it reports end of stream. Serial sources never do.
    pub async fn run<S: LineSource>(mut self, mut source: S) -> Result<()> {
        info!(
            "Ingestion started (classifier={}, dedup={:?}, relay={})",
            self.classifier.name(),
            self.dedup.scope(),
            self.relay.as_ref().map(|r| r.url()).unwrap_or("disabled")
        );
        self.metrics.set_transport_connected(true);
        loop {
            match source.next_line().await {
                Ok(Some(line)) => {
                    if !self.metrics.transport_connected() {
                        info!("Transport recovered");
                        self.metrics.set_transport_connected(true);
                    }
                    self.process_line(&line).await;
                }
                Ok(None) => {
                    info!("Line source closed");
                    self.metrics.set_transport_connected(false);
                    break;
                }
                Err(e) => {
                    self.metrics.inc_transport_errors();
                    self.metrics.set_transport_connected(false);
                    warn!(
                        "Transport read error: {} (retrying in {}ms)",
                        e,
                        self.retry_pause.as_millis()
                    );
                    tokio::time::sleep(self.retry_pause).await;
                }
            }
        }
        let snap = self.metrics.snapshot();
        info!(
            "Ingestion stopped: lines={} accepted={} rejected={} duplicates={} relayed={} relay_failures={}",
            snap.lines_read,
            snap.accepted,
            snap.rejected,
            snap.duplicates,
            snap.delivered,
            snap.delivery_failed
        );
        Ok(())
    }

    /// Arrival stamp that never goes backwards, even if the wall clock does.
    fn next_received_at(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = match self.last_received_at {
            Some(last) if last > now => last,
            _ => now,
        };
        self.last_received_at = Some(stamp);
        stamp
    }
}
