//! # Meshrelay - disaster-relief message relay for Meshtastic field nodes
//!
//! A field node attached over USB/UART prints one frame per line: a short text
//! message plus routing metadata. Meshrelay parses each frame, drops repeats heard
//! through the mesh, labels the message HIGH/MEDIUM/LOW, keeps a bounded window of
//! recent traffic, and forwards every new message to an aggregation backend.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use meshrelay::config::Config;
//! use meshrelay::meshtastic::SerialLineSource;
//! use meshrelay::pipeline::IngestionPipeline;
//! use meshrelay::store;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let (writer, _reader) = store::shared(config.store.capacity);
//!     let pipeline = IngestionPipeline::from_config(&config, writer)?;
//!     let source =
//!         SerialLineSource::open(&config.meshtastic.port, config.meshtastic.baud_rate).await?;
//!     pipeline.run(source).await
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`frame`] - line parser for the JSON and compact frame encodings
//! - [`message`] - message, node id, GPS and urgency types
//! - [`dedup`] - duplicate detection over the store window
//! - [`classify`] - urgency classification strategies
//! - [`store`] - bounded FIFO of accepted messages
//! - [`relay`] - best-effort delivery to the aggregator
//! - [`pipeline`] - the ingestion loop tying the stages together
//! - [`meshtastic`] - line sources (serial port, async readers)
//! - [`api`] - read-only HTTP view
//! - [`config`] - TOML configuration
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  Field node     │ ← serial line source (dedicated reader thread)
//! └─────────────────┘
//!          │
//! ┌─────────────────┐      ┌─────────────────┐
//! │  Ingestion      │─────→│  Aggregator     │ ← single HTTP attempt per message
//! │  Pipeline       │      └─────────────────┘
//! └─────────────────┘
//!          │
//! ┌─────────────────┐      ┌─────────────────┐
//! │  Bounded store  │←─────│  HTTP API       │ ← snapshot reads only
//! └─────────────────┘      └─────────────────┘
//! ```

pub mod api;
pub mod classify;
pub mod config;
pub mod dedup;
pub mod frame;
pub mod logutil;
pub mod message;
pub mod meshtastic;
pub mod metrics;
pub mod pipeline;
pub mod relay;
pub mod store;
