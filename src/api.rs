//! Read-only HTTP view of the relay for dashboards and health checks.
//!
//! - `GET /` - service banner
//! - `GET /api/messages` - recent messages, oldest first (`?order=newest` for a feed)
//! - `GET /api/health` - store size, transport status and pipeline counters
//!
//! Handlers only ever take snapshots of the store, so they never wait on ingestion.

use anyhow::{anyhow, Result};
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::metrics::{Metrics, Snapshot};
use crate::store::StoreReader;

#[derive(Clone)]
pub struct ApiState {
    pub store: StoreReader,
    pub metrics: Arc<Metrics>,
    /// Serial port name (or "stdin") shown in status responses.
    pub transport: String,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/messages", get(messages))
        .route("/api/health", get(health))
        .with_state(state)
}

/// Serve the router on `bind` until the process exits.
pub async fn serve(bind: &str, state: ApiState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|e| anyhow!("Failed to bind API listener on {}: {}", bind, e))?;
    info!("API listening on http://{}", bind);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn index(State(state): State<ApiState>) -> Json<Value> {
    Json(json!({
        "service": "meshrelay",
        "status": "running",
        "serial_port": state.transport,
        "endpoints": {
            "/api/messages": "GET - Fetch recent messages (?order=newest for newest first)",
            "/api/health": "GET - Health check",
        }
    }))
}

#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    #[default]
    Oldest,
    Newest,
}

#[derive(Debug, Default, Deserialize)]
pub struct MessagesQuery {
    #[serde(default)]
    pub order: Order,
}

async fn messages(
    State(state): State<ApiState>,
    Query(query): Query<MessagesQuery>,
) -> Json<Vec<Value>> {
    let snapshot = match query.order {
        Order::Oldest => state.store.snapshot(),
        Order::Newest => state.store.newest_first(),
    };
    let views = snapshot
        .iter()
        .filter_map(|m| serde_json::to_value(m.view()).ok())
        .collect();
    Json(views)
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub total_messages: usize,
    pub serial_port: String,
    pub transport_status: &'static str,
    pub counters: Snapshot,
}

async fn health(State(state): State<ApiState>) -> Json<Health> {
    Json(Health {
        status: "healthy",
        total_messages: state.store.len(),
        serial_port: state.transport.clone(),
        transport_status: if state.metrics.transport_connected() {
            "connected"
        } else {
            "disconnected"
        },
        counters: state.metrics.snapshot(),
    })
}
