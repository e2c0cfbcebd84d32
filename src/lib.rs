//! Distributed-tracing collector.
//!
//! Ingests spans over HTTP into a bounded queue drained by a worker pool,
//! assembles traces from unordered spans, and serves multi-index queries
//! over an in-memory store with capacity-based eviction.
//!
//! # Architecture
//!
//! - `core`: domain types (`Span`, `Trace`, ids), configuration, and errors.
//! - `storage`: the concurrent-safe store and its secondary indexes.
//! - `collector`: the bounded ingestion queue and worker pool.
//! - `api`: the HTTP surface (routing, request/response encoding).
//! - `cli`: process configuration and logging setup.

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod cli;
pub mod collector;
pub mod core;
pub mod storage;

use crate::collector::Collector;
use crate::core::{Config, Result};
use crate::storage::InMemoryStorage;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Wires together the store, collector, and HTTP surface, and serves until
/// a Ctrl-C signal is received. Drains the collector on the way out.
pub async fn run(config: Config) -> Result<()> {
    let storage: Arc<dyn storage::StorageBackend> =
        Arc::new(InMemoryStorage::new(config.storage.max_traces));

    let (collector, receiver) = Collector::new(config.collector.buffer_size);
    let collector = Arc::new(collector);
    collector.start(config.collector.workers, receiver, storage.clone());

    let state = api::ApiState {
        collector: collector.clone(),
        storage,
    };
    let app = api::router(state);

    let addr = format!("0.0.0.0:{}", config.server.listen_port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "listening");

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    collector.stop(Duration::from_secs(10)).await?;
    Ok(())
}
