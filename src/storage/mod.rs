//! Storage backend for span and trace data.

pub mod index;
pub mod memory;
pub mod query;

pub use memory::InMemoryStorage;
pub use query::Query;

use crate::core::{Result, Span, Trace};

/// Capability set exposed by a trace storage backend.
///
/// This is the one polymorphic seam in the system: the collector depends on
/// `Arc<dyn StorageBackend>` so an alternative backend can be substituted
/// without touching the collector or the HTTP layer.
#[async_trait::async_trait]
pub trait StorageBackend: Send + Sync {
    /// Validates and stores a span, updating every applicable index.
    async fn write(&self, span: Span) -> Result<()>;

    /// Assembles the trace for `trace_id`, or `Ok(None)` if no span has been stored for it.
    async fn get_trace(&self, trace_id: &str) -> Result<Option<Trace>>;

    /// Runs a filtered, paginated search over stored traces.
    async fn find(&self, query: &Query) -> Result<Vec<Trace>>;

    /// Every service name seen on any stored span, sorted and deduplicated.
    async fn get_services(&self) -> Result<Vec<String>>;

    /// Releases any resources held by the backend. A no-op for in-memory storage.
    async fn close(&self) -> Result<()>;
}
