//! Domain types, configuration, and error handling.

pub mod config;
pub mod error;
pub mod idgen;
pub mod types;

// Re-export commonly used types
pub use config::{Config, ConfigBuilder};
pub use error::{Result, UrpoError};
pub use idgen::{new_span_id, new_trace_id};
pub use types::{
    ServiceName, Span, SpanBuilder, SpanId, SpanKind, SpanStatus, Trace, TraceId, Traceparent,
};
