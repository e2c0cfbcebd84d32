//! Shared fixtures for integration tests.

use std::time::{Duration, SystemTime};
use tracecollector::core::{ServiceName, Span, SpanId, SpanStatus, TraceId};

/// Builds a span with sensible defaults, overridable per test.
pub struct TestSpanBuilder {
    trace_id: TraceId,
    span_num: u8,
    service: String,
    is_root: bool,
    status: SpanStatus,
    duration: Duration,
}

impl TestSpanBuilder {
    pub fn new(trace_num: u8, span_num: u8) -> Self {
        Self {
            trace_id: TraceId::new(format!("{:032x}", trace_num)).unwrap(),
            span_num,
            service: "test-service".to_string(),
            is_root: span_num == 0,
            status: SpanStatus::Ok,
            duration: Duration::from_millis(100),
        }
    }

    pub fn service(mut self, service: &str) -> Self {
        self.service = service.to_string();
        self
    }

    pub fn with_error(mut self) -> Self {
        self.status = SpanStatus::Error;
        self
    }

    pub fn as_root(mut self, is_root: bool) -> Self {
        self.is_root = is_root;
        self
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn build(self) -> Span {
        let span_id = SpanId::new(format!("{:016x}", self.span_num as u64 + 1)).unwrap();
        let mut builder = Span::builder()
            .trace_id(self.trace_id)
            .span_id(span_id)
            .service_name(ServiceName::new(self.service).unwrap())
            .operation_name("test-op")
            .start_time(SystemTime::now())
            .duration(self.duration)
            .status(self.status);

        if !self.is_root {
            builder = builder.parent_span_id(SpanId::new(format!("{:016x}", 1)).unwrap());
        }

        builder.build().unwrap()
    }
}
