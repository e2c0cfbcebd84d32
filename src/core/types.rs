use crate::core::error::{Result, UrpoError};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

static DEFAULT_TRACE_ID: Lazy<Arc<str>> =
    Lazy::new(|| Arc::from("00000000000000000000000000000000000000000000000000000000000000"));
static DEFAULT_SPAN_ID: Lazy<Arc<str>> = Lazy::new(|| Arc::from("0000000000000000"));
static DEFAULT_SERVICE_NAME: Lazy<Arc<str>> = Lazy::new(|| Arc::from("unknown"));

const TRACE_ID_HEX_LEN: usize = 32;
const SPAN_ID_HEX_LEN: usize = 16;

fn is_lowercase_hex(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
}

/// 128-bit trace identifier, rendered as 32 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraceId(Arc<str>);

impl Default for TraceId {
    #[inline(always)]
    fn default() -> Self {
        TraceId(DEFAULT_TRACE_ID.clone())
    }
}

impl TraceId {
    /// Validates and wraps a trace id. Must be exactly 32 lowercase hex characters.
    pub fn new(id: String) -> Result<Self> {
        if id.len() != TRACE_ID_HEX_LEN || !is_lowercase_hex(&id) {
            return Err(UrpoError::InvalidSpan(format!(
                "trace_id must be {TRACE_ID_HEX_LEN} lowercase hex characters, got {id:?}"
            )));
        }
        Ok(TraceId(Arc::from(id)))
    }

    /// Wraps a string without validation. Used for IDs generated internally.
    #[inline]
    pub fn from_str_unchecked(id: &str) -> Self {
        TraceId(Arc::from(id))
    }

    /// Returns the string representation of the trace id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TraceId {
    type Err = UrpoError;

    fn from_str(s: &str) -> Result<Self> {
        TraceId::new(s.to_string())
    }
}

impl AsRef<str> for TraceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// 64-bit span identifier, rendered as 16 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpanId(Arc<str>);

impl Default for SpanId {
    #[inline(always)]
    fn default() -> Self {
        SpanId(DEFAULT_SPAN_ID.clone())
    }
}

impl SpanId {
    /// Validates and wraps a span id. Must be exactly 16 lowercase hex characters.
    pub fn new(id: String) -> Result<Self> {
        if id.len() != SPAN_ID_HEX_LEN || !is_lowercase_hex(&id) {
            return Err(UrpoError::InvalidSpan(format!(
                "span_id must be {SPAN_ID_HEX_LEN} lowercase hex characters, got {id:?}"
            )));
        }
        Ok(SpanId(Arc::from(id)))
    }

    #[inline]
    pub fn from_str_unchecked(id: &str) -> Self {
        SpanId(Arc::from(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SpanId {
    type Err = UrpoError;

    fn from_str(s: &str) -> Result<Self> {
        SpanId::new(s.to_string())
    }
}

impl AsRef<str> for SpanId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Service name identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceName(Arc<str>);

impl Default for ServiceName {
    #[inline(always)]
    fn default() -> Self {
        ServiceName(DEFAULT_SERVICE_NAME.clone())
    }
}

impl ServiceName {
    pub fn new(name: String) -> Result<Self> {
        if name.is_empty() {
            return Err(UrpoError::InvalidSpan("service_name cannot be empty".to_string()));
        }
        Ok(ServiceName(Arc::from(name)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ServiceName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Kind of a span, per the OpenTelemetry span-kind vocabulary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SpanKind {
    Internal,
    Client,
    Server,
    Producer,
    Consumer,
}

impl FromStr for SpanKind {
    type Err = UrpoError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "internal" => Ok(SpanKind::Internal),
            "client" => Ok(SpanKind::Client),
            "server" => Ok(SpanKind::Server),
            "producer" => Ok(SpanKind::Producer),
            "consumer" => Ok(SpanKind::Consumer),
            other => Err(UrpoError::InvalidSpan(format!("unknown span_kind: {other}"))),
        }
    }
}

/// Terminal status of a span's execution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SpanStatus {
    Ok,
    Error,
}

impl SpanStatus {
    #[inline(always)]
    pub fn is_error(&self) -> bool {
        matches!(self, SpanStatus::Error)
    }

    #[inline(always)]
    pub fn is_ok(&self) -> bool {
        matches!(self, SpanStatus::Ok)
    }
}

impl FromStr for SpanStatus {
    type Err = UrpoError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ok" => Ok(SpanStatus::Ok),
            "error" => Ok(SpanStatus::Error),
            other => Err(UrpoError::InvalidSpan(format!(
                "status must be \"ok\" or \"error\", got {other:?}"
            ))),
        }
    }
}

/// A W3C `traceparent` header value: `00-<trace_id-32hex>-<span_id-16hex>-<flags-2hex>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Traceparent {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub flags: u8,
}

impl fmt::Display for Traceparent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "00-{}-{}-{:02x}", self.trace_id, self.span_id, self.flags)
    }
}

impl FromStr for Traceparent {
    type Err = UrpoError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('-').collect();
        let [version, trace_id, span_id, flags] = parts.as_slice() else {
            return Err(UrpoError::invalid_span("traceparent must have 4 dash-separated fields"));
        };
        if *version != "00" {
            return Err(UrpoError::invalid_span(format!("unsupported traceparent version: {version}")));
        }
        if flags.len() != 2 || !is_lowercase_hex(flags) {
            return Err(UrpoError::invalid_span("traceparent flags must be 2 lowercase hex characters"));
        }
        let flags = u8::from_str_radix(flags, 16)
            .map_err(|_| UrpoError::invalid_span("traceparent flags are not valid hex"))?;
        Ok(Traceparent {
            trace_id: TraceId::new((*trace_id).to_string())?,
            span_id: SpanId::new((*span_id).to_string())?,
            flags,
        })
    }
}

/// (De)serializes a [`Duration`] as an integer count of nanoseconds, per the wire format.
mod duration_nanos {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_nanos() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let nanos = u64::deserialize(deserializer)?;
        Ok(Duration::from_nanos(nanos))
    }
}

/// A single unit of work within a distributed operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Span {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<SpanId>,
    pub service_name: ServiceName,
    pub operation_name: String,
    #[serde(with = "humantime_serde")]
    pub start_time: SystemTime,
    #[serde(with = "duration_nanos")]
    pub duration: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span_kind: Option<SpanKind>,
    pub status: SpanStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_sha: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(default)]
    pub cost: f64,
    #[serde(default)]
    pub has_profile: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_id: Option<String>,
}

impl Span {
    pub fn builder() -> SpanBuilder {
        SpanBuilder::default()
    }

    pub fn end_time(&self) -> SystemTime {
        self.start_time + self.duration
    }

    /// A root span has no parent.
    pub fn is_root(&self) -> bool {
        self.parent_span_id.is_none()
    }

    #[inline(always)]
    pub fn is_error(&self) -> bool {
        self.status.is_error()
    }

    /// Validates the invariants described for the span data model.
    pub fn validate(&self) -> Result<()> {
        TraceId::new(self.trace_id.as_str().to_string())?;
        SpanId::new(self.span_id.as_str().to_string())?;
        if let Some(parent) = &self.parent_span_id {
            SpanId::new(parent.as_str().to_string())?;
        }
        if self.service_name.as_str().is_empty() {
            return Err(UrpoError::invalid_span("service_name cannot be empty"));
        }
        if self.operation_name.is_empty() {
            return Err(UrpoError::invalid_span("operation_name is required"));
        }
        if self.start_time == std::time::UNIX_EPOCH {
            return Err(UrpoError::invalid_span("start_time must be non-zero"));
        }
        if self.cost < 0.0 {
            return Err(UrpoError::invalid_span("cost must be non-negative"));
        }
        Ok(())
    }

    #[inline(always)]
    pub fn duration_ms(&self) -> u64 {
        self.duration.as_millis() as u64
    }
}

/// Builder for [`Span`] values.
#[derive(Default)]
pub struct SpanBuilder {
    trace_id: Option<TraceId>,
    span_id: Option<SpanId>,
    parent_span_id: Option<SpanId>,
    service_name: Option<ServiceName>,
    operation_name: Option<String>,
    start_time: Option<SystemTime>,
    duration: Option<Duration>,
    span_kind: Option<SpanKind>,
    status: Option<SpanStatus>,
    status_message: Option<String>,
    tags: HashMap<String, String>,
    deployment_id: Option<String>,
    git_sha: Option<String>,
    environment: Option<String>,
    cost: f64,
    has_profile: bool,
    profile_id: Option<String>,
}

impl SpanBuilder {
    pub fn trace_id(mut self, trace_id: TraceId) -> Self {
        self.trace_id = Some(trace_id);
        self
    }

    pub fn span_id(mut self, span_id: SpanId) -> Self {
        self.span_id = Some(span_id);
        self
    }

    pub fn parent_span_id(mut self, parent_span_id: SpanId) -> Self {
        self.parent_span_id = Some(parent_span_id);
        self
    }

    pub fn service_name(mut self, service_name: ServiceName) -> Self {
        self.service_name = Some(service_name);
        self
    }

    pub fn operation_name<S: Into<String>>(mut self, operation_name: S) -> Self {
        self.operation_name = Some(operation_name.into());
        self
    }

    pub fn start_time(mut self, start_time: SystemTime) -> Self {
        self.start_time = Some(start_time);
        self
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn kind(mut self, kind: SpanKind) -> Self {
        self.span_kind = Some(kind);
        self
    }

    pub fn status(mut self, status: SpanStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn status_message<S: Into<String>>(mut self, message: S) -> Self {
        self.status_message = Some(message.into());
        self
    }

    pub fn tag<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn deployment_id<S: Into<String>>(mut self, id: S) -> Self {
        self.deployment_id = Some(id.into());
        self
    }

    pub fn git_sha<S: Into<String>>(mut self, sha: S) -> Self {
        self.git_sha = Some(sha.into());
        self
    }

    pub fn environment<S: Into<String>>(mut self, env: S) -> Self {
        self.environment = Some(env.into());
        self
    }

    pub fn cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }

    pub fn profile<S: Into<String>>(mut self, profile_id: S) -> Self {
        self.has_profile = true;
        self.profile_id = Some(profile_id.into());
        self
    }

    pub fn build(self) -> Result<Span> {
        let span = Span {
            trace_id: self
                .trace_id
                .ok_or_else(|| UrpoError::invalid_span("trace_id is required"))?,
            span_id: self
                .span_id
                .ok_or_else(|| UrpoError::invalid_span("span_id is required"))?,
            parent_span_id: self.parent_span_id,
            service_name: self
                .service_name
                .ok_or_else(|| UrpoError::invalid_span("service_name is required"))?,
            operation_name: self
                .operation_name
                .ok_or_else(|| UrpoError::invalid_span("operation_name is required"))?,
            start_time: self
                .start_time
                .ok_or_else(|| UrpoError::invalid_span("start_time is required"))?,
            duration: self.duration.unwrap_or_default(),
            span_kind: self.span_kind,
            status: self.status.unwrap_or(SpanStatus::Ok),
            status_message: self.status_message,
            tags: self.tags,
            deployment_id: self.deployment_id,
            git_sha: self.git_sha,
            environment: self.environment,
            cost: self.cost,
            has_profile: self.has_profile,
            profile_id: self.profile_id,
        };
        span.validate()?;
        Ok(span)
    }
}

/// A derived view assembled from every span sharing a trace_id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trace {
    pub trace_id: TraceId,
    pub spans: Vec<Span>,
    pub start_time: SystemTime,
    pub duration: Duration,
    pub services: Vec<String>,
    pub service_deployment: HashMap<String, String>,
    pub total_cost: f64,
    pub cost_breakdown: HashMap<String, f64>,
}

impl Trace {
    /// Assembles a trace from an unordered set of spans sharing a trace_id.
    pub fn from_spans(trace_id: TraceId, spans: Vec<Span>) -> Result<Self> {
        if spans.is_empty() {
            return Err(UrpoError::invalid_span("trace must contain at least one span"));
        }

        let start_time = spans
            .iter()
            .map(|s| s.start_time)
            .min()
            .expect("spans is non-empty");
        let end_time = spans
            .iter()
            .map(Span::end_time)
            .max()
            .expect("spans is non-empty");
        let duration = end_time
            .duration_since(start_time)
            .unwrap_or_else(|_| Duration::from_secs(0));

        let mut services: Vec<String> = spans
            .iter()
            .map(|s| s.service_name.as_str().to_string())
            .collect();
        services.sort_unstable();
        services.dedup();

        let mut service_deployment = HashMap::new();
        for span in &spans {
            if let Some(dep) = &span.deployment_id {
                service_deployment.insert(span.service_name.as_str().to_string(), dep.clone());
            }
        }

        let total_cost: f64 = spans.iter().map(|s| s.cost).sum();
        let mut cost_breakdown: HashMap<String, f64> = HashMap::new();
        for span in &spans {
            *cost_breakdown
                .entry(span.service_name.as_str().to_string())
                .or_insert(0.0) += span.cost;
        }

        Ok(Trace {
            trace_id,
            spans,
            start_time,
            duration,
            services,
            service_deployment,
            total_cost,
            cost_breakdown,
        })
    }

    pub fn has_errors(&self) -> bool {
        self.spans.iter().any(Span::is_error)
    }

    pub fn root_span(&self) -> Option<&Span> {
        self.spans.iter().find(|s| s.is_root())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trace_id(n: u8) -> TraceId {
        TraceId::new(format!("{:032x}", n)).unwrap()
    }

    fn span_id(n: u8) -> SpanId {
        SpanId::new(format!("{:016x}", n)).unwrap()
    }

    #[test]
    fn test_trace_id_validation() {
        assert!(TraceId::new("a".repeat(32)).is_ok());
        assert!(TraceId::new("".to_string()).is_err());
        assert!(TraceId::new("a".repeat(31)).is_err());
        assert!(TraceId::new("Z".repeat(32)).is_err());
    }

    #[test]
    fn test_span_id_validation() {
        assert!(SpanId::new("a".repeat(16)).is_ok());
        assert!(SpanId::new("a".repeat(15)).is_err());
    }

    #[test]
    fn test_span_builder() {
        let span = Span::builder()
            .trace_id(trace_id(1))
            .span_id(span_id(1))
            .service_name(ServiceName::new("frontend".to_string()).unwrap())
            .operation_name("GET /")
            .start_time(SystemTime::now())
            .tag("key", "value")
            .build()
            .unwrap();

        assert_eq!(span.operation_name, "GET /");
        assert_eq!(span.tags.get("key"), Some(&"value".to_string()));
        assert!(span.is_root());
    }

    #[test]
    fn test_span_requires_start_time_and_op_name() {
        let err = Span::builder()
            .trace_id(trace_id(1))
            .span_id(span_id(1))
            .service_name(ServiceName::new("frontend".to_string()).unwrap())
            .start_time(SystemTime::now())
            .build()
            .unwrap_err();
        assert!(matches!(err, UrpoError::InvalidSpan(_)));
    }

    #[test]
    fn test_trace_from_spans() {
        let tid = trace_id(1);
        let span = Span::builder()
            .trace_id(tid.clone())
            .span_id(span_id(1))
            .service_name(ServiceName::new("frontend".to_string()).unwrap())
            .operation_name("GET /")
            .start_time(SystemTime::now())
            .duration(Duration::from_millis(100))
            .cost(0.5)
            .build()
            .unwrap();

        let trace = Trace::from_spans(tid, vec![span]).unwrap();
        assert_eq!(trace.spans.len(), 1);
        assert_eq!(trace.services, vec!["frontend".to_string()]);
        assert_eq!(trace.total_cost, 0.5);
        assert!(!trace.has_errors());
    }

    #[test]
    fn test_trace_duration_spans_multiple_services() {
        let tid = trace_id(2);
        let t0 = SystemTime::now();
        let root = Span::builder()
            .trace_id(tid.clone())
            .span_id(span_id(1))
            .service_name(ServiceName::new("frontend".to_string()).unwrap())
            .operation_name("GET /")
            .start_time(t0)
            .duration(Duration::from_millis(100))
            .build()
            .unwrap();
        let child = Span::builder()
            .trace_id(tid.clone())
            .span_id(span_id(2))
            .parent_span_id(span_id(1))
            .service_name(ServiceName::new("api".to_string()).unwrap())
            .operation_name("handle")
            .start_time(t0 + Duration::from_millis(10))
            .duration(Duration::from_millis(50))
            .build()
            .unwrap();

        let trace = Trace::from_spans(tid, vec![root, child]).unwrap();
        assert_eq!(trace.duration, Duration::from_millis(100));
        assert_eq!(trace.services, vec!["api".to_string(), "frontend".to_string()]);
    }

    #[test]
    fn test_traceparent_round_trip() {
        let original = Traceparent {
            trace_id: trace_id(0xab),
            span_id: span_id(0xcd),
            flags: 1,
        };
        let encoded = original.to_string();
        let decoded: Traceparent = encoded.parse().unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_traceparent_rejects_malformed_strings() {
        assert!("00-short-short-01".parse::<Traceparent>().is_err());
        assert!(format!("01-{}-{}-01", "a".repeat(32), "b".repeat(16))
            .parse::<Traceparent>()
            .is_err());
        assert!(format!("00-{}-{}-gg", "a".repeat(32), "b".repeat(16))
            .parse::<Traceparent>()
            .is_err());
    }
}
