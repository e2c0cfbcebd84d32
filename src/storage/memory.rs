//! In-memory storage backend for span and trace data.
//!
//! Keeps two primary, lock-free containers (`spans`, `traces`) in `DashMap`s
//! and one `tokio::sync::RwLock`-guarded set of secondary indexes. Eviction
//! runs inline on the write path, oldest-trace-first.

use super::index::SecondaryIndexes;
use super::query::Query;
use super::StorageBackend;
use crate::core::{Result, ServiceName, Span, SpanId, Trace, TraceId, UrpoError};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::RwLock;

/// Bounded, concurrent-safe in-memory store for spans and traces.
pub struct InMemoryStorage {
    spans: Arc<DashMap<SpanId, Span>>,
    traces: Arc<DashMap<TraceId, Vec<SpanId>>>,
    indexes: Arc<RwLock<SecondaryIndexes>>,
    max_traces: usize,
}

fn secs_since_epoch(t: SystemTime) -> u64 {
    t.duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl InMemoryStorage {
    /// Creates a store with the given trace capacity.
    pub fn new(max_traces: usize) -> Self {
        Self {
            spans: Arc::new(DashMap::new()),
            traces: Arc::new(DashMap::new()),
            indexes: Arc::new(RwLock::new(SecondaryIndexes::new())),
            max_traces,
        }
    }

    /// Number of traces currently tracked.
    pub fn trace_count(&self) -> usize {
        self.traces.len()
    }

    /// Number of spans currently stored.
    pub fn span_count(&self) -> usize {
        self.spans.len()
    }

    fn load_spans(&self, trace_id: &TraceId) -> Vec<Span> {
        self.traces
            .get(trace_id)
            .map(|span_ids| {
                span_ids
                    .iter()
                    .filter_map(|id| self.spans.get(id).map(|s| s.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// First-stored start_time for a trace, used as its eviction age.
    fn trace_age(&self, trace_id: &TraceId) -> Option<SystemTime> {
        self.load_spans(trace_id)
            .iter()
            .map(|s| s.start_time)
            .min()
    }

    async fn maybe_evict(&self) {
        let over = self.traces.len().saturating_sub(self.max_traces);
        if over == 0 {
            return;
        }

        let mut ages: Vec<(TraceId, SystemTime)> = self
            .traces
            .iter()
            .filter_map(|entry| {
                let trace_id = entry.key().clone();
                self.trace_age(&trace_id).map(|age| (trace_id, age))
            })
            .collect();
        ages.sort_by_key(|(_, age)| *age);

        let mut indexes = self.indexes.write().await;
        for (trace_id, _) in ages.into_iter().take(over) {
            if let Some((_, span_ids)) = self.traces.remove(&trace_id) {
                for span_id in span_ids {
                    self.spans.remove(&span_id);
                }
            }
            indexes.remove_trace(&trace_id);
        }
    }
}

#[async_trait::async_trait]
impl StorageBackend for InMemoryStorage {
    async fn write(&self, span: Span) -> Result<()> {
        span.validate()?;

        let span_id = span.span_id.clone();
        let trace_id = span.trace_id.clone();
        let service_name = span.service_name.clone();
        let start_time_secs = secs_since_epoch(span.start_time);
        let is_root = span.is_root();
        let duration_ms = span.duration.as_millis();
        let cost = span.cost;

        self.spans.insert(span_id.clone(), span);

        let trace_is_new = {
            let mut entry = self.traces.entry(trace_id.clone()).or_default();
            let is_new = entry.is_empty();
            if !entry.contains(&span_id) {
                entry.push(span_id);
            }
            is_new
        };
        let _ = trace_is_new;

        {
            let mut indexes = self.indexes.write().await;
            indexes.index_service_and_time(&service_name, start_time_secs, &trace_id);
            if is_root {
                indexes.index_root_span(duration_ms, cost, &trace_id);
            }
        }

        self.maybe_evict().await;

        Ok(())
    }

    async fn get_trace(&self, trace_id: &str) -> Result<Option<Trace>> {
        let trace_id = TraceId::from_str_unchecked(trace_id);
        let spans = self.load_spans(&trace_id);
        if spans.is_empty() {
            return Ok(None);
        }
        Trace::from_spans(trace_id, spans).map(Some)
    }

    async fn find(&self, query: &Query) -> Result<Vec<Trace>> {
        let candidates: Vec<TraceId> = {
            let indexes = self.indexes.read().await;
            if let Some(service) = &query.service {
                indexes.service_candidates(service)
            } else if query.start_time.is_some() || query.end_time.is_some() {
                let (start, end) = query.effective_window();
                let start_hour = SecondaryIndexes::hour_bucket(secs_since_epoch(start));
                let end_hour = SecondaryIndexes::hour_bucket(secs_since_epoch(end));
                indexes.timestamp_candidates(start_hour, end_hour)
            } else {
                self.traces.iter().map(|e| e.key().clone()).collect()
            }
        };

        let mut matched = Vec::new();
        for trace_id in candidates {
            let spans = self.load_spans(&trace_id);
            if spans.is_empty() {
                continue;
            }
            let trace = Trace::from_spans(trace_id, spans)?;
            if query.matches(&trace.services, trace.start_time, trace.duration, trace.total_cost) {
                matched.push(trace);
            }
        }

        matched.sort_by(|a, b| b.start_time.cmp(&a.start_time));

        let total = matched.len();
        let offset = query.offset;
        if offset >= total {
            return Ok(Vec::new());
        }
        let end = if query.limit == 0 {
            total
        } else {
            total.min(offset + query.limit)
        };
        Ok(matched[offset..end].to_vec())
    }

    async fn get_services(&self) -> Result<Vec<String>> {
        Ok(self.indexes.read().await.service_names())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

impl InMemoryStorage {
    /// Convenience for tests and the HTTP layer: look up a service name, erroring
    /// if it isn't valid, rather than silently dropping the filter.
    pub fn parse_service_name(name: &str) -> Result<ServiceName> {
        ServiceName::new(name.to_string()).map_err(|_| UrpoError::invalid_span("empty service name"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SpanStatus;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn trace_id(n: u8) -> TraceId {
        TraceId::new(format!("{:032x}", n)).unwrap()
    }

    fn span_id(n: u8) -> SpanId {
        SpanId::new(format!("{:016x}", n)).unwrap()
    }

    fn make_span(trace: u8, span: u8, service: &str, start: SystemTime, duration_ms: u64) -> Span {
        Span::builder()
            .trace_id(trace_id(trace))
            .span_id(span_id(span))
            .service_name(ServiceName::new(service.to_string()).unwrap())
            .operation_name("op")
            .start_time(start)
            .duration(Duration::from_millis(duration_ms))
            .status(SpanStatus::Ok)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_write_then_get_trace() {
        let store = InMemoryStorage::new(100);
        let now = SystemTime::now();
        store
            .write(make_span(1, 1, "frontend", now, 100))
            .await
            .unwrap();

        let trace = store
            .get_trace(trace_id(1).as_str())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(trace.spans.len(), 1);
        assert_eq!(trace.services, vec!["frontend".to_string()]);
        assert_eq!(trace.duration, Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_get_trace_missing_returns_none() {
        let store = InMemoryStorage::new(100);
        assert!(store.get_trace(trace_id(99).as_str()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_multi_service_trace_duration() {
        let store = InMemoryStorage::new(100);
        let t0 = SystemTime::now();
        store.write(make_span(1, 1, "frontend", t0, 100)).await.unwrap();
        store
            .write(make_span(1, 2, "api", t0 + Duration::from_millis(10), 50))
            .await
            .unwrap();
        store
            .write(make_span(1, 3, "database", t0 + Duration::from_millis(20), 25))
            .await
            .unwrap();

        let trace = store.get_trace(trace_id(1).as_str()).await.unwrap().unwrap();
        assert_eq!(trace.duration, Duration::from_millis(100));
        assert_eq!(
            trace.services,
            vec!["api".to_string(), "database".to_string(), "frontend".to_string()]
        );
    }

    #[tokio::test]
    async fn test_eviction_keeps_newest_traces() {
        let store = InMemoryStorage::new(5);
        let base = SystemTime::now();
        for i in 0u8..10 {
            store
                .write(make_span(
                    i,
                    i,
                    "svc",
                    base + Duration::from_millis(i as u64 * 1000),
                    10,
                ))
                .await
                .unwrap();
        }

        assert_eq!(store.trace_count(), 5);
        for i in 5u8..10 {
            assert!(store.get_trace(trace_id(i).as_str()).await.unwrap().is_some());
        }
        for i in 0u8..5 {
            assert!(store.get_trace(trace_id(i).as_str()).await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn test_find_by_service() {
        let store = InMemoryStorage::new(1000);
        let base = SystemTime::now();
        for service_idx in 0u8..10 {
            for span_idx in 0u8..10 {
                let trace_num = service_idx * 10 + span_idx;
                store
                    .write(make_span(
                        trace_num,
                        trace_num,
                        &format!("service-{service_idx}"),
                        base + Duration::from_millis(trace_num as u64),
                        10,
                    ))
                    .await
                    .unwrap();
            }
        }

        let query = Query {
            service: Some(ServiceName::new("service-5".to_string()).unwrap()),
            ..Query::new()
        };
        let results = store.find(&query).await.unwrap();
        assert_eq!(results.len(), 10);
        for trace in &results {
            assert!(trace.services.contains(&"service-5".to_string()));
        }
    }

    #[tokio::test]
    async fn test_get_services_sorted_and_deduped() {
        let store = InMemoryStorage::new(100);
        let now = SystemTime::now();
        store.write(make_span(1, 1, "zeta", now, 10)).await.unwrap();
        store.write(make_span(2, 2, "alpha", now, 10)).await.unwrap();
        store.write(make_span(3, 3, "alpha", now, 10)).await.unwrap();

        let services = store.get_services().await.unwrap();
        assert_eq!(services, vec!["alpha".to_string(), "zeta".to_string()]);
    }

    #[tokio::test]
    async fn test_pagination_limit_and_offset() {
        let store = InMemoryStorage::new(1000);
        let base = SystemTime::now();
        for i in 0u8..20 {
            store
                .write(make_span(i, i, "svc", base + Duration::from_millis(i as u64), 10))
                .await
                .unwrap();
        }

        let query = Query {
            limit: 5,
            offset: 0,
            ..Query::new()
        };
        let page1 = store.find(&query).await.unwrap();
        assert_eq!(page1.len(), 5);

        let query = Query {
            limit: 5,
            offset: 18,
            ..Query::new()
        };
        let tail = store.find(&query).await.unwrap();
        assert_eq!(tail.len(), 2);

        let query = Query {
            limit: 5,
            offset: 100,
            ..Query::new()
        };
        assert!(store.find(&query).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_span_id_overwrites() {
        let store = InMemoryStorage::new(100);
        let now = SystemTime::now();
        store.write(make_span(1, 1, "frontend", now, 100)).await.unwrap();
        store.write(make_span(1, 1, "frontend", now, 200)).await.unwrap();

        let trace = store.get_trace(trace_id(1).as_str()).await.unwrap().unwrap();
        assert_eq!(trace.spans.len(), 1);
        assert_eq!(trace.duration, Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_invalid_span_rejected() {
        let store = InMemoryStorage::new(100);
        let bad = Span::builder()
            .trace_id(trace_id(1))
            .span_id(span_id(1))
            .service_name(ServiceName::new("frontend".to_string()).unwrap())
            .operation_name("")
            .start_time(SystemTime::now())
            .build();
        assert!(bad.is_err());
        let _ = store; // store untouched by a span that never builds
    }
}
