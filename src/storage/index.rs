//! Secondary indexes over stored traces.

use crate::core::{ServiceName, TraceId};
use std::collections::HashMap;

/// Duration bucket a trace's root span falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DurationBucket {
    Fast,
    Medium,
    Slow,
    VerySlow,
}

impl DurationBucket {
    /// Classifies a duration. Boundaries are inclusive-low, exclusive-high.
    pub fn classify(duration_ms: u128) -> Self {
        if duration_ms < 10 {
            DurationBucket::Fast
        } else if duration_ms < 100 {
            DurationBucket::Medium
        } else if duration_ms < 1000 {
            DurationBucket::Slow
        } else {
            DurationBucket::VerySlow
        }
    }

    const ALL: [DurationBucket; 4] = [
        DurationBucket::Fast,
        DurationBucket::Medium,
        DurationBucket::Slow,
        DurationBucket::VerySlow,
    ];
}

/// Cost bucket a trace's root span falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CostBucket {
    Cheap,
    Moderate,
    Expensive,
}

impl CostBucket {
    /// Classifies a cost value. Boundaries are inclusive-low, exclusive-high.
    pub fn classify(cost: f64) -> Self {
        if cost < 1e-4 {
            CostBucket::Cheap
        } else if cost < 1e-3 {
            CostBucket::Moderate
        } else {
            CostBucket::Expensive
        }
    }

    const ALL: [CostBucket; 3] = [CostBucket::Cheap, CostBucket::Moderate, CostBucket::Expensive];
}

/// Appends `trace_id` to `bucket` unless it is already present.
fn push_unique(bucket: &mut Vec<TraceId>, trace_id: &TraceId) {
    if !bucket.contains(trace_id) {
        bucket.push(trace_id.clone());
    }
}

/// Removes every occurrence of `trace_id` from `bucket`.
fn remove_all(bucket: &mut Vec<TraceId>, trace_id: &TraceId) {
    bucket.retain(|id| id != trace_id);
}

/// The four secondary indexes, collectively guarded by a single lock in
/// [`crate::storage::memory::InMemoryStorage`].
#[derive(Debug, Default)]
pub struct SecondaryIndexes {
    pub by_service: HashMap<ServiceName, Vec<TraceId>>,
    pub by_timestamp: HashMap<u64, Vec<TraceId>>,
    pub by_duration: HashMap<DurationBucket, Vec<TraceId>>,
    pub by_cost: HashMap<CostBucket, Vec<TraceId>>,
}

impl SecondaryIndexes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hour bucket for a start-time-in-seconds value.
    pub fn hour_bucket(start_time_secs: u64) -> u64 {
        start_time_secs / 3600
    }

    /// Records `trace_id` under the service and hour-bucket indexes.
    pub fn index_service_and_time(
        &mut self,
        service: &ServiceName,
        start_time_secs: u64,
        trace_id: &TraceId,
    ) {
        push_unique(
            self.by_service.entry(service.clone()).or_default(),
            trace_id,
        );
        let hour = Self::hour_bucket(start_time_secs);
        push_unique(self.by_timestamp.entry(hour).or_default(), trace_id);
    }

    /// Records `trace_id` under the duration and cost indexes, based on a root span.
    pub fn index_root_span(&mut self, duration_ms: u128, cost: f64, trace_id: &TraceId) {
        let duration_bucket = DurationBucket::classify(duration_ms);
        push_unique(
            self.by_duration.entry(duration_bucket).or_default(),
            trace_id,
        );
        let cost_bucket = CostBucket::classify(cost);
        push_unique(self.by_cost.entry(cost_bucket).or_default(), trace_id);
    }

    /// Removes every trace of `trace_id` from every index.
    pub fn remove_trace(&mut self, trace_id: &TraceId) {
        for bucket in self.by_service.values_mut() {
            remove_all(bucket, trace_id);
        }
        for bucket in self.by_timestamp.values_mut() {
            remove_all(bucket, trace_id);
        }
        for kind in DurationBucket::ALL {
            if let Some(bucket) = self.by_duration.get_mut(&kind) {
                remove_all(bucket, trace_id);
            }
        }
        for kind in CostBucket::ALL {
            if let Some(bucket) = self.by_cost.get_mut(&kind) {
                remove_all(bucket, trace_id);
            }
        }
    }

    /// Trace ids recorded for `service`, deduplicated, in index order.
    pub fn service_candidates(&self, service: &ServiceName) -> Vec<TraceId> {
        self.by_service.get(service).cloned().unwrap_or_default()
    }

    /// Union of trace ids across hour buckets `[start_hour, end_hour]`, deduplicated.
    pub fn timestamp_candidates(&self, start_hour: u64, end_hour: u64) -> Vec<TraceId> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for hour in start_hour..=end_hour {
            if let Some(bucket) = self.by_timestamp.get(&hour) {
                for trace_id in bucket {
                    if seen.insert(trace_id.clone()) {
                        out.push(trace_id.clone());
                    }
                }
            }
        }
        out
    }

    /// Every service name with at least one indexed trace, sorted lexicographically.
    pub fn service_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .by_service
            .keys()
            .map(|s| s.as_str().to_string())
            .collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tid(n: u8) -> TraceId {
        TraceId::new(format!("{:032x}", n)).unwrap()
    }

    #[test]
    fn test_duration_bucket_boundaries() {
        assert!(matches!(DurationBucket::classify(9), DurationBucket::Fast));
        assert!(matches!(DurationBucket::classify(10), DurationBucket::Medium));
        assert!(matches!(DurationBucket::classify(100), DurationBucket::Slow));
        assert!(matches!(DurationBucket::classify(1000), DurationBucket::VerySlow));
    }

    #[test]
    fn test_index_and_remove() {
        let mut idx = SecondaryIndexes::new();
        let svc = ServiceName::new("frontend".to_string()).unwrap();
        let trace_id = tid(1);

        idx.index_service_and_time(&svc, 0, &trace_id);
        idx.index_root_span(5, 0.0, &trace_id);

        assert_eq!(idx.service_candidates(&svc), vec![trace_id.clone()]);
        assert_eq!(idx.by_duration[&DurationBucket::Fast], vec![trace_id.clone()]);

        idx.remove_trace(&trace_id);
        assert!(idx.service_candidates(&svc).is_empty());
        assert!(idx.by_duration[&DurationBucket::Fast].is_empty());
    }

    #[test]
    fn test_duplicate_insert_is_suppressed() {
        let mut idx = SecondaryIndexes::new();
        let svc = ServiceName::new("frontend".to_string()).unwrap();
        let trace_id = tid(1);
        idx.index_service_and_time(&svc, 0, &trace_id);
        idx.index_service_and_time(&svc, 0, &trace_id);
        assert_eq!(idx.service_candidates(&svc).len(), 1);
    }
}
