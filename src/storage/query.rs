//! Trace search queries.

use crate::core::ServiceName;
use std::time::{Duration, SystemTime};

/// Default page size for [`Query`] results when `limit` is unset.
pub const DEFAULT_LIMIT: usize = 100;

/// Filters and pagination for [`crate::storage::StorageBackend::find`].
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub service: Option<ServiceName>,
    pub min_duration: Option<Duration>,
    pub max_duration: Option<Duration>,
    pub min_cost: Option<f64>,
    pub max_cost: Option<f64>,
    pub start_time: Option<SystemTime>,
    pub end_time: Option<SystemTime>,
    /// Recognized but not currently consulted by the filter.
    pub has_profile: Option<bool>,
    pub limit: usize,
    pub offset: usize,
}

impl Query {
    /// A query with no filters and default pagination.
    pub fn new() -> Self {
        Query {
            limit: DEFAULT_LIMIT,
            ..Default::default()
        }
    }

    /// The effective time window, with the documented defaults substituted:
    /// start defaults to the epoch, end defaults to now + 24h.
    pub fn effective_window(&self) -> (SystemTime, SystemTime) {
        let start = self.start_time.unwrap_or(SystemTime::UNIX_EPOCH);
        let end = self
            .end_time
            .unwrap_or_else(|| SystemTime::now() + Duration::from_secs(24 * 3600));
        (start, end)
    }

    /// Matches a trace's summary fields against every set filter.
    pub fn matches(
        &self,
        services: &[String],
        start_time: SystemTime,
        duration: Duration,
        total_cost: f64,
    ) -> bool {
        if let Some(service) = &self.service {
            if !services.iter().any(|s| s == service.as_str()) {
                return false;
            }
        }
        if let Some(min) = self.min_duration {
            if min > Duration::ZERO && duration < min {
                return false;
            }
        }
        if let Some(max) = self.max_duration {
            if max > Duration::ZERO && duration > max {
                return false;
            }
        }
        if let Some(min) = self.min_cost {
            if min > 0.0 && total_cost < min {
                return false;
            }
        }
        if let Some(max) = self.max_cost {
            if max > 0.0 && total_cost > max {
                return false;
            }
        }
        // Note: the end-time bound is checked against the trace's start_time,
        // not its end_time. This is intentional, not an oversight.
        if self.start_time.is_some() || self.end_time.is_some() {
            let (start, end) = self.effective_window();
            if start_time < start || start_time > end {
                return false;
            }
        }
        true
    }
}
