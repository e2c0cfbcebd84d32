//! Random identifier generation for traces and spans.

use super::types::{SpanId, TraceId};
use rand::RngCore;

/// Generates a cryptographically random 128-bit trace id, rendered as 32 lowercase hex chars.
pub fn new_trace_id() -> TraceId {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    TraceId::from_str_unchecked(&hex::encode(bytes))
}

/// Generates a cryptographically random 64-bit span id, rendered as 16 lowercase hex chars.
pub fn new_span_id() -> SpanId {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    SpanId::from_str_unchecked(&hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_trace_id_shape() {
        let id = new_trace_id();
        assert_eq!(id.as_str().len(), 32);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_span_id_shape() {
        let id = new_span_id();
        assert_eq!(id.as_str().len(), 16);
    }

    #[test]
    fn test_no_duplicates_over_many_calls() {
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            assert!(seen.insert(new_trace_id().as_str().to_string()));
        }
    }
}
