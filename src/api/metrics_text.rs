//! Prometheus text-exposition rendering for collector counters.

use crate::collector::CollectorMetrics;
use std::fmt::Write as _;

const PREFIX: &str = "urpo_collector";

/// Renders the collector's counters in Prometheus text-exposition format.
pub fn render(metrics: CollectorMetrics) -> String {
    let mut out = String::new();
    write_counter(
        &mut out,
        "spans_received_total",
        "Total spans submitted to the collector",
        metrics.received,
    );
    write_counter(
        &mut out,
        "spans_stored_total",
        "Total spans successfully written to storage",
        metrics.stored,
    );
    write_counter(
        &mut out,
        "span_errors_total",
        "Total spans rejected by storage",
        metrics.errors,
    );
    out
}

fn write_counter(out: &mut String, name: &str, help: &str, value: u64) {
    let _ = writeln!(out, "# HELP {PREFIX}_{name} {help}");
    let _ = writeln!(out, "# TYPE {PREFIX}_{name} counter");
    let _ = writeln!(out, "{PREFIX}_{name} {value}");
}
