//! Prometheus text exposition of cache metrics

use crate::infra::metrics::CacheMetricsSummary;
use std::fmt::Write;

/// Prometheus metric type
enum MetricType {
    Counter,
    Gauge,
}

impl MetricType {
    fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
        }
    }
}

/// Write a simple metric (counter or gauge) with source label
fn write_metric(output: &mut String, name: &str, help: &str, typ: MetricType, source: &str, val: u64) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} {}", typ.as_str());
    let _ = writeln!(output, "{name}{{source=\"{source}\"}} {val}");
}

/// Write a gauge metric with f64 value
fn write_gauge_f64(output: &mut String, name: &str, help: &str, source: &str, val: f64) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} gauge");
    let _ = writeln!(output, "{name}{{source=\"{source}\"}} {val:.6}");
}

/// Format cache metrics in Prometheus text exposition format
pub fn format_prometheus_metrics(summary: &CacheMetricsSummary, source: &str) -> String {
    let mut output = String::with_capacity(2048);

    let counters = [
        ("schedule_cache_lookups_total", "Cache lookups", summary.lookups),
        ("schedule_cache_fresh_hits_total", "Lookups served from the fresh tier", summary.fresh_hits),
        ("schedule_cache_refreshes_total", "Upstream refresh attempts", summary.refreshes),
        ("schedule_cache_refresh_failures_total", "Upstream refreshes that failed", summary.refresh_failures),
        ("schedule_cache_stale_hits_total", "Lookups served from the stale tier", summary.stale_hits),
        ("schedule_cache_empty_total", "Lookups with no data in any tier", summary.empty_results),
        ("schedule_cache_dates_stored_total", "Dates written by refreshes", summary.dates_stored),
    ];
    for (name, help, val) in counters {
        write_metric(&mut output, name, help, MetricType::Counter, source, val);
    }

    write_metric(
        &mut output,
        "schedule_refresh_latency_avg_ms",
        "Average refresh latency in milliseconds",
        MetricType::Gauge,
        source,
        summary.refresh_latency_avg_ms,
    );
    write_metric(
        &mut output,
        "schedule_refresh_latency_max_ms",
        "Maximum refresh latency in milliseconds",
        MetricType::Gauge,
        source,
        summary.refresh_latency_max_ms,
    );
    write_gauge_f64(
        &mut output,
        "schedule_cache_fresh_hit_ratio",
        "Fresh hits / lookups",
        source,
        summary.fresh_hit_ratio,
    );

    output
}
