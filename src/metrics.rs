//! Query metrics and tracing spans
//!
//! With the `metrics` feature, query counts, durations and affected rows are
//! recorded through OpenTelemetry instruments on the global meter provider;
//! exporting them is up to the application. With the `tracing` feature every
//! fetch and mutation runs inside a span. Without either feature the hooks
//! below compile to nothing.

use std::time::Duration;

#[cfg(feature = "metrics")]
use once_cell::sync::Lazy;
#[cfg(feature = "metrics")]
use opentelemetry::{
    global,
    metrics::{Counter, Histogram},
    KeyValue,
};

#[cfg(feature = "metrics")]
pub static METRICS: Lazy<QuarryMetrics> = Lazy::new(QuarryMetrics::init);

#[cfg(feature = "metrics")]
pub struct QuarryMetrics {
    pub queries_total: Counter<u64>,
    pub query_duration: Histogram<f64>,
    pub rows_affected_total: Counter<u64>,
}

#[cfg(feature = "metrics")]
impl QuarryMetrics {
    pub fn init() -> Self {
        let meter = global::meter("quarry");

        let queries_total = meter
            .u64_counter("quarry_queries_total")
            .with_description("Total queries executed")
            .build();

        let query_duration = meter
            .f64_histogram("quarry_query_duration_seconds")
            .with_description("Duration of queries")
            .build();

        let rows_affected_total = meter
            .u64_counter("quarry_rows_affected_total")
            .with_description("Rows changed by bulk updates and deletes")
            .build();

        Self {
            queries_total,
            query_duration,
            rows_affected_total,
        }
    }

    pub fn record_query(&self, operation: &'static str, elapsed: Duration) {
        let attrs = [KeyValue::new("operation", operation)];
        self.queries_total.add(1, &attrs);
        self.query_duration.record(elapsed.as_secs_f64(), &attrs);
    }

    pub fn record_rows_affected(&self, kind: &'static str, rows: u64) {
        self.rows_affected_total
            .add(rows, &[KeyValue::new("kind", kind)]);
    }
}

pub(crate) fn observe_query(operation: &'static str, elapsed: Duration) {
    #[cfg(feature = "metrics")]
    METRICS.record_query(operation, elapsed);
    #[cfg(not(feature = "metrics"))]
    let _ = (operation, elapsed);
}

pub(crate) fn observe_rows_affected(kind: &'static str, rows: u64) {
    #[cfg(feature = "metrics")]
    METRICS.record_rows_affected(kind, rows);
    #[cfg(not(feature = "metrics"))]
    let _ = (kind, rows);
}

#[cfg(feature = "tracing")]
pub mod tracing_helpers {
    use tracing::{info_span, Span};

    pub fn fetch_span(operation: &'static str, entity: &str) -> Span {
        info_span!("quarry.fetch", operation, entity)
    }

    pub fn mutation_span(kind: &'static str, entity: &str) -> Span {
        info_span!("quarry.mutation", kind, entity)
    }
}
