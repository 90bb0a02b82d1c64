//! Prometheus metrics and tracing span helpers.
//!
//! Both halves are feature gated: `metrics` enables [`METRICS`], `tracing`
//! enables [`tracing_helpers`]. Callers guard their use with the same
//! `#[cfg(feature = ...)]`.

#[cfg(feature = "metrics")]
pub use prometheus_metrics::{JoineryMetrics, METRICS};

#[cfg(feature = "metrics")]
mod prometheus_metrics {
    use once_cell::sync::Lazy;
    use opentelemetry::{
        global,
        metrics::{Counter, Histogram, MeterProvider},
    };
    use opentelemetry_sdk::metrics::SdkMeterProvider;
    use prometheus::{Encoder, Registry, TextEncoder};

    pub static METRICS: Lazy<JoineryMetrics> = Lazy::new(JoineryMetrics::init);

    pub struct JoineryMetrics {
        registry: Registry,
        _provider: Option<SdkMeterProvider>,
        pub queries_total: Counter<u64>,
        pub query_duration: Histogram<f64>,
        pub query_errors_total: Counter<u64>,
        pub rows_unjoined_total: Counter<u64>,
    }

    impl JoineryMetrics {
        pub fn init() -> Self {
            let registry = Registry::new();
            let (provider, meter) = match opentelemetry_prometheus::exporter()
                .with_registry(registry.clone())
                .build()
            {
                Ok(exporter) => {
                    let provider = SdkMeterProvider::builder().with_reader(exporter).build();
                    let meter = provider.meter("joinery");
                    (Some(provider), meter)
                }
                Err(e) => {
                    log::warn!("Prometheus exporter unavailable, recording to the global meter: {e}");
                    (None, global::meter("joinery"))
                }
            };

            let queries_total = meter
                .u64_counter("joinery_queries_total")
                .with_description("Total queries executed")
                .build();

            let query_duration = meter
                .f64_histogram("joinery_query_duration_seconds")
                .with_description("Duration of queries")
                .build();

            let query_errors_total = meter
                .u64_counter("joinery_query_errors_total")
                .with_description("Queries that returned an error")
                .build();

            let rows_unjoined_total = meter
                .u64_counter("joinery_rows_unjoined_total")
                .with_description("Joined rows reconstructed into entities")
                .build();

            Self {
                registry,
                _provider: provider,
                queries_total,
                query_duration,
                query_errors_total,
                rows_unjoined_total,
            }
        }

        pub fn record_query(&self, elapsed: std::time::Duration) {
            self.queries_total.add(1, &[]);
            self.query_duration.record(elapsed.as_secs_f64(), &[]);
        }

        pub fn record_query_error(&self) {
            self.query_errors_total.add(1, &[]);
        }

        pub fn record_rows_unjoined(&self, rows: usize) {
            self.rows_unjoined_total.add(rows as u64, &[]);
        }

        /// Prometheus text exposition of every recorded metric
        pub fn render(&self) -> String {
            let mut buffer = Vec::new();
            if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buffer) {
                log::warn!("Failed to encode metrics: {e}");
            }
            String::from_utf8_lossy(&buffer).into_owned()
        }
    }
}

/// Span constructors used around SQL execution
#[cfg(feature = "tracing")]
pub mod tracing_helpers {
    use tracing::{info_span, Span};

    pub fn query_span(sql: &str) -> Span {
        info_span!("joinery.query", db.statement = %sql)
    }

    pub fn execute_span(sql: &str) -> Span {
        info_span!("joinery.execute", db.statement = %sql)
    }

    pub fn connect_span() -> Span {
        info_span!("joinery.connect")
    }

    /// Span covering one load including its follow-up queries
    pub fn load_span(table: &str) -> Span {
        info_span!("joinery.load", table = %table)
    }
}

#[cfg(all(test, feature = "metrics"))]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_recorded_metrics_are_exported() {
        METRICS.record_query(Duration::from_millis(3));
        METRICS.record_query_error();
        METRICS.record_rows_unjoined(4);
        let text = METRICS.render();
        assert!(text.contains("joinery_queries"), "exposition was: {text}");
    }
}
