//! Observability hooks.
//!
//! With the `metrics` feature, statement counts, statement latency, connection wait time and
//! pool occupancy are recorded through OpenTelemetry and exposed in Prometheus text format via
//! [`PingormMetrics::encode`]. With the `tracing` feature, [`tracing_helpers`] provides the spans
//! wrapped around statements, transactions, connection checkout and repository operations.

#[cfg(feature = "metrics")]
pub use self::otel::{PingormMetrics, METRICS};

#[cfg(feature = "metrics")]
mod otel {
    use once_cell::sync::Lazy;
    use opentelemetry::metrics::{Counter, Histogram, MeterProvider as _};
    use opentelemetry_sdk::metrics::SdkMeterProvider;
    use prometheus::{Encoder, Registry, TextEncoder};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    pub static METRICS: Lazy<PingormMetrics> = Lazy::new(PingormMetrics::init);

    pub struct PingormMetrics {
        registry: Registry,
        _provider: SdkMeterProvider,
        queries_total: Counter<u64>,
        query_errors_total: Counter<u64>,
        query_duration: Histogram<f64>,
        connection_wait_duration: Histogram<f64>,
        pool_in_use: Arc<AtomicUsize>,
    }

    impl PingormMetrics {
        fn init() -> Self {
            let registry = Registry::new();
            let builder = SdkMeterProvider::builder();
            let builder = match opentelemetry_prometheus::exporter()
                .with_registry(registry.clone())
                .build()
            {
                Ok(exporter) => builder.with_reader(exporter),
                Err(e) => {
                    log::warn!(
                        "prometheus exporter unavailable, metrics will not be exported: {e}"
                    );
                    builder
                }
            };
            let provider = builder.build();
            let meter = provider.meter("pingorm");

            let queries_total = meter
                .u64_counter("pingorm_queries_total")
                .with_description("Total statements executed")
                .build();
            let query_errors_total = meter
                .u64_counter("pingorm_query_errors_total")
                .with_description("Statements that returned an error")
                .build();
            let query_duration = meter
                .f64_histogram("pingorm_query_duration_seconds")
                .with_description("Duration of statements")
                .build();
            let connection_wait_duration = meter
                .f64_histogram("pingorm_connection_wait_seconds")
                .with_description("Time spent opening or checking out a connection")
                .build();

            let pool_in_use = Arc::new(AtomicUsize::new(0));
            let in_use = Arc::clone(&pool_in_use);
            let _gauge = meter
                .u64_observable_gauge("pingorm_pool_connections_in_use")
                .with_description("Connections currently checked out of the pool")
                .with_callback(move |observer| {
                    observer.observe(in_use.load(Ordering::Relaxed) as u64, &[]);
                })
                .build();

            Self {
                registry,
                _provider: provider,
                queries_total,
                query_errors_total,
                query_duration,
                connection_wait_duration,
                pool_in_use,
            }
        }

        pub fn record_query_duration(&self, elapsed: Duration) {
            self.queries_total.add(1, &[]);
            self.query_duration.record(elapsed.as_secs_f64(), &[]);
        }

        pub fn record_query_error(&self) {
            self.query_errors_total.add(1, &[]);
        }

        pub fn record_connection_wait(&self, elapsed: Duration) {
            self.connection_wait_duration
                .record(elapsed.as_secs_f64(), &[]);
        }

        pub fn record_checkout(&self) {
            self.pool_in_use.fetch_add(1, Ordering::Relaxed);
        }

        pub fn record_checkin(&self) {
            self.pool_in_use.fetch_sub(1, Ordering::Relaxed);
        }

        /// Render every collected metric in the Prometheus text exposition format.
        pub fn encode(&self) -> Result<String, prometheus::Error> {
            let mut buf = Vec::new();
            TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
            Ok(String::from_utf8_lossy(&buf).into_owned())
        }
    }
}

#[cfg(feature = "tracing")]
pub mod tracing_helpers {
    use tracing::{info_span, Span};

    pub fn execute_query_span(query: &str) -> Span {
        info_span!("pingorm.execute_query", db.system = "postgresql", db.statement = %query)
    }

    pub fn acquire_connection_span() -> Span {
        info_span!("pingorm.acquire_connection", db.system = "postgresql")
    }

    pub fn begin_transaction_span() -> Span {
        info_span!("pingorm.begin_transaction")
    }

    pub fn commit_transaction_span() -> Span {
        info_span!("pingorm.commit_transaction")
    }

    pub fn rollback_transaction_span() -> Span {
        info_span!("pingorm.rollback_transaction")
    }

    /// Span wrapping one repository operation (`create`, `get`, ...) on one entity.
    pub fn repository_span(operation: &'static str, entity: &'static str) -> Span {
        info_span!("pingorm.repository", operation, entity)
    }
}

#[cfg(all(test, feature = "metrics"))]
mod tests {
    use super::METRICS;
    use std::time::Duration;

    #[test]
    fn test_recorded_metrics_are_encoded() {
        METRICS.record_query_duration(Duration::from_millis(3));
        METRICS.record_query_error();
        let text = METRICS.encode().expect("encode metrics");
        assert!(text.contains("pingorm_queries_total"));
    }
}
