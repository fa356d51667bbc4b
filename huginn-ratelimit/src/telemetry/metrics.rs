use opentelemetry::global;
use opentelemetry::metrics::{Counter, Gauge, Meter};
use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::{Encoder, Registry, TextEncoder};
use std::sync::Arc;

use crate::backend::StatsSnapshot;

pub mod labels {
    pub const STRATEGY: &str = "strategy";
    pub const ROUTE: &str = "route";
    pub const SCOPE: &str = "scope";
    pub const VERSION: &str = "version";
    pub const RUST_VERSION: &str = "rust_version";
}

#[derive(Clone)]
pub struct Metrics {
    pub rate_limit_requests_total: Counter<u64>,
    pub rate_limit_allowed_total: Counter<u64>,
    pub rate_limit_rejected_total: Counter<u64>,

    // Limiter state backend, fed from `StatsSnapshot`
    pub cache_entries: Gauge<u64>,
    pub cache_hits: Gauge<u64>,
    pub cache_misses: Gauge<u64>,
    pub cache_evictions: Gauge<u64>,

    pub build_info: Gauge<u64>,
}

impl Metrics {
    pub fn new(meter: Meter) -> Self {
        Self {
            rate_limit_requests_total: meter
                .u64_counter("huginn_rate_limit_requests_total")
                .with_description("Total number of requests evaluated by rate limiter")
                .build(),
            rate_limit_allowed_total: meter
                .u64_counter("huginn_rate_limit_allowed_total")
                .with_description("Total number of requests allowed by rate limiter")
                .build(),
            rate_limit_rejected_total: meter
                .u64_counter("huginn_rate_limit_rejected_total")
                .with_description("Total number of requests rejected by rate limiter (429/503)")
                .build(),
            cache_entries: meter
                .u64_gauge("huginn_rate_limit_cache_entries")
                .with_description("Limiter entries held by the backend, including unswept ones")
                .build(),
            cache_hits: meter
                .u64_gauge("huginn_rate_limit_cache_hits")
                .with_description("Loads served by a live limiter entry")
                .build(),
            cache_misses: meter
                .u64_gauge("huginn_rate_limit_cache_misses")
                .with_description("Loads that created a new limiter")
                .build(),
            cache_evictions: meter
                .u64_gauge("huginn_rate_limit_cache_evictions")
                .with_description("Expired limiter entries removed by the sweeper")
                .build(),
            build_info: meter
                .u64_gauge("huginn_rate_limit_build_info")
                .with_description("Build information (version, rust version)")
                .build(),
        }
    }

    /// Set build info metric with version labels
    pub fn set_build_info(&self) {
        let version = env!("CARGO_PKG_VERSION");
        let rust_version = env!("CARGO_PKG_RUST_VERSION");
        self.build_info.record(
            1,
            &[
                KeyValue::new(labels::VERSION, version),
                KeyValue::new(labels::RUST_VERSION, rust_version),
            ],
        );
    }

    pub fn record_rate_limit_request(&self, strategy: &str, route: &str) {
        self.rate_limit_requests_total.add(
            1,
            &[
                KeyValue::new(labels::STRATEGY, strategy.to_string()),
                KeyValue::new(labels::ROUTE, route.to_string()),
            ],
        );
    }

    pub fn record_rate_limit_allowed(&self, strategy: &str, route: &str) {
        self.rate_limit_allowed_total.add(
            1,
            &[
                KeyValue::new(labels::STRATEGY, strategy.to_string()),
                KeyValue::new(labels::ROUTE, route.to_string()),
            ],
        );
    }

    pub fn record_rate_limit_rejection(&self, strategy: &str, route: &str, scope: &str) {
        self.rate_limit_rejected_total.add(
            1,
            &[
                KeyValue::new(labels::STRATEGY, strategy.to_string()),
                KeyValue::new(labels::ROUTE, route.to_string()),
                KeyValue::new(labels::SCOPE, scope.to_string()),
            ],
        );
    }

    pub fn record_cache_stats(&self, route: &str, entries: usize, stats: StatsSnapshot) {
        let attrs = [KeyValue::new(labels::ROUTE, route.to_string())];
        self.cache_entries.record(entries as u64, &attrs);
        self.cache_hits.record(stats.hits, &attrs);
        self.cache_misses.record(stats.misses, &attrs);
        self.cache_evictions.record(stats.evictions, &attrs);
    }
}

/// Install a Prometheus-backed meter provider and build the metric handles.
pub fn init_metrics() -> Result<(Arc<Metrics>, Registry), Box<dyn std::error::Error + Send + Sync>>
{
    let registry = Registry::default();

    let exporter = opentelemetry_prometheus::exporter()
        .with_registry(registry.clone())
        .build()?;

    let meter_provider = SdkMeterProvider::builder().with_reader(exporter).build();

    global::set_meter_provider(meter_provider);

    let meter = global::meter("huginn-ratelimit");
    let metrics = Arc::new(Metrics::new(meter));

    metrics.set_build_info();

    Ok((metrics, registry))
}

/// Render every metric family in `registry` in the Prometheus text format.
pub fn encode_metrics(
    registry: &Registry,
) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| format!("Failed to encode metrics: {e}"))?;

    Ok(String::from_utf8(buffer)?)
}
