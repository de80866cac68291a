use prometheus::{Gauge, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use tracing::info;
use std::sync::Arc;
use tokio::sync::OnceCell;

// Declare the static OnceCell to hold the Metrics.
static METRICS_INSTANCE: OnceCell<Arc<Metrics>> = OnceCell::const_new();

/// Asynchronously initializes and gets a reference to the static `Metrics`.
pub async fn get_metrics() -> &'static Arc<Metrics> {
    METRICS_INSTANCE.get_or_init(|| async {
        info!("Initializing Metrics ...");
        Metrics::new()}
    ).await
}

/// Exporter self-observability. The same `registry` also carries the
/// republished Cloud Eye gauges, so one scrape returns both.
#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Provider calls
    pub catalog_requests: IntCounterVec,
    pub sample_requests: IntCounterVec,
    pub token_requests: IntCounterVec,
    pub request_duration: HistogramVec,

    // Poll loop
    pub cycle_duration: Histogram,
    pub last_cycle_unix: IntGauge,
    pub catalog_descriptors: IntGauge,
    pub instruments: IntGauge,

    // Config/runtime
    pub config_errors: IntCounter,
    pub up: IntGauge,

    // === Service resource metrics ===
    pub process_cpu_usage: Gauge,
    pub process_memory_usage: IntGauge,
    pub process_virtual_memory: IntGauge,
    pub process_open_fds: IntGauge,
    pub process_start_time: IntGauge,
    pub process_uptime: IntGauge,
}

impl Metrics {
    fn new() -> Arc<Self> {
        let registry = Registry::new();

        let metrics: Arc<Metrics> = Arc::new(Self {
            catalog_requests: IntCounterVec::new(Opts::new("cloudeye_exporter_catalog_requests_total", "Catalog fetches by outcome"),&["outcome"],).unwrap(),
            sample_requests: IntCounterVec::new(Opts::new("cloudeye_exporter_sample_requests_total", "Datapoint fetches by outcome"),&["outcome"],).unwrap(),
            token_requests: IntCounterVec::new(Opts::new("cloudeye_exporter_token_requests_total", "Token requests by outcome"),&["outcome"],).unwrap(),
            request_duration: HistogramVec::new(HistogramOpts::new("cloudeye_exporter_request_duration_seconds", "Provider request duration seconds").buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),&["endpoint"],).unwrap(),

            cycle_duration: Histogram::with_opts(HistogramOpts::new("cloudeye_exporter_cycle_duration_seconds", "Catalog and sampling pass duration seconds").buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0])).unwrap(),
            last_cycle_unix: IntGauge::new("cloudeye_exporter_last_cycle_timestamp_seconds", "Completion time of the last poll cycle (UNIX seconds)").unwrap(),
            catalog_descriptors: IntGauge::new("cloudeye_exporter_catalog_descriptors", "Descriptors returned by the last catalog fetch").unwrap(),
            instruments: IntGauge::new("cloudeye_exporter_instruments", "Registered Cloud Eye gauges").unwrap(),

            config_errors: IntCounter::new("cloudeye_exporter_config_errors_total", "Configuration parse and validation errors").unwrap(),
            up: IntGauge::new("up", "1 if the metrics endpoint is serving").unwrap(),
            process_cpu_usage: Gauge::new("process_cpu_usage_percent", "CPU usage % of this process").unwrap(),
            process_memory_usage: IntGauge::new("process_memory_usage_bytes", "Resident memory used by this process").unwrap(),
            process_virtual_memory: IntGauge::new("process_virtual_memory_bytes", "Virtual memory used by this process").unwrap(),
            process_open_fds: IntGauge::new("process_open_fds", "Number of open file descriptors").unwrap(),
            process_start_time: IntGauge::new("process_start_time_seconds", "Process start time (UNIX seconds)").unwrap(),
            process_uptime: IntGauge::new("process_uptime_seconds", "Process uptime seconds").unwrap(),

            registry,
        });

        // Register all metrics in the registry
        let reg = &metrics.registry;
        reg.register(Box::new(metrics.catalog_requests.clone())).unwrap();
        reg.register(Box::new(metrics.sample_requests.clone())).unwrap();
        reg.register(Box::new(metrics.token_requests.clone())).unwrap();
        reg.register(Box::new(metrics.request_duration.clone())).unwrap();
        reg.register(Box::new(metrics.cycle_duration.clone())).unwrap();
        reg.register(Box::new(metrics.last_cycle_unix.clone())).unwrap();
        reg.register(Box::new(metrics.catalog_descriptors.clone())).unwrap();
        reg.register(Box::new(metrics.instruments.clone())).unwrap();
        reg.register(Box::new(metrics.config_errors.clone())).unwrap();
        reg.register(Box::new(metrics.up.clone())).unwrap();

        reg.register(Box::new(metrics.process_cpu_usage.clone())).unwrap();
        reg.register(Box::new(metrics.process_memory_usage.clone())).unwrap();
        reg.register(Box::new(metrics.process_virtual_memory.clone())).unwrap();
        reg.register(Box::new(metrics.process_open_fds.clone())).unwrap();
        reg.register(Box::new(metrics.process_start_time.clone())).unwrap();
        reg.register(Box::new(metrics.process_uptime.clone())).unwrap();

        metrics
    }
}
