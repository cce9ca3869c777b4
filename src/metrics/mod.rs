
use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::Encoder;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;
use tracing::warn;

lazy_static! {
    /// Cache reads by outcome: `hit` or `miss`
    pub static ref CACHE_READS_METRIC: IntCounterVec = IntCounterVec::new(
        Opts::new("cache_reads", "Cache reads by outcome"),
        &["outcome"]
    )
    .expect("metric can not be created");

    /// Fetch plan attempts by source (`cache`, `network`) and outcome
    pub static ref FETCH_ATTEMPTS_METRIC: IntCounterVec = IntCounterVec::new(
        Opts::new("fetch_attempts", "Fetch plan attempts by source and outcome"),
        &["source", "outcome"]
    )
    .expect("metric can not be created");

    pub static ref CHANGED_FIELDS_METRIC: IntCounter =
        IntCounter::new("changed_fields", "Qualified keys published as changed")
            .expect("metric can not be created");

    pub static ref ACTIVE_WATCHERS_METRIC: IntGauge =
        IntGauge::new("active_watchers", "Registered watchers")
            .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

static REGISTER_ONCE: Once = Once::new();

pub fn register_custom_metrics(registry: &Registry) {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(CACHE_READS_METRIC.clone()),
        Box::new(FETCH_ATTEMPTS_METRIC.clone()),
        Box::new(CHANGED_FIELDS_METRIC.clone()),
        Box::new(ACTIVE_WATCHERS_METRIC.clone()),
    ];
    for collector in collectors {
        if let Err(e) = registry.register(collector) {
            warn!("collector can not be registered: {:?}", e);
        }
    }
}

/// Encodes every cache metric in the Prometheus text format
pub fn gather_metrics() -> String {
    REGISTER_ONCE.call_once(|| register_custom_metrics(&REGISTRY));

    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        warn!("could not encode custom metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_else(|e| {
        warn!("custom metrics could not be from_utf8'd: {}", e);
        String::default()
    })
}

pub(crate) fn record_cache_read(hit: bool) {
    let outcome = if hit { "hit" } else { "miss" };
    CACHE_READS_METRIC.with_label_values(&[outcome]).inc();
}

pub(crate) fn record_fetch_attempt(
    source: &str,
    success: bool,
) {
    let outcome = if success { "success" } else { "failure" };
    FETCH_ATTEMPTS_METRIC.with_label_values(&[source, outcome]).inc();
}
