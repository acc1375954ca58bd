use lazy_static::lazy_static;
use prometheus::{Counter, Encoder, Histogram, HistogramOpts, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref LINK_REQUESTS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "gateway_link_requests_total",
        "Total device link requests received"
    ))
    .unwrap();
    pub static ref LINK_SUCCESS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "gateway_link_success_total",
        "Total devices linked to a user"
    ))
    .unwrap();
    pub static ref LINK_INVALID_TOTAL: Counter = Counter::with_opts(Opts::new(
        "gateway_link_invalid_total",
        "Total link requests rejected by validation"
    ))
    .unwrap();
    pub static ref LINK_REJECTED_TOTAL: Counter = Counter::with_opts(Opts::new(
        "gateway_link_rejected_total",
        "Total link requests failed by a permanent store error"
    ))
    .unwrap();
    pub static ref LINK_EXHAUSTED_TOTAL: Counter = Counter::with_opts(Opts::new(
        "gateway_link_exhausted_total",
        "Total link requests that ran out of retries"
    ))
    .unwrap();
    pub static ref LINK_CANCELLED_TOTAL: Counter = Counter::with_opts(Opts::new(
        "gateway_link_cancelled_total",
        "Total link requests cancelled by shutdown"
    ))
    .unwrap();
    pub static ref LINK_LATENCY_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "gateway_link_latency_seconds",
            "Time from link request to final outcome, retries included"
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 35.0, 65.0, 125.0, 250.0])
    )
    .unwrap();
    pub static ref SERIES_CACHE_HITS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "gateway_series_cache_hits_total",
        "Total chart series served from cache"
    ))
    .unwrap();
    pub static ref SERIES_CACHE_MISSES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "gateway_series_cache_misses_total",
        "Total chart series fetched from the database"
    ))
    .unwrap();
}

pub fn init_metrics() {
    REGISTRY
        .register(Box::new(LINK_REQUESTS_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(LINK_SUCCESS_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(LINK_INVALID_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(LINK_REJECTED_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(LINK_EXHAUSTED_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(LINK_CANCELLED_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(LINK_LATENCY_SECONDS.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(SERIES_CACHE_HITS_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(SERIES_CACHE_MISSES_TOTAL.clone()))
        .unwrap();
}

pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}
