use lazy_static::lazy_static;
use prometheus::{Counter, Gauge, Histogram, register_counter, register_gauge, register_histogram};

lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("relay_requests_total", "Total number of chat requests").unwrap();
    pub static ref RATE_LIMITED_TOTAL: Counter =
        register_counter!("relay_rate_limited_total", "Requests rejected by the rate limiter").unwrap();
    pub static ref QUOTA_REJECTED_TOTAL: Counter =
        register_counter!("relay_quota_rejected_total", "Requests rejected by the usage ledger").unwrap();
    pub static ref PROVIDER_ERRORS_TOTAL: Counter =
        register_counter!("relay_provider_errors_total", "Failed provider calls").unwrap();
    pub static ref PROVIDER_LATENCY: Histogram = register_histogram!(
        "relay_provider_latency_seconds",
        "Provider call latency in seconds"
    )
    .unwrap();
    pub static ref TRACKED_IDENTITIES: Gauge = register_gauge!(
        "relay_tracked_identities",
        "Identities with an active rate-limit window"
    )
    .unwrap();
}
