// Prometheus metrics definitions for the wiki backend.

use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use lazy_static::lazy_static;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ── Shortcodes ───────────────────────────────────────────────────

    /// Markers rewritten into links, by kind code.
    pub static ref SHORTCODES_RESOLVED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("gm_wiki_shortcodes_resolved_total", "Shortcode markers rewritten into links"),
        &["type"],
    )
    .unwrap();

    /// Stub rows created on demand by shortcode resolution, by kind code.
    pub static ref STUB_ENTITIES_CREATED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("gm_wiki_stub_entities_created_total", "Stub entities created by shortcodes"),
        &["type"],
    )
    .unwrap();

    /// Markers left as literal text (blank name, lookup-only miss), by kind code.
    pub static ref SHORTCODE_SOFT_MISSES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("gm_wiki_shortcode_soft_misses_total", "Shortcode markers left unresolved"),
        &["type"],
    )
    .unwrap();

    /// Mention edges skipped at read time because an endpoint row is gone.
    pub static ref DANGLING_MENTIONS_SKIPPED_TOTAL: IntCounter = IntCounter::new(
        "gm_wiki_dangling_mentions_skipped_total",
        "Mention edges skipped because an endpoint no longer exists",
    )
    .unwrap();

    // ── HTTP ─────────────────────────────────────────────────────────

    /// Total API requests, by method/endpoint/status.
    pub static ref API_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("gm_wiki_api_requests_total", "Total API requests"),
        &["method", "endpoint", "status"],
    )
    .unwrap();

    /// API request duration in seconds, by endpoint.
    pub static ref API_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "gm_wiki_api_request_duration_seconds",
            "API request duration in seconds",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0]),
        &["endpoint"],
    )
    .unwrap();
}

/// Register all metrics with the custom registry. Call once at startup.
pub fn register_metrics() {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(SHORTCODES_RESOLVED_TOTAL.clone()),
        Box::new(STUB_ENTITIES_CREATED_TOTAL.clone()),
        Box::new(SHORTCODE_SOFT_MISSES_TOTAL.clone()),
        Box::new(DANGLING_MENTIONS_SKIPPED_TOTAL.clone()),
        Box::new(API_REQUESTS_TOTAL.clone()),
        Box::new(API_REQUEST_DURATION_SECONDS.clone()),
    ];

    for c in collectors {
        // Already-registered collectors are skipped.
        if let Err(e) = REGISTRY.register(c) {
            tracing::debug!("metric already registered: {e}");
        }
    }
}

/// Serialize all registered metrics to the Prometheus text exposition format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("failed to encode metrics: {e}");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Normalize a URL path for metric labels: replace numeric path segments with `:id`
/// to prevent cardinality explosion.
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if segment.parse::<i64>().is_ok() {
                ":id"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Middleware recording request count and latency per normalized endpoint.
pub async fn track_requests(req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let endpoint = normalize_path(req.uri().path());
    let start = Instant::now();

    let response = next.run(req).await;

    API_REQUEST_DURATION_SECONDS
        .with_label_values(&[endpoint.as_str()])
        .observe(start.elapsed().as_secs_f64());
    API_REQUESTS_TOTAL
        .with_label_values(&[method.as_str(), endpoint.as_str(), response.status().as_str()])
        .inc();
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_no_ids() {
        assert_eq!(normalize_path("/api/campaigns"), "/api/campaigns");
        assert_eq!(normalize_path("/health"), "/health");
    }

    #[test]
    fn test_normalize_path_with_ids() {
        assert_eq!(normalize_path("/api/bestiary/42"), "/api/bestiary/:id");
        assert_eq!(
            normalize_path("/api/campaigns/3/npcs/7"),
            "/api/campaigns/:id/npcs/:id"
        );
    }

    #[test]
    fn test_gather_metrics_after_registration() {
        register_metrics();
        register_metrics();
        DANGLING_MENTIONS_SKIPPED_TOTAL.inc();
        let output = gather_metrics();
        assert!(output.contains("gm_wiki_dangling_mentions_skipped_total"));
    }

    #[test]
    fn test_metric_increments() {
        SHORTCODES_RESOLVED_TOTAL.with_label_values(&["npc"]).inc();
        STUB_ENTITIES_CREATED_TOTAL.with_label_values(&["loc"]).inc();
        SHORTCODE_SOFT_MISSES_TOTAL.with_label_values(&["pc"]).inc();
        assert!(SHORTCODE_SOFT_MISSES_TOTAL.with_label_values(&["pc"]).get() >= 1);

        API_REQUEST_DURATION_SECONDS
            .with_label_values(&["/api/campaigns"])
            .observe(0.05);
        API_REQUESTS_TOTAL
            .with_label_values(&["GET", "/api/campaigns", "200"])
            .inc();
    }
}
