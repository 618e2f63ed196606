// dbbot/crates/dbbot/src/metrics.rs

use axum::http::StatusCode;
use axum::response::IntoResponse;
use lazy_static::lazy_static;
use prometheus::core::Collector;
use prometheus::{Encoder, IntCounterVec, IntGauge, Registry, TextEncoder};
use std::sync::OnceLock;
use tracing::warn;

lazy_static! {
    static ref REGISTRY: Registry = Registry::new();
}

static REQ_COUNTER: OnceLock<IntCounterVec> = OnceLock::new();
static QUERY_ATTEMPTS: OnceLock<IntCounterVec> = OnceLock::new();
static CONNECTED_SESSIONS: OnceLock<IntGauge> = OnceLock::new();

pub fn init_metrics() {
    register(&REGISTRY, &REQ_COUNTER, || {
        IntCounterVec::new(
            prometheus::opts!("requests_total", "Total requests per route"),
            &["route", "status"],
        )
    });
    register(&REGISTRY, &QUERY_ATTEMPTS, || {
        IntCounterVec::new(
            prometheus::opts!("query_attempts_total", "Generated SQL executions by outcome"),
            &["outcome"],
        )
    });
    register(&REGISTRY, &CONNECTED_SESSIONS, || {
        IntGauge::new("connected_sessions", "Sessions with a database connection")
    });
}

/// Builds and registers one collector. A failure only affects that collector.
fn register<C, F>(registry: &Registry, slot: &OnceLock<C>, build: F)
where
    C: Collector + Clone + 'static,
    F: FnOnce() -> prometheus::Result<C>,
{
    if slot.get().is_some() {
        return;
    }
    let collector = match build() {
        Ok(collector) => collector,
        Err(e) => {
            warn!("Failed to create metric: {}", e);
            return;
        }
    };
    if slot.set(collector.clone()).is_err() {
        return;
    }
    if let Err(e) = registry.register(Box::new(collector)) {
        warn!("Failed to register metric: {}", e);
    }
}

pub fn inc_request(route: &str, status: &str) {
    if let Some(counter) = REQ_COUNTER.get() {
        counter.with_label_values(&[route, status]).inc();
    }
}

pub fn inc_query_attempt(outcome: &str) {
    if let Some(counter) = QUERY_ATTEMPTS.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}

pub fn inc_sessions() {
    if let Some(gauge) = CONNECTED_SESSIONS.get() {
        gauge.inc();
    }
}

pub fn dec_sessions() {
    if let Some(gauge) = CONNECTED_SESSIONS.get() {
        gauge.dec();
    }
}

pub fn dec_sessions_by(count: usize) {
    if let Some(gauge) = CONNECTED_SESSIONS.get() {
        gauge.sub(count as i64);
    }
}

pub async fn get_metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("failed to encode metrics: {}", e).into_bytes(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        buffer,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_metrics_is_idempotent() {
        init_metrics();
        init_metrics();
        inc_request("chat", "ok");
        inc_query_attempt("success");

        let names: Vec<String> = REGISTRY.gather().iter().map(|f| f.get_name().to_string()).collect();
        assert!(names.contains(&"requests_total".to_string()));
        assert!(names.contains(&"query_attempts_total".to_string()));
        assert!(names.contains(&"connected_sessions".to_string()));
    }

    #[test]
    fn test_failed_registration_does_not_block_later_collectors() {
        let registry = Registry::new();
        registry
            .register(Box::new(IntGauge::new("taken", "already registered").unwrap()))
            .unwrap();

        let clashing: OnceLock<IntGauge> = OnceLock::new();
        let independent: OnceLock<IntGauge> = OnceLock::new();
        register(&registry, &clashing, || IntGauge::new("taken", "clashes"));
        register(&registry, &independent, || IntGauge::new("independent", "still registered"));

        let names: Vec<String> = registry.gather().iter().map(|f| f.get_name().to_string()).collect();
        assert!(names.contains(&"independent".to_string()));
        assert!(independent.get().is_some());
    }

    #[test]
    fn test_failed_build_leaves_slot_empty() {
        let registry = Registry::new();
        let slot: OnceLock<IntGauge> = OnceLock::new();
        register(&registry, &slot, || IntGauge::new("1invalid", "invalid name"));
        assert!(slot.get().is_none());
    }
}
