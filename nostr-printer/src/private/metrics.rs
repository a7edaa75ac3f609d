use axum::routing::get;
use axum::Router;
use lazy_static::lazy_static;
use prometheus::{opts, IntCounter, IntCounterVec, IntGauge, Registry};
use std::sync::Arc;
use tokio::net::TcpListener;

lazy_static! {
    pub static ref REGISTRY: Arc<Registry> = Arc::new(Registry::default());
    pub static ref FRAME_COUNTER: IntCounterVec = IntCounterVec::new(
        opts!("recv_frame_count", "Count of received frames"),
        &["frame"]
    )
    .expect("failed to create FRAME_COUNTER");
    pub static ref CURSOR_FAILURES: IntCounterVec = IntCounterVec::new(
        opts!("cursor_failure_count", "Count of failed cursor advances"),
        &["reason"]
    )
    .expect("failed to create CURSOR_FAILURES");
    pub static ref CURSOR_SINCE: IntGauge =
        IntGauge::new("cursor_since", "Last persisted since")
            .expect("failed to create CURSOR_SINCE");
    pub static ref RECEIPTS_PRINTED: IntCounter =
        IntCounter::new("receipts_printed", "Count of printed receipts")
            .expect("failed to create RECEIPTS_PRINTED");
    pub static ref PAYLOAD_ERRORS: IntCounter =
        IntCounter::new("payload_error_count", "Count of undecodable payment payloads")
            .expect("failed to create PAYLOAD_ERRORS");
    pub static ref CONNECTIONS: IntCounter =
        IntCounter::new("relay_connections", "Count of relay connections")
            .expect("failed to create CONNECTIONS");
    pub static ref DEGRADED_CONNECTIONS: IntCounter = IntCounter::new(
        "relay_degraded_connections",
        "Count of connections where no subscription could be sent"
    )
    .expect("failed to create DEGRADED_CONNECTIONS");
}

pub fn register_metrics() -> Result<(), prometheus::Error> {
    REGISTRY.register(Box::new(FRAME_COUNTER.clone()))?;
    REGISTRY.register(Box::new(CURSOR_FAILURES.clone()))?;
    REGISTRY.register(Box::new(CURSOR_SINCE.clone()))?;
    REGISTRY.register(Box::new(RECEIPTS_PRINTED.clone()))?;
    REGISTRY.register(Box::new(PAYLOAD_ERRORS.clone()))?;
    REGISTRY.register(Box::new(CONNECTIONS.clone()))?;
    REGISTRY.register(Box::new(DEGRADED_CONNECTIONS.clone()))?;
    Ok(())
}

#[inline]
pub fn track_frame(frame: &str) {
    match FRAME_COUNTER.get_metric_with_label_values(&[frame]) {
        Ok(metrics) => metrics.inc(),
        Err(err) => tracing::error!("track_frame: {err}"),
    }
}

#[inline]
pub fn track_cursor_failure(reason: &str) {
    match CURSOR_FAILURES.get_metric_with_label_values(&[reason]) {
        Ok(metrics) => metrics.inc(),
        Err(err) => tracing::error!("track_cursor_failure: {err}"),
    }
}

pub async fn metrics_handler() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        tracing::error!("could not encode custom metrics: {}", e);
    };
    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("custom metrics could not be from_utf8'd: {}", e);
        String::default()
    })
}

pub async fn get_metrics_app(socket_addr: &str) -> std::io::Result<(Router, TcpListener)> {
    let router = Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/metrics", get(metrics_handler));
    let listener = TcpListener::bind(socket_addr).await?;
    Ok((router, listener))
}
