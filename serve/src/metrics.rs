//! Hand-rolled counters for `/metrics`: status-class counts, 429/503 counts,
//! a request-latency histogram plus running average, the number of live SSE
//! connections, and cumulative token usage. No external metrics crate is in
//! the teacher's dependency stack, so this follows the same plain-`Arc`-of-
//! atomics shape the pipeline crate uses for its own counters (e.g.
//! [`pipeline::fanout::SessionBus`]'s sequence counter).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use serde::Serialize;

use crate::state::AppState;

/// Latency bucket boundaries in milliseconds, matching common API latency
/// dashboards: sub-10ms, sub-50ms, sub-200ms, sub-1s, sub-5s, and overflow.
const BUCKET_BOUNDS_MS: [u64; 5] = [10, 50, 200, 1_000, 5_000];

#[derive(Default)]
pub struct Metrics {
    status_2xx: AtomicU64,
    status_3xx: AtomicU64,
    status_4xx: AtomicU64,
    status_5xx: AtomicU64,
    status_429: AtomicU64,
    status_503: AtomicU64,
    latency_buckets: [AtomicU64; 6],
    latency_sum_ms: AtomicU64,
    latency_count: AtomicU64,
    sse_connections: AtomicU64,
    prompt_tokens: AtomicU64,
    completion_tokens: AtomicU64,
    total_tokens: AtomicU64,
}

impl Metrics {
    /// Records one completed request: its status class and latency.
    pub fn record_request(&self, status: u16, elapsed: Duration) {
        match status {
            200..=299 => self.status_2xx.fetch_add(1, Ordering::Relaxed),
            300..=399 => self.status_3xx.fetch_add(1, Ordering::Relaxed),
            429 => self.status_429.fetch_add(1, Ordering::Relaxed),
            503 => self.status_503.fetch_add(1, Ordering::Relaxed),
            400..=499 => self.status_4xx.fetch_add(1, Ordering::Relaxed),
            500..=599 => self.status_5xx.fetch_add(1, Ordering::Relaxed),
            _ => 0,
        };
        let ms = elapsed.as_millis() as u64;
        let bucket = BUCKET_BOUNDS_MS
            .iter()
            .position(|&bound| ms < bound)
            .unwrap_or(BUCKET_BOUNDS_MS.len());
        self.latency_buckets[bucket].fetch_add(1, Ordering::Relaxed);
        self.latency_sum_ms.fetch_add(ms, Ordering::Relaxed);
        self.latency_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn sse_connection_opened(&self) {
        self.sse_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn sse_connection_closed(&self) {
        self.sse_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_usage(&self, usage: &pipeline::LlmUsage) {
        self.prompt_tokens
            .fetch_add(usage.prompt_tokens as u64, Ordering::Relaxed);
        self.completion_tokens
            .fetch_add(usage.completion_tokens as u64, Ordering::Relaxed);
        self.total_tokens
            .fetch_add(usage.total_tokens as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let count = self.latency_count.load(Ordering::Relaxed);
        let sum = self.latency_sum_ms.load(Ordering::Relaxed);
        MetricsSnapshot {
            status_2xx: self.status_2xx.load(Ordering::Relaxed),
            status_3xx: self.status_3xx.load(Ordering::Relaxed),
            status_4xx: self.status_4xx.load(Ordering::Relaxed),
            status_5xx: self.status_5xx.load(Ordering::Relaxed),
            status_429: self.status_429.load(Ordering::Relaxed),
            status_503: self.status_503.load(Ordering::Relaxed),
            latency_buckets_ms: BUCKET_BOUNDS_MS
                .iter()
                .copied()
                .chain(std::iter::once(u64::MAX))
                .zip(self.latency_buckets.iter().map(|b| b.load(Ordering::Relaxed)))
                .collect(),
            latency_avg_ms: if count == 0 { 0.0 } else { sum as f64 / count as f64 },
            sse_connections: self.sse_connections.load(Ordering::Relaxed),
            prompt_tokens: self.prompt_tokens.load(Ordering::Relaxed),
            completion_tokens: self.completion_tokens.load(Ordering::Relaxed),
            total_tokens: self.total_tokens.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub status_2xx: u64,
    pub status_3xx: u64,
    pub status_4xx: u64,
    pub status_5xx: u64,
    pub status_429: u64,
    pub status_503: u64,
    pub latency_buckets_ms: Vec<(u64, u64)>,
    pub latency_avg_ms: f64,
    pub sse_connections: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// Records every request's status class and latency into [`Metrics`].
pub async fn metrics_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let response = next.run(request).await;
    state
        .metrics
        .record_request(response.status().as_u16(), started.elapsed());
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_recorded_in_the_right_status_class() {
        let metrics = Metrics::default();
        metrics.record_request(200, Duration::from_millis(5));
        metrics.record_request(404, Duration::from_millis(5));
        metrics.record_request(429, Duration::from_millis(5));
        metrics.record_request(503, Duration::from_millis(5));
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.status_2xx, 1);
        assert_eq!(snapshot.status_4xx, 1);
        assert_eq!(snapshot.status_429, 1);
        assert_eq!(snapshot.status_503, 1);
    }

    #[test]
    fn latency_average_is_computed_across_requests() {
        let metrics = Metrics::default();
        metrics.record_request(200, Duration::from_millis(10));
        metrics.record_request(200, Duration::from_millis(30));
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.latency_avg_ms, 20.0);
    }

    #[test]
    fn sse_gauge_tracks_opens_and_closes() {
        let metrics = Metrics::default();
        metrics.sse_connection_opened();
        metrics.sse_connection_opened();
        metrics.sse_connection_closed();
        assert_eq!(metrics.snapshot().sse_connections, 1);
    }
}
