//! HTTP request metrics.
//!
//! Two instruments per instrumented route:
//! - `filegate_http_requests_total{route, status}`
//! - `filegate_http_request_duration_seconds{route}`
//!
//! Handlers hold a [`RequestTimer`] for their whole body. The timer records
//! when it is dropped, so every exit path is counted exactly once, including
//! a handler future dropped because the client went away.

use std::time::Instant;

use axum::http::StatusCode;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

const REQUESTS_TOTAL: &str = "filegate_http_requests_total";
const REQUEST_DURATION: &str = "filegate_http_request_duration_seconds";

/// Status label used when the handler never produced a response.
pub const CANCELLED_STATUS: &str = "cancelled";

/// Request counter and duration histogram registered with Prometheus.
#[derive(Clone)]
pub struct HttpMetrics {
    requests_total: IntCounterVec,
    request_duration: HistogramVec,
    registry: Registry,
}

impl HttpMetrics {
    /// Create the instruments and register them.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let requests_total = IntCounterVec::new(
            Opts::new(REQUESTS_TOTAL, "Total file API requests"),
            &["route", "status"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        // 5ms .. ~40s, storage round trips dominate
        let duration_buckets = prometheus::exponential_buckets(0.005, 2.0, 14)?;
        let request_duration = HistogramVec::new(
            HistogramOpts::new(REQUEST_DURATION, "File API request duration in seconds")
                .buckets(duration_buckets),
            &["route"],
        )?;
        registry.register(Box::new(request_duration.clone()))?;

        Ok(Self {
            requests_total,
            request_duration,
            registry: registry.clone(),
        })
    }

    /// Create instruments on a fresh private registry.
    pub fn unregistered() -> Result<Self, prometheus::Error> {
        Self::new(&Registry::new())
    }

    /// Start timing a request on `route`.
    pub fn start_timer(&self, route: &'static str) -> RequestTimer<'_> {
        RequestTimer {
            metrics: self,
            route,
            started: Instant::now(),
            status: None,
        }
    }

    /// Requests seen on `route` that ended with `status`.
    pub fn request_count(&self, route: &str, status: &str) -> u64 {
        self.requests_total.with_label_values(&[route, status]).get()
    }

    /// Duration samples recorded for `route`.
    pub fn duration_samples(&self, route: &str) -> u64 {
        self.request_duration
            .with_label_values(&[route])
            .get_sample_count()
    }

    /// Render the registry in the Prometheus text format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    fn record(&self, route: &str, status: &str, seconds: f64) {
        self.requests_total.with_label_values(&[route, status]).inc();
        self.request_duration
            .with_label_values(&[route])
            .observe(seconds);
    }
}

/// Records one request when dropped.
#[must_use = "the request is recorded when the timer is dropped"]
pub struct RequestTimer<'a> {
    metrics: &'a HttpMetrics,
    route: &'static str,
    started: Instant,
    status: Option<StatusCode>,
}

impl RequestTimer<'_> {
    /// Record the request with the final response status.
    pub fn finish(mut self, status: StatusCode) {
        self.status = Some(status);
    }
}

impl Drop for RequestTimer<'_> {
    fn drop(&mut self) {
        let status = self.status.as_ref().map_or(CANCELLED_STATUS, StatusCode::as_str);
        self.metrics
            .record(self.route, status, self.started.elapsed().as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_records_once() {
        let metrics = HttpMetrics::unregistered().unwrap();

        metrics.start_timer("/files/upload").finish(StatusCode::OK);

        assert_eq!(metrics.request_count("/files/upload", "200"), 1);
        assert_eq!(metrics.duration_samples("/files/upload"), 1);
    }

    #[test]
    fn test_dropped_timer_counts_as_cancelled() {
        let metrics = HttpMetrics::unregistered().unwrap();

        {
            let _timer = metrics.start_timer("/files/upload");
        }

        assert_eq!(metrics.request_count("/files/upload", CANCELLED_STATUS), 1);
        assert_eq!(metrics.duration_samples("/files/upload"), 1);
    }

    #[test]
    fn test_routes_are_counted_separately() {
        let metrics = HttpMetrics::unregistered().unwrap();

        metrics
            .start_timer("/files/upload")
            .finish(StatusCode::BAD_REQUEST);
        metrics
            .start_timer("/files/presigned-url")
            .finish(StatusCode::OK);
        metrics
            .start_timer("/files/presigned-url")
            .finish(StatusCode::INTERNAL_SERVER_ERROR);

        assert_eq!(metrics.request_count("/files/upload", "400"), 1);
        assert_eq!(metrics.request_count("/files/upload", "200"), 0);
        assert_eq!(metrics.request_count("/files/presigned-url", "200"), 1);
        assert_eq!(metrics.request_count("/files/presigned-url", "500"), 1);
        assert_eq!(metrics.duration_samples("/files/presigned-url"), 2);
    }

    #[test]
    fn test_render_exposes_instruments() {
        let metrics = HttpMetrics::unregistered().unwrap();
        metrics.start_timer("/files/upload").finish(StatusCode::OK);

        let text = metrics.render().unwrap();
        assert!(text.contains(REQUESTS_TOTAL));
        assert!(text.contains(REQUEST_DURATION));
    }

    #[test]
    fn test_double_registration_fails() {
        let registry = Registry::new();
        HttpMetrics::new(&registry).unwrap();
        assert!(HttpMetrics::new(&registry).is_err());
    }
}
