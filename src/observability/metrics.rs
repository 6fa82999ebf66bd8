use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub trip_transitions_total: IntCounterVec,
    pub document_uploads_total: IntCounterVec,
    pub tracking_points_total: IntCounter,
    pub remote_request_seconds: HistogramVec,
    pub requests_in_flight: IntGauge,
    pub notifications_unread: IntGauge,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let trip_transitions_total = IntCounterVec::new(
            Opts::new("trip_transitions_total", "Trip status transitions by action and outcome"),
            &["action", "outcome"],
        )
        .expect("valid trip_transitions_total metric");

        let document_uploads_total = IntCounterVec::new(
            Opts::new("document_uploads_total", "Document upload batches by stage and outcome"),
            &["stage", "outcome"],
        )
        .expect("valid document_uploads_total metric");

        let tracking_points_total =
            IntCounter::new("tracking_points_total", "Location points recorded while tracking")
                .expect("valid tracking_points_total metric");

        let remote_request_seconds = HistogramVec::new(
            HistogramOpts::new(
                "remote_request_seconds",
                "Latency of trip service calls in seconds",
            ),
            &["operation", "outcome"],
        )
        .expect("valid remote_request_seconds metric");

        let requests_in_flight = IntGauge::new(
            "requests_in_flight",
            "Trip mutations currently awaiting the trip service",
        )
        .expect("valid requests_in_flight metric");

        let notifications_unread =
            IntGauge::new("notifications_unread", "Unread notifications in the inbox")
                .expect("valid notifications_unread metric");

        registry
            .register(Box::new(trip_transitions_total.clone()))
            .expect("register trip_transitions_total");
        registry
            .register(Box::new(document_uploads_total.clone()))
            .expect("register document_uploads_total");
        registry
            .register(Box::new(tracking_points_total.clone()))
            .expect("register tracking_points_total");
        registry
            .register(Box::new(remote_request_seconds.clone()))
            .expect("register remote_request_seconds");
        registry
            .register(Box::new(requests_in_flight.clone()))
            .expect("register requests_in_flight");
        registry
            .register(Box::new(notifications_unread.clone()))
            .expect("register notifications_unread");

        Self {
            registry,
            trip_transitions_total,
            document_uploads_total,
            tracking_points_total,
            remote_request_seconds,
            requests_in_flight,
            notifications_unread,
        }
    }

    pub fn observe_remote(&self, operation: &str, ok: bool, seconds: f64) {
        self.remote_request_seconds
            .with_label_values(&[operation, outcome(ok)])
            .observe(seconds);
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

pub fn outcome(ok: bool) -> &'static str {
    if ok {
        "success"
    } else {
        "error"
    }
}
