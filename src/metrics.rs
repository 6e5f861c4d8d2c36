use anyhow::Context;
use axum::{
    extract::State,
    response::{IntoResponse, Response},
};
use http::StatusCode;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Prometheus registry holding the counters for the subscription endpoints.
#[derive(Debug, Clone)]
pub struct Metrics {
    registry: Registry,
    requests: IntCounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();
        let requests = IntCounterVec::new(
            Opts::new(
                "subscription_requests_total",
                "Requests handled by the subscription endpoints",
            ),
            &["operation", "outcome"],
        )
        .context("Failed to create `subscription_requests_total` counter")?;
        registry
            .register(Box::new(requests.clone()))
            .context("Failed to register `subscription_requests_total` metric")?;

        Ok(Self { registry, requests })
    }

    /// Count one request for `operation`. `outcome` is an error code or `OK`.
    pub fn record(&self, operation: &str, outcome: &str) {
        self.requests
            .with_label_values(&[operation, outcome])
            .inc();
    }

    pub fn count(&self, operation: &str, outcome: &str) -> u64 {
        self.requests
            .with_label_values(&[operation, outcome])
            .get()
    }

    fn encode(&self) -> anyhow::Result<String> {
        let mut buffer = vec![];
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .context("Failed to encode metrics")?;

        String::from_utf8(buffer).context("Failed to convert metrics to a valid string")
    }
}

/// Export all metrics in the Prometheus text format.
#[tracing::instrument(skip(metrics))]
#[utoipa::path(
    get,
    path = "/metrics",
    responses((status = OK, description = "Metrics in the Prometheus text format"))
)]
pub async fn metrics_endpoint(State(metrics): State<Arc<Metrics>>) -> Result<String, MetricsError> {
    metrics.encode().map_err(MetricsError::UnexpectedError)
}

#[derive(thiserror::Error)]
pub enum MetricsError {
    #[error("Unexpected error when generating metrics")]
    UnexpectedError(#[source] anyhow::Error),
}

impl IntoResponse for MetricsError {
    fn into_response(self) -> Response {
        tracing::error!(error.cause_chain = ?self, "Failed to export metrics");
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}
