use axum::{routing::get, Router};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

// The recorder is process-global; tests build many routers.
static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder (once per process) and describe the
    /// gatekeeper series.
    pub fn init() -> anyhow::Result<Self> {
        let handle = HANDLE.get_or_try_init(|| {
            let handle = PrometheusBuilder::new().install_recorder()?;
            describe();
            Ok::<_, anyhow::Error>(handle)
        })?;
        Ok(Self {
            handle: handle.clone(),
        })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

fn describe() {
    describe_counter!("gatekeeper_documents_scored_total", "Documents scored");
    describe_counter!(
        "gatekeeper_component_fallback_total",
        "Score components replaced by their neutral value, by component"
    );
    describe_counter!(
        "gatekeeper_documents_merged_total",
        "Documents folded into another representative"
    );
    describe_counter!("gatekeeper_judge_batches_total", "Judge batches, by outcome");
    describe_counter!("gatekeeper_judge_retries_total", "Judge calls retried after a transient error");
    describe_histogram!("gatekeeper_pipeline_duration_ms", "End-to-end pipeline run time (ms)");
}
