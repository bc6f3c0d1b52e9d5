use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use prometheus::{IntCounterVec, Opts, Registry};
use service_core::error::AppError;
use std::sync::OnceLock;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
pub static PROMETHEUS_REGISTRY: OnceLock<Registry> = OnceLock::new();
pub static PROVISIONING_OUTCOMES_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Install the recorder for HTTP metrics and register the outcome counter.
pub fn init_metrics() -> Result<(), AppError> {
    let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
        AppError::InternalError(anyhow::anyhow!(
            "Failed to install Prometheus recorder: {}",
            e
        ))
    })?;
    let _ = METRICS_HANDLE.set(handle);

    let registry = Registry::new();

    let outcomes = IntCounterVec::new(
        Opts::new(
            "provisioning_outcomes_total",
            "Provisioning and deprovisioning outcomes by operation and result",
        ),
        &["operation", "result"],
    )
    .map_err(|e| AppError::InternalError(anyhow::anyhow!(e)))?;

    registry
        .register(Box::new(outcomes.clone()))
        .map_err(|e| AppError::InternalError(anyhow::anyhow!(e)))?;

    let _ = PROMETHEUS_REGISTRY.set(registry);
    let _ = PROVISIONING_OUTCOMES_TOTAL.set(outcomes);
    Ok(())
}

/// Count an orchestrator outcome. A no-op until [`init_metrics`] has run.
pub fn record_outcome(operation: &str, result: &str) {
    if let Some(counter) = PROVISIONING_OUTCOMES_TOTAL.get() {
        counter.with_label_values(&[operation, result]).inc();
    }
}

pub fn get_metrics() -> String {
    let mut output = METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string());

    if let Some(registry) = PROMETHEUS_REGISTRY.get() {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).ok();
        if let Ok(custom_metrics) = String::from_utf8(buffer) {
            output.push_str(&custom_metrics);
        }
    }

    output
}
