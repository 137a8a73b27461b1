use super::*;

fn create_test_registry() -> Registry {
    let registry = Registry::new_custom(Some("logstore".to_string()), None).unwrap();
    register_custom_metrics(&registry);
    registry
}

#[test]
fn test_custom_registry() {
    let registry = create_test_registry();

    let metrics = &registry.gather();
    let metric_names: Vec<_> = metrics.iter().map(|m| m.get_name()).collect();
    assert!(
        metric_names.contains(&"logstore_logs_per_batch"),
        "Missing logstore_logs_per_batch"
    );
    assert!(metric_names.contains(&"logstore_store_logs_duration_ms"));
}

#[test]
fn test_prometheus_hook_observes_known_metrics() {
    let before = LOGS_PER_BATCH_METRIC.get_sample_count();

    PrometheusMetrics.record(METRIC_LOGS_PER_BATCH, 3.0);
    PrometheusMetrics.record("not_a_metric", 1.0);

    assert_eq!(LOGS_PER_BATCH_METRIC.get_sample_count(), before + 1);
    assert!(gather_metrics().contains("logs_per_batch"));
}
