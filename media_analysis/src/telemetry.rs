use opentelemetry::{
    global,
    metrics::{Counter, Histogram, MeterProvider},
    KeyValue,
};
use prometheus::Registry;
use std::collections::HashSet;

pub struct Metrics {
    request_counter: Counter<u64>,
    analysis_duration: Histogram<u64>,
    sampled_frames: Counter<u64>,
    failed_frames: Counter<u64>,
    pub registry: Registry,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();
        let exporter = opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .build()?;

        let provider = opentelemetry_sdk::metrics::SdkMeterProvider::builder()
            .with_reader(exporter)
            .build();

        let meter = provider.meter("media_analysis");
        global::set_meter_provider(provider);

        let request_counter = meter
            .u64_counter("requests_total")
            .with_description("Total number of requests")
            .build();

        let boundaries = generate_boundaries([10, 100, 1_000, 10_000, 60_000], [10, 100, 1_000, 10_000]);

        let analysis_duration = meter
            .u64_histogram("analysis_duration_ms")
            .with_boundaries(boundaries)
            .with_description("Duration of analysis operations in milliseconds")
            .build();

        let sampled_frames = meter
            .u64_counter("video_frames_sampled_total")
            .with_description("Video frames submitted for classification")
            .build();

        let failed_frames = meter
            .u64_counter("video_frames_failed_total")
            .with_description("Sampled video frames skipped after an error")
            .build();

        Ok(Metrics {
            request_counter,
            analysis_duration,
            sampled_frames,
            failed_frames,
            registry,
        })
    }

    pub fn record_request(&self, route: &str) {
        let attributes = vec![KeyValue::new("route", route.to_string())];
        self.request_counter.add(1, &attributes);
    }

    pub fn record_analysis_duration(&self, duration_ms: u64, route: &str) {
        let attributes = vec![KeyValue::new("route", route.to_string())];
        self.analysis_duration.record(duration_ms, &attributes);
    }

    pub fn record_frames(&self, sampled: u64, failed: u64) {
        self.sampled_frames.add(sampled, &[]);
        self.failed_frames.add(failed, &[]);
    }
}

/// Histogram buckets: each `parts` window is walked with the matching `steps` stride.
fn generate_boundaries(parts: [u64; 5], steps: [usize; 4]) -> Vec<f64> {
    let mut seen = HashSet::new();
    parts
        .windows(2)
        .zip(steps)
        .flat_map(|(window, step)| (window[0]..=window[1]).step_by(step))
        .filter(|&x| seen.insert(x))
        .map(|x| x as f64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_boundaries() {
        let get = generate_boundaries([2, 22, 26, 46, 146], [10, 2, 20, 100]);
        let expected = vec![2.0, 12.0, 22.0, 24.0, 26.0, 46.0, 146.0];

        assert_eq!(get, expected);
    }

    #[test]
    fn test_metrics_are_exported() {
        let metrics = Metrics::new().unwrap();
        metrics.record_request("/api/sentiment");
        metrics.record_frames(3, 1);

        let families = metrics.registry.gather();
        let names: Vec<&str> = families.iter().map(|f| f.get_name()).collect();

        assert!(names.iter().any(|name| name.starts_with("requests_total")));
        assert!(names
            .iter()
            .any(|name| name.starts_with("video_frames_sampled_total")));
    }
}
