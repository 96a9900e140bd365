use opentelemetry::{
    global,
    metrics::{Counter, Histogram, MeterProvider},
    KeyValue,
};
use prometheus::Registry;
use std::collections::HashSet;

pub struct Metrics {
    frames_counter: Counter<u64>,
    prediction_counter: Counter<u64>,
    prediction_duration: Histogram<u64>,
    key_event_counter: Counter<u64>,
    pub registry: Registry,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();
        let exporter = opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build prometheus exporter: {}", e))?;

        let provider = opentelemetry_sdk::metrics::SdkMeterProvider::builder()
            .with_reader(exporter)
            .build();

        let meter = provider.meter("gesture_maze");
        global::set_meter_provider(provider);

        let frames_counter = meter
            .u64_counter("frames_total")
            .with_description("Total number of frames read from the frame source")
            .build();

        let prediction_counter = meter
            .u64_counter("predictions_total")
            .with_description("Prediction attempts by outcome")
            .build();

        let boundaries = generate_boundaries(&[(10, 100, 10), (100, 500, 50), (500, 5000, 500)]);

        let prediction_duration = meter
            .u64_histogram("prediction_duration_ms")
            .with_boundaries(boundaries)
            .with_description("Duration of remote classification round trips in milliseconds")
            .build();

        let key_event_counter = meter
            .u64_counter("key_events_total")
            .with_description("Directions dispatched as key presses")
            .build();

        Ok(Metrics {
            frames_counter,
            prediction_counter,
            prediction_duration,
            key_event_counter,
            registry,
        })
    }

    pub fn record_frame(&self) {
        self.frames_counter.add(1, &[]);
    }

    pub fn record_prediction(&self, outcome: &str) {
        let attributes = vec![KeyValue::new("outcome", outcome.to_string())];
        self.prediction_counter.add(1, &attributes);
    }

    pub fn record_prediction_duration(&self, duration_ms: u64) {
        self.prediction_duration.record(duration_ms, &[]);
    }

    pub fn record_key_press(&self, direction: &str) {
        let attributes = vec![KeyValue::new("direction", direction.to_string())];
        self.key_event_counter.add(1, &attributes);
    }
}

/// Builds histogram bucket edges from `(start, end, step)` segments, dropping
/// edges shared by adjacent segments.
fn generate_boundaries(segments: &[(i32, i32, usize)]) -> Vec<f64> {
    let mut seen = HashSet::new();
    segments
        .iter()
        .flat_map(|&(start, end, step)| (start..=end).step_by(step))
        .filter(|&x| seen.insert(x))
        .map(|x| x as f64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_boundaries() {
        let get = generate_boundaries(&[(2, 22, 10), (22, 26, 2), (26, 46, 20), (46, 146, 100)]);
        let expected = vec![2.0, 12.0, 22.0, 24.0, 26.0, 46.0, 146.0];

        assert_eq!(get, expected);
    }

    #[test]
    fn test_metrics_are_exported() {
        let metrics = Metrics::new().unwrap();
        metrics.record_frame();
        metrics.record_prediction("direction");
        metrics.record_prediction_duration(42);
        metrics.record_key_press("up");

        let names: Vec<String> = metrics
            .registry
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();

        assert!(names.iter().any(|name| name.starts_with("predictions_total")));
        assert!(names.iter().any(|name| name.starts_with("key_events_total")));
    }
}
