//! Console logging backend.

use std::collections::HashMap;

use super::MetricLogger;

/// Logger that prints metrics to stdout via tracing.
#[derive(Default)]
pub struct ConsoleLogger {
    prefix: Option<String>,
}

impl ConsoleLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend `prefix/` to every metric name.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }

    fn qualified(&self, name: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}/{}", prefix, name),
            None => name.to_string(),
        }
    }

    /// One line with all metrics, sorted by name.
    pub fn format_metrics(&self, metrics: &HashMap<String, f64>, step: u64) -> String {
        let mut sorted: Vec<_> = metrics.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(b.0));

        let body = sorted
            .iter()
            .map(|(key, value)| format!("{}={:.4}", self.qualified(key), value))
            .collect::<Vec<_>>()
            .join(", ");
        format!("Step {}: {}", step, body)
    }
}

impl MetricLogger for ConsoleLogger {
    fn log_scalar(&self, name: &str, value: f64, step: u64) {
        tracing::info!("Step {}: {} = {:.4}", step, self.qualified(name), value);
    }

    fn log_metrics(&self, metrics: &HashMap<String, f64>, step: u64) {
        // Group output to avoid spamming lines
        tracing::info!("{}", self.format_metrics(metrics, step));
    }
}
