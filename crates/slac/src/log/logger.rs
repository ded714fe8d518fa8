//! Metric logger traits and composites.

use std::collections::HashMap;
use std::sync::Mutex;

/// Trait for logging metrics to various backends.
pub trait MetricLogger: Send + Sync {
    /// Log a scalar value (e.g. a loss term).
    fn log_scalar(&self, name: &str, value: f64, step: u64);

    /// Log a set of metrics collected in a dictionary/map.
    fn log_metrics(&self, metrics: &HashMap<String, f64>, step: u64) {
        for (name, value) in metrics {
            self.log_scalar(name, *value, step);
        }
    }

    /// Close the logger and flush any pending writes.
    fn close(&self) {}
}

/// A logger that does nothing (default).
pub struct NoOpLogger;

impl MetricLogger for NoOpLogger {
    fn log_scalar(&self, _name: &str, _value: f64, _step: u64) {}
    fn log_metrics(&self, _metrics: &HashMap<String, f64>, _step: u64) {}
}

/// Keeps every logged scalar in memory as `(step, value)` series.
#[derive(Default)]
pub struct RecordingLogger {
    series: Mutex<HashMap<String, Vec<(u64, f64)>>>,
}

impl RecordingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded points for `name`, in logging order.
    pub fn series(&self, name: &str) -> Vec<(u64, f64)> {
        self.series
            .lock()
            .map(|series| series.get(name).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Most recent value for `name`.
    pub fn last(&self, name: &str) -> Option<f64> {
        self.series(name).last().map(|&(_, value)| value)
    }
}

impl MetricLogger for RecordingLogger {
    fn log_scalar(&self, name: &str, value: f64, step: u64) {
        if let Ok(mut series) = self.series.lock() {
            series
                .entry(name.to_string())
                .or_default()
                .push((step, value));
        }
    }
}

/// A composite logger that dispatches to multiple backends.
pub struct CompositeLogger {
    loggers: Vec<Box<dyn MetricLogger>>,
}

impl CompositeLogger {
    pub fn new(loggers: Vec<Box<dyn MetricLogger>>) -> Self {
        Self { loggers }
    }

    pub fn add(&mut self, logger: Box<dyn MetricLogger>) {
        self.loggers.push(logger);
    }
}

impl MetricLogger for CompositeLogger {
    fn log_scalar(&self, name: &str, value: f64, step: u64) {
        for logger in &self.loggers {
            logger.log_scalar(name, value, step);
        }
    }

    fn log_metrics(&self, metrics: &HashMap<String, f64>, step: u64) {
        for logger in &self.loggers {
            logger.log_metrics(metrics, step);
        }
    }

    fn close(&self) {
        for logger in &self.loggers {
            logger.close();
        }
    }
}

impl<T: MetricLogger + ?Sized> MetricLogger for std::sync::Arc<T> {
    fn log_scalar(&self, name: &str, value: f64, step: u64) {
        (**self).log_scalar(name, value, step);
    }

    fn log_metrics(&self, metrics: &HashMap<String, f64>, step: u64) {
        (**self).log_metrics(metrics, step);
    }

    fn close(&self) {
        (**self).close();
    }
}
