use serde::{Deserialize, Serialize};
use std::sync::Mutex;

pub struct MetricsRecorder {
    inner: Mutex<Metrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub stages: usize,
    pub errors: usize,
    pub shots: usize,
}

#[derive(Default)]
struct Metrics {
    stages: usize,
    errors: usize,
    shots: usize,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Metrics::default()),
        }
    }

    pub fn record_stage(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.stages += 1;
        }
    }

    pub fn record_error(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.errors += 1;
        }
    }

    pub fn record_shot(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.shots += 1;
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        if let Ok(metrics) = self.inner.lock() {
            MetricsSnapshot {
                stages: metrics.stages,
                errors: metrics.errors,
                shots: metrics.shots,
            }
        } else {
            MetricsSnapshot::default()
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
