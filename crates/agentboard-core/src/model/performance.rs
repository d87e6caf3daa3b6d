// ── Performance telemetry ──

use serde::{Deserialize, Serialize};

/// Tokens and requests per minute.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Throughput {
    pub tpm: f64,
    pub rpm: f64,
}

/// Parallel per-minute series; index `i` of each vector is one sample.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceHistory {
    pub tpm: Vec<f64>,
    pub rpm: Vec<f64>,
    /// Unix milliseconds.
    pub timestamps: Vec<i64>,
}

impl PerformanceHistory {
    /// Number of complete samples.
    pub fn len(&self) -> usize {
        self.tpm.len().min(self.rpm.len()).min(self.timestamps.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(timestamp, throughput)` pairs, oldest first.
    pub fn samples(&self) -> impl Iterator<Item = (i64, Throughput)> + '_ {
        self.timestamps
            .iter()
            .zip(self.tpm.iter().zip(&self.rpm))
            .map(|(&ts, (&tpm, &rpm))| (ts, Throughput { tpm, rpm }))
    }

    pub fn peak_tpm(&self) -> Option<f64> {
        self.tpm.iter().copied().reduce(f64::max)
    }
}

/// Cumulative usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageTotals {
    pub tokens: u64,
    pub requests: u64,
}

/// Payload of the `performance` channel.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceSnapshot {
    pub current: Throughput,
    pub history: PerformanceHistory,
    pub total: UsageTotals,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_backend_payload() {
        let snap: PerformanceSnapshot = serde_json::from_value(json!({
            "current": { "tpm": 1200, "rpm": 4 },
            "history": { "tpm": [800, 1200], "rpm": [3, 4], "timestamps": [60_000, 120_000] },
            "total": { "tokens": 50_000, "requests": 120 }
        }))
        .unwrap();

        assert!((snap.current.tpm - 1200.0).abs() < f64::EPSILON);
        assert_eq!(snap.history.len(), 2);
        assert_eq!(snap.history.peak_tpm(), Some(1200.0));
        assert_eq!(snap.total.requests, 120);

        let samples: Vec<_> = snap.history.samples().collect();
        assert_eq!(samples[0].0, 60_000);
    }

    #[test]
    fn ragged_history_counts_complete_samples() {
        let history = PerformanceHistory {
            tpm: vec![1.0, 2.0, 3.0],
            rpm: vec![1.0],
            timestamps: vec![1, 2],
        };
        assert_eq!(history.len(), 1);
        assert_eq!(history.samples().count(), 1);
    }
}
