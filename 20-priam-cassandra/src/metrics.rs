//! Per-node message latency histogram.
//!
//! Every message handled by a node is measured from the instant it was sent
//! to the instant the node picked it up. Samples are observed in microseconds
//! into a prometheus histogram with power-of-two buckets, which is coarse but
//! enough to tell a healthy mailbox from a backed-up one.

use std::{fmt, time::Duration};

use prometheus_client::{
    encoding::text::encode,
    metrics::histogram::{Histogram, exponential_buckets},
    registry::Registry,
};
use serde::Serialize;

/// Metric name as it appears in the OpenMetrics exposition.
pub const METRIC: &str = "message_latency_microseconds";

/// Upper bounds 1us, 2us, 4us, ... 2^31us, plus `+Inf`.
const BUCKETS: u16 = 32;

#[derive(Debug)]
pub struct LatencyHistogram {
    label: String,
    histogram: Histogram,
    registry: Registry,
    max: Duration,
}

/// Point-in-time view of a histogram, suitable for logging or JSON output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencySummary {
    pub label: String,
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

impl LatencyHistogram {
    pub fn new(label: impl Into<String>) -> Self {
        let histogram = Histogram::new(exponential_buckets(1.0, 2.0, BUCKETS));
        let mut registry = Registry::default();
        registry.register(
            METRIC,
            "Time from send to handling of each message",
            histogram.clone(),
        );
        Self {
            label: label.into(),
            histogram,
            registry,
            max: Duration::ZERO,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Renames the histogram once the owning node learns its name. Samples
    /// already recorded are kept.
    pub fn relabel(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    pub fn record(&mut self, latency: Duration) {
        self.histogram.observe(latency.as_micros() as f64);
        self.max = self.max.max(latency);
    }

    pub fn count(&self) -> u64 {
        self.snapshot().count
    }

    /// OpenMetrics text exposition of the histogram.
    pub fn encode(&self) -> Result<String, fmt::Error> {
        let mut buffer = String::new();
        encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }

    pub fn summary(&self) -> LatencySummary {
        let snapshot = self.snapshot();
        let max_us = self.max.as_micros() as u64;
        let mean_us = match snapshot.count {
            0 => 0,
            n => (snapshot.sum / n as f64).round() as u64,
        };
        LatencySummary {
            label: self.label.clone(),
            count: snapshot.count,
            mean_us,
            p50_us: snapshot.quantile_us(0.5, max_us),
            p99_us: snapshot.quantile_us(0.99, max_us),
            max_us,
        }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot::parse(&self.encode().unwrap_or_default())
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new("")
    }
}

/// Count, sum and cumulative buckets read back from the exposition.
#[derive(Debug, Default, PartialEq)]
struct Snapshot {
    count: u64,
    sum: f64,
    buckets: Vec<(f64, u64)>,
}

impl Snapshot {
    fn parse(text: &str) -> Self {
        let mut snapshot = Snapshot::default();
        for line in text.lines() {
            let Some((series, value)) = line
                .strip_prefix(METRIC)
                .and_then(|rest| rest.rsplit_once(' '))
            else {
                continue;
            };
            match series {
                "_count" => snapshot.count = value.parse().unwrap_or_default(),
                "_sum" => snapshot.sum = value.parse().unwrap_or_default(),
                _ => {
                    let le = series
                        .strip_prefix("_bucket{le=\"")
                        .and_then(|rest| rest.strip_suffix("\"}"));
                    if let (Some(Ok(le)), Ok(hits)) = (le.map(str::parse::<f64>), value.parse()) {
                        snapshot.buckets.push((le, hits));
                    }
                }
            }
        }
        snapshot
    }

    /// Upper bound of the bucket holding the `q`-th quantile, in microseconds.
    /// Samples past the last finite bucket report `max_us`.
    fn quantile_us(&self, q: f64, max_us: u64) -> u64 {
        if self.count == 0 {
            return 0;
        }
        let rank = ((self.count as f64) * q.clamp(0.0, 1.0)).ceil().max(1.0) as u64;
        self.buckets
            .iter()
            .find(|(_, cumulative)| *cumulative >= rank)
            .filter(|(le, _)| le.is_finite())
            .map_or(max_us, |(le, _)| *le as u64)
    }
}
