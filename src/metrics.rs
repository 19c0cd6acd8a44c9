//! Runtime counters and latency statistics for the decision engine.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector for the decision pipeline
pub struct PipelineMetrics {
    /// Decisions returned to callers
    pub decisions: AtomicU64,
    /// Decisions with `is_fraud = true`
    pub fraud_flags: AtomicU64,
    /// Alerts emitted
    pub alerts_generated: AtomicU64,
    /// Decisions made without a model score
    pub model_fallbacks: AtomicU64,
    /// Individual rule failures
    pub rule_failures: AtomicU64,
    /// Failed prediction or alert writes
    pub persistence_failures: AtomicU64,
    /// Requests rejected as malformed
    pub malformed_inputs: AtomicU64,
    /// Alerts by risk level
    alerts_by_level: RwLock<HashMap<String, u64>>,
    /// Decision latency (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Risk score distribution buckets
    score_buckets: RwLock<[u64; 10]>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl PipelineMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            decisions: AtomicU64::new(0),
            fraud_flags: AtomicU64::new(0),
            alerts_generated: AtomicU64::new(0),
            model_fallbacks: AtomicU64::new(0),
            rule_failures: AtomicU64::new(0),
            persistence_failures: AtomicU64::new(0),
            malformed_inputs: AtomicU64::new(0),
            alerts_by_level: RwLock::new(HashMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            score_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record a completed decision
    pub fn record_decision(&self, processing_time: Duration, risk_score: f64, is_fraud: bool) {
        self.decisions.fetch_add(1, Ordering::Relaxed);
        if is_fraud {
            self.fraud_flags.fetch_add(1, Ordering::Relaxed);
        }

        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            // Keep only the most recent samples
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }

        let bucket = (risk_score.clamp(0.0, 1.0) * 10.0).min(9.0) as usize;
        if let Ok(mut buckets) = self.score_buckets.write() {
            buckets[bucket] += 1;
        }
    }

    /// Record an emitted alert
    pub fn record_alert(&self, risk_level: &str) {
        self.alerts_generated.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut by_level) = self.alerts_by_level.write() {
            *by_level.entry(risk_level.to_string()).or_insert(0) += 1;
        }
    }

    pub fn record_model_fallback(&self) {
        self.model_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rule_failures(&self, count: usize) {
        self.rule_failures.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_persistence_failure(&self) {
        self.persistence_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed_input(&self) {
        self.malformed_inputs.fetch_add(1, Ordering::Relaxed);
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let times = match self.processing_times.read() {
            Ok(times) => times.clone(),
            Err(_) => return ProcessingStats::default(),
        };
        if times.is_empty() {
            return ProcessingStats::default();
        }

        let mut sorted = times;
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[(count as f64 * 0.95) as usize],
            p99_us: sorted[(count as f64 * 0.99) as usize],
            max_us: sorted[count - 1],
        }
    }

    /// Get current throughput (decisions per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.decisions.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Get score distribution
    pub fn get_score_distribution(&self) -> [u64; 10] {
        self.score_buckets.read().map(|b| *b).unwrap_or([0; 10])
    }

    /// Get alerts by risk level
    pub fn get_alerts_by_level(&self) -> HashMap<String, u64> {
        self.alerts_by_level
            .read()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let decisions = self.decisions.load(Ordering::Relaxed);
        let flags = self.fraud_flags.load(Ordering::Relaxed);
        let alerts = self.alerts_generated.load(Ordering::Relaxed);
        let pct = |n: u64| {
            if decisions > 0 {
                n as f64 / decisions as f64 * 100.0
            } else {
                0.0
            }
        };

        let processing = self.get_processing_stats();
        let score_dist = self.get_score_distribution();

        info!(
            decisions,
            throughput = format!("{:.1} tx/s", self.get_throughput()),
            fraud_rate = format!("{:.1}%", pct(flags)),
            alert_rate = format!("{:.1}%", pct(alerts)),
            "Decision summary"
        );
        info!(
            mean_us = processing.mean_us,
            p50_us = processing.p50_us,
            p95_us = processing.p95_us,
            p99_us = processing.p99_us,
            max_us = processing.max_us,
            "Decision latency"
        );
        info!(
            model_fallbacks = self.model_fallbacks.load(Ordering::Relaxed),
            rule_failures = self.rule_failures.load(Ordering::Relaxed),
            persistence_failures = self.persistence_failures.load(Ordering::Relaxed),
            malformed_inputs = self.malformed_inputs.load(Ordering::Relaxed),
            "Degradations"
        );
        for (level, count) in &self.get_alerts_by_level() {
            info!(level = %level, count, "Alerts by risk level");
        }

        let total: u64 = score_dist.iter().sum();
        for (i, &count) in score_dist.iter().enumerate() {
            let share = if total > 0 {
                count as f64 / total as f64 * 100.0
            } else {
                0.0
            };
            let bar: String = "█".repeat(((share / 5.0) as usize).min(20));
            info!(
                "  {:.1}-{:.1}: {:>6} ({:>5.1}%) {}",
                i as f64 / 10.0,
                (i + 1) as f64 / 10.0,
                count,
                share,
                bar
            );
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Real-time metrics reporter that logs periodic summaries
pub struct MetricsReporter {
    metrics: std::sync::Arc<PipelineMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: std::sync::Arc<PipelineMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = PipelineMetrics::new();

        metrics.record_decision(Duration::from_micros(100), 0.5, true);
        metrics.record_decision(Duration::from_micros(200), 0.1, false);
        metrics.record_alert("medium");
        metrics.record_model_fallback();
        metrics.record_rule_failures(2);

        assert_eq!(metrics.decisions.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.fraud_flags.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.alerts_generated.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.model_fallbacks.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.rule_failures.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.get_alerts_by_level().get("medium"), Some(&1));
    }

    #[test]
    fn test_score_buckets() {
        let metrics = PipelineMetrics::new();
        metrics.record_decision(Duration::from_micros(10), 0.0, false);
        metrics.record_decision(Duration::from_micros(10), 0.55, true);
        metrics.record_decision(Duration::from_micros(10), 1.0, true);

        let dist = metrics.get_score_distribution();
        assert_eq!(dist[0], 1);
        assert_eq!(dist[5], 1);
        assert_eq!(dist[9], 1);
    }

    #[test]
    fn test_processing_stats() {
        let metrics = PipelineMetrics::new();
        assert_eq!(metrics.get_processing_stats().count, 0);

        for us in [100, 200, 300, 400] {
            metrics.record_decision(Duration::from_micros(us), 0.1, false);
        }
        let stats = metrics.get_processing_stats();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.mean_us, 250);
        assert_eq!(stats.max_us, 400);
    }
}
