use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::Lazy;
use tokio::sync::RwLock;

pub static METRICS: Lazy<Metrics> = Lazy::new(Metrics::new);

#[derive(Debug, Clone, Default)]
pub struct Counter {
    value: Arc<RwLock<u64>>,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn inc(&self) {
        let mut value = self.value.write().await;
        *value += 1;
    }

    pub async fn inc_by(&self, delta: u64) {
        let mut value = self.value.write().await;
        *value += delta;
    }

    pub async fn get(&self) -> u64 {
        *self.value.read().await
    }
}

#[derive(Debug, Clone)]
pub struct Histogram {
    buckets: Vec<f64>,
    counts: Arc<RwLock<Vec<u64>>>,
    sum: Arc<RwLock<f64>>,
    count: Arc<RwLock<u64>>,
}

impl Histogram {
    pub fn new(buckets: Vec<f64>) -> Self {
        let bucket_count = buckets.len();
        Self {
            buckets,
            counts: Arc::new(RwLock::new(vec![0; bucket_count + 1])),
            sum: Arc::new(RwLock::new(0.0)),
            count: Arc::new(RwLock::new(0)),
        }
    }

    pub fn default_buckets() -> Vec<f64> {
        vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    }

    pub async fn observe(&self, value: f64) {
        let mut counts = self.counts.write().await;
        let mut sum = self.sum.write().await;
        let mut count = self.count.write().await;

        *sum += value;
        *count += 1;

        for (i, &bucket) in self.buckets.iter().enumerate() {
            if value <= bucket {
                counts[i] += 1;
            }
        }
        counts[self.buckets.len()] += 1;
    }

    pub async fn observe_since(&self, start: Instant) {
        self.observe(start.elapsed().as_secs_f64()).await;
    }

    pub async fn get_count(&self) -> u64 {
        *self.count.read().await
    }

    async fn render(&self, name: &str, help: &str, output: &mut String) {
        let counts = self.counts.read().await;
        let _ = writeln!(output, "# HELP {name} {help}");
        let _ = writeln!(output, "# TYPE {name} histogram");
        for (i, bucket) in self.buckets.iter().enumerate() {
            let _ = writeln!(output, "{name}_bucket{{le=\"{bucket}\"}} {}", counts[i]);
        }
        let _ = writeln!(output, "{name}_bucket{{le=\"+Inf\"}} {}", counts[self.buckets.len()]);
        let _ = writeln!(output, "{name}_sum {}", *self.sum.read().await);
        let _ = writeln!(output, "{name}_count {}", *self.count.read().await);
    }
}

#[derive(Debug, Clone)]
pub struct Metrics {
    pub contacts_listed: Counter,
    pub contacts_fetched: Counter,
    pub contacts_created: Counter,
    pub contacts_updated: Counter,
    pub contacts_deleted: Counter,
    pub contacts_searched: Counter,

    pub validation_failures: Counter,
    pub store_errors: Counter,
    pub store_latency: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            contacts_listed: Counter::new(),
            contacts_fetched: Counter::new(),
            contacts_created: Counter::new(),
            contacts_updated: Counter::new(),
            contacts_deleted: Counter::new(),
            contacts_searched: Counter::new(),

            validation_failures: Counter::new(),
            store_errors: Counter::new(),
            store_latency: Histogram::new(Histogram::default_buckets()),
        }
    }

    pub async fn to_prometheus(&self) -> String {
        let mut output = String::new();

        let counters = [
            ("contacts_listed", "Total number of list operations", &self.contacts_listed),
            ("contacts_fetched", "Total number of single-contact reads", &self.contacts_fetched),
            ("contacts_created", "Total number of contacts created", &self.contacts_created),
            ("contacts_updated", "Total number of contacts updated", &self.contacts_updated),
            ("contacts_deleted", "Total number of contacts deleted", &self.contacts_deleted),
            ("contacts_searched", "Total number of search operations", &self.contacts_searched),
            ("validation_failures", "Total number of rejected form submissions", &self.validation_failures),
            ("store_errors", "Total number of failed store operations", &self.store_errors),
        ];

        for (name, help, counter) in counters {
            let _ = writeln!(output, "# HELP contact_book_{name} {help}");
            let _ = writeln!(output, "# TYPE contact_book_{name} counter");
            let _ = writeln!(output, "contact_book_{name} {}", counter.get().await);
        }

        self.store_latency
            .render(
                "contact_book_store_latency_seconds",
                "Store operation latency in seconds",
                &mut output,
            )
            .await;

        output
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

pub fn metrics() -> &'static Metrics {
    &METRICS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counter() {
        let metrics = Metrics::new();

        assert_eq!(metrics.contacts_created.get().await, 0);

        metrics.contacts_created.inc().await;
        assert_eq!(metrics.contacts_created.get().await, 1);

        metrics.contacts_created.inc_by(5).await;
        assert_eq!(metrics.contacts_created.get().await, 6);
    }

    #[tokio::test]
    async fn test_histogram_buckets() {
        let histogram = Histogram::new(vec![0.1, 1.0]);
        histogram.observe(0.05).await;
        histogram.observe(0.5).await;
        histogram.observe(5.0).await;

        assert_eq!(histogram.get_count().await, 3);
        assert_eq!(*histogram.counts.read().await, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_prometheus_output() {
        let metrics = Metrics::new();

        metrics.contacts_deleted.inc().await;
        metrics.store_latency.observe(0.02).await;

        let output = metrics.to_prometheus().await;

        assert!(output.contains("contact_book_contacts_deleted 1"));
        assert!(output.contains("contact_book_contacts_created 0"));
        assert!(output.contains("contact_book_store_latency_seconds_count 1"));
        assert!(output.contains("contact_book_store_latency_seconds_bucket{le=\"+Inf\"} 1"));
    }
}
