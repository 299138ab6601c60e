//! Metrics collection and export for object pools

use std::collections::HashMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicUsize, Ordering};

#[cfg(feature = "serde")]
use serde::Serialize;

/// Metrics data for a pool
///
/// # Examples
///
/// ```
/// use gated_objectpool::{ObjectPool, PoolConfiguration};
///
/// let pool = ObjectPool::fixed(vec![1, 2, 3], PoolConfiguration::default()).unwrap();
///
/// {
///     let _obj = pool.take().unwrap();
///     let metrics = pool.get_metrics();
///     assert_eq!(metrics.total_retrieved, 1);
///     assert_eq!(metrics.active_objects, 1);
///     assert_eq!(metrics.size, 3);
/// }
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct PoolMetrics {
    /// Total objects handed out
    pub total_retrieved: usize,

    /// Total objects put back into the pool
    pub total_returned: usize,

    /// Total objects produced by the factory
    pub total_created: usize,

    /// Factory calls that failed
    pub factory_failures: usize,

    /// Returned objects discarded because clearing failed
    pub reclaim_failures: usize,

    /// Waits that ran out of time
    pub timeouts: usize,

    /// Waits that were cancelled
    pub cancellations: usize,

    /// Objects currently checked out
    pub active_objects: usize,

    /// Objects currently waiting in the pool
    pub available_objects: usize,

    /// Live objects counted against capacity
    pub size: usize,

    /// Maximum pool capacity
    pub max_size: usize,

    /// Checked-out share of capacity (0.0 to 1.0)
    pub utilization: f64,
}

impl PoolMetrics {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("total_retrieved".to_string(), self.total_retrieved.to_string());
        metrics.insert("total_returned".to_string(), self.total_returned.to_string());
        metrics.insert("total_created".to_string(), self.total_created.to_string());
        metrics.insert("factory_failures".to_string(), self.factory_failures.to_string());
        metrics.insert("reclaim_failures".to_string(), self.reclaim_failures.to_string());
        metrics.insert("timeouts".to_string(), self.timeouts.to_string());
        metrics.insert("cancellations".to_string(), self.cancellations.to_string());
        metrics.insert("active_objects".to_string(), self.active_objects.to_string());
        metrics.insert("available_objects".to_string(), self.available_objects.to_string());
        metrics.insert("size".to_string(), self.size.to_string());
        metrics.insert("max_size".to_string(), self.max_size.to_string());
        metrics.insert("utilization".to_string(), format!("{:.2}", self.utilization));
        metrics
    }
}

/// Metrics exporter for Prometheus format
pub struct MetricsExporter;

impl MetricsExporter {
    /// Export metrics in Prometheus exposition format
    ///
    /// # Examples
    ///
    /// ```
    /// use gated_objectpool::{ObjectPool, PoolConfiguration};
    /// use std::collections::HashMap;
    ///
    /// let pool = ObjectPool::fixed(vec![1, 2, 3], PoolConfiguration::default()).unwrap();
    ///
    /// let mut tags = HashMap::new();
    /// tags.insert("service".to_string(), "api".to_string());
    ///
    /// let output = pool.export_metrics_prometheus("my_pool", Some(&tags));
    /// assert!(output.contains("objectpool_objects_active"));
    /// assert!(output.contains("service=\"api\""));
    /// ```
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        let labels = Self::format_labels(pool_name, tags);
        let mut output = String::new();

        let gauges = [
            ("objectpool_objects_active", "Current checked-out objects", metrics.active_objects),
            (
                "objectpool_objects_available",
                "Current available objects",
                metrics.available_objects,
            ),
            ("objectpool_size", "Live objects counted against capacity", metrics.size),
            ("objectpool_max_size", "Maximum pool capacity", metrics.max_size),
        ];
        for (name, help, value) in gauges {
            Self::write_metric(&mut output, name, help, "gauge", &labels, value);
        }

        let _ = writeln!(output, "# HELP objectpool_utilization Pool utilization ratio");
        let _ = writeln!(output, "# TYPE objectpool_utilization gauge");
        let _ = writeln!(output, "objectpool_utilization{{{}}} {:.2}", labels, metrics.utilization);

        let counters = [
            (
                "objectpool_objects_retrieved_total",
                "Total objects retrieved",
                metrics.total_retrieved,
            ),
            (
                "objectpool_objects_returned_total",
                "Total objects returned",
                metrics.total_returned,
            ),
            ("objectpool_objects_created_total", "Total objects created", metrics.total_created),
            ("objectpool_factory_failures_total", "Factory failures", metrics.factory_failures),
            (
                "objectpool_reclaim_failures_total",
                "Objects discarded on return",
                metrics.reclaim_failures,
            ),
            ("objectpool_wait_timeouts_total", "Waits that timed out", metrics.timeouts),
            (
                "objectpool_wait_cancellations_total",
                "Waits that were cancelled",
                metrics.cancellations,
            ),
        ];
        for (name, help, value) in counters {
            Self::write_metric(&mut output, name, help, "counter", &labels, value);
        }

        output
    }

    fn write_metric(
        output: &mut String,
        name: &str,
        help: &str,
        kind: &str,
        labels: &str,
        value: usize,
    ) {
        let _ = writeln!(output, "# HELP {} {}", name, help);
        let _ = writeln!(output, "# TYPE {} {}", name, kind);
        let _ = writeln!(output, "{}{{{}}} {}", name, labels, value);
    }

    fn format_labels(pool_name: &str, tags: Option<&HashMap<String, String>>) -> String {
        let mut labels = vec![format!("pool=\"{}\"", pool_name)];

        if let Some(tags) = tags {
            let mut tags: Vec<_> = tags.iter().collect();
            tags.sort();
            for (key, value) in tags {
                labels.push(format!("{}=\"{}\"", key, value));
            }
        }

        labels.join(",")
    }
}

/// Internal metrics tracker
#[derive(Default)]
pub(crate) struct MetricsTracker {
    pub total_retrieved: AtomicUsize,
    pub total_returned: AtomicUsize,
    pub total_created: AtomicUsize,
    pub factory_failures: AtomicUsize,
    pub reclaim_failures: AtomicUsize,
    pub timeouts: AtomicUsize,
    pub cancellations: AtomicUsize,
    pub active: AtomicUsize,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_checkout(&self) {
        self.total_retrieved.fetch_add(1, Ordering::Relaxed);
        self.active.fetch_add(1, Ordering::Relaxed);
    }

    /// The caller gave the object back, whatever happens to it next
    pub fn record_checkin(&self) {
        self.active.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn get_metrics(&self, size: usize, available: usize, max_size: usize) -> PoolMetrics {
        let active = self.active.load(Ordering::Relaxed);
        let utilization = if max_size > 0 {
            active as f64 / max_size as f64
        } else {
            0.0
        };

        PoolMetrics {
            total_retrieved: self.total_retrieved.load(Ordering::Relaxed),
            total_returned: self.total_returned.load(Ordering::Relaxed),
            total_created: self.total_created.load(Ordering::Relaxed),
            factory_failures: self.factory_failures.load(Ordering::Relaxed),
            reclaim_failures: self.reclaim_failures.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            cancellations: self.cancellations.load(Ordering::Relaxed),
            active_objects: active,
            available_objects: available,
            size,
            max_size,
            utilization,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_and_export() {
        let tracker = MetricsTracker::new();
        tracker.record_checkout();
        tracker.record_checkout();
        tracker.record_checkin();
        tracker.total_created.fetch_add(2, Ordering::Relaxed);

        let metrics = tracker.get_metrics(2, 1, 4);
        assert_eq!(metrics.total_retrieved, 2);
        assert_eq!(metrics.active_objects, 1);
        assert_eq!(metrics.utilization, 0.25);

        let exported = metrics.export();
        assert_eq!(exported["total_created"], "2");
        assert_eq!(exported["utilization"], "0.25");
    }

    #[test]
    fn test_prometheus_labels_are_sorted() {
        let metrics = MetricsTracker::new().get_metrics(0, 0, 1);
        let mut tags = HashMap::new();
        tags.insert("zone".to_string(), "b".to_string());
        tags.insert("app".to_string(), "a".to_string());

        let output = MetricsExporter::export_prometheus(&metrics, "db", Some(&tags));
        assert!(output.contains("objectpool_size{pool=\"db\",app=\"a\",zone=\"b\"} 0"));
        assert!(output.contains("# TYPE objectpool_wait_timeouts_total counter"));
    }
}
