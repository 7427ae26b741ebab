//! In-memory fault monitoring.
//!
//! Hour-bucketed counters feed threshold alerting and the stats API.
//! Buckets are keyed `YYYY-MM-DD-HH` (UTC) and swept past the configured
//! retention on every update, so the map stays bounded for the process
//! lifetime. Counters are per-process: in a multi-worker deployment each
//! worker evaluates thresholds independently, which callers wanting global
//! alerting must replace with a shared counter store.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::error;

use crate::config::MonitorConfig;
use crate::record::{FaultRecord, Severity};

/// Number of entries in the top-errors ranking.
pub const TOP_ERRORS_LIMIT: usize = 10;

/// Format a UTC timestamp as an hour-bucket key.
#[must_use]
pub fn hour_key(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d-%H").to_string()
}

/// Counters for one hour bucket.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HourCounts {
    /// All faults recorded in this hour.
    pub total: u64,
    /// Error-severity faults.
    pub error: u64,
    /// Critical-severity faults.
    pub critical: u64,
}

#[derive(Debug, Default)]
struct Bucket {
    counts: HourCounts,
    by_kind: HashMap<String, u64>,
}

/// Aggregated statistics over a trailing window of hours.
#[derive(Debug, Clone, Serialize)]
pub struct FaultStats {
    /// All faults in the window.
    pub total_count: u64,
    /// Error-severity faults in the window.
    pub error_count: u64,
    /// Critical-severity faults in the window.
    pub critical_count: u64,
    /// Per-error-type counts in the window.
    pub by_type: HashMap<String, u64>,
    /// Per-hour counts, zero-filled: exactly as many entries as requested.
    pub by_hour: BTreeMap<String, HourCounts>,
    /// Top error types by count, at most [`TOP_ERRORS_LIMIT`].
    pub top_errors: Vec<TopError>,
}

/// One entry in the top-errors ranking.
#[derive(Debug, Clone, Serialize)]
pub struct TopError {
    /// Error type name.
    pub error_type: String,
    /// Occurrences in the window.
    pub count: u64,
}

/// A threshold crossing handed to the alert sink.
#[derive(Debug, Clone, Serialize)]
pub struct ThresholdAlert {
    /// Which counter crossed: critical or error.
    pub severity: Severity,
    /// The bucket's count at evaluation time.
    pub count: u64,
    /// The configured threshold.
    pub threshold: u64,
    /// The hour bucket key.
    pub hour: String,
    /// Error type of the record that triggered evaluation.
    pub error_type: String,
    /// Message of the record that triggered evaluation.
    pub message: String,
}

/// Delivery channel for threshold alerts.
pub trait AlertSink: Send + Sync {
    /// Fire one alert. Fire-and-forget; implementations must not block.
    fn fire(&self, alert: &ThresholdAlert);
}

/// Default alert sink: one critical log line per alert.
///
/// TODO: add a paging/email `AlertSink` implementation and select it from
/// configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAlertSink;

impl LogAlertSink {
    /// Create a log alert sink.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl AlertSink for LogAlertSink {
    fn fire(&self, alert: &ThresholdAlert) {
        error!(
            target: "faultline::alerts",
            alert_type = "exception_threshold",
            severity = alert.severity.as_str(),
            count = alert.count,
            threshold = alert.threshold,
            hour = %alert.hour,
            error_type = %alert.error_type,
            message = %alert.message,
            "fault threshold exceeded"
        );
    }
}

/// In-memory alert capture for tests.
#[derive(Debug, Default)]
pub struct MemoryAlerts {
    alerts: parking_lot::Mutex<Vec<ThresholdAlert>>,
}

impl MemoryAlerts {
    /// Create an empty capture.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Alerts fired so far.
    #[must_use]
    pub fn fired(&self) -> Vec<ThresholdAlert> {
        self.alerts.lock().clone()
    }

    /// Number of alerts fired.
    #[must_use]
    pub fn len(&self) -> usize {
        self.alerts.lock().len()
    }

    /// Whether no alert has fired.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AlertSink for MemoryAlerts {
    fn fire(&self, alert: &ThresholdAlert) {
        self.alerts.lock().push(alert.clone());
    }
}

struct MonitorState {
    buckets: HashMap<String, Bucket>,
    critical_threshold: u64,
    error_threshold: u64,
}

/// Hour-bucketed fault counters with threshold alerting.
pub struct Monitor {
    state: RwLock<MonitorState>,
    retention_hours: u32,
    alerts: Arc<dyn AlertSink>,
}

impl Monitor {
    /// Create a monitor from configuration.
    #[must_use]
    pub fn new(config: &MonitorConfig, alerts: Arc<dyn AlertSink>) -> Self {
        Self {
            state: RwLock::new(MonitorState {
                buckets: HashMap::new(),
                critical_threshold: config.critical_threshold,
                error_threshold: config.error_threshold,
            }),
            retention_hours: config.retention_hours.max(1),
            alerts,
        }
    }

    /// Count a recorded fault in its hour bucket.
    ///
    /// Total always increments; critical severity feeds the critical
    /// counter, everything else the error counter, keeping
    /// `total == error + critical` for the capture pipeline's records.
    pub fn update_stats(&self, record: &FaultRecord) {
        let key = hour_key(record.created_at);
        let mut state = self.state.write();
        sweep(&mut state.buckets, self.retention_hours);
        let bucket = state.buckets.entry(key).or_default();
        bucket.counts.total += 1;
        if record.severity == Severity::Critical {
            bucket.counts.critical += 1;
        } else {
            bucket.counts.error += 1;
        }
        *bucket
            .by_kind
            .entry(record.error_type.clone())
            .or_insert(0) += 1;
    }

    /// Evaluate thresholds for the record's hour bucket.
    ///
    /// Fires at most one alert per call; the critical threshold takes
    /// precedence when both are crossed.
    pub fn check_alerts(&self, record: &FaultRecord) {
        let key = hour_key(record.created_at);
        let alert = {
            let state = self.state.read();
            let Some(bucket) = state.buckets.get(&key) else {
                return;
            };
            if bucket.counts.critical >= state.critical_threshold {
                Some(ThresholdAlert {
                    severity: Severity::Critical,
                    count: bucket.counts.critical,
                    threshold: state.critical_threshold,
                    hour: key,
                    error_type: record.error_type.clone(),
                    message: record.message.clone(),
                })
            } else if bucket.counts.error >= state.error_threshold {
                Some(ThresholdAlert {
                    severity: Severity::Error,
                    count: bucket.counts.error,
                    threshold: state.error_threshold,
                    hour: key,
                    error_type: record.error_type.clone(),
                    message: record.message.clone(),
                })
            } else {
                None
            }
        };
        if let Some(alert) = alert {
            self.alerts.fire(&alert);
        }
    }

    /// Aggregate statistics over the trailing `hours` window.
    ///
    /// `by_hour` always contains exactly `hours` entries, zero-filled for
    /// untouched hours. Read-only; safe to call concurrently with updates.
    #[must_use]
    pub fn stats(&self, hours: u32) -> FaultStats {
        let hours = hours.max(1);
        let now = Utc::now();
        let state = self.state.read();

        let mut by_hour = BTreeMap::new();
        let mut by_type: HashMap<String, u64> = HashMap::new();
        let mut total = 0u64;
        let mut errors = 0u64;
        let mut criticals = 0u64;

        for offset in 0..hours {
            let key = hour_key(now - Duration::hours(i64::from(offset)));
            let counts = state.buckets.get(&key).map_or_else(HourCounts::default, |b| {
                for (kind, count) in &b.by_kind {
                    *by_type.entry(kind.clone()).or_insert(0) += count;
                }
                b.counts.clone()
            });
            total += counts.total;
            errors += counts.error;
            criticals += counts.critical;
            by_hour.insert(key, counts);
        }

        let mut top: Vec<TopError> = by_type
            .iter()
            .map(|(error_type, count)| TopError {
                error_type: error_type.clone(),
                count: *count,
            })
            .collect();
        top.sort_by(|a, b| b.count.cmp(&a.count).then(a.error_type.cmp(&b.error_type)));
        top.truncate(TOP_ERRORS_LIMIT);

        FaultStats {
            total_count: total,
            error_count: errors,
            critical_count: criticals,
            by_type,
            by_hour,
            top_errors: top,
        }
    }

    /// Adjust thresholds at runtime. An omitted argument leaves the
    /// existing threshold unchanged.
    pub fn set_thresholds(&self, critical: Option<u64>, error: Option<u64>) {
        let mut state = self.state.write();
        if let Some(critical) = critical {
            state.critical_threshold = critical;
        }
        if let Some(error) = error {
            state.error_threshold = error;
        }
    }

    /// Current (critical, error) thresholds.
    #[must_use]
    pub fn thresholds(&self) -> (u64, u64) {
        let state = self.state.read();
        (state.critical_threshold, state.error_threshold)
    }
}

/// Drop buckets older than the retention window.
///
/// Bucket keys sort lexicographically in time order, so a single cutoff
/// key comparison suffices.
fn sweep(buckets: &mut HashMap<String, Bucket>, retention_hours: u32) {
    let cutoff = hour_key(Utc::now() - Duration::hours(i64::from(retention_hours)));
    buckets.retain(|key, _| *key >= cutoff);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FaultSource;
    use serde_json::Map;

    fn record(severity: Severity, error_type: &str, at: DateTime<Utc>) -> FaultRecord {
        FaultRecord {
            id: "r".to_owned(),
            source: FaultSource::Backend,
            severity,
            layer: "api".to_owned(),
            message: "m".to_owned(),
            error_type: error_type.to_owned(),
            file_path: None,
            line_number: None,
            function_name: None,
            trace_id: None,
            request_id: None,
            user_id: None,
            stack_trace: "t".to_owned(),
            context: Map::new(),
            http_status: 500,
            resolved: false,
            resolution_notes: None,
            created_at: at,
        }
    }

    fn monitor(critical: u64, error: u64) -> (Monitor, Arc<MemoryAlerts>) {
        let alerts = Arc::new(MemoryAlerts::new());
        let config = MonitorConfig {
            critical_threshold: critical,
            error_threshold: error,
            retention_hours: 168,
        };
        (Monitor::new(&config, alerts.clone()), alerts)
    }

    #[test]
    fn counts_split_by_severity() {
        let (monitor, _alerts) = monitor(10, 100);
        let now = Utc::now();
        monitor.update_stats(&record(Severity::Error, "ValidationError", now));
        monitor.update_stats(&record(Severity::Error, "ValidationError", now));
        monitor.update_stats(&record(Severity::Critical, "DatabaseError", now));

        let stats = monitor.stats(1);
        assert_eq!(stats.total_count, 3);
        assert_eq!(stats.error_count, 2);
        assert_eq!(stats.critical_count, 1);
        assert_eq!(stats.total_count, stats.error_count + stats.critical_count);
        assert_eq!(stats.by_type["ValidationError"], 2);
        assert_eq!(stats.by_type["DatabaseError"], 1);
    }

    #[test]
    fn stats_window_is_zero_filled() {
        let (monitor, _alerts) = monitor(10, 100);
        monitor.update_stats(&record(Severity::Error, "ValidationError", Utc::now()));

        let stats = monitor.stats(24);
        assert_eq!(stats.by_hour.len(), 24);
        let touched: u64 = stats.by_hour.values().map(|c| c.total).sum();
        assert_eq!(touched, 1);
    }

    #[test]
    fn critical_alert_fires_on_threshold_not_before() {
        let (monitor, alerts) = monitor(10, 100);
        let now = Utc::now();
        for _ in 0..9 {
            let r = record(Severity::Critical, "DatabaseError", now);
            monitor.update_stats(&r);
            monitor.check_alerts(&r);
        }
        assert!(alerts.is_empty());

        let tenth = record(Severity::Critical, "DatabaseError", now);
        monitor.update_stats(&tenth);
        monitor.check_alerts(&tenth);
        assert_eq!(alerts.len(), 1);
        let alert = &alerts.fired()[0];
        assert_eq!(alert.count, 10);
        assert_eq!(alert.threshold, 10);
        assert_eq!(alert.severity, Severity::Critical);
    }

    #[test]
    fn error_alert_uses_error_threshold() {
        let (monitor, alerts) = monitor(10, 3);
        let now = Utc::now();
        for _ in 0..3 {
            let r = record(Severity::Error, "ValidationError", now);
            monitor.update_stats(&r);
            monitor.check_alerts(&r);
        }
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts.fired()[0].severity, Severity::Error);
    }

    #[test]
    fn critical_takes_precedence_over_error() {
        let (monitor, alerts) = monitor(1, 1);
        let now = Utc::now();
        let error = record(Severity::Error, "ValidationError", now);
        monitor.update_stats(&error);
        let critical = record(Severity::Critical, "DatabaseError", now);
        monitor.update_stats(&critical);
        monitor.check_alerts(&critical);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts.fired()[0].severity, Severity::Critical);
    }

    #[test]
    fn thresholds_adjust_independently() {
        let (monitor, _alerts) = monitor(10, 100);
        monitor.set_thresholds(Some(5), None);
        assert_eq!(monitor.thresholds(), (5, 100));
        monitor.set_thresholds(None, Some(50));
        assert_eq!(monitor.thresholds(), (5, 50));
    }

    #[test]
    fn old_buckets_are_swept() {
        let alerts = Arc::new(MemoryAlerts::new());
        let config = MonitorConfig {
            critical_threshold: 10,
            error_threshold: 100,
            retention_hours: 2,
        };
        let monitor = Monitor::new(&config, alerts);
        let old = Utc::now() - Duration::hours(5);
        monitor.update_stats(&record(Severity::Error, "ValidationError", old));
        // A fresh update triggers the sweep.
        monitor.update_stats(&record(Severity::Error, "ValidationError", Utc::now()));

        let state = monitor.state.read();
        assert_eq!(state.buckets.len(), 1);
    }

    #[test]
    fn top_errors_ranked_and_capped() {
        let (monitor, _alerts) = monitor(1000, 1000);
        let now = Utc::now();
        for i in 0..12 {
            let name = format!("Kind{i}");
            for _ in 0..=i {
                monitor.update_stats(&record(Severity::Error, &name, now));
            }
        }
        let stats = monitor.stats(1);
        assert_eq!(stats.top_errors.len(), TOP_ERRORS_LIMIT);
        assert_eq!(stats.top_errors[0].error_type, "Kind11");
        assert_eq!(stats.top_errors[0].count, 12);
        assert!(stats.top_errors[0].count >= stats.top_errors[9].count);
    }

    #[test]
    fn missing_bucket_means_no_alert() {
        let (monitor, alerts) = monitor(0, 0);
        // Thresholds of zero would always fire, but the bucket does not
        // exist until update_stats runs.
        monitor.check_alerts(&record(Severity::Critical, "DatabaseError", Utc::now()));
        assert!(alerts.is_empty());
    }
}
