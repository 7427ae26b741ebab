//! The fault service facade.
//!
//! One API over classifier, recorder, monitor, and layer rules. All
//! collaborators are constructed explicitly and injected; there are no
//! module-level singletons.

use std::sync::Arc;

use crate::classify::{CaughtFault, Classifier, RawFault};
use crate::config::FaultlineConfig;
use crate::error::FaultlineError;
use crate::layers::LayerRuleEngine;
use crate::monitor::{AlertSink, FaultStats, Monitor};
use crate::record::{DirectFault, FaultContext, FaultRecord, FaultSink, FaultSource, Recorder};
use crate::taxonomy::AppFault;

/// Coordinates fault capture end to end.
pub struct FaultService {
    classifier: Classifier,
    recorder: Recorder,
    monitor: Monitor,
    layers: Arc<LayerRuleEngine>,
}

impl FaultService {
    /// Assemble the service from its collaborators.
    #[must_use]
    pub fn new(
        classifier: Classifier,
        recorder: Recorder,
        monitor: Monitor,
        layers: Arc<LayerRuleEngine>,
    ) -> Self {
        Self {
            classifier,
            recorder,
            monitor,
            layers,
        }
    }

    /// Wire up the service from configuration with the given sinks.
    #[must_use]
    pub fn from_config(
        config: &FaultlineConfig,
        sink: Arc<dyn FaultSink>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        let layers = Arc::new(LayerRuleEngine::new(&config.layers, config.environment));
        Self {
            classifier: Classifier::new(),
            recorder: Recorder::new(sink, layers.clone()),
            monitor: Monitor::new(&config.monitor, alerts),
            layers,
        }
    }

    /// Record a caught failure: layer-check typed faults, then record,
    /// update stats, and evaluate alerts - in that order, so alert
    /// evaluation always sees the just-recorded event.
    ///
    /// The layer check only fails in strict mode; in default mode a
    /// violation warns and the fault is recorded anyway. Raw faults carry
    /// no origin and are not checked.
    pub fn record_fault(
        &self,
        fault: &CaughtFault,
        context: &FaultContext,
        source: FaultSource,
    ) -> Result<FaultRecord, FaultlineError> {
        if let CaughtFault::Typed(typed) = fault {
            self.layers.check(typed.kind(), typed.origin())?;
        }
        let record = self.recorder.record(fault, context, source);
        self.monitor.update_stats(&record);
        self.monitor.check_alerts(&record);
        Ok(record)
    }

    /// Classify a caught failure into a typed fault.
    #[must_use]
    #[track_caller]
    pub fn classify(&self, fault: CaughtFault) -> AppFault {
        self.classifier.classify(fault)
    }

    /// Record a pre-formed report (no locally raised failure).
    ///
    /// When the report carries no kind, the type-name/message pair is run
    /// through the classifier first so the record gets a canonical kind and
    /// status; explicit overrides in the report still win.
    #[must_use]
    pub fn report(
        &self,
        mut direct: DirectFault,
        context: &FaultContext,
        source: FaultSource,
    ) -> FaultRecord {
        if direct.kind.is_none() {
            let raw = RawFault::new(direct.type_name.clone(), direct.message.clone());
            direct.kind = Some(self.classifier.classify_raw(&raw));
        }
        let record = self.recorder.record_direct(direct, context, source);
        self.monitor.update_stats(&record);
        self.monitor.check_alerts(&record);
        record
    }

    /// Aggregate stats over the trailing window.
    #[must_use]
    pub fn stats(&self, hours: u32) -> FaultStats {
        self.monitor.stats(hours)
    }

    /// Adjust alert thresholds at runtime.
    pub fn set_alert_thresholds(&self, critical: Option<u64>, error: Option<u64>) {
        self.monitor.set_thresholds(critical, error);
    }

    /// Current (critical, error) thresholds.
    #[must_use]
    pub fn alert_thresholds(&self) -> (u64, u64) {
        self.monitor.thresholds()
    }

    /// The layer rule engine, for checked fault admission.
    #[must_use]
    pub fn layers(&self) -> &LayerRuleEngine {
        &self.layers
    }
}
