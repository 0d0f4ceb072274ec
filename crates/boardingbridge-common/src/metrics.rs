//! Reconcile metrics
//!
//! Instruments are created lazily from the global meter, so they record into
//! whatever provider [`crate::telemetry::init_telemetry`] installed, or into a
//! no-op provider when OTLP export is off.

use once_cell::sync::Lazy;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::{global, KeyValue};

use crate::Error;

static METER: Lazy<Meter> = Lazy::new(|| global::meter("boardingbridge"));

/// Histogram of reconcile pass duration
///
/// Labels:
/// - `bridge_service`: namespace/name
/// - `result`: success, error
pub static RECONCILE_DURATION: Lazy<Histogram<f64>> = Lazy::new(|| {
    METER
        .f64_histogram("boardingbridge_reconcile_duration_seconds")
        .with_description("Duration of BridgeService reconcile passes in seconds")
        .with_unit("s")
        .build()
});

/// Counter of failed reconcile passes
///
/// Labels:
/// - `bridge_service`: namespace/name
/// - `reason`: the error's status condition reason
/// - `retryable`: true, false
pub static RECONCILE_ERRORS: Lazy<Counter<u64>> = Lazy::new(|| {
    METER
        .u64_counter("boardingbridge_reconcile_errors_total")
        .with_description("Total number of failed BridgeService reconcile passes")
        .with_unit("{errors}")
        .build()
});

/// Counter of writes to managed Services
///
/// Labels:
/// - `operation`: create, replace, publish, delete
pub static SERVICE_WRITES: Lazy<Counter<u64>> = Lazy::new(|| {
    METER
        .u64_counter("boardingbridge_managed_service_writes_total")
        .with_description("Total number of writes to managed Services")
        .with_unit("{writes}")
        .build()
});

/// A write the controller made to a managed Service
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServiceWrite {
    /// The Service was created
    Create,
    /// A drifted Service was overwritten
    Replace,
    /// The address was written into the Service's status
    Publish,
    /// The Service was deleted during teardown
    Delete,
}

impl ServiceWrite {
    /// Label value for this write
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Replace => "replace",
            Self::Publish => "publish",
            Self::Delete => "delete",
        }
    }
}

/// Count a write to a managed Service
pub fn record_service_write(write: ServiceWrite) {
    SERVICE_WRITES.add(1, &[KeyValue::new("operation", write.as_str())]);
}

/// Times one reconcile pass
pub struct ReconcileTimer {
    bridge_service: String,
    start: std::time::Instant,
}

impl ReconcileTimer {
    /// Start timing a pass for the BridgeService at `bridge_service`
    pub fn start(bridge_service: impl Into<String>) -> Self {
        Self {
            bridge_service: bridge_service.into(),
            start: std::time::Instant::now(),
        }
    }

    /// Record the outcome of the pass
    pub fn finish<T>(self, result: &Result<T, Error>) {
        let duration = self.start.elapsed().as_secs_f64();
        let outcome = if result.is_ok() { "success" } else { "error" };
        RECONCILE_DURATION.record(
            duration,
            &[
                KeyValue::new("bridge_service", self.bridge_service.clone()),
                KeyValue::new("result", outcome),
            ],
        );

        if let Err(e) = result {
            RECONCILE_ERRORS.add(
                1,
                &[
                    KeyValue::new("bridge_service", self.bridge_service),
                    KeyValue::new("reason", e.reason()),
                    KeyValue::new("retryable", e.is_retryable()),
                ],
            );
        }
    }
}
