//! Logging, tracing and metrics export
//!
//! Logs always go to stdout as JSON. When an OTLP endpoint is configured,
//! spans and the instruments in [`crate::metrics`] are exported too, and the
//! returned [`TelemetryGuard`] flushes both on shutdown.

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::TracerProvider;
use opentelemetry_sdk::{runtime, Resource};
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "info,boardingbridge=debug,kube=info,tower=warn,hyper=warn";

/// Service name reported when `OTEL_SERVICE_NAME` is unset
pub const DEFAULT_SERVICE_NAME: &str = "boardingbridge";

/// Errors that can occur during telemetry initialization
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// An OTLP exporter could not be built
    #[error("failed to build OTLP {signal} exporter for {endpoint}: {message}")]
    Exporter {
        /// Which signal the exporter carries (traces, metrics)
        signal: &'static str,
        /// The configured collector endpoint
        endpoint: String,
        /// Description of what failed
        message: String,
    },

    /// A global log subscriber was already installed
    #[error("failed to install log subscriber: {0}")]
    Subscriber(String),
}

/// Where telemetry goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Service name attached to spans and metrics
    pub service_name: String,

    /// OTLP collector endpoint (e.g. "http://otel-collector:4317").
    /// If None, nothing is exported and logs stay local.
    pub otlp_endpoint: Option<String>,
}

impl TelemetryConfig {
    /// Read `OTEL_SERVICE_NAME` and `OTEL_EXPORTER_OTLP_ENDPOINT`
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let set = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Self {
            service_name: set("OTEL_SERVICE_NAME").unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string()),
            otlp_endpoint: set("OTEL_EXPORTER_OTLP_ENDPOINT"),
        }
    }
}

/// Keeps the OTLP pipelines alive; call [`TelemetryGuard::shutdown`] before exit
#[derive(Default)]
pub struct TelemetryGuard {
    exporters: Option<OtlpProviders>,
}

impl TelemetryGuard {
    /// Returns true if spans and metrics are being exported
    pub fn is_exporting(&self) -> bool {
        self.exporters.is_some()
    }

    /// Flush pending spans and metrics and stop the exporters
    pub fn shutdown(self) {
        let Some(exporters) = self.exporters else {
            return;
        };
        if let Err(e) = exporters.meter.shutdown() {
            tracing::warn!(error = %e, "failed to flush metrics");
        }
        if let Err(e) = exporters.tracer.shutdown() {
            tracing::warn!(error = %e, "failed to flush traces");
        }
    }
}

struct OtlpProviders {
    tracer: TracerProvider,
    meter: SdkMeterProvider,
}

impl OtlpProviders {
    /// Build both exporters and make them the global providers
    fn install(endpoint: &str, resource: Resource) -> Result<Self, TelemetryError> {
        let exporter_error = |signal: &'static str, message: String| TelemetryError::Exporter {
            signal,
            endpoint: endpoint.to_string(),
            message,
        };

        let spans = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .build()
            .map_err(|e| exporter_error("traces", e.to_string()))?;
        let metrics = opentelemetry_otlp::MetricExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .build()
            .map_err(|e| exporter_error("metrics", e.to_string()))?;

        let tracer = TracerProvider::builder()
            .with_batch_exporter(spans, runtime::Tokio)
            .with_resource(resource.clone())
            .build();
        let meter = SdkMeterProvider::builder()
            .with_reader(PeriodicReader::builder(metrics, runtime::Tokio).build())
            .with_resource(resource)
            .build();

        global::set_tracer_provider(tracer.clone());
        global::set_meter_provider(meter.clone());
        Ok(Self { tracer, meter })
    }
}

/// Install the global log subscriber and, if configured, the OTLP exporters
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    global::set_text_map_propagator(TraceContextPropagator::new());

    let exporters = config
        .otlp_endpoint
        .as_deref()
        .map(|endpoint| OtlpProviders::install(endpoint, resource(&config.service_name)))
        .transpose()?;

    let span_layer = exporters.as_ref().map(|p| {
        tracing_opentelemetry::layer().with_tracer(p.tracer.tracer(config.service_name.clone()))
    });

    let log_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(false)
        .with_target(true)
        .with_file(false)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(log_filter())
        .with(log_layer)
        .with(span_layer)
        .try_init()
        .map_err(|e| TelemetryError::Subscriber(e.to_string()))?;

    Ok(TelemetryGuard { exporters })
}

fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Service identity plus the pod's downward-API metadata
fn resource(service_name: &str) -> Resource {
    let mut attributes = vec![
        KeyValue::new(
            opentelemetry_semantic_conventions::resource::SERVICE_NAME,
            service_name.to_string(),
        ),
        KeyValue::new(
            opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
            env!("CARGO_PKG_VERSION"),
        ),
    ];
    for (var, key) in [
        ("POD_NAME", "k8s.pod.name"),
        ("POD_NAMESPACE", "k8s.namespace.name"),
    ] {
        if let Ok(value) = std::env::var(var) {
            attributes.push(KeyValue::new(key, value));
        }
    }
    Resource::new(attributes)
}
