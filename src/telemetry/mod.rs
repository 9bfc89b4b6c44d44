//! Tracing and OpenTelemetry initialization.
//!
//! Sets up tracing-subscriber with an fmt layer. If an OTLP endpoint is
//! configured, also exports traces and metrics there.

pub mod metrics;
pub mod work;

use crate::config::Config;
use crate::error::{Error, Result};
use opentelemetry_otlp::WithExportConfig as _;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;

/// Configuration for telemetry initialization.
pub struct TelemetryConfig {
    /// Optional OTLP endpoint (e.g. "http://localhost:4317").
    /// When `None`, only the local fmt layer is installed.
    pub endpoint: Option<String>,
    /// The service name reported in telemetry signals.
    pub service_name: String,
    /// Filter directive used when `RUST_LOG` is not set.
    pub default_filter: String,
}

impl From<&Config> for TelemetryConfig {
    fn from(config: &Config) -> Self {
        Self {
            endpoint: config.otel_endpoint.clone(),
            service_name: config.service_name.clone(),
            default_filter: config.log_level.clone(),
        }
    }
}

/// Guard that shuts down OTel providers on drop.
///
/// Must be held for the lifetime of the application.
pub struct TelemetryGuard {
    providers: Option<Providers>,
}

struct Providers {
    tracer: SdkTracerProvider,
    meter: SdkMeterProvider,
}

impl TelemetryGuard {
    /// Force-flush the trace and metric pipelines.
    pub fn force_flush(&self) {
        if let Some(ref providers) = self.providers {
            let _ = providers.tracer.force_flush();
            let _ = providers.meter.force_flush();
        }
    }

    /// True when OTLP exporters are installed.
    pub fn is_exporting(&self) -> bool {
        self.providers.is_some()
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(providers) = self.providers.take() {
            let _ = providers.meter.shutdown();
            let _ = providers.tracer.shutdown();
        }
    }
}

/// Initialize tracing, plus OTLP trace and metric export when an endpoint
/// is configured.
///
/// Queue events reach the collector as span events on `queue.work` spans, so
/// no separate log pipeline is installed.
///
/// # Errors
///
/// Returns an error if an OTLP exporter fails to build or the tracing
/// subscriber cannot be initialized (e.g. if one was already set).
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard> {
    use opentelemetry::trace::TracerProvider as _;
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::layer::SubscriberExt as _;
    use tracing_subscriber::util::SubscriberInitExt as _;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));
    let registry = tracing_subscriber::registry().with(env_filter);

    let Some(endpoint) = config.endpoint else {
        registry
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .map_err(subscriber_error)?;
        return Ok(TelemetryGuard { providers: None });
    };

    let resource = Resource::builder()
        .with_service_name(config.service_name)
        .build();
    let tracer = tracer_provider(&endpoint, resource.clone())?;
    let meter = meter_provider(&endpoint, resource)?;
    opentelemetry::global::set_meter_provider(meter.clone());

    registry
        .with(tracing_subscriber::fmt::layer().compact())
        .with(tracing_opentelemetry::layer().with_tracer(tracer.tracer("serialq")))
        .try_init()
        .map_err(subscriber_error)?;

    Ok(TelemetryGuard {
        providers: Some(Providers { tracer, meter }),
    })
}

fn tracer_provider(endpoint: &str, resource: Resource) -> Result<SdkTracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| Error::Other(format!("failed to create OTLP span exporter: {e}")))?;

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .build())
}

fn meter_provider(endpoint: &str, resource: Resource) -> Result<SdkMeterProvider> {
    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| Error::Other(format!("failed to create OTLP metric exporter: {e}")))?;

    Ok(SdkMeterProvider::builder()
        .with_periodic_exporter(exporter)
        .with_resource(resource)
        .build())
}

fn subscriber_error(e: tracing_subscriber::util::TryInitError) -> Error {
    Error::Other(format!("failed to init tracing subscriber: {e}"))
}
