//! # Telemetry
//!
//! Console logging is always on: a `tracing_subscriber` registry with an
//! `EnvFilter` (default `info`, override with `RUST_LOG`) and a `fmt` layer.
//!
//! ## Feature matrix
//!
//! - `metrics`: OpenTelemetry counters and histograms for every RPC issued.
//! - `stdout`: exports those metrics to stdout every 5 seconds.
//!
//! Without `metrics` every `record_*` helper compiles to a no-op, so call
//! sites never need their own `cfg` guards.
//!
//! ## Metrics
//!
//! - `calls` - unary calls and stream opens, by `rpc` and `outcome`
//!   (`ok` / `error`).
//! - `call_errors` - failed RPCs, by `rpc`, `phase` and `class`.
//! - `stream_replies` - messages received on streaming RPCs, by `rpc`.
//! - `call_duration` - milliseconds until a unary reply or until a stream is
//!   open, by `rpc`.

#[cfg(all(feature = "stdout", not(feature = "metrics")))]
compile_error!("The 'stdout' feature requires the 'metrics' feature to be enabled.");

use lumber_core::{Error, Rpc};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "metrics")]
use opentelemetry::{
    InstrumentationScope, KeyValue,
    metrics::{Counter, Histogram, Meter},
};
#[cfg(feature = "metrics")]
use opentelemetry_sdk::{Resource, metrics as sdkmetrics};
#[cfg(feature = "metrics")]
use opentelemetry_semantic_conventions as semvcns;
#[cfg(feature = "metrics")]
use std::sync::OnceLock;

pub struct TelemetryProviders {
    #[cfg(feature = "metrics")]
    pub meter_provider: sdkmetrics::SdkMeterProvider,
}

pub fn init_telemetry() -> anyhow::Result<TelemetryProviders> {
    #[cfg(feature = "metrics")]
    let meter_provider = init_metrics();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_thread_ids(true)
                .with_line_number(true)
                .with_target(false)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339()),
        )
        .try_init()?;

    #[cfg(feature = "metrics")]
    {
        opentelemetry::global::set_meter_provider(meter_provider.clone());
        let scope = InstrumentationScope::builder("lumber")
            .with_version(env!("CARGO_PKG_VERSION"))
            .with_schema_url(semvcns::SCHEMA_URL)
            .build();
        init_metric_handles(opentelemetry::global::meter_with_scope(scope));
    }

    Ok(TelemetryProviders {
        #[cfg(feature = "metrics")]
        meter_provider,
    })
}

/// Flushes and shuts down exporters. Must run before any hard process exit.
pub fn shutdown_telemetry(_providers: TelemetryProviders) {
    #[cfg(feature = "metrics")]
    {
        if let Err(err) = _providers.meter_provider.force_flush() {
            eprintln!("Error flushing metrics: {err:#?}");
        }
        if let Err(err) = _providers.meter_provider.shutdown() {
            eprintln!("Error shutting down meter: {err:#?}");
        }
    }
}

#[cfg(feature = "metrics")]
fn resource() -> Resource {
    Resource::builder()
        .with_service_name("lmc")
        .with_schema_url(
            [KeyValue::new(
                semvcns::resource::SERVICE_VERSION,
                env!("CARGO_PKG_VERSION"),
            )],
            semvcns::SCHEMA_URL,
        )
        .build()
}

#[cfg(feature = "metrics")]
fn init_metrics() -> sdkmetrics::SdkMeterProvider {
    let builder = sdkmetrics::SdkMeterProvider::builder().with_resource(resource());

    #[cfg(feature = "stdout")]
    let builder = {
        let exporter = opentelemetry_stdout::MetricExporter::default();
        let reader = sdkmetrics::PeriodicReader::builder(exporter)
            .with_interval(std::time::Duration::from_secs(5))
            .build();
        builder.with_reader(reader)
    };

    builder.build()
}

#[cfg(feature = "metrics")]
static CALLS: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static CALL_ERRORS: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static STREAM_REPLIES: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static CALL_DURATION_MS: OnceLock<Histogram<f64>> = OnceLock::new();

#[cfg(feature = "metrics")]
fn init_metric_handles(meter: Meter) {
    let _ = CALLS.set(
        meter
            .u64_counter("calls")
            .with_description("Unary calls and stream opens issued against the log store")
            .build(),
    );

    let _ = CALL_ERRORS.set(
        meter
            .u64_counter("call_errors")
            .with_description("Failed RPCs, by classification")
            .build(),
    );

    let _ = STREAM_REPLIES.set(
        meter
            .u64_counter("stream_replies")
            .with_description("Messages received on streaming RPCs")
            .build(),
    );

    let _ = CALL_DURATION_MS.set(
        meter
            .f64_histogram("call_duration")
            .with_unit("ms")
            .with_description("Unary call latency and stream open latency")
            .build(),
    );
}

#[cfg(feature = "metrics")]
pub fn record_call(rpc: Rpc, ok: bool, duration_ms: f64) {
    let rpc_attr = KeyValue::new("rpc", rpc.as_str());
    if let Some(counter) = CALLS.get() {
        counter.add(
            1,
            &[
                rpc_attr.clone(),
                KeyValue::new("outcome", if ok { "ok" } else { "error" }),
            ],
        );
    }
    if let Some(histogram) = CALL_DURATION_MS.get() {
        histogram.record(duration_ms, &[rpc_attr]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn record_call(_rpc: Rpc, _ok: bool, _duration_ms: f64) {}

#[cfg(feature = "metrics")]
pub fn record_call_error(err: &Error) {
    let (Some(rpc), Some(phase)) = (err.rpc(), err.phase()) else {
        return;
    };
    if let Some(counter) = CALL_ERRORS.get() {
        counter.add(
            1,
            &[
                KeyValue::new("rpc", rpc.as_str()),
                KeyValue::new("phase", phase.as_str()),
                KeyValue::new(
                    "class",
                    if err.is_service_reported() {
                        "service"
                    } else {
                        "transport"
                    },
                ),
            ],
        );
    }
}

#[cfg(not(feature = "metrics"))]
pub fn record_call_error(_err: &Error) {}

#[cfg(feature = "metrics")]
pub fn increment_stream_replies(rpc: Rpc) {
    if let Some(counter) = STREAM_REPLIES.get() {
        counter.add(1, &[KeyValue::new("rpc", rpc.as_str())]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_stream_replies(_rpc: Rpc) {}
