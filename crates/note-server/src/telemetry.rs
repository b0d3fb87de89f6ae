//! Log formatting and trace export
//!
//! JSON log lines use the field names Cloud Logging picks up (`severity`,
//! `timestamp`, `logging.googleapis.com/trace`, ...). When `OTLP_ENDPOINT` is
//! set, spans are exported over OTLP/gRPC and each log line carries the trace
//! and span ids of the span it was emitted in.

use crate::config::{LogFormat, TelemetryConfig};
use anyhow::{Context, Result};
use opentelemetry::trace::{SpanId, TraceContextExt, TraceId};
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{runtime, trace as sdktrace, Resource};
use serde_json::{Map, Value};
use std::fmt;
use tonic::transport::ClientTlsConfig;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_opentelemetry::OtelData;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

const SERVICE_NAME: &str = "note_service";

const TRACE_KEY: &str = "logging.googleapis.com/trace";
const SPAN_ID_KEY: &str = "logging.googleapis.com/spanId";
const SAMPLED_KEY: &str = "logging.googleapis.com/trace_sampled";

/// Install the global subscriber, plus the OTLP pipeline when an endpoint is configured
pub fn init(config: &TelemetryConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .event_format(CloudJson)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer().boxed(),
    };

    let otel_layer = match &config.otlp_endpoint {
        Some(endpoint) => Some(tracing_opentelemetry::layer().with_tracer(otlp_tracer(endpoint)?)),
        None => None,
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(otel_layer)
        .with(filter)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

/// Flush pending spans. A no-op when export was never enabled.
pub fn shutdown() {
    opentelemetry::global::shutdown_tracer_provider();
}

fn otlp_tracer(endpoint: &str) -> Result<sdktrace::Tracer> {
    let mut exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(endpoint);
    if endpoint.starts_with("https://") {
        exporter = exporter.with_tls_config(ClientTlsConfig::new());
    }

    opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(exporter)
        .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
            KeyValue::new("service.name", SERVICE_NAME),
        ])))
        .install_batch(runtime::Tokio)
        .with_context(|| format!("Failed to set up OTLP export to {}", endpoint))
}

/// One JSON object per event, shaped for Cloud Logging
pub struct CloudJson;

impl<S, N> FormatEvent<S, N> for CloudJson
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();
        let mut line = Map::new();
        line.insert(
            "timestamp".to_string(),
            Value::from(chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()),
        );
        line.insert("severity".to_string(), Value::from(severity(meta.level())));
        line.insert("target".to_string(), Value::from(meta.target()));

        event.record(&mut JsonFields(&mut line));

        if let Some(span) = ctx.lookup_current() {
            line.insert("span".to_string(), Value::from(span.name()));

            let extensions = span.extensions();
            if let Some((trace_id, span_id, sampled)) = extensions.get::<OtelData>().and_then(trace_ids) {
                line.insert(TRACE_KEY.to_string(), Value::from(format!("{:032x}", trace_id)));
                line.insert(SPAN_ID_KEY.to_string(), Value::from(format!("{:016x}", span_id)));
                line.insert(SAMPLED_KEY.to_string(), Value::from(sampled));
            }
        }

        let json = serde_json::to_string(&line).map_err(|_| fmt::Error)?;
        writeln!(writer, "{}", json)
    }
}

fn severity(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => "ERROR",
        Level::WARN => "WARNING",
        Level::INFO => "INFO",
        Level::DEBUG | Level::TRACE => "DEBUG",
    }
}

fn trace_ids(otel: &OtelData) -> Option<(TraceId, SpanId, bool)> {
    let parent = otel.parent_cx.span();
    let parent = parent.span_context();

    let trace_id = match otel.builder.trace_id {
        Some(id) => id,
        None if parent.is_valid() => parent.trace_id(),
        None => return None,
    };
    let span_id = otel.builder.span_id?;
    // Root spans are always sampled under the default parent-based sampler
    let sampled = !parent.is_valid() || parent.is_sampled();

    Some((trace_id, span_id, sampled))
}

struct JsonFields<'a>(&'a mut Map<String, Value>);

impl Visit for JsonFields<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().to_string(), Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.0.insert(field.name().to_string(), Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.0.insert(field.name().to_string(), Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.0.insert(field.name().to_string(), Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.0.insert(field.name().to_string(), Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.0
            .insert(field.name().to_string(), Value::from(format!("{:?}", value)));
    }
}

/// In-memory log sink for asserting on formatted output
#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct CapturedLogs(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

#[cfg(test)]
impl CapturedLogs {
    /// Every captured line, parsed as JSON
    pub(crate) fn lines(&self) -> Vec<Value> {
        let raw = String::from_utf8(self.0.lock().unwrap().clone()).unwrap();
        raw.lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }
}

#[cfg(test)]
impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::trace::TracerProvider as _;

    #[test]
    fn test_severity_names() {
        assert_eq!(severity(&Level::ERROR), "ERROR");
        assert_eq!(severity(&Level::WARN), "WARNING");
        assert_eq!(severity(&Level::INFO), "INFO");
        assert_eq!(severity(&Level::TRACE), "DEBUG");
    }

    #[test]
    fn test_json_line_without_export() {
        let captured = CapturedLogs::default();
        let subscriber = tracing_subscriber::registry().with(
            tracing_subscriber::fmt::layer()
                .event_format(CloudJson)
                .with_writer(captured.clone()),
        );

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(note_id = "abc", "Created a new note");
        });

        let lines = captured.lines();
        assert_eq!(lines.len(), 1);
        let line = &lines[0];
        assert_eq!(line["severity"], "WARNING");
        assert_eq!(line["message"], "Created a new note");
        assert_eq!(line["note_id"], "abc");
        assert!(line["timestamp"].as_str().unwrap().ends_with('Z'));
        assert!(line.get(TRACE_KEY).is_none());
        assert!(line.get(SPAN_ID_KEY).is_none());
    }

    #[test]
    fn test_json_line_carries_trace_ids() {
        let captured = CapturedLogs::default();
        // Tracers only hold a weak handle; the provider must outlive the test body
        let provider = sdktrace::TracerProvider::builder().build();
        let tracer = provider.tracer("test");
        let subscriber = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .event_format(CloudJson)
                    .with_writer(captured.clone()),
            )
            .with(tracing_opentelemetry::layer().with_tracer(tracer));

        tracing::subscriber::with_default(subscriber, || {
            let list = tracing::info_span!("list", note.total_count = 3u64);
            let _list = list.enter();
            tracing::info!("listing");

            let get = tracing::info_span!("get", note.identifier = "abc");
            let _get = get.enter();
            tracing::error!("fetch failed");
        });

        let lines = captured.lines();
        assert_eq!(lines.len(), 2);

        let trace = lines[0][TRACE_KEY].as_str().unwrap().to_string();
        assert_eq!(trace.len(), 32);
        assert!(trace.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(lines[0][SPAN_ID_KEY].as_str().unwrap().len(), 16);
        assert_eq!(lines[0][SAMPLED_KEY], true);
        assert_eq!(lines[0]["span"], "list");

        // Child span shares the trace but has its own id
        assert_eq!(lines[1][TRACE_KEY], trace.as_str());
        assert_ne!(lines[1][SPAN_ID_KEY], lines[0][SPAN_ID_KEY]);
        assert_eq!(lines[1][SAMPLED_KEY], true);
        assert_eq!(lines[1]["severity"], "ERROR");
        assert_eq!(lines[1]["span"], "get");
    }
}
