use tokio::sync::{mpsc, oneshot};
use tracing::Level;
use tracing_subscriber::{
    filter::FromEnvError, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

#[cfg(feature = "otlp")]
use opentelemetry::{
    trace::{TraceError, Tracer},
    KeyValue,
};
#[cfg(feature = "otlp")]
use opentelemetry_sdk::{
    propagation::TraceContextPropagator,
    resource::{ResourceDetector, SdkProvidedResourceDetector},
    trace::BatchConfigBuilder,
    Resource,
};

pub mod propagate;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Init(#[from] tracing_subscriber::util::TryInitError),

    #[error("invalid RUST_LOG: {0}")]
    Filter(#[from] FromEnvError),

    #[error(transparent)]
    MpscSend(#[from] mpsc::error::SendError<Option<oneshot::Sender<()>>>),

    #[error(transparent)]
    OneshotRecv(#[from] oneshot::error::RecvError),

    #[cfg(feature = "otlp")]
    #[error("unable to set up the OTLP exporter: {0}")]
    Otlp(#[from] opentelemetry::trace::TraceError),
}

/// How log lines are written to stderr.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human readable, one line per event.
    #[default]
    Compact,
    /// One JSON object per event.
    Json,
}

#[derive(Clone)]
pub struct TracingHandle {
    tx: Option<mpsc::Sender<Option<oneshot::Sender<()>>>>,
}

impl TracingHandle {
    /// Asks the span exporter to send out what it has buffered so far.
    ///
    /// Returns as soon as the request is queued. `done` is notified once the
    /// spans were sent, or right away when no exporter is configured.
    pub async fn flush(&self, done: Option<oneshot::Sender<()>>) -> Result<(), Error> {
        if let Some(tx) = &self.tx {
            Ok(tx.send(done).await?)
        } else {
            if let Some(tx) = done {
                let _ = tx.send(());
            }
            Ok(())
        }
    }

    /// Flushes pending spans and stops the exporter. Called once before the
    /// server exits.
    pub async fn shutdown(&self) -> Result<(), Error> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.flush(Some(tx)).await?;
        rx.await?;

        #[cfg(feature = "otlp")]
        {
            // shutdown_tracer_provider can block forever when called from the runtime, see
            // https://github.com/open-telemetry/opentelemetry-rust/issues/1395#issuecomment-1953280335
            let _ = tokio::task::spawn_blocking(move || {
                opentelemetry::global::shutdown_tracer_provider();
            })
            .await;
        }

        Ok(())
    }
}

pub struct TracingBuilder {
    level: Level,
    format: LogFormat,

    #[cfg(feature = "otlp")]
    service_name: Option<&'static str>,
}

impl Default for TracingBuilder {
    fn default() -> Self {
        TracingBuilder {
            level: Level::INFO,
            format: LogFormat::default(),

            #[cfg(feature = "otlp")]
            service_name: None,
        }
    }
}

impl TracingBuilder {
    /// Minimum level of recorded events. A `RUST_LOG` directive in the
    /// environment takes precedence.
    pub fn level(mut self, level: Level) -> TracingBuilder {
        self.level = level;
        self
    }

    pub fn format(mut self, format: LogFormat) -> TracingBuilder {
        self.format = format;
        self
    }

    /// Exports spans via OTLP, reported under `service_name`.
    #[cfg(feature = "otlp")]
    pub fn enable_otlp(mut self, service_name: &'static str) -> TracingBuilder {
        self.service_name = Some(service_name);
        self
    }

    /// Installs the global subscriber: log lines on stderr, filtered by the
    /// configured level, plus the OTLP exporter if one was enabled.
    pub fn build(self) -> Result<TracingHandle, Error> {
        let subscriber = tracing_subscriber::registry()
            .with(
                EnvFilter::builder()
                    .with_default_directive(self.level.into())
                    .from_env()?,
            )
            .with((self.format == LogFormat::Compact).then(|| {
                tracing_subscriber::fmt::Layer::new()
                    .with_writer(std::io::stderr)
                    .compact()
            }))
            .with((self.format == LogFormat::Json).then(|| {
                tracing_subscriber::fmt::Layer::new()
                    .with_writer(std::io::stderr)
                    .json()
            }));

        #[cfg(feature = "otlp")]
        {
            if let Some(service_name) = self.service_name {
                // register a text map propagator for trace propagation
                opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());

                let (tracer, tx) = gen_otlp_tracer(service_name.to_string())?;
                let layer = tracing_opentelemetry::layer().with_tracer(tracer);

                subscriber.with(Some(layer)).try_init()?;
                return Ok(TracingHandle { tx: Some(tx) });
            }
        }

        subscriber.try_init()?;
        Ok(TracingHandle { tx: None })
    }
}

/// Builds the batch exporting tracer. Flush requests sent into the returned
/// channel are served on a blocking thread.
#[cfg(feature = "otlp")]
fn gen_otlp_tracer(
    service_name: String,
) -> Result<
    (
        impl Tracer + tracing_opentelemetry::PreSampledTracer,
        mpsc::Sender<Option<oneshot::Sender<()>>>,
    ),
    Error,
> {
    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(opentelemetry_otlp::new_exporter().tonic())
        .with_batch_config(
            BatchConfigBuilder::default()
                // export on schedule only, a page listing a large snapshot easily
                // produces more than the default 512 spans.
                .with_max_export_batch_size(4096)
                .with_max_queue_size(4096 * 4)
                .with_scheduled_delay(std::time::Duration::from_secs(10))
                .build(),
        )
        .with_trace_config(opentelemetry_sdk::trace::config().with_resource({
            // SdkProvidedResourceDetector always sets `service.name`, replace its default.
            let resources = SdkProvidedResourceDetector.detect(std::time::Duration::from_secs(0));
            if resources.get("service.name".into()) == Some("unknown_service".into()) {
                resources.merge(&Resource::new([KeyValue::new(
                    "service.name",
                    service_name,
                )]))
            } else {
                resources
            }
        }))
        .install_batch(opentelemetry_sdk::runtime::Tokio)?;

    let tracer_provider = tracer
        .provider()
        .ok_or_else(|| TraceError::Other("batch tracer without provider".into()))?;

    // Flush requests are received here, and answered once the flush is done.
    let (tx, mut rx) = mpsc::channel::<Option<oneshot::Sender<()>>>(16);

    tokio::spawn(async move {
        while let Some(m) = rx.recv().await {
            // force_flush blocks, see
            // https://github.com/open-telemetry/opentelemetry-rust/issues/1395#issuecomment-1953280335
            let _ = tokio::task::spawn_blocking({
                let tracer_provider = tracer_provider.clone();
                move || tracer_provider.force_flush()
            })
            .await;
            if let Some(tx) = m {
                let _ = tx.send(());
            }
        }
    });

    Ok((tracer, tx))
}

#[cfg(test)]
mod tests {
    use super::TracingHandle;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn flush_without_exporter() {
        let handle = TracingHandle { tx: None };
        let (tx, rx) = oneshot::channel();
        handle.flush(Some(tx)).await.expect("must succeed");
        rx.await.expect("done must be notified right away");

        handle.shutdown().await.expect("must succeed");
    }
}
