#[cfg(feature = "otlp")]
use opentelemetry::{global, propagation::Extractor};
#[cfg(feature = "otlp")]
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Joins the current span (usually the request span of the HTTP trace layer) to the trace
/// context carried in the request headers, if any and valid.
///
/// Without the otlp feature this returns the request unchanged.
pub fn accept_trace<B>(request: axum::http::Request<B>) -> axum::http::Request<B> {
    #[cfg(feature = "otlp")]
    {
        // Current context, if no or invalid data is received.
        let parent_context = global::get_text_map_propagator(|propagator| {
            propagator.extract(&HeaderExtractor(request.headers()))
        });
        tracing::Span::current().set_parent(parent_context);
    }
    request
}

/// Reads trace context from HTTP request headers.
#[cfg(feature = "otlp")]
struct HeaderExtractor<'a>(&'a axum::http::HeaderMap);

#[cfg(feature = "otlp")]
impl<'a> Extractor for HeaderExtractor<'a> {
    /// Non-ASCII values are skipped.
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| match v.to_str() {
            Ok(s) => Some(s),
            Err(error) => {
                tracing::warn!(%error, ?v, "cannot convert header value to ASCII");
                None
            }
        })
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|k| k.as_str()).collect()
    }
}
