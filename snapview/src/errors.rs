use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use tracing::{debug, warn};

use crate::decoder::DecodeError;
use crate::provider::ProviderError;
use crate::render::{RenderError, TemplateEngine, BUILTIN, ERROR_TEMPLATE};

/// Errors a request can fail with.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Decode(_) | Error::Provider(_) | Error::Render(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for Error {
    /// Renders the error page, or a plain text message if even that fails.
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();
        if status.is_server_error() {
            warn!(err = %message, status = status.as_u16(), "request failed");
        } else {
            debug!(err = %message, status = status.as_u16(), "rejected request");
        }

        let mut context = tera::Context::new();
        context.insert("curpath", "");
        context.insert("status", &status.as_u16());
        context.insert("reason", status.canonical_reason().unwrap_or_default());
        context.insert("message", &message);

        match BUILTIN.render(ERROR_TEMPLATE, &context) {
            Ok(body) => (status, Html(body)).into_response(),
            Err(e) => {
                warn!(err = %e, "failed to render error page");
                (status, message).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Error;
    use crate::decoder::DecodeError;
    use crate::provider::ProviderError;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use rstest::rstest;

    #[rstest]
    #[case::validation(Error::Validation("no snapshot id".into()), StatusCode::BAD_REQUEST)]
    #[case::decode(Error::Decode(DecodeError::MissingHeader), StatusCode::INTERNAL_SERVER_ERROR)]
    #[case::provider(
        Error::Provider(ProviderError::UnknownSnapshot("abc".into())),
        StatusCode::INTERNAL_SERVER_ERROR
    )]
    fn status_codes(#[case] err: Error, #[case] expected: StatusCode) {
        assert_eq!(expected, err.status_code());
        assert_eq!(expected, err.into_response().status());
    }
}
