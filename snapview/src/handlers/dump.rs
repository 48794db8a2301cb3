use axum::body::Body;
use axum::extract::State;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderValue, Uri};
use axum::response::{IntoResponse, Response};
use tokio_util::io::ReaderStream;
use tracing::{instrument, warn};

use crate::request;
use crate::{AppState, Error};

/// Streams a single file out of a snapshot.
#[instrument(skip_all, fields(uri = %uri))]
pub async fn get(
    State(AppState { provider, .. }): State<AppState>,
    uri: Uri,
) -> Result<Response, Error> {
    let params = request::params(uri.query());
    let snapshot_id = request::snapshot_id(&params)?;
    let path = request::absolute_path(&params, "path")?
        .ok_or_else(|| Error::Validation("no path given".into()))?;

    let reader = provider.dump(snapshot_id, path).await?;

    Ok((
        [
            (
                CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            ),
            (CONTENT_DISPOSITION, content_disposition(path)),
        ],
        Body::from_stream(ReaderStream::new(reader)),
    )
        .into_response())
}

/// Offers the file as download, named after the last path segment.
fn content_disposition(path: &str) -> HeaderValue {
    let filename = path
        .rsplit('/')
        .find(|s| !s.is_empty())
        .unwrap_or_default()
        .replace(['"', '\\'], "_");

    HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename)).unwrap_or_else(|e| {
        warn!(err = %e, "unable to use filename in content-disposition");
        HeaderValue::from_static("attachment")
    })
}
