use axum::extract::State;
use axum::http::Uri;
use axum::response::Html;
use serde::Serialize;
use tracing::{field, instrument, Span};

use super::render_page;
use crate::decoder::decode_snapshots;
use crate::provider::{ListingProvider, SnapshotFilter};
use crate::records::Snapshot;
use crate::request::{self, Params};
use crate::{AppState, Error};

/// Lists all snapshots matching the `host`, `tag` and `path` parameters.
#[instrument(skip(provider), fields(snapshots = field::Empty), err)]
pub async fn run_snapshots(
    provider: &dyn ListingProvider,
    params: &Params,
) -> Result<Vec<Snapshot>, Error> {
    let filter = SnapshotFilter {
        hosts: request::comma_separated(params, "host"),
        tags: request::comma_separated(params, "tag"),
        paths: request::absolute_path(params, "path")?
            .map(str::to_owned)
            .into_iter()
            .collect(),
    };

    let mut buf = Vec::new();
    provider.snapshots(&filter, &mut buf).await?;

    let snapshots = decode_snapshots(&buf)?;
    Span::current().record("snapshots", snapshots.len());
    Ok(snapshots)
}

#[derive(Serialize)]
struct SnapshotsPage<'a> {
    snapshots: &'a [Snapshot],
    repo: &'a str,
    params: &'a Params,
    curpath: &'a str,
}

#[instrument(skip_all, fields(uri = %uri))]
pub async fn get(
    State(AppState {
        provider,
        templates,
    }): State<AppState>,
    uri: Uri,
) -> Result<Html<String>, Error> {
    let params = request::params(uri.query());
    let snapshots = run_snapshots(provider.as_ref(), &params).await?;

    render_page(
        templates.as_ref(),
        "snapshots",
        &SnapshotsPage {
            snapshots: &snapshots,
            repo: provider.repository(),
            params: &params,
            curpath: "/snapshots",
        },
    )
}

#[cfg(test)]
mod tests {
    use super::run_snapshots;
    use crate::fixtures::SNAPSHOTS;
    use crate::provider::MemoryListingProvider;
    use crate::request::params;
    use crate::Error;

    #[tokio::test]
    async fn decodes() {
        let provider = MemoryListingProvider::new("memory").with_snapshots(SNAPSHOTS);
        let snapshots = run_snapshots(&provider, &params(None))
            .await
            .expect("must succeed");

        assert_eq!(2, snapshots.len());
        assert_eq!("01234567", snapshots[0].short_id);
        assert_eq!("myhost", snapshots[1].hostname);
    }

    #[tokio::test]
    async fn empty() {
        let provider = MemoryListingProvider::new("memory");
        assert!(run_snapshots(&provider, &params(None))
            .await
            .expect("must succeed")
            .is_empty());
    }

    #[tokio::test]
    async fn malformed() {
        let provider = MemoryListingProvider::new("memory").with_snapshots(&b"[{\"id\":"[..]);
        assert!(matches!(
            run_snapshots(&provider, &params(None)).await,
            Err(Error::Decode(_))
        ));
    }

    #[tokio::test]
    async fn relative_path() {
        let provider = MemoryListingProvider::new("memory");
        assert!(matches!(
            run_snapshots(&provider, &params(Some("path=home"))).await,
            Err(Error::Validation(_))
        ));
    }
}
