use axum::extract::State;
use axum::http::Uri;
use axum::response::Html;
use serde::Serialize;
use tracing::{field, instrument, Span};

use super::render_page;
use crate::decoder::decode_listing;
use crate::provider::{ListingProvider, LsRequest};
use crate::records::SnapshotHeader;
use crate::render::{render_nodes, RenderContext, RequestUrl, DIR_PARAM};
use crate::request::{self, Params};
use crate::tree::Nodes;
use crate::{AppState, Error};

/// The navigation entry `ls` pages belong to.
const CURPATH: &str = "/snapshots";

/// The decoded listing of one snapshot, ready to be rendered.
#[derive(Debug)]
pub struct LsContext {
    pub ls_snapshot: SnapshotHeader,
    pub dir_tree: Nodes,
    /// Number of entries in the listing.
    pub entries: usize,
    pub params: Params,
    pub snapshot_id: String,
    pub curpath: &'static str,
    pub long: bool,
}

/// Lists a snapshot through `provider` and builds the tree of its entries.
///
/// Nothing is returned if any part of the listing fails to decode.
#[instrument(skip(provider), fields(snapshot.id = field::Empty, entries = field::Empty), err)]
pub async fn run_ls(provider: &dyn ListingProvider, params: Params) -> Result<LsContext, Error> {
    let snapshot_id = request::snapshot_id(&params)?.to_owned();

    let dir = request::absolute_path(&params, DIR_PARAM)?;
    let path = request::absolute_path(&params, "path")?;
    let long = request::bool_param(&params, "long");

    let ls_request = LsRequest {
        snapshot_id: snapshot_id.clone(),
        dirs: dir.map(str::to_owned).into_iter().collect(),
        hosts: request::comma_separated(&params, "host"),
        tags: request::comma_separated(&params, "tag"),
        paths: path.map(str::to_owned).into_iter().collect(),
        recursive: request::bool_param(&params, "recursive"),
        long,
    };

    let mut buf = Vec::new();
    provider.ls(&ls_request, &mut buf).await?;

    let (ls_snapshot, records) = decode_listing(&buf)?;
    Span::current().record("snapshot.id", ls_snapshot.id.as_str());

    let mut dir_tree = Nodes::new();
    let mut entries = 0;
    for record in records {
        dir_tree.add(record?);
        entries += 1;
    }
    Span::current().record("entries", entries);

    Ok(LsContext {
        ls_snapshot,
        dir_tree,
        entries,
        params,
        snapshot_id,
        curpath: CURPATH,
        long,
    })
}

#[derive(Serialize)]
struct LsPage<'a> {
    ls_snapshot: &'a SnapshotHeader,
    entries: usize,
    dir_tree: String,
    params: &'a Params,
    snapshot_id: &'a str,
    curpath: &'a str,
    repo: &'a str,
}

#[instrument(skip_all, fields(uri = %uri))]
pub async fn get(
    State(AppState {
        provider,
        templates,
    }): State<AppState>,
    uri: Uri,
) -> Result<Html<String>, Error> {
    let url = RequestUrl::parse(uri.path_and_query().map_or("/", |pq| pq.as_str()))
        .map_err(|e| Error::Validation(format!("invalid request uri: {}", e)))?;

    let ls = run_ls(provider.as_ref(), request::params(uri.query())).await?;

    let ctx = RenderContext::new(
        ls.params.clone(),
        ls.snapshot_id.clone(),
        ls.curpath.to_owned(),
        ls.long,
        url,
    );
    let dir_tree = render_nodes(templates.as_ref(), &ls.dir_tree, &ctx);

    render_page(
        templates.as_ref(),
        "ls",
        &LsPage {
            ls_snapshot: &ls.ls_snapshot,
            entries: ls.entries,
            dir_tree,
            params: &ls.params,
            snapshot_id: &ls.snapshot_id,
            curpath: ls.curpath,
            repo: provider.repository(),
        },
    )
}
