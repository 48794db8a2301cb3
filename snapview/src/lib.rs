use std::sync::Arc;

use axum::extract::State;
use axum::response::Html;
use axum::{routing::get, Router};
use serde::Serialize;
use snapview_tracing::propagate::axum::accept_trace;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

pub mod decoder;
mod errors;
pub mod handlers;
pub mod provider;
pub mod records;
pub mod render;
pub mod request;
pub mod tree;

#[cfg(test)]
mod fixtures;

pub use errors::Error;

use provider::ListingProvider;
use render::TemplateEngine;

#[derive(Clone)]
pub struct AppState {
    provider: Arc<dyn ListingProvider>,
    templates: Arc<dyn TemplateEngine>,
}

impl AppState {
    pub fn new(provider: Arc<dyn ListingProvider>, templates: Arc<dyn TemplateEngine>) -> Self {
        Self {
            provider,
            templates,
        }
    }
}

pub fn gen_router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/ls", get(handlers::ls::get))
        .route("/snapshots", get(handlers::snapshots::get))
        .route("/dump", get(handlers::dump::get))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .map_request(accept_trace::<axum::body::Body>),
        )
}

#[derive(Serialize)]
struct IndexPage<'a> {
    repo: &'a str,
    curpath: &'a str,
}

async fn root(
    State(AppState {
        provider,
        templates,
    }): State<AppState>,
) -> Result<Html<String>, Error> {
    handlers::render_page(
        templates.as_ref(),
        "index",
        &IndexPage {
            repo: provider.repository(),
            curpath: "/",
        },
    )
}
