use axum::response::Html;
use serde::Serialize;

use crate::render::{RenderError, TemplateEngine};
use crate::Error;

pub mod dump;
pub mod ls;
pub mod snapshots;

/// Renders the page template `name` from `data`.
pub(crate) fn render_page<T: Serialize>(
    templates: &dyn TemplateEngine,
    name: &str,
    data: &T,
) -> Result<Html<String>, Error> {
    let context = tera::Context::from_serialize(data).map_err(RenderError::Context)?;
    Ok(Html(templates.render(name, &context)?))
}
