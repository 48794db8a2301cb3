//! Turns render contexts into markup.
use std::collections::HashMap;
use std::error::Error as StdError;
use std::path::{Path, PathBuf};

use data_encoding::BASE64;
use lazy_static::lazy_static;
use tera::{Tera, Value};
use tracing::{debug, warn};

mod context;
mod tree;

pub use context::{RenderContext, RequestUrl, DIR_PARAM};
pub use tree::{render_node, render_nodes, DIRTREE_TEMPLATE};

pub const ERROR_TEMPLATE: &str = "error";

/// Templates compiled into the binary, keyed by their name.
const BUILTIN_TEMPLATES: &[(&str, &str)] = &[
    ("css", include_str!("../../templates/css.html")),
    ("base", include_str!("../../templates/base.html")),
    ("index", include_str!("../../templates/index.html")),
    ("snapshots", include_str!("../../templates/snapshots.html")),
    ("ls", include_str!("../../templates/ls.html")),
    ("dirtree", include_str!("../../templates/dirtree.html")),
    ("error", include_str!("../../templates/error.html")),
];

lazy_static! {
    /// The builtin templates, used for error pages.
    pub static ref BUILTIN: Templates = Templates::builtin().expect("invalid builtin templates");
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("unknown template '{0}'")]
    UnknownTemplate(String),

    #[error("failed to render template '{name}': {}", error_chain(.source))]
    Template {
        name: String,
        #[source]
        source: tera::Error,
    },

    #[error("failed to build template context: {}", error_chain(.0))]
    Context(#[source] tera::Error),

    #[error("failed to load templates from {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The template engine contract: render the template called `name` with
/// the given data.
pub trait TemplateEngine: Send + Sync {
    fn render(&self, name: &str, context: &tera::Context) -> Result<String, RenderError>;
}

/// [TemplateEngine] backed by tera.
///
/// All templates are autoescaped, regardless of their name.
pub struct Templates {
    tera: Tera,
}

impl Templates {
    pub fn builtin() -> Result<Self, RenderError> {
        let mut tera = Tera::default();
        tera.autoescape_on(vec![""]);
        tera.register_filter("base64_encode", base64_encode);
        tera.register_filter("base64_decode", base64_decode);
        tera.add_raw_templates(BUILTIN_TEMPLATES.iter().copied())
            .map_err(|source| RenderError::Template {
                name: "builtin".into(),
                source,
            })?;

        Ok(Self { tera })
    }

    /// Loads the builtin templates, then replaces them with the `*.html`
    /// files found in `dir`. Each file provides the template named after its
    /// file stem.
    pub fn with_overrides(dir: &Path) -> Result<Self, RenderError> {
        let mut templates = Self::builtin()?;

        let load_err = |source| RenderError::Load {
            path: dir.to_owned(),
            source,
        };

        let mut overrides = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(load_err)? {
            let path = entry.map_err(load_err)?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("html") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let content = std::fs::read_to_string(&path).map_err(|source| RenderError::Load {
                path: path.clone(),
                source,
            })?;
            debug!(template = name, path = %path.display(), "overriding template");
            overrides.push((name.to_owned(), content));
        }

        templates
            .tera
            .add_raw_templates(overrides)
            .map_err(|source| RenderError::Template {
                name: dir.display().to_string(),
                source,
            })?;

        Ok(templates)
    }
}

impl TemplateEngine for Templates {
    fn render(&self, name: &str, context: &tera::Context) -> Result<String, RenderError> {
        if !self.tera.get_template_names().any(|n| n == name) {
            return Err(RenderError::UnknownTemplate(name.to_owned()));
        }

        self.tera
            .render(name, context)
            .map_err(|source| RenderError::Template {
                name: name.to_owned(),
                source,
            })
    }
}

fn base64_encode(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
    let s = tera::try_get_value!("base64_encode", "value", String, value);
    Ok(Value::String(BASE64.encode(s.as_bytes())))
}

fn base64_decode(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
    let s = tera::try_get_value!("base64_decode", "value", String, value);
    match BASE64.decode(s.as_bytes()) {
        Ok(decoded) => Ok(Value::String(String::from_utf8_lossy(&decoded).into_owned())),
        Err(e) => {
            warn!(err = %e, "unable to decode base64 value");
            Ok(Value::String(String::new()))
        }
    }
}

/// tera keeps the interesting part of its errors in the source chain.
fn error_chain(err: &tera::Error) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(e) = source {
        msg.push_str(": ");
        msg.push_str(&e.to_string());
        source = e.source();
    }
    msg
}

#[cfg(test)]
mod tests {
    use super::{RenderError, TemplateEngine, Templates, BUILTIN};
    use rstest::rstest;
    use tempfile::TempDir;

    #[rstest]
    #[case::css("css")]
    #[case::index("index")]
    #[case::error("error")]
    fn builtin_templates_render(#[case] name: &str) {
        let mut context = tera::Context::new();
        context.insert("curpath", "/");
        context.insert("repo", "/srv/restic-repo");
        context.insert("status", &500);
        context.insert("reason", "Internal Server Error");
        context.insert("message", "<boom>");

        let out = BUILTIN.render(name, &context).expect("must render");
        assert!(!out.contains("<boom>"), "values must be escaped");
    }

    #[test]
    fn unknown_template() {
        assert!(matches!(
            BUILTIN.render("nope", &tera::Context::new()),
            Err(RenderError::UnknownTemplate(name)) if name == "nope"
        ));
    }

    #[rstest]
    #[case::encode("{{ v | base64_encode }}", "hello", "aGVsbG8=")]
    #[case::decode("{{ v | base64_decode }}", "aGVsbG8=", "hello")]
    #[case::decode_invalid("{{ v | base64_decode }}", "%%%", "")]
    fn base64_filters(#[case] template: &str, #[case] value: &str, #[case] expected: &str) {
        let mut templates = Templates::builtin().unwrap();
        templates.tera.add_raw_template("t", template).unwrap();

        let mut context = tera::Context::new();
        context.insert("v", value);
        assert_eq!(expected, templates.render("t", &context).unwrap());
    }

    #[test]
    fn overrides_from_dir() {
        let tmpdir = TempDir::new().unwrap();
        let dir = tmpdir.path();
        std::fs::write(dir.join("index.html"), "custom index for {{ repo }}").unwrap();
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let templates = Templates::with_overrides(dir).expect("must load");
        let mut context = tera::Context::new();
        context.insert("repo", "r");
        assert_eq!("custom index for r", templates.render("index", &context).unwrap());
        assert!(templates.render("notes", &context).is_err());
    }

    #[test]
    fn overrides_missing_dir() {
        assert!(matches!(
            Templates::with_overrides(std::path::Path::new("/nonexistent/snapview")),
            Err(RenderError::Load { .. })
        ));
    }
}
