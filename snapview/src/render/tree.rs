use serde::Serialize;
use tracing::warn;

use super::{RenderContext, RenderError, TemplateEngine};
use crate::tree::{Node, Nodes};

/// The template rendering a single node of the tree.
pub const DIRTREE_TEMPLATE: &str = "dirtree";

/// What the `dirtree` template gets to see of a [Node].
#[derive(Serialize)]
struct NodeView<'a> {
    name: &'a str,
    path: &'a str,
    path_chain: &'a str,
    kind: &'a str,
    is_dir: bool,
    is_leaf: bool,
    is_expanded: bool,
    is_inferred: bool,
    selected: bool,
    uid: u32,
    gid: u32,
    size: u64,
    mode: String,
    mtime: Option<String>,
}

impl<'a> NodeView<'a> {
    fn new(node: &'a Node, ctx: &RenderContext) -> Self {
        let record = node.record();
        Self {
            name: node.name(),
            path: node.path(),
            path_chain: node.path_chain(),
            kind: &record.kind,
            is_dir: node.is_dir(),
            is_leaf: node.is_leaf(),
            is_expanded: node.is_expanded(),
            is_inferred: node.is_inferred(),
            selected: ctx.selected_dir() == Some(node.path_chain()),
            uid: record.uid,
            gid: record.gid,
            size: record.size,
            mode: record.mode.to_string(),
            mtime: record
                .mtime
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
        }
    }
}

#[derive(Serialize)]
struct DirTreeData<'a> {
    node: NodeView<'a>,
    ctx: &'a RenderContext,
    /// The already rendered children of the node.
    children: String,
}

/// Renders a node, and all nodes below it.
///
/// A failure to render the node is logged and rendered as an error message
/// in place of the node, so one broken node doesn't break the whole page.
pub fn render_node(engine: &dyn TemplateEngine, node: &Node, ctx: &RenderContext) -> String {
    let ctx = ctx.for_node(node);
    let children = render_nodes(engine, node.nodes(), &ctx);

    let data = DirTreeData {
        node: NodeView::new(node, &ctx),
        ctx: &ctx,
        children,
    };

    match tera::Context::from_serialize(&data)
        .map_err(RenderError::Context)
        .and_then(|context| engine.render(DIRTREE_TEMPLATE, &context))
    {
        Ok(fragment) => fragment,
        Err(e) => {
            warn!(err = %e, path_chain = node.path_chain(), "failed to render node");
            format!(
                r#"<li class="render-error">{}</li>"#,
                tera::escape_html(&e.to_string())
            )
        }
    }
}

/// Renders all nodes of a forest, in order.
pub fn render_nodes(engine: &dyn TemplateEngine, nodes: &Nodes, ctx: &RenderContext) -> String {
    nodes
        .iter()
        .map(|node| render_node(engine, node, ctx))
        .collect()
}
