//! Assembles the flat list of [EntryRecord]s of a listing into a tree.
use std::collections::HashMap;

use tracing::{instrument, trace};

use crate::records::EntryRecord;

/// An element of the directory tree.
///
/// A node is either created from an [EntryRecord] of the listing (a terminal
/// node), or inferred as an ancestor directory of a deeper entry which was
/// listed before (or without) its parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    record: EntryRecord,
    /// The absolute path from the root down to and including this node.
    path_chain: String,
    nodes: Nodes,
    is_expanded: bool,
    inferred: bool,
}

impl Node {
    fn terminal(record: EntryRecord, path_chain: String) -> Self {
        Self {
            record,
            path_chain,
            nodes: Nodes::default(),
            is_expanded: false,
            inferred: false,
        }
    }

    /// Inferred directories keep the path of the entry that caused them to
    /// be created, so they never count as leaves.
    fn inferred(name: &str, entry_path: &str, path_chain: String) -> Self {
        Self {
            record: EntryRecord::inferred_dir(name, entry_path),
            path_chain,
            nodes: Nodes::default(),
            is_expanded: true,
            inferred: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.record.name
    }

    /// The full path of the record this node was created from.
    pub fn path(&self) -> &str {
        &self.record.path
    }

    pub fn path_chain(&self) -> &str {
        &self.path_chain
    }

    pub fn record(&self) -> &EntryRecord {
        &self.record
    }

    pub fn nodes(&self) -> &Nodes {
        &self.nodes
    }

    pub fn is_expanded(&self) -> bool {
        self.is_expanded
    }

    pub fn is_inferred(&self) -> bool {
        self.inferred
    }

    pub fn is_dir(&self) -> bool {
        self.record.is_dir()
    }

    pub fn is_leaf(&self) -> bool {
        self.path_chain == self.record.path
    }
}

/// An ordered list of sibling [Node]s.
///
/// Nodes are kept in the order they were first seen. A side index maps each
/// name to the first node carrying it, which is the one deeper entries are
/// attached to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Nodes {
    nodes: Vec<Node>,
    by_name: HashMap<String, usize>,
}

impl Nodes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Node> {
        self.nodes.iter()
    }

    /// Returns the first node with the given name.
    pub fn find(&self, name: &str) -> Option<&Node> {
        self.by_name.get(name).map(|ix| &self.nodes[*ix])
    }

    /// Inserts an entry into the tree.
    ///
    /// All directories on the way to the entry that don't exist yet are
    /// created as inferred directories, existing ones are marked expanded.
    /// The entry itself always becomes a new node, entries are expected to
    /// be listed at most once.
    #[instrument(level = "trace", skip_all, fields(entry.path = %entry.path))]
    pub fn add(&mut self, entry: EntryRecord) {
        let path = entry.path.clone();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        // the root itself has no node.
        let Some((last, ancestors)) = segments.split_last() else {
            return;
        };

        let mut path_chain = String::with_capacity(path.len() + 1);
        let mut current = self;
        for segment in ancestors {
            path_chain.push('/');
            path_chain.push_str(segment);

            let ix = match current.by_name.get(*segment) {
                Some(&ix) => {
                    current.nodes[ix].is_expanded = true;
                    ix
                }
                None => {
                    trace!(path_chain = %path_chain, "inferring directory");
                    current.push(Node::inferred(segment, &path, path_chain.clone()))
                }
            };
            current = &mut current.nodes[ix].nodes;
        }

        path_chain.push('/');
        path_chain.push_str(last);
        current.push(Node::terminal(entry, path_chain));
    }

    /// Returns all leaves of the tree, depth-first.
    pub fn leaves(&self) -> Vec<&Node> {
        let mut leaves = Vec::new();
        let mut stack: Vec<&Node> = self.nodes.iter().rev().collect();
        while let Some(node) = stack.pop() {
            if node.is_leaf() {
                leaves.push(node);
            }
            stack.extend(node.nodes.iter().rev());
        }
        leaves
    }

    fn push(&mut self, node: Node) -> usize {
        let ix = self.nodes.len();
        self.by_name.entry(node.name().to_owned()).or_insert(ix);
        self.nodes.push(node);
        ix
    }
}

impl<'a> IntoIterator for &'a Nodes {
    type Item = &'a Node;
    type IntoIter = std::slice::Iter<'a, Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

impl Extend<EntryRecord> for Nodes {
    fn extend<T: IntoIterator<Item = EntryRecord>>(&mut self, iter: T) {
        for entry in iter {
            self.add(entry);
        }
    }
}

impl FromIterator<EntryRecord> for Nodes {
    fn from_iter<T: IntoIterator<Item = EntryRecord>>(iter: T) -> Self {
        let mut nodes = Nodes::new();
        nodes.extend(iter);
        nodes
    }
}
