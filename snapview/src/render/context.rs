use std::collections::BTreeMap;
use std::fmt::{self, Display};

use lazy_static::lazy_static;
use serde::{Serialize, Serializer};
use url::Url;

use crate::tree::Node;

/// The query parameter carrying the directory a link points to.
pub const DIR_PARAM: &str = "dir";

lazy_static! {
    // Requests only carry path and query, relative URLs are resolved
    // against this.
    static ref BASE_URL: Url = Url::parse("http://localhost/").expect("invalid base url");
}

/// Per-request state carried through the recursive tree render.
///
/// Every node is rendered with its own copy, see [RenderContext::for_node].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderContext {
    pub params: BTreeMap<String, String>,
    pub snapshot_id: String,
    pub curpath: String,
    pub long: bool,
    pub url: RequestUrl,
}

impl RenderContext {
    pub fn new(
        params: BTreeMap<String, String>,
        snapshot_id: String,
        curpath: String,
        long: bool,
        url: RequestUrl,
    ) -> Self {
        Self {
            params,
            snapshot_id,
            curpath,
            long,
            url,
        }
    }

    /// Returns a copy of the context whose URL points to the directory of
    /// `node`.
    pub fn for_node(&self, node: &Node) -> Self {
        let mut ctx = self.clone();
        ctx.url.set_query_param(DIR_PARAM, node.path_chain());
        ctx
    }

    /// The directory requested by the client, if any.
    pub fn selected_dir(&self) -> Option<&str> {
        self.params.get(DIR_PARAM).map(String::as_str)
    }
}

/// The URL of the request being served. It serializes to its path and
/// query only, so it can be used as a link target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestUrl(Url);

impl RequestUrl {
    /// Parses an absolute URL, or a path with an optional query.
    pub fn parse(s: &str) -> Result<Self, url::ParseError> {
        BASE_URL.join(s).map(Self)
    }

    pub fn query_param(&self, key: &str) -> Option<String> {
        self.0
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    /// Sets `key` to `value`, replacing all previous values of `key`.
    pub fn set_query_param(&mut self, key: &str, value: &str) {
        let pairs: Vec<(String, String)> = self
            .0
            .query_pairs()
            .filter(|(k, _)| k != key)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        self.0
            .query_pairs_mut()
            .clear()
            .extend_pairs(pairs)
            .append_pair(key, value);
    }

    pub fn href(&self) -> String {
        match self.0.query() {
            Some(query) => format!("{}?{}", self.0.path(), query),
            None => self.0.path().to_owned(),
        }
    }
}

impl Display for RequestUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.href())
    }
}

impl Serialize for RequestUrl {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.href())
    }
}
