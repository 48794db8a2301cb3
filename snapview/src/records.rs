//! Records emitted by the listing provider in its JSON output mode.
use std::fmt::{self, Display};

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// The `struct_type` value carried by a snapshot header.
pub const STRUCT_TYPE_SNAPSHOT: &str = "snapshot";
/// The `struct_type` value carried by an entry record.
pub const STRUCT_TYPE_NODE: &str = "node";

/// The record preceding all entries of a listing, describing the snapshot
/// the entries belong to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub id: String,
    #[serde(default)]
    pub short_id: String,
    #[serde(default)]
    pub time: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub paths: Vec<String>,
    #[serde(default)]
    pub tree: Option<String>,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub struct_type: Option<String>,
}

/// An element of the snapshot listing, as returned by the `snapshots`
/// operation. It has the same shape as the header of an `ls` listing.
pub type Snapshot = SnapshotHeader;

/// One file or directory of a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRecord {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub path: String,
    #[serde(default)]
    pub uid: u32,
    #[serde(default)]
    pub gid: u32,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub mode: FileMode,
    #[serde(default)]
    pub mtime: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub atime: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub ctime: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub struct_type: Option<String>,
}

impl EntryRecord {
    /// Synthesizes the record of a directory that only appears as an
    /// ancestor of `path`.
    pub fn inferred_dir(name: &str, path: &str) -> Self {
        Self {
            name: name.to_owned(),
            kind: "dir".to_owned(),
            path: path.to_owned(),
            ..Default::default()
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == "dir"
    }

    /// Fills in fields the provider may leave out.
    pub(crate) fn normalize(mut self) -> Self {
        if self.name.is_empty() {
            if let Some(last) = self.path.rsplit('/').find(|s| !s.is_empty()) {
                self.name = last.to_owned();
            }
        }
        self
    }
}

/// File mode bits in the layout the listing provider serializes them in:
/// permission bits in the lowest 9 bits, file type bits at the top.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileMode(pub u32);

impl FileMode {
    pub const DIR: u32 = 1 << 31;
    pub const SYMLINK: u32 = 1 << 27;

    // One character per type bit, starting at bit 31.
    const TYPE_CHARS: &'static [u8] = b"dalTLDpSugct?";
    const PERM_CHARS: &'static [u8] = b"rwxrwxrwx";
}

impl Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::with_capacity(12);
        for (i, c) in Self::TYPE_CHARS.iter().enumerate() {
            if self.0 & (1 << (31 - i)) != 0 {
                out.push(*c as char);
            }
        }
        if out.is_empty() {
            out.push('-');
        }
        for (i, c) in Self::PERM_CHARS.iter().enumerate() {
            out.push(if self.0 & (1 << (8 - i)) != 0 {
                *c as char
            } else {
                '-'
            });
        }
        f.write_str(&out)
    }
}
