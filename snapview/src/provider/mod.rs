//! The listing provider produces the listings this crate displays.
use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncRead;

mod memory;
mod restic;

pub use self::memory::MemoryListingProvider;
pub use self::restic::{ResticCommand, ResticConfig};

/// Parameters of a single `ls` invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LsRequest {
    /// The snapshot to list, or `latest`.
    pub snapshot_id: String,
    /// Only list entries within these (absolute) directories.
    pub dirs: Vec<String>,
    /// Only consider snapshots from these hosts.
    pub hosts: Vec<String>,
    /// Only consider snapshots carrying one of these tags.
    pub tags: Vec<String>,
    /// Only consider snapshots which include these paths.
    pub paths: Vec<String>,
    /// Descend into subdirectories of the listed directories.
    pub recursive: bool,
    pub long: bool,
}

/// Filters for the `snapshots` operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotFilter {
    pub hosts: Vec<String>,
    pub tags: Vec<String>,
    pub paths: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} failed ({status}): {stderr}")]
    Exit {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("{program} did not finish within {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    #[error("failed to read output of {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("unknown snapshot {0}")]
    UnknownSnapshot(String),

    #[error("no file {path} in snapshot {snapshot_id}")]
    UnknownFile { snapshot_id: String, path: String },
}

/// Reader over the contents of a file in a snapshot.
pub type DumpReader = Box<dyn AsyncRead + Send + Unpin>;

/// The operations of the backup tool that the HTTP handlers bridge to.
///
/// `ls` and `snapshots` write the JSON output of the respective operation
/// into `sink`, in the format understood by [crate::decoder].
#[async_trait]
pub trait ListingProvider: Send + Sync {
    /// Lists the contents of a snapshot.
    async fn ls(&self, request: &LsRequest, sink: &mut Vec<u8>) -> Result<(), ProviderError>;

    /// Lists all snapshots matching the filter.
    async fn snapshots(
        &self,
        filter: &SnapshotFilter,
        sink: &mut Vec<u8>,
    ) -> Result<(), ProviderError>;

    /// Opens a single file of a snapshot for reading.
    async fn dump(&self, snapshot_id: &str, path: &str) -> Result<DumpReader, ProviderError>;

    /// A human readable description of the repository being browsed.
    fn repository(&self) -> &str;
}
