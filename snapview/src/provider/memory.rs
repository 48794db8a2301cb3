use std::collections::HashMap;
use std::io::Cursor;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::instrument;

use super::{DumpReader, ListingProvider, LsRequest, ProviderError, SnapshotFilter};

/// [ListingProvider] replaying outputs recorded in memory.
///
/// Listings are looked up by snapshot id only, the other parameters of a
/// request are recorded but don't influence the output.
#[derive(Default)]
pub struct MemoryListingProvider {
    repository: String,
    listings: HashMap<String, Vec<u8>>,
    snapshots: Option<Vec<u8>>,
    files: HashMap<(String, String), Vec<u8>>,
    ls_requests: Mutex<Vec<LsRequest>>,
}

impl MemoryListingProvider {
    pub fn new(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            ..Default::default()
        }
    }

    /// Registers the `ls` output for a snapshot.
    pub fn with_listing(mut self, snapshot_id: impl Into<String>, output: impl Into<Vec<u8>>) -> Self {
        self.listings.insert(snapshot_id.into(), output.into());
        self
    }

    /// Registers the `snapshots` output.
    pub fn with_snapshots(mut self, output: impl Into<Vec<u8>>) -> Self {
        self.snapshots = Some(output.into());
        self
    }

    /// Registers the contents of a file in a snapshot.
    pub fn with_file(
        mut self,
        snapshot_id: impl Into<String>,
        path: impl Into<String>,
        contents: impl Into<Vec<u8>>,
    ) -> Self {
        self.files
            .insert((snapshot_id.into(), path.into()), contents.into());
        self
    }

    /// All `ls` requests received so far.
    pub fn ls_requests(&self) -> Vec<LsRequest> {
        self.ls_requests.lock().clone()
    }
}

#[async_trait]
impl ListingProvider for MemoryListingProvider {
    #[instrument(skip(self, sink), err)]
    async fn ls(&self, request: &LsRequest, sink: &mut Vec<u8>) -> Result<(), ProviderError> {
        self.ls_requests.lock().push(request.clone());

        let output = self
            .listings
            .get(&request.snapshot_id)
            .ok_or_else(|| ProviderError::UnknownSnapshot(request.snapshot_id.clone()))?;
        sink.extend_from_slice(output);
        Ok(())
    }

    async fn snapshots(
        &self,
        _filter: &SnapshotFilter,
        sink: &mut Vec<u8>,
    ) -> Result<(), ProviderError> {
        sink.extend_from_slice(self.snapshots.as_deref().unwrap_or(b"[]"));
        Ok(())
    }

    async fn dump(&self, snapshot_id: &str, path: &str) -> Result<DumpReader, ProviderError> {
        let contents = self
            .files
            .get(&(snapshot_id.to_owned(), path.to_owned()))
            .ok_or_else(|| ProviderError::UnknownFile {
                snapshot_id: snapshot_id.to_owned(),
                path: path.to_owned(),
            })?;
        Ok(Box::new(Cursor::new(contents.clone())))
    }

    fn repository(&self) -> &str {
        &self.repository
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryListingProvider;
    use crate::fixtures::{HELLOWORLD_CONTENTS, LISTING_SINGLE_FILE};
    use crate::provider::{ListingProvider, LsRequest, ProviderError, SnapshotFilter};
    use tokio::io::AsyncReadExt;

    fn provider() -> MemoryListingProvider {
        MemoryListingProvider::new("memory")
            .with_listing("abc123", LISTING_SINGLE_FILE)
            .with_file("abc123", "/file.txt", HELLOWORLD_CONTENTS)
    }

    #[tokio::test]
    async fn ls() {
        let provider = provider();
        let request = LsRequest {
            snapshot_id: "abc123".into(),
            ..Default::default()
        };

        let mut sink = Vec::new();
        provider.ls(&request, &mut sink).await.unwrap();
        assert_eq!(LISTING_SINGLE_FILE, &sink[..]);
        assert_eq!(vec![request], provider.ls_requests());
    }

    #[tokio::test]
    async fn ls_unknown() {
        let request = LsRequest {
            snapshot_id: "nope".into(),
            ..Default::default()
        };
        assert!(matches!(
            provider().ls(&request, &mut Vec::new()).await,
            Err(ProviderError::UnknownSnapshot(id)) if id == "nope"
        ));
    }

    #[tokio::test]
    async fn snapshots_default_empty() {
        let mut sink = Vec::new();
        provider()
            .snapshots(&SnapshotFilter::default(), &mut sink)
            .await
            .unwrap();
        assert_eq!(b"[]", &sink[..]);
    }

    #[tokio::test]
    async fn dump() {
        let mut reader = provider().dump("abc123", "/file.txt").await.unwrap();
        let mut contents = Vec::new();
        reader.read_to_end(&mut contents).await.unwrap();
        assert_eq!(HELLOWORLD_CONTENTS, &contents[..]);

        assert!(matches!(
            provider().dump("abc123", "/other.txt").await,
            Err(ProviderError::UnknownFile { .. })
        ));
    }
}
