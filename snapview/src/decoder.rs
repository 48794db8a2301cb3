//! Decodes the captured output of a listing invocation.
//!
//! The output of `ls` is a sequence of JSON values: one [SnapshotHeader],
//! followed by zero or more [EntryRecord]s. The output of `snapshots` is a
//! single JSON array of [Snapshot]s.
use std::fmt::{self, Display};

use serde_json::{de::SliceRead, Deserializer, StreamDeserializer};
use tracing::{instrument, trace};

use crate::records::{
    EntryRecord, Snapshot, SnapshotHeader, STRUCT_TYPE_NODE, STRUCT_TYPE_SNAPSHOT,
};

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("listing output is empty, expected a snapshot header")]
    MissingHeader,

    #[error("failed to decode {record} at byte {offset}: {source}")]
    Malformed {
        record: RecordPosition,
        offset: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("{record} at byte {offset} has struct_type {found:?}, expected {expected:?}")]
    UnexpectedStructType {
        record: RecordPosition,
        offset: usize,
        found: String,
        expected: &'static str,
    },
}

/// Which record of the stream a [DecodeError] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordPosition {
    Header,
    /// The n-th entry after the header, counting from zero.
    Entry(usize),
    SnapshotList,
}

impl Display for RecordPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordPosition::Header => write!(f, "snapshot header"),
            RecordPosition::Entry(n) => write!(f, "entry #{}", n),
            RecordPosition::SnapshotList => write!(f, "snapshot list"),
        }
    }
}

/// Decodes the header of an `ls` listing and returns it, together with an
/// iterator over the entries following it.
///
/// The entries are decoded lazily, one at a time, while iterating. The
/// iterator stops after the first error.
#[instrument(level = "trace", skip_all, fields(buf.len = buf.len()), err)]
pub fn decode_listing(buf: &[u8]) -> Result<(SnapshotHeader, Entries<'_>), DecodeError> {
    let mut stream = Deserializer::from_slice(buf).into_iter::<SnapshotHeader>();

    let header = match stream.next() {
        None => return Err(DecodeError::MissingHeader),
        Some(Err(source)) => {
            return Err(DecodeError::Malformed {
                record: RecordPosition::Header,
                offset: stream.byte_offset(),
                source,
            })
        }
        Some(Ok(header)) => header,
    };

    check_struct_type(
        header.struct_type.as_deref(),
        STRUCT_TYPE_SNAPSHOT,
        RecordPosition::Header,
        0,
    )?;

    let base = stream.byte_offset();
    trace!(snapshot.id = %header.id, header.len = base, "decoded header");

    Ok((
        header,
        Entries {
            inner: Deserializer::from_slice(&buf[base..]).into_iter(),
            base,
            index: 0,
            done: false,
        },
    ))
}

/// Decodes the output of the `snapshots` operation.
pub fn decode_snapshots(buf: &[u8]) -> Result<Vec<Snapshot>, DecodeError> {
    let snapshots: Vec<Snapshot> =
        serde_json::from_slice(buf).map_err(|source| DecodeError::Malformed {
            record: RecordPosition::SnapshotList,
            offset: byte_offset(buf, source.line(), source.column()),
            source,
        })?;

    for (i, snapshot) in snapshots.iter().enumerate() {
        check_struct_type(
            snapshot.struct_type.as_deref(),
            STRUCT_TYPE_SNAPSHOT,
            RecordPosition::SnapshotList,
            i,
        )?;
    }

    Ok(snapshots)
}

/// Lazy sequence of the [EntryRecord]s following a header.
pub struct Entries<'a> {
    inner: StreamDeserializer<'a, SliceRead<'a>, EntryRecord>,
    // offset of `inner`'s input in the whole buffer
    base: usize,
    index: usize,
    done: bool,
}

impl Iterator for Entries<'_> {
    type Item = Result<EntryRecord, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let offset = self.base + self.inner.byte_offset();
        let record = RecordPosition::Entry(self.index);

        let item = match self.inner.next()? {
            Ok(entry) => check_struct_type(
                entry.struct_type.as_deref(),
                STRUCT_TYPE_NODE,
                record,
                offset,
            )
            .map(|()| entry.normalize()),
            Err(source) => Err(DecodeError::Malformed {
                record,
                offset,
                source,
            }),
        };

        self.index += 1;
        self.done = item.is_err();
        Some(item)
    }
}

fn check_struct_type(
    found: Option<&str>,
    expected: &'static str,
    record: RecordPosition,
    offset: usize,
) -> Result<(), DecodeError> {
    match found {
        Some(found) if found != expected => Err(DecodeError::UnexpectedStructType {
            record,
            offset,
            found: found.to_owned(),
            expected,
        }),
        _ => Ok(()),
    }
}

/// Converts the 1-based line and column serde_json reports into a byte
/// offset into `buf`.
fn byte_offset(buf: &[u8], line: usize, column: usize) -> usize {
    let line_start: usize = buf
        .split_inclusive(|b| *b == b'\n')
        .take(line.saturating_sub(1))
        .map(|l| l.len())
        .sum();
    (line_start + column.saturating_sub(1)).min(buf.len())
}

#[cfg(test)]
mod tests {
    use super::{decode_listing, decode_snapshots, DecodeError, RecordPosition};
    use crate::fixtures::{LISTING_NESTED, LISTING_SINGLE_FILE, SNAPSHOTS};
    use rstest::rstest;

    #[test]
    fn single_file() {
        let (header, entries) = decode_listing(LISTING_SINGLE_FILE).expect("must decode");
        assert_eq!("abc123", header.id);

        let entries: Vec<_> = entries.collect::<Result<_, _>>().expect("must decode");
        assert_eq!(1, entries.len());
        assert_eq!("/file.txt", entries[0].path);
        assert_eq!("file.txt", entries[0].name);
        assert_eq!(3, entries[0].size);
    }

    #[test]
    fn nested() {
        let (header, entries) = decode_listing(LISTING_NESTED).expect("must decode");
        assert_eq!("4bba301e", header.short_id);
        assert_eq!(vec!["/test".to_string()], header.paths);

        let paths: Vec<String> = entries.map(|e| e.unwrap().path).collect();
        assert_eq!(
            vec!["/test", "/test/foo.txt", "/test/bar", "/test/bar/baz.txt"],
            paths
        );
    }

    #[test]
    fn header_only() {
        let (_, mut entries) =
            decode_listing(br#"{"id":"abc123","struct_type":"snapshot"}"#).expect("must decode");
        assert!(entries.next().is_none());
    }

    #[rstest]
    #[case::empty(b"")]
    #[case::whitespace(b" \n\n")]
    fn missing_header(#[case] buf: &[u8]) {
        assert!(matches!(
            decode_listing(buf),
            Err(DecodeError::MissingHeader)
        ));
    }

    #[test]
    fn malformed_header() {
        match decode_listing(br#"{"short_id":"abc"}"#) {
            Err(DecodeError::Malformed { record, .. }) => {
                assert_eq!(RecordPosition::Header, record)
            }
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("must fail"),
        }
    }

    #[test]
    fn truncated_entry() {
        let buf = b"{\"id\":\"abc123\"}\n{\"path\":\"/a\",\"type\":\"file\"}\n{\"path\":\"/b\",\"ty";
        let (_, entries) = decode_listing(buf).expect("header must decode");
        let results: Vec<_> = entries.collect();

        // the first entry decodes, the second one fails, nothing after it.
        assert_eq!(2, results.len());
        assert!(results[0].is_ok());
        match &results[1] {
            Err(DecodeError::Malformed { record, offset, .. }) => {
                assert_eq!(RecordPosition::Entry(1), *record);
                assert_eq!(43, *offset);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn wrong_struct_type() {
        let buf = b"{\"id\":\"abc123\"}\n{\"path\":\"/a\",\"struct_type\":\"snapshot\"}\n";
        let (_, mut entries) = decode_listing(buf).expect("header must decode");
        assert!(matches!(
            entries.next(),
            Some(Err(DecodeError::UnexpectedStructType {
                record: RecordPosition::Entry(0),
                ..
            }))
        ));
        assert!(entries.next().is_none());
    }

    #[test]
    fn snapshots() {
        let snapshots = decode_snapshots(SNAPSHOTS).expect("must decode");
        assert_eq!(2, snapshots.len());
        assert_eq!("myhost", snapshots[1].hostname);
        assert_eq!(vec!["daily".to_string()], snapshots[1].tags);
    }

    #[test]
    fn snapshots_malformed() {
        match decode_snapshots(b"[\n{\"id\":1}]") {
            Err(DecodeError::Malformed { offset, .. }) => assert!(offset > 0),
            other => panic!("unexpected result: {:?}", other.map(|s| s.len())),
        }
    }
}
