//! Captured listing outputs used throughout the tests.
use lazy_static::lazy_static;

use crate::records::EntryRecord;

pub const LISTING_SINGLE_FILE: &[u8] = br#"{"id":"abc123"}
{"path":"/file.txt","type":"file","size":3}
"#;

pub const LISTING_NESTED: &[u8] = br#"{"time":"2021-03-04T10:11:12.123456789+01:00","tree":"1b2c3d","paths":["/test"],"hostname":"myhost","username":"me","id":"4bba301e1f8a7ab8c2f3e1fbf0b5d6a9d0e1c2b3a4f5e6d7c8b9a0f1e2d3c4b5","short_id":"4bba301e","struct_type":"snapshot"}
{"name":"test","type":"dir","path":"/test","uid":1000,"gid":100,"mode":2147484141,"mtime":"2021-03-04T10:11:12+01:00","atime":"2021-03-04T10:11:12+01:00","ctime":"2021-03-04T10:11:12+01:00","struct_type":"node"}
{"name":"foo.txt","type":"file","path":"/test/foo.txt","uid":1000,"gid":100,"size":10,"mode":420,"mtime":"2021-03-04T10:11:12+01:00","atime":"2021-03-04T10:11:12+01:00","ctime":"2021-03-04T10:11:12+01:00","struct_type":"node"}
{"name":"bar","type":"dir","path":"/test/bar","uid":1000,"gid":100,"mode":2147484141,"mtime":"2021-03-04T10:11:12+01:00","atime":"2021-03-04T10:11:12+01:00","ctime":"2021-03-04T10:11:12+01:00","struct_type":"node"}
{"name":"baz.txt","type":"file","path":"/test/bar/baz.txt","uid":1000,"gid":100,"size":5,"mode":420,"mtime":"2021-03-04T10:11:12+01:00","atime":"2021-03-04T10:11:12+01:00","ctime":"2021-03-04T10:11:12+01:00","struct_type":"node"}
"#;

pub const LISTING_TRUNCATED: &[u8] = br#"{"id":"abc123","struct_type":"snapshot"}
{"path":"/good.txt","type":"file","size":3,"struct_type":"node"}
{"path":"/bad.txt","type":"fi"#;

pub const SNAPSHOTS: &[u8] = br#"[{"time":"2021-03-03T09:00:00Z","paths":["/home"],"hostname":"otherhost","id":"0123456789abcdef","short_id":"01234567"},{"time":"2021-03-04T10:11:12+01:00","paths":["/test"],"hostname":"myhost","username":"me","tags":["daily"],"id":"4bba301e1f8a7ab8c2f3e1fbf0b5d6a9d0e1c2b3a4f5e6d7c8b9a0f1e2d3c4b5","short_id":"4bba301e"}]
"#;

pub const HELLOWORLD_CONTENTS: &[u8] = b"Hello World!";

fn file(path: &str, size: u64) -> EntryRecord {
    EntryRecord {
        kind: "file".into(),
        path: path.into(),
        size,
        ..Default::default()
    }
    .normalize()
}

fn dir(path: &str) -> EntryRecord {
    EntryRecord {
        kind: "dir".into(),
        path: path.into(),
        ..Default::default()
    }
    .normalize()
}

lazy_static! {
    pub static ref ENTRY_TEST_FOO: EntryRecord = file("/test/foo.txt", 10);
    pub static ref ENTRY_TEST_BAR_BAZ: EntryRecord = file("/test/bar/baz.txt", 5);
    pub static ref ENTRY_TEST_BAR: EntryRecord = dir("/test/bar");
    pub static ref ENTRY_A_B_C: EntryRecord = file("/a/b/c", 1);
    pub static ref ENTRY_ROOT: EntryRecord = dir("/");
    pub static ref ENTRIES_MIXED: Vec<EntryRecord> = vec![
        dir("/etc"),
        file("/etc/hosts", 200),
        file("/var/log/syslog", 1024),
        dir("/var/log/nginx"),
        file("/var/log/nginx/access.log", 4096),
        file("/README", 12),
    ];
}
