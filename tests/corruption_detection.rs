//! Corruption detection tests
//!
//! Verify that damaged containers are reported as errors instead of
//! returning wrong data, and that damaged or missing tails without a
//! recognizable trailer are treated as host-only files.

use damd::container::{HEADER_LEN, TRAILER_LEN};
use damd::{DamdError, DamdFile, ErrorKind, SegmentOptions};
use std::fs::{self, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use tempfile::NamedTempFile;

const HOST: &[u8] = b"Original file content";

/// Helper: host file with one saved segment
fn saved_file(key: &str, payload: &str, compress: bool) -> NamedTempFile {
    let mut temp = NamedTempFile::new().unwrap();
    temp.write_all(HOST).unwrap();
    temp.flush().unwrap();

    let mut file = DamdFile::open(temp.path()).unwrap();
    file.add_segment_with(key, payload, SegmentOptions::new().compress(compress))
        .unwrap();
    file.save().unwrap();
    temp
}

/// Helper: XOR one byte at `offset`
fn flip_byte(path: &Path, offset: u64) {
    let mut bytes = fs::read(path).unwrap();
    bytes[offset as usize] ^= 0x01;
    fs::write(path, bytes).unwrap();
}

/// Helper: Truncate file to specific size
fn truncate_file(path: &Path, size: u64) {
    let file = OpenOptions::new().write(true).open(path).unwrap();
    file.set_len(size).unwrap();
}

#[test]
fn test_flipped_uncompressed_payload_byte() {
    let temp = saved_file("notes", "hello world", false);

    // Stored bytes are the last thing before the trailer
    let len = fs::metadata(temp.path()).unwrap().len();
    flip_byte(temp.path(), len - TRAILER_LEN as u64 - 3);

    let err = DamdFile::open(temp.path()).unwrap_err();
    assert!(err.is_corruption(), "unexpected error: {:?}", err);
    match err {
        DamdError::CorruptSegment { key, .. } => assert_eq!(key, "notes"),
        other => panic!("expected CorruptSegment, got {:?}", other),
    }
}

#[test]
fn test_flipped_compressed_payload_byte() {
    let temp = saved_file("summary", &"compressible line\n".repeat(200), true);

    let len = fs::metadata(temp.path()).unwrap().len();
    flip_byte(temp.path(), len - TRAILER_LEN as u64 - 6);

    // Either the decompressor or the checksum catches it
    let err = DamdFile::open(temp.path()).unwrap_err();
    assert!(err.is_corruption(), "unexpected error: {:?}", err);
}

#[test]
fn test_every_container_byte_is_protected() {
    let temp = saved_file("k", "value", false);
    let pristine = fs::read(temp.path()).unwrap();
    let container_start = HOST.len();
    let crc_end = pristine.len() - TRAILER_LEN + 4;

    // Header, records and the CRC itself
    for offset in container_start..crc_end {
        let mut damaged = pristine.clone();
        damaged[offset] ^= 0x80;
        fs::write(temp.path(), &damaged).unwrap();

        let result = DamdFile::open(temp.path());
        assert!(result.is_err(), "flip at {} went unnoticed", offset);
    }
}

#[test]
fn test_corrupt_length_field() {
    let temp = saved_file("notes", "hello", false);
    let len = fs::metadata(temp.path()).unwrap().len();

    let mut file = OpenOptions::new().write(true).open(temp.path()).unwrap();
    file.seek(SeekFrom::Start(len - TRAILER_LEN as u64 + 4)).unwrap();
    file.write_all(&(len * 2).to_le_bytes()).unwrap();
    drop(file);

    let err = DamdFile::open(temp.path()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedRecord);
}

#[test]
fn test_truncated_tail_is_host_only() {
    let temp = saved_file("notes", "hello", false);
    let len = fs::metadata(temp.path()).unwrap().len();
    truncate_file(temp.path(), len - 2);

    let file = DamdFile::open(temp.path()).unwrap();
    assert!(file.is_empty());
    assert_eq!(file.original_size(), len - 2);
}

#[test]
fn test_future_version_is_rejected() {
    let temp = saved_file("notes", "hello", false);

    let mut file = OpenOptions::new().write(true).open(temp.path()).unwrap();
    file.seek(SeekFrom::Start(HOST.len() as u64 + 8)).unwrap();
    file.write_all(&9u16.to_le_bytes()).unwrap();
    drop(file);

    let err = DamdFile::open(temp.path()).unwrap_err();
    assert!(matches!(err, DamdError::UnsupportedVersion(9)));
}

#[test]
fn test_host_damage_is_not_metadata_damage() {
    let temp = saved_file("notes", "hello", false);
    flip_byte(temp.path(), 0);

    // Host bytes are not covered by the container checksums
    let file = DamdFile::open(temp.path()).unwrap();
    assert_eq!(file.get_text("notes").unwrap().as_deref(), Some("hello"));
}

#[test]
fn test_failed_load_keeps_file_intact() {
    let temp = saved_file("notes", "hello", false);
    flip_byte(temp.path(), HOST.len() as u64 + HEADER_LEN as u64 + 3);
    let damaged = fs::read(temp.path()).unwrap();

    let mut file = DamdFile::new(temp.path());
    assert!(file.load().is_err());
    assert_eq!(fs::read(temp.path()).unwrap(), damaged);
}
