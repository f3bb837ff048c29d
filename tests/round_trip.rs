//! Save/load round trip tests
//!
//! Covers the everyday scenarios: empty hosts, text and binary segments,
//! removal, compression transparency and idempotent saves.

use damd::{CompressionMethod, DamdError, DamdFile, ErrorKind, PayloadKind, SegmentOptions};
use std::fs;
use std::io::Write;
use tempfile::NamedTempFile;

/// Helper: temp file holding `content`
fn host_file(content: &[u8]) -> NamedTempFile {
    let mut temp = NamedTempFile::new().unwrap();
    temp.write_all(content).unwrap();
    temp.flush().unwrap();
    temp
}

#[test]
fn test_empty_file() {
    let temp = host_file(b"");
    let mut file = DamdFile::new(temp.path());
    file.load().unwrap();

    assert!(file.list_segments().is_empty());
    assert_eq!(file.original_size(), 0);
    assert!(file.is_loaded());
}

#[test]
fn test_text_segment_survives_reload() {
    let temp = host_file(b"Original file content");

    let mut file = DamdFile::open(temp.path()).unwrap();
    file.add_segment_with("notes", "hello", SegmentOptions::new().compress(false))
        .unwrap();
    file.save().unwrap();

    let reloaded = DamdFile::open(temp.path()).unwrap();
    assert_eq!(reloaded.get_text("notes").unwrap().as_deref(), Some("hello"));
    assert_eq!(reloaded.get_segment("notes").unwrap().kind(), PayloadKind::Text);
}

#[test]
fn test_binary_segment_survives_reload() {
    let temp = host_file(b"Original file content");

    let mut file = DamdFile::open(temp.path()).unwrap();
    file.add_segment_with(
        "blob",
        b"\x00\x01\xFF",
        SegmentOptions::new()
            .content_type("application/octet-stream")
            .compress(false),
    )
    .unwrap();
    file.save().unwrap();

    let reloaded = DamdFile::open(temp.path()).unwrap();
    assert_eq!(
        reloaded.get_data("blob").unwrap(),
        Some(b"\x00\x01\xFF".to_vec())
    );
    assert!(matches!(
        reloaded.get_text("blob"),
        Err(DamdError::InvalidText(_))
    ));
}

#[test]
fn test_save_and_load_cycle_without_initial_load() {
    let temp = host_file(b"Original file content");

    let mut file = DamdFile::new(temp.path());
    file.add_segment("key1", "value1").unwrap();
    file.add_segment("key2", "value2").unwrap();
    file.save().unwrap();

    let reloaded = DamdFile::open(temp.path()).unwrap();
    assert_eq!(reloaded.list_segments(), vec!["key1", "key2"]);
    assert_eq!(reloaded.get_text("key1").unwrap().as_deref(), Some("value1"));
    assert_eq!(reloaded.get_text("key2").unwrap().as_deref(), Some("value2"));
    assert_eq!(reloaded.original_size(), 21);
}

#[test]
fn test_remove_segment() {
    let temp = host_file(b"Original file content");
    let mut file = DamdFile::open(temp.path()).unwrap();
    file.add_segment("key1", "value1").unwrap();
    file.add_segment("key2", "value2").unwrap();

    assert!(file.remove_segment("key1"));
    assert_eq!(file.list_segments(), vec!["key2"]);

    assert!(!file.remove_segment("nonexistent"));
    assert_eq!(file.list_segments(), vec!["key2"]);

    file.save().unwrap();
    let reloaded = DamdFile::open(temp.path()).unwrap();
    assert_eq!(reloaded.list_segments(), vec!["key2"]);
}

#[test]
fn test_missing_key_is_not_an_error() {
    let file = DamdFile::new("/tmp/damd-never-written.bin");
    assert!(file.get_segment("nope").is_none());
    assert_eq!(file.get_text("nope").unwrap(), None);
    assert_eq!(file.get_data("nope").unwrap(), None);
}

#[test]
fn test_nonexistent_file() {
    let mut file = DamdFile::new("/nonexistent/path/file.txt");
    let err = file.load().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FileNotFound);
}

#[test]
fn test_large_repetitive_text_compresses() {
    let temp = host_file(b"Original file content");
    let large_text = "Hello world! ".repeat(100);

    let mut file = DamdFile::open(temp.path()).unwrap();
    let segment = file
        .add_segment_with("compressible", large_text.as_str(), SegmentOptions::new().compress(true))
        .unwrap();
    assert!(segment.compressed());
    assert!(segment.stored_bytes().len() < large_text.len());
    assert_eq!(file.get_text("compressible").unwrap(), Some(large_text.clone()));

    file.save().unwrap();
    let reloaded = DamdFile::open(temp.path()).unwrap();
    assert!(reloaded.get_segment("compressible").unwrap().compressed());
    assert_eq!(reloaded.get_text("compressible").unwrap(), Some(large_text));
}

#[test]
fn test_compression_transparency_across_methods() {
    let payload = "metadata payload ".repeat(40);

    for method in [
        CompressionMethod::None,
        CompressionMethod::Lz4,
        CompressionMethod::Zstd,
    ] {
        for compress in [false, true] {
            let temp = host_file(b"host");
            let mut file = DamdFile::builder(temp.path()).compression(method).open().unwrap();
            file.add_segment_with("p", payload.as_str(), SegmentOptions::new().compress(compress))
                .unwrap();
            file.save().unwrap();

            let reloaded = DamdFile::open(temp.path()).unwrap();
            assert_eq!(
                reloaded.get_text("p").unwrap().as_deref(),
                Some(payload.as_str()),
                "method {:?} compress {}",
                method,
                compress
            );
            assert_eq!(
                reloaded.get_data("p").unwrap().as_deref(),
                Some(payload.as_bytes())
            );
        }
    }
}

#[test]
fn test_round_trip_preserves_all_fields() {
    let temp = host_file(b"host");
    let mut file = DamdFile::open(temp.path()).unwrap();
    file.add_segment_with(
        "image_info",
        r#"{"width":640}"#,
        SegmentOptions::new()
            .content_type("application/json")
            .metadata("extracted_at", "1700000000.0")
            .metadata("handler", "ImageHandler"),
    )
    .unwrap();
    file.add_segment_with("raw", vec![9u8; 300], SegmentOptions::new().compress(false))
        .unwrap();

    let before: Vec<_> = file.segments().cloned().collect();
    file.save().unwrap();

    let reloaded = DamdFile::open(temp.path()).unwrap();
    let after: Vec<_> = reloaded.segments().cloned().collect();
    assert_eq!(before, after);
}

#[test]
fn test_readding_key_overwrites_on_disk() {
    let temp = host_file(b"host");
    let mut file = DamdFile::open(temp.path()).unwrap();
    file.add_segment("notes", "first").unwrap();
    file.save().unwrap();

    let mut file = DamdFile::open(temp.path()).unwrap();
    file.add_segment("notes", "second").unwrap();
    file.save().unwrap();

    let reloaded = DamdFile::open(temp.path()).unwrap();
    assert_eq!(reloaded.len(), 1);
    assert_eq!(reloaded.get_text("notes").unwrap().as_deref(), Some("second"));
}

#[test]
fn test_idempotent_save() {
    let temp = host_file(b"Original file content");
    let mut file = DamdFile::open(temp.path()).unwrap();
    file.add_segment("a", "alpha").unwrap();
    file.add_segment("b", vec![1u8, 2, 3]).unwrap();

    file.save().unwrap();
    let first = fs::read(temp.path()).unwrap();
    file.save().unwrap();
    let second = fs::read(temp.path()).unwrap();
    assert_eq!(first, second);

    // A load/save cycle with no mutation is also byte-stable
    let mut reloaded = DamdFile::open(temp.path()).unwrap();
    reloaded.save().unwrap();
    assert_eq!(fs::read(temp.path()).unwrap(), first);
}

#[test]
fn test_reload_replaces_in_memory_state() {
    let temp = host_file(b"host");
    let mut file = DamdFile::open(temp.path()).unwrap();
    file.add_segment("saved", "yes").unwrap();
    file.save().unwrap();

    file.add_segment("unsaved", "no").unwrap();
    assert!(file.is_dirty());

    file.load().unwrap();
    assert_eq!(file.list_segments(), vec!["saved"]);
    assert!(!file.is_dirty());
}

#[test]
fn test_file_info() {
    let temp = host_file(b"Original file content");
    let mut file = DamdFile::open(temp.path()).unwrap();
    file.add_segment("test", "data").unwrap();

    let info = file.get_info();
    assert_eq!(info.filepath, temp.path());
    assert_eq!(info.original_size, 21);
    assert_eq!(info.segment_count, 1);
    assert_eq!(info.segments, vec!["test"]);

    // Metadata size reflects what save() will append
    file.save().unwrap();
    let on_disk = fs::metadata(temp.path()).unwrap().len();
    assert_eq!(on_disk, 21 + info.total_metadata_size);
}

#[test]
fn test_removing_last_segment_restores_host() {
    let temp = host_file(b"Original file content");
    let mut file = DamdFile::open(temp.path()).unwrap();
    file.add_segment("only", "one").unwrap();
    file.save().unwrap();

    assert!(file.remove_segment("only"));
    file.save().unwrap();
    assert_eq!(fs::read(temp.path()).unwrap(), b"Original file content");

    let reloaded = DamdFile::open(temp.path()).unwrap();
    assert!(reloaded.is_empty());
    assert_eq!(reloaded.original_size(), 21);
}
