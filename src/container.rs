//! Container codec
//!
//! Serializes the full segment table into one self-describing block that is
//! appended after the host content, and finds and parses such a block at the
//! tail of an existing file.
//!
//! # Layout
//!
//! ```text
//! +--------------------------------------------------------------+
//! | header  | magic "DAMD\0HDR" | version u16 | flags u16 | count u32 |
//! | records | count x segment record (see segment module)           |
//! | trailer | crc32 u32 | container_len u64 | magic "DAMD\0END"     |
//! +--------------------------------------------------------------+
//! ```
//!
//! The trailer sits at the very end of the file so a loader can find the
//! container start as `file_len - container_len` without scanning. The CRC
//! covers header and records.

use crate::error::{DamdError, Result};
use crate::segment::Segment;
use crate::wire::{Reader, Writer};
use std::collections::BTreeMap;

pub const MAGIC: [u8; 8] = *b"DAMD\x00HDR";
pub const TRAILER_MAGIC: [u8; 8] = *b"DAMD\x00END";
pub const VERSION: u16 = 1;

/// magic + version + flags + count
pub const HEADER_LEN: usize = 8 + 2 + 2 + 4;

/// crc32 + container_len + magic
pub const TRAILER_LEN: usize = 4 + 8 + 8;

/// Container header, first bytes of the block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Magic number: "DAMD\x00HDR"
    pub magic: [u8; 8],

    /// Format version
    pub version: u16,

    /// Reserved, written as zero
    pub flags: u16,

    /// Number of segment records that follow
    pub segment_count: u32,
}

impl Header {
    pub fn new(segment_count: u32) -> Self {
        Header {
            magic: MAGIC,
            version: VERSION,
            flags: 0,
            segment_count,
        }
    }

    /// Validate the header magic and version
    pub fn validate(&self) -> Result<()> {
        if self.magic != MAGIC {
            return Err(DamdError::malformed(
                "container trailer found but header magic is missing",
            ));
        }

        if self.version != VERSION {
            return Err(DamdError::UnsupportedVersion(self.version));
        }

        Ok(())
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0..8].copy_from_slice(&self.magic);
        bytes[8..10].copy_from_slice(&self.version.to_le_bytes());
        bytes[10..12].copy_from_slice(&self.flags.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.segment_count.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut r = Reader::new(bytes);
        let mut magic = [0u8; 8];
        magic.copy_from_slice(r.take(8, "header magic")?);
        Ok(Header {
            magic,
            version: r.u16("header version")?,
            flags: r.u16("header flags")?,
            segment_count: r.u32("segment count")?,
        })
    }
}

/// Container trailer, last bytes of the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trailer {
    /// CRC32 of header and records
    pub crc32: u32,

    /// Total container length, header through trailer
    pub container_len: u64,

    /// Magic number: "DAMD\x00END"
    pub magic: [u8; 8],
}

impl Trailer {
    pub fn to_bytes(&self) -> [u8; TRAILER_LEN] {
        let mut bytes = [0u8; TRAILER_LEN];
        bytes[0..4].copy_from_slice(&self.crc32.to_le_bytes());
        bytes[4..12].copy_from_slice(&self.container_len.to_le_bytes());
        bytes[12..20].copy_from_slice(&self.magic);
        bytes
    }

    /// Parse the trailer from the last `TRAILER_LEN` bytes of `tail`
    ///
    /// Returns `None` when the tail is too short or the magic is absent.
    pub fn from_tail(tail: &[u8]) -> Option<Self> {
        if tail.len() < TRAILER_LEN {
            return None;
        }
        let bytes = &tail[tail.len() - TRAILER_LEN..];
        if bytes[12..20] != TRAILER_MAGIC {
            return None;
        }

        let mut crc32 = [0u8; 4];
        crc32.copy_from_slice(&bytes[0..4]);
        let mut container_len = [0u8; 8];
        container_len.copy_from_slice(&bytes[4..12]);

        Some(Trailer {
            crc32: u32::from_le_bytes(crc32),
            container_len: u64::from_le_bytes(container_len),
            magic: TRAILER_MAGIC,
        })
    }
}

/// Container parsed from the tail of a file
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    /// Offset where the host content ends and the container begins
    pub original_size: u64,

    /// Verified segments keyed by segment key
    pub segments: BTreeMap<String, Segment>,
}

/// Serialized size of a container holding `segments`
pub fn encoded_len<'a, I>(segments: I) -> usize
where
    I: IntoIterator<Item = &'a Segment>,
{
    HEADER_LEN
        + segments
            .into_iter()
            .map(Segment::encoded_len)
            .sum::<usize>()
        + TRAILER_LEN
}

/// Encode `segments` into a complete container block
///
/// Records are written in key order, so equal tables encode to equal bytes.
pub fn encode(segments: &BTreeMap<String, Segment>) -> Vec<u8> {
    let total = encoded_len(segments.values());
    let mut w = Writer::with_capacity(total);

    w.put_raw(&Header::new(segments.len() as u32).to_bytes());
    for segment in segments.values() {
        segment.encode(&mut w);
    }

    let crc32 = crc32fast::hash(w.as_slice());
    let trailer = Trailer {
        crc32,
        container_len: (w.len() + TRAILER_LEN) as u64,
        magic: TRAILER_MAGIC,
    };
    w.put_raw(&trailer.to_bytes());

    debug_assert_eq!(w.len(), total);
    w.into_bytes()
}

/// Find where the host content ends in `file_bytes`
///
/// Reads only the trailer. Returns `None` when no container is present.
pub fn locate(file_bytes: &[u8]) -> Result<Option<u64>> {
    locate_trailer(file_bytes, file_bytes.len() as u64)
}

/// Like [`locate`], given only the last bytes of a file of `file_len` bytes
pub fn locate_trailer(tail: &[u8], file_len: u64) -> Result<Option<u64>> {
    let trailer = match Trailer::from_tail(tail) {
        Some(trailer) => trailer,
        None => return Ok(None),
    };

    if trailer.container_len < (HEADER_LEN + TRAILER_LEN) as u64
        || trailer.container_len > file_len
    {
        return Err(DamdError::malformed(format!(
            "container length {} is impossible for a {} byte file",
            trailer.container_len, file_len
        )));
    }

    Ok(Some(file_len - trailer.container_len))
}

/// Parse the container at the tail of `file_bytes`
///
/// Returns `Ok(None)` when no container is present. Every segment is
/// materialized once so a damaged payload fails here rather than later.
///
/// # Errors
///
/// - `MalformedRecord` if the trailer magic matches but the block is broken
/// - `UnsupportedVersion` for containers written by a newer format
/// - `CorruptSegment` or `CorruptContainer` if stored bytes were altered
pub fn decode(file_bytes: &[u8]) -> Result<Option<Decoded>> {
    let original_size = match locate(file_bytes)? {
        Some(offset) => offset,
        None => return Ok(None),
    };

    let start = original_size as usize;
    let body_end = file_bytes.len() - TRAILER_LEN;
    let body = &file_bytes[start..body_end];

    let header = Header::from_bytes(body)?;
    header.validate()?;

    let expected_crc = Trailer::from_tail(file_bytes)
        .map(|t| t.crc32)
        .unwrap_or_default();
    let actual_crc = crc32fast::hash(body);

    let records = decode_records(&body[HEADER_LEN..], header.segment_count);

    if actual_crc != expected_crc {
        // Name the damaged segment when the records still parse
        if let Ok(segments) = &records {
            for segment in segments.values() {
                segment.materialize()?;
            }
        }
        return Err(DamdError::CorruptContainer {
            expected: expected_crc,
            actual: actual_crc,
        });
    }

    let segments = records?;
    for segment in segments.values() {
        segment.materialize()?;
    }

    Ok(Some(Decoded {
        original_size,
        segments,
    }))
}

fn decode_records(bytes: &[u8], count: u32) -> Result<BTreeMap<String, Segment>> {
    let mut r = Reader::new(bytes);
    let mut segments = BTreeMap::new();

    for _ in 0..count {
        let segment = Segment::decode(&mut r)?;
        if segments.contains_key(segment.key()) {
            return Err(DamdError::malformed(format!(
                "duplicate segment key '{}'",
                segment.key()
            )));
        }
        segments.insert(segment.key().to_string(), segment);
    }

    if r.remaining() != 0 {
        return Err(DamdError::malformed(format!(
            "{} unexpected bytes after last record",
            r.remaining()
        )));
    }

    Ok(segments)
}
