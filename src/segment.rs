//! Segment: one named metadata record
//!
//! A segment keeps its payload in stored form (possibly compressed) together
//! with the SHA-256 checksum of the logical payload. Materializing a segment
//! decompresses the stored bytes and verifies them against that checksum.
//!
//! # Record layout
//!
//! ```text
//! key            str16
//! content_type   str32
//! method         u8     (CompressionMethod)
//! kind           u8     (PayloadKind)
//! checksum       str16  (64 lowercase hex chars)
//! timestamp      f64
//! payload_len    u64
//! meta_count     u32, then meta_count x (str32 key, str32 value)
//! stored         u64 length + bytes
//! ```

use crate::checksum::{self, CHECKSUM_HEX_LEN};
use crate::compression::{self, CompressionMethod};
use crate::error::{DamdError, Result};
use crate::validation::SegmentKey;
use crate::wire::{Reader, Writer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Whether a payload originated as text or as raw bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum PayloadKind {
    Binary = 0,
    Text = 1,
}

impl PayloadKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(PayloadKind::Binary),
            1 => Some(PayloadKind::Text),
            _ => None,
        }
    }
}

/// Data handed to [`crate::DamdFile::add_segment`]
///
/// Text is stored as its UTF-8 bytes and comes back as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Binary(Vec<u8>),
}

impl Payload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::Text(_) => PayloadKind::Text,
            Payload::Binary(_) => PayloadKind::Binary,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Payload::Text(text) => text.as_bytes(),
            Payload::Binary(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Binary(bytes)
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Payload::Binary(bytes.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for Payload {
    fn from(bytes: &[u8; N]) -> Self {
        Payload::Binary(bytes.to_vec())
    }
}

/// Optional settings for a single `add_segment` call
#[derive(Debug, Clone, Default)]
pub struct SegmentOptions {
    /// Content type; sniffed from the key and payload when absent
    pub content_type: Option<String>,

    /// Free-form sidecar attributes
    pub metadata: BTreeMap<String, String>,

    /// Compress this segment; falls back to the file's configured default
    pub compress: Option<bool>,
}

impl SegmentOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn compress(mut self, compress: bool) -> Self {
        self.compress = Some(compress);
        self
    }
}

/// Current time as fractional Unix seconds
pub fn now_timestamp() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// One named, typed, optionally-compressed metadata record
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    key: String,
    content_type: String,
    kind: PayloadKind,
    method: CompressionMethod,
    payload_len: u64,
    stored: Vec<u8>,
    checksum: String,
    timestamp: f64,
    metadata: BTreeMap<String, String>,
}

impl Segment {
    /// Create a segment from a payload
    ///
    /// Validates the key, checksums the logical payload and compresses it
    /// with `method` (use [`CompressionMethod::None`] to store it as-is).
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` if the key fails validation, or `Compression`
    /// if the compressor fails.
    pub fn create(
        key: &str,
        payload: Payload,
        content_type: impl Into<String>,
        metadata: BTreeMap<String, String>,
        method: CompressionMethod,
        level: i32,
    ) -> Result<Self> {
        let key = SegmentKey::new(key)?.into_string();
        let kind = payload.kind();
        let payload_len = payload.len() as u64;
        let checksum = checksum::calculate(payload.as_bytes());
        let stored = match method {
            CompressionMethod::None => match payload {
                Payload::Text(text) => text.into_bytes(),
                Payload::Binary(bytes) => bytes,
            },
            _ => compression::compress(payload.as_bytes(), method, level)?,
        };

        Ok(Segment {
            key,
            content_type: content_type.into(),
            kind,
            method,
            payload_len,
            stored,
            checksum,
            timestamp: now_timestamp(),
            metadata,
        })
    }

    /// Override the creation timestamp
    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn kind(&self) -> PayloadKind {
        self.kind
    }

    pub fn method(&self) -> CompressionMethod {
        self.method
    }

    /// Whether the stored bytes are a compressed form of the payload
    pub fn compressed(&self) -> bool {
        self.method.is_compressed()
    }

    /// Length of the logical payload
    pub fn payload_len(&self) -> u64 {
        self.payload_len
    }

    /// Bytes as persisted in the container
    pub fn stored_bytes(&self) -> &[u8] {
        &self.stored
    }

    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// Recover the logical payload
    ///
    /// # Errors
    ///
    /// Returns `CorruptSegment` if the recovered bytes do not match the
    /// stored checksum, or `Compression` if the stored bytes cannot be
    /// decompressed or would expand past the recorded payload length.
    pub fn materialize(&self) -> Result<Vec<u8>> {
        let payload = compression::decompress(&self.stored, self.method, self.payload_len)?;
        let actual = checksum::calculate(&payload);
        if actual != self.checksum || payload.len() as u64 != self.payload_len {
            return Err(DamdError::CorruptSegment {
                key: self.key.clone(),
                expected: self.checksum.clone(),
                actual,
            });
        }
        Ok(payload)
    }

    /// Materialize and decode the payload as UTF-8 text
    ///
    /// Works for binary-origin segments too, as long as the bytes are valid UTF-8.
    pub fn text(&self) -> Result<String> {
        let payload = self.materialize()?;
        String::from_utf8(payload).map_err(|_| DamdError::InvalidText(self.key.clone()))
    }

    /// Materialize the payload back into its original form
    pub fn payload(&self) -> Result<Payload> {
        match self.kind {
            PayloadKind::Text => self.text().map(Payload::Text),
            PayloadKind::Binary => self.materialize().map(Payload::Binary),
        }
    }

    /// Append this segment's record to `w`
    pub(crate) fn encode(&self, w: &mut Writer) {
        w.put_str16(&self.key);
        w.put_str32(&self.content_type);
        w.put_u8(self.method as u8);
        w.put_u8(self.kind as u8);
        w.put_str16(&self.checksum);
        w.put_f64(self.timestamp);
        w.put_u64(self.payload_len);
        w.put_u32(self.metadata.len() as u32);
        for (key, value) in &self.metadata {
            w.put_str32(key);
            w.put_str32(value);
        }
        w.put_blob(&self.stored);
    }

    /// Serialized size of this segment's record
    pub fn encoded_len(&self) -> usize {
        let metadata: usize = self
            .metadata
            .iter()
            .map(|(k, v)| 4 + k.len() + 4 + v.len())
            .sum();
        (2 + self.key.len())
            + (4 + self.content_type.len())
            + 1
            + 1
            + (2 + self.checksum.len())
            + 8
            + 8
            + 4
            + metadata
            + (8 + self.stored.len())
    }

    /// Decode one record from `r`
    ///
    /// The checksum is not verified here; see [`Segment::materialize`].
    pub(crate) fn decode(r: &mut Reader<'_>) -> Result<Self> {
        let key = r.str16("segment key")?;
        if SegmentKey::new(key.as_str()).is_err() {
            return Err(DamdError::malformed(format!("invalid stored key '{}'", key)));
        }

        let content_type = r.str32("content type")?;

        let method_byte = r.u8("compression method")?;
        let method = CompressionMethod::from_u8(method_byte).ok_or_else(|| {
            DamdError::malformed(format!(
                "segment '{}': unknown compression method {}",
                key, method_byte
            ))
        })?;

        let kind_byte = r.u8("payload kind")?;
        let kind = PayloadKind::from_u8(kind_byte).ok_or_else(|| {
            DamdError::malformed(format!(
                "segment '{}': unknown payload kind {}",
                key, kind_byte
            ))
        })?;

        let checksum = r.str16("checksum")?;
        if checksum.len() != CHECKSUM_HEX_LEN
            || !checksum.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
        {
            return Err(DamdError::malformed(format!(
                "segment '{}': checksum is not a sha256 hex digest",
                key
            )));
        }

        let timestamp = r.f64("timestamp")?;
        let payload_len = r.u64("payload length")?;

        let meta_count = r.u32("metadata count")?;
        let mut metadata = BTreeMap::new();
        for _ in 0..meta_count {
            let meta_key = r.str32("metadata key")?;
            let meta_value = r.str32("metadata value")?;
            metadata.insert(meta_key, meta_value);
        }

        let stored = r.blob("stored bytes")?.to_vec();

        Ok(Segment {
            key,
            content_type,
            kind,
            method,
            payload_len,
            stored,
            checksum,
            timestamp,
            metadata,
        })
    }
}
