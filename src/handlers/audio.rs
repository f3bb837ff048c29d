//! Audio handler
//!
//! Stream properties are read from WAV `fmt `/`data` chunks and from the
//! FLAC STREAMINFO block. Other formats only get a note.

use super::{has_extension, read_host, Extracted, MetadataHandler};
use crate::error::Result;
use crate::segment::Payload;
use serde::Serialize;
use std::path::Path;

const EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "ogg", "m4a"];

#[derive(Debug, Clone, Copy, Default)]
pub struct AudioHandler;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct AudioProperties {
    /// Duration in seconds
    pub length: f64,
    /// Bits per second
    pub bitrate: u64,
    pub sample_rate: u32,
    pub channels: u16,
}

impl MetadataHandler for AudioHandler {
    fn name(&self) -> &'static str {
        "AudioHandler"
    }

    fn can_handle(&self, path: &Path) -> bool {
        has_extension(path, EXTENSIONS)
    }

    fn extract_metadata(&self, path: &Path) -> Result<Extracted> {
        let data = read_host(path)?;
        let mut extracted = Extracted::new();

        let properties = if data.starts_with(b"RIFF") {
            parse_wav(&data)
        } else if data.starts_with(b"fLaC") {
            parse_flac(&data, data.len() as u64)
        } else {
            None
        };

        match properties {
            Some(properties) => {
                extracted.insert(
                    "audio_properties".to_string(),
                    Payload::Text(serde_json::to_string(&properties)?),
                );
            }
            None => {
                extracted.insert(
                    "extraction_note".to_string(),
                    Payload::from(
                        "stream properties unavailable for this format, basic metadata only",
                    ),
                );
            }
        }

        Ok(extracted)
    }
}

fn le_u16(data: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_le_bytes(data.get(at..at + 2)?.try_into().ok()?))
}

fn le_u32(data: &[u8], at: usize) -> Option<u32> {
    Some(u32::from_le_bytes(data.get(at..at + 4)?.try_into().ok()?))
}

pub(crate) fn parse_wav(data: &[u8]) -> Option<AudioProperties> {
    if data.get(8..12)? != b"WAVE" {
        return None;
    }

    let mut format = None;
    let mut data_len = None;
    let mut at = 12;
    while at + 8 <= data.len() {
        let id = &data[at..at + 4];
        let size = le_u32(data, at + 4)? as usize;
        let body = at + 8;
        match id {
            b"fmt " => {
                let channels = le_u16(data, body + 2)?;
                let sample_rate = le_u32(data, body + 4)?;
                let byte_rate = le_u32(data, body + 8)?;
                format = Some((channels, sample_rate, byte_rate));
            }
            b"data" => data_len = Some(size as u64),
            _ => {}
        }
        // Chunks are padded to even sizes
        at = body.checked_add(size)?.checked_add(size & 1)?;
    }

    let (channels, sample_rate, byte_rate) = format?;
    let length = match (data_len, byte_rate) {
        (Some(len), rate) if rate > 0 => len as f64 / f64::from(rate),
        _ => 0.0,
    };

    Some(AudioProperties {
        length,
        bitrate: u64::from(byte_rate) * 8,
        sample_rate,
        channels,
    })
}

/// STREAMINFO is the mandatory first metadata block
pub(crate) fn parse_flac(data: &[u8], file_len: u64) -> Option<AudioProperties> {
    if *data.get(4)? & 0x7F != 0 {
        return None;
    }
    let info = data.get(8..26)?;
    let packed = u64::from_be_bytes(info[10..18].try_into().ok()?);

    let sample_rate = (packed >> 44) as u32;
    let channels = ((packed >> 41) & 0x07) as u16 + 1;
    let total_samples = packed & 0x0F_FFFF_FFFF;

    let length = if sample_rate > 0 {
        total_samples as f64 / f64::from(sample_rate)
    } else {
        0.0
    };
    let bitrate = if length > 0.0 {
        (file_len as f64 * 8.0 / length) as u64
    } else {
        0
    };

    Some(AudioProperties {
        length,
        bitrate,
        sample_rate,
        channels,
    })
}
