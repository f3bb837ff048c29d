//! Video handler: filesystem-level facts only

use super::{has_extension, host_len, Extracted, MetadataHandler};
use crate::error::Result;
use crate::segment::Payload;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::time::SystemTime;

const EXTENSIONS: &[&str] = &["mp4", "avi", "mkv", "webm", "mov", "wmv"];

#[derive(Debug, Clone, Copy, Default)]
pub struct VideoHandler;

#[derive(Debug, Serialize)]
struct FileStat {
    file_size: u64,
    /// Unix seconds; absent where the platform has no birth time
    created: Option<f64>,
    modified: Option<f64>,
}

fn unix_seconds(time: std::io::Result<SystemTime>) -> Option<f64> {
    let time = DateTime::<Utc>::from(time.ok()?);
    Some(time.timestamp_micros() as f64 / 1_000_000.0)
}

impl MetadataHandler for VideoHandler {
    fn name(&self) -> &'static str {
        "VideoHandler"
    }

    fn can_handle(&self, path: &Path) -> bool {
        has_extension(path, EXTENSIONS)
    }

    fn extract_metadata(&self, path: &Path) -> Result<Extracted> {
        let meta = fs::metadata(path)?;
        let stat = FileStat {
            file_size: host_len(path)?,
            created: unix_seconds(meta.created()),
            modified: unix_seconds(meta.modified()),
        };

        let mut extracted = Extracted::new();
        extracted.insert(
            "file_info".to_string(),
            Payload::Text(serde_json::to_string(&stat)?),
        );
        extracted.insert(
            "video_note".to_string(),
            Payload::from("container and codec metadata need a media demuxer"),
        );
        Ok(extracted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DamdError;

    #[test]
    fn test_file_info() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        fs::write(&path, vec![0u8; 1234]).unwrap();

        let extracted = VideoHandler.extract_metadata(&path).unwrap();
        match extracted.get("file_info") {
            Some(Payload::Text(json)) => {
                let value: serde_json::Value = serde_json::from_str(json).unwrap();
                assert_eq!(value["file_size"], 1234);
                let modified = value["modified"].as_f64().unwrap();
                assert!((modified - crate::segment::now_timestamp()).abs() < 600.0);
            }
            other => panic!("expected file_info, got {:?}", other),
        }
        assert!(extracted.contains_key("video_note"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = VideoHandler.extract_metadata(Path::new("/nonexistent/clip.mp4"));
        assert!(matches!(result, Err(DamdError::Io(_))));
    }
}
