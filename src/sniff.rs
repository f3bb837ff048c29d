//! Content type detection and size formatting

/// Fallback content type for unrecognized binary data
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Detect a MIME-like content type from a filename hint and the data itself
///
/// The filename extension wins when it is known. Otherwise the leading bytes
/// are checked for common signatures, and valid UTF-8 falls back to
/// `text/plain`.
pub fn detect_content_type(data: &[u8], filename: &str) -> &'static str {
    if let Some(content_type) = content_type_for_filename(filename) {
        return content_type;
    }

    if data.starts_with(b"\x89PNG") {
        "image/png"
    } else if data.starts_with(b"\xff\xd8\xff") {
        "image/jpeg"
    } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        "image/gif"
    } else if data.starts_with(b"RIFF") && data.len() >= 12 && &data[8..12] == b"WEBP" {
        "image/webp"
    } else if data.starts_with(b"%PDF") {
        "application/pdf"
    } else if data.starts_with(b"PK") {
        "application/zip"
    } else if std::str::from_utf8(data).is_ok() {
        "text/plain"
    } else {
        OCTET_STREAM
    }
}

/// Look up a content type from a filename extension
pub fn content_type_for_filename(filename: &str) -> Option<&'static str> {
    let (_, ext) = filename.rsplit_once('.')?;
    let content_type = match ext.to_ascii_lowercase().as_str() {
        "txt" => "text/plain",
        "json" => "application/json",
        "xml" => "application/xml",
        "html" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        _ => return None,
    };
    Some(content_type)
}

/// Format a byte count in human readable form (e.g. `1.5KB`)
pub fn format_size(size_bytes: u64) -> String {
    if size_bytes == 0 {
        return "0B".to_string();
    }

    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = size_bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    format!("{:.1}{}", size, UNITS[unit])
}
