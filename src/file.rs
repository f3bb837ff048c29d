//! DamdFile: the binding between a host path and its segment table
//!
//! Mutations are purely in-memory. `load()` and `save()` each open, use and
//! close the file within the call, so no handle outlives an operation.

use crate::compression::{CompressionMethod, DEFAULT_ZSTD_LEVEL};
use crate::container::{self, TRAILER_LEN};
use crate::error::{DamdError, Result};
use crate::segment::{Payload, Segment, SegmentOptions};
use crate::sniff::{detect_content_type, format_size};
use serde::Serialize;
use std::collections::btree_map::{BTreeMap, Entry};
use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Engine configuration for one [`DamdFile`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamdConfig {
    /// Method used when a segment is compressed
    pub method: CompressionMethod,

    /// Zstd compression level
    pub level: i32,

    /// Whether `add_segment` compresses when the caller doesn't say
    pub compress_by_default: bool,
}

impl Default for DamdConfig {
    fn default() -> Self {
        DamdConfig {
            method: CompressionMethod::Zstd,
            level: DEFAULT_ZSTD_LEVEL,
            compress_by_default: true,
        }
    }
}

/// Read-only summary returned by [`DamdFile::get_info`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    pub filepath: PathBuf,
    pub original_size: u64,
    pub segment_count: usize,
    /// Serialized size of the container for the current segments
    pub total_metadata_size: u64,
    pub segments: Vec<String>,
}

impl std::fmt::Display for FileInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "File: {}", self.filepath.display())?;
        writeln!(f, "  Original size: {}", format_size(self.original_size))?;
        writeln!(f, "  Metadata size: {}", format_size(self.total_metadata_size))?;
        write!(f, "  Segments ({}): {}", self.segment_count, self.segments.join(", "))
    }
}

/// One open binding between a filesystem path and its segment table
///
/// # Examples
///
/// ```rust,no_run
/// use damd::{DamdFile, SegmentOptions};
///
/// # fn main() -> damd::Result<()> {
/// let mut file = DamdFile::open("photo.jpg")?;
/// file.add_segment("description", "Sunset over the bay")?;
/// file.add_segment_with(
///     "thumbnail",
///     vec![0xFF, 0xD8, 0xFF],
///     SegmentOptions::new().content_type("image/jpeg").compress(false),
/// )?;
/// file.save()?;
///
/// assert_eq!(file.get_text("description")?.as_deref(), Some("Sunset over the bay"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DamdFile {
    path: PathBuf,
    config: DamdConfig,
    /// Host boundary; `None` until loaded or saved
    original_size: Option<u64>,
    segments: BTreeMap<String, Segment>,
    dirty: bool,
}

impl DamdFile {
    /// Bind to `path` with the default configuration. Nothing is read yet.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self::with_config(path, DamdConfig::default())
    }

    pub fn with_config<P: AsRef<Path>>(path: P, config: DamdConfig) -> Self {
        DamdFile {
            path: path.as_ref().to_path_buf(),
            config,
            original_size: None,
            segments: BTreeMap::new(),
            dirty: false,
        }
    }

    /// Bind to `path` and load it
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = Self::new(path);
        file.load()?;
        Ok(file)
    }

    pub fn builder<P: AsRef<Path>>(path: P) -> DamdFileBuilder {
        DamdFileBuilder::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &DamdConfig {
        &self.config
    }

    /// Byte offset where host content ends (0 before the first load or save)
    pub fn original_size(&self) -> u64 {
        self.original_size.unwrap_or(0)
    }

    /// Whether the host boundary is known
    pub fn is_loaded(&self) -> bool {
        self.original_size.is_some()
    }

    /// Whether segments changed since the last load or save
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Replace in-memory state with what is on disk
    ///
    /// A file without a container is host-only: `original_size` becomes the
    /// file size and the segment table is empty.
    ///
    /// # Errors
    ///
    /// - `FileNotFound` if the path is missing or unreadable
    /// - `MalformedRecord`, `UnsupportedVersion`, `CorruptSegment` or
    ///   `CorruptContainer` if a container is present but damaged
    pub fn load(&mut self) -> Result<()> {
        info!("Loading DAMD segments from {:?}", self.path);

        let bytes = fs::read(&self.path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
                DamdError::FileNotFound(self.path.clone())
            }
            _ => DamdError::Io(e),
        })?;

        match container::decode(&bytes)? {
            Some(decoded) => {
                debug!(
                    "Found container with {} segments at offset {}",
                    decoded.segments.len(),
                    decoded.original_size
                );
                self.original_size = Some(decoded.original_size);
                self.segments = decoded.segments;
            }
            None => {
                debug!("No container in {:?}, treating as host-only", self.path);
                self.original_size = Some(bytes.len() as u64);
                self.segments.clear();
            }
        }
        self.dirty = false;

        Ok(())
    }

    /// Add or replace a segment using the configured compression default
    pub fn add_segment(&mut self, key: &str, data: impl Into<Payload>) -> Result<&Segment> {
        self.add_segment_with(key, data, SegmentOptions::default())
    }

    /// Add or replace a segment
    ///
    /// Re-adding an existing key replaces it. The content type is sniffed
    /// from the key and payload when `options` does not set one.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` before any state changes if the key is invalid.
    pub fn add_segment_with(
        &mut self,
        key: &str,
        data: impl Into<Payload>,
        options: SegmentOptions,
    ) -> Result<&Segment> {
        let payload = data.into();
        let compress = options.compress.unwrap_or(self.config.compress_by_default);
        let method = if compress {
            self.config.method
        } else {
            CompressionMethod::None
        };
        let content_type = options
            .content_type
            .unwrap_or_else(|| detect_content_type(payload.as_bytes(), key).to_string());

        let segment = Segment::create(
            key,
            payload,
            content_type,
            options.metadata,
            method,
            self.config.level,
        )?;
        debug!(
            "Adding segment '{}' ({} bytes, stored {} as {:?})",
            key,
            segment.payload_len(),
            segment.stored_bytes().len(),
            segment.method()
        );

        Ok(self.insert_segment(segment))
    }

    /// Insert a prebuilt segment, replacing any segment with the same key
    pub fn insert_segment(&mut self, segment: Segment) -> &Segment {
        self.dirty = true;
        match self.segments.entry(segment.key().to_string()) {
            Entry::Occupied(mut entry) => {
                entry.insert(segment);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(segment),
        }
    }

    /// Remove a segment, returning whether it was present
    pub fn remove_segment(&mut self, key: &str) -> bool {
        let removed = self.segments.remove(key).is_some();
        if removed {
            debug!("Removed segment '{}'", key);
            self.dirty = true;
        }
        removed
    }

    /// Remove every segment in memory
    pub fn clear(&mut self) {
        if !self.segments.is_empty() {
            self.segments.clear();
            self.dirty = true;
        }
    }

    pub fn get_segment(&self, key: &str) -> Option<&Segment> {
        self.segments.get(key)
    }

    /// Materialized payload as text, `None` if the key is absent
    ///
    /// # Errors
    ///
    /// Returns `InvalidText` if the payload is not UTF-8.
    pub fn get_text(&self, key: &str) -> Result<Option<String>> {
        self.segments.get(key).map(Segment::text).transpose()
    }

    /// Materialized payload bytes, `None` if the key is absent
    pub fn get_data(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.segments.get(key).map(Segment::materialize).transpose()
    }

    /// Segment keys in sorted order
    pub fn list_segments(&self) -> Vec<String> {
        self.segments.keys().cloned().collect()
    }

    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.segments.values()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.segments.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Container bytes for the current segments; empty when there are none
    fn container_bytes(&self) -> Vec<u8> {
        if self.segments.is_empty() {
            Vec::new()
        } else {
            container::encode(&self.segments)
        }
    }

    pub fn get_info(&self) -> FileInfo {
        let total_metadata_size = if self.segments.is_empty() {
            0
        } else {
            container::encoded_len(self.segments.values()) as u64
        };

        FileInfo {
            filepath: self.path.clone(),
            original_size: self.original_size(),
            segment_count: self.segments.len(),
            total_metadata_size,
            segments: self.list_segments(),
        }
    }

    /// Write host bytes followed by the current container
    ///
    /// The new content goes to a temporary file in the same directory which
    /// is synced and then renamed over the target, so readers only ever see
    /// the old or the new file. A missing target is created with an empty
    /// host.
    ///
    /// # Errors
    ///
    /// Returns `HostTruncated` if the host content shrank since it was
    /// loaded, or `Io` if any write step fails. The original file is left
    /// untouched on error.
    pub fn save(&mut self) -> Result<()> {
        let host_len = match self.original_size {
            Some(size) => size,
            None => self.read_host_boundary()?,
        };
        let container = self.container_bytes();

        info!(
            "Saving {} segments to {:?} (host {} bytes, container {} bytes)",
            self.segments.len(),
            self.path,
            host_len,
            container.len()
        );

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut temp = tempfile::Builder::new()
            .prefix(".damd-")
            .suffix(".tmp")
            .tempfile_in(&dir)?;

        let permissions = match File::open(&self.path) {
            Ok(source) => {
                let permissions = source.metadata()?.permissions();
                let copied = io::copy(&mut source.take(host_len), temp.as_file_mut())?;
                if copied != host_len {
                    return Err(DamdError::HostTruncated {
                        expected: host_len,
                        actual: copied,
                    });
                }
                Some(permissions)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound && host_len == 0 => None,
            Err(e) => return Err(DamdError::Io(e)),
        };

        temp.write_all(&container)?;
        temp.as_file().sync_all()?;
        if let Some(permissions) = permissions {
            fs::set_permissions(temp.path(), permissions)?;
        }
        temp.persist(&self.path).map_err(|e| e.error)?;
        sync_directory(&dir)?;

        self.original_size = Some(host_len);
        self.dirty = false;
        Ok(())
    }

    /// Remove all segments and save, leaving only the host bytes
    pub fn strip(&mut self) -> Result<()> {
        self.clear();
        self.save()
    }

    /// Find the host boundary on disk without touching in-memory segments
    ///
    /// A missing file has an empty host.
    fn read_host_boundary(&self) -> Result<u64> {
        match File::open(&self.path) {
            Ok(mut file) => {
                let boundary = host_boundary(&mut file)?;
                debug!("Probed host boundary of {:?}: {}", self.path, boundary);
                Ok(boundary)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(DamdError::Io(e)),
        }
    }
}

/// Length of the host content in an open file, reading only the trailer
pub(crate) fn host_boundary(file: &mut File) -> Result<u64> {
    let file_len = file.metadata()?.len();
    if file_len < TRAILER_LEN as u64 {
        return Ok(file_len);
    }

    let mut tail = [0u8; TRAILER_LEN];
    file.seek(SeekFrom::End(-(TRAILER_LEN as i64)))?;
    file.read_exact(&mut tail)?;

    Ok(container::locate_trailer(&tail, file_len)?.unwrap_or(file_len))
}

#[cfg(unix)]
fn sync_directory(dir: &Path) -> Result<()> {
    File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_directory(_dir: &Path) -> Result<()> {
    Ok(())
}

/// Builder for a [`DamdFile`] with custom configuration
///
/// # Examples
///
/// ```rust,no_run
/// use damd::{CompressionMethod, DamdFile};
///
/// let file = DamdFile::builder("song.wav")
///     .compression(CompressionMethod::Lz4)
///     .compress_by_default(false)
///     .build();
/// assert!(!file.config().compress_by_default);
/// ```
#[derive(Debug, Clone)]
pub struct DamdFileBuilder {
    path: PathBuf,
    config: DamdConfig,
}

impl DamdFileBuilder {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        DamdFileBuilder {
            path: path.as_ref().to_path_buf(),
            config: DamdConfig::default(),
        }
    }

    /// Method used for compressed segments
    pub fn compression(mut self, method: CompressionMethod) -> Self {
        self.config.method = method;
        self
    }

    /// Zstd compression level
    pub fn level(mut self, level: i32) -> Self {
        self.config.level = level;
        self
    }

    pub fn compress_by_default(mut self, compress: bool) -> Self {
        self.config.compress_by_default = compress;
        self
    }

    pub fn build(self) -> DamdFile {
        DamdFile::with_config(self.path, self.config)
    }

    /// Build and load in one step
    pub fn open(self) -> Result<DamdFile> {
        let mut file = self.build();
        file.load()?;
        Ok(file)
    }
}
