//! File type handlers
//!
//! A handler decides which metadata to extract from a host file and hands
//! the resulting key/payload pairs to a [`DamdFile`]. Handlers are looked up
//! through a [`HandlerRegistry`], first match wins.

mod audio;
mod image;
mod text;
mod video;

pub use audio::AudioHandler;
pub use self::image::ImageHandler;
pub use text::TextHandler;
pub use video::VideoHandler;

use crate::container;
use crate::error::Result;
use crate::file::{host_boundary, DamdFile};
use crate::segment::{now_timestamp, Payload, SegmentOptions};
use crate::sniff::detect_content_type;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::Path;
use tracing::debug;

/// Metadata extracted from one host file, keyed by segment key
pub type Extracted = BTreeMap<String, Payload>;

/// Capability interface for per-file-type metadata extraction
pub trait MetadataHandler: Send + Sync {
    /// Display name, also used to deduplicate registrations
    fn name(&self) -> &'static str;

    /// Whether this handler understands `path`
    fn can_handle(&self, path: &Path) -> bool;

    /// Extract metadata from `path`
    ///
    /// Content the handler cannot interpret is reported as an
    /// `extraction_error` entry; I/O failures are returned as errors.
    fn extract_metadata(&self, path: &Path) -> Result<Extracted>;

    /// Extract metadata and add it to `file`, returning the segment count
    fn process_file(&self, path: &Path, file: &mut DamdFile) -> Result<usize> {
        let extracted = self.extract_metadata(path)?;
        let extracted_at = now_timestamp().to_string();

        for (key, value) in &extracted {
            let options = SegmentOptions::new()
                .content_type(detect_content_type(value.as_bytes(), ""))
                .metadata("extracted_at", extracted_at.as_str())
                .metadata("handler", self.name());
            file.add_segment_with(key, value.clone(), options)?;
        }

        debug!(
            "{} added {} segments for {:?}",
            self.name(),
            extracted.len(),
            path
        );
        Ok(extracted.len())
    }
}

/// Case-insensitive extension check
pub(crate) fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            extensions.iter().any(|candidate| *candidate == ext)
        })
        .unwrap_or(false)
}

/// Host content of `path`, without any container already appended to it
pub(crate) fn read_host(path: &Path) -> Result<Vec<u8>> {
    let mut bytes = fs::read(path)?;
    if let Some(boundary) = container::locate(&bytes)? {
        bytes.truncate(boundary as usize);
    }
    Ok(bytes)
}

/// Host length of `path`, reading only its trailer
pub(crate) fn host_len(path: &Path) -> Result<u64> {
    host_boundary(&mut File::open(path)?)
}

/// Ordered set of handlers with first-match dispatch
pub struct HandlerRegistry {
    handlers: Vec<Box<dyn MetadataHandler>>,
}

impl HandlerRegistry {
    /// Registry with no handlers
    pub fn empty() -> Self {
        HandlerRegistry {
            handlers: Vec::new(),
        }
    }

    /// Append a handler; returns false if one with the same name exists
    pub fn register(&mut self, handler: Box<dyn MetadataHandler>) -> bool {
        if self.handlers.iter().any(|h| h.name() == handler.name()) {
            return false;
        }
        self.handlers.push(handler);
        true
    }

    /// First handler that can handle `path`
    pub fn get_handler(&self, path: &Path) -> Option<&dyn MetadataHandler> {
        self.handlers
            .iter()
            .find(|h| h.can_handle(path))
            .map(|h| h.as_ref())
    }

    pub fn list_handlers(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    /// Run the matching handler, if any, against `file`
    pub fn process(&self, path: &Path, file: &mut DamdFile) -> Result<Option<usize>> {
        match self.get_handler(path) {
            Some(handler) => handler.process_file(path, file).map(Some),
            None => Ok(None),
        }
    }
}

impl Default for HandlerRegistry {
    /// Built-in handlers: image, text, audio, video
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(ImageHandler));
        registry.register(Box::new(TextHandler));
        registry.register(Box::new(AudioHandler));
        registry.register(Box::new(VideoHandler));
        registry
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.list_handlers())
            .finish()
    }
}
