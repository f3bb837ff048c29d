//! # DAMD - Data As Metadata in Data
//!
//! `damd` embeds small named metadata records inside arbitrary host files.
//! The records live in one container block appended after the host's own
//! bytes, so the host content stays byte-identical and tools that ignore
//! trailing data keep working.
//!
//! - **Host preservation**: the original bytes are never rewritten
//! - **Integrity**: every payload carries a SHA-256 checksum, the container a CRC32
//! - **Optional compression**: Zstd or LZ4 per segment, chosen by the caller
//! - **Atomic saves**: temp file in the same directory, then rename
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use damd::{DamdFile, Result};
//!
//! # fn main() -> Result<()> {
//! let mut file = DamdFile::open("report.pdf")?;
//!
//! file.add_segment("summary", "Quarterly numbers, final revision")?;
//! file.add_segment("checksum_map", vec![0x00, 0x01, 0xFF])?;
//! file.save()?;
//!
//! let reopened = DamdFile::open("report.pdf")?;
//! assert_eq!(
//!     reopened.get_text("summary")?.as_deref(),
//!     Some("Quarterly numbers, final revision")
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Handlers
//!
//! ```rust,no_run
//! use damd::{DamdFile, HandlerRegistry};
//! use std::path::Path;
//!
//! # fn main() -> damd::Result<()> {
//! let registry = HandlerRegistry::default();
//! let path = Path::new("holiday.png");
//!
//! let mut file = DamdFile::open(path)?;
//! if let Some(count) = registry.process(path, &mut file)? {
//!     println!("extracted {} segments", count);
//!     file.save()?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod checksum;
pub mod compression;
pub mod container;
pub mod error;
pub mod file;
pub mod handlers;
pub mod segment;
pub mod sniff;
pub mod validation;

mod wire;

pub use crate::compression::CompressionMethod;
pub use crate::error::{DamdError, ErrorKind, Result};
pub use crate::file::{DamdConfig, DamdFile, DamdFileBuilder, FileInfo};
pub use crate::handlers::{
    AudioHandler, HandlerRegistry, ImageHandler, MetadataHandler, TextHandler, VideoHandler,
};
pub use crate::segment::{Payload, PayloadKind, Segment, SegmentOptions};
pub use crate::validation::SegmentKey;
