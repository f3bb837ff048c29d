//! Image handler
//!
//! Decodes the host image to report its dimensions and pixel mode, keep the
//! raw EXIF block when the format carries one, and store a small JPEG
//! thumbnail.

use super::{has_extension, read_host, Extracted, MetadataHandler};
use crate::error::Result;
use crate::segment::Payload;
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage, ImageDecoder, ImageFormat, ImageReader, ImageResult};
use serde::Serialize;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, warn};

const EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp", "tiff"];

/// Thumbnails fit inside a square of this many pixels
pub const THUMBNAIL_SIZE: u32 = 128;

const THUMBNAIL_QUALITY: u8 = 85;

#[derive(Debug, Clone, Copy, Default)]
pub struct ImageHandler;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub format: &'static str,
    pub mode: &'static str,
}

/// Everything extracted from one decoded image
#[derive(Debug)]
pub(crate) struct Inspected {
    pub info: ImageInfo,
    /// Raw EXIF block (TIFF structure) as stored in the file
    pub exif: Option<Vec<u8>>,
    /// JPEG encoded thumbnail
    pub thumbnail: Vec<u8>,
}

impl MetadataHandler for ImageHandler {
    fn name(&self) -> &'static str {
        "ImageHandler"
    }

    fn can_handle(&self, path: &Path) -> bool {
        has_extension(path, EXTENSIONS)
    }

    fn extract_metadata(&self, path: &Path) -> Result<Extracted> {
        let data = read_host(path)?;
        let mut extracted = Extracted::new();

        match inspect(&data) {
            Ok(inspected) => {
                extracted.insert(
                    "image_info".to_string(),
                    Payload::Text(serde_json::to_string(&inspected.info)?),
                );
                if let Some(exif) = inspected.exif {
                    extracted.insert("exif_data".to_string(), Payload::Binary(exif));
                }
                extracted.insert(
                    "thumbnail".to_string(),
                    Payload::Binary(inspected.thumbnail),
                );
            }
            Err(e) => {
                warn!("Could not read image {:?}: {}", path, e);
                extracted.insert("extraction_error".to_string(), Payload::Text(e.to_string()));
            }
        }

        Ok(extracted)
    }
}

/// Decode `data` and collect header facts, EXIF and a thumbnail
pub(crate) fn inspect(data: &[u8]) -> ImageResult<Inspected> {
    let reader = ImageReader::new(Cursor::new(data)).with_guessed_format()?;
    let format = reader.format();

    let mut decoder = reader.into_decoder()?;
    let (width, height) = decoder.dimensions();
    let mode = mode_name(decoder.color_type());
    let exif = decoder.exif_metadata()?;

    let image = DynamicImage::from_decoder(decoder)?;
    let thumbnail = encode_thumbnail(&image)?;
    debug!(
        "Decoded {}x{} image, thumbnail {} bytes",
        width,
        height,
        thumbnail.len()
    );

    Ok(Inspected {
        info: ImageInfo {
            width,
            height,
            format: format.map(format_name).unwrap_or("UNKNOWN"),
            mode,
        },
        exif,
        thumbnail,
    })
}

/// Shrink to fit `THUMBNAIL_SIZE` (never enlarging) and encode as JPEG
fn encode_thumbnail(image: &DynamicImage) -> ImageResult<Vec<u8>> {
    let rgb = if image.width() > THUMBNAIL_SIZE || image.height() > THUMBNAIL_SIZE {
        image.thumbnail(THUMBNAIL_SIZE, THUMBNAIL_SIZE).to_rgb8()
    } else {
        image.to_rgb8()
    };

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, THUMBNAIL_QUALITY).encode_image(&rgb)?;
    Ok(out)
}

fn format_name(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "PNG",
        ImageFormat::Jpeg => "JPEG",
        ImageFormat::Gif => "GIF",
        ImageFormat::WebP => "WEBP",
        ImageFormat::Bmp => "BMP",
        ImageFormat::Tiff => "TIFF",
        _ => "UNKNOWN",
    }
}

/// Pixel mode in the usual short notation (`L`, `LA`, `RGB`, `RGBA`)
fn mode_name(color: ColorType) -> &'static str {
    match color {
        ColorType::L8 => "L",
        ColorType::L16 => "I;16",
        ColorType::La8 | ColorType::La16 => "LA",
        ColorType::Rgba8 | ColorType::Rgba16 | ColorType::Rgba32F => "RGBA",
        _ => "RGB",
    }
}
