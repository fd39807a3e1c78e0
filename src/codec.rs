use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::TempPath;

use crate::images::ImageKind;

#[derive(Debug)]
pub enum CodecError {
    /// The codec cannot read or write this kind at all.
    Unsupported(ImageKind),
    Decode(String),
    Io(std::io::Error),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::Unsupported(kind) => write!(f, "unsupported image kind {kind:?}"),
            CodecError::Decode(msg) => write!(f, "image decode failed: {msg}"),
            CodecError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for CodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CodecError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CodecError {
    fn from(e: std::io::Error) -> Self {
        CodecError::Io(e)
    }
}

impl From<image::ImageError> for CodecError {
    fn from(e: image::ImageError) -> Self {
        CodecError::Decode(e.to_string())
    }
}

/// An intermediate file written by a codec. Deleted by `release`, or on drop
/// if the owner bails out early.
#[derive(Debug)]
pub struct TempImage {
    path: TempPath,
}

impl TempImage {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Deletes the file now. A failed delete is logged and otherwise ignored.
    pub fn release(self) {
        let shown = self.path.display().to_string();
        if let Err(e) = self.path.close() {
            log::warn!("could not remove temporary image {shown}: {e}");
        } else {
            log::debug!("removed temporary image {shown}");
        }
    }
}

/// Bytes produced by a conversion or repair.
#[derive(Debug)]
pub struct Converted {
    pub bytes: Vec<u8>,
    pub kind: ImageKind,
    pub temp: Option<TempImage>,
}

/// Format conversion and repair for images the sink cannot place as-is.
pub trait ImageCodec {
    fn supports(&self, kind: ImageKind) -> bool;
    fn convert(&self, bytes: &[u8], from: ImageKind, to: ImageKind) -> Result<Converted, CodecError>;
    /// Re-encodes an interlaced PNG as a plain row-major PNG.
    fn deinterlace(&self, bytes: &[u8]) -> Result<Converted, CodecError>;
}

/// Codec backed by the `image` crate. When a cache directory is configured,
/// every output is also written there as a temporary file.
#[derive(Debug, Default)]
pub struct RasterCodec {
    cache_dir: Option<PathBuf>,
}

impl RasterCodec {
    pub fn new(cache_dir: Option<PathBuf>) -> Self {
        Self { cache_dir }
    }

    fn encode(&self, img: &image::DynamicImage, to: ImageKind) -> Result<Converted, CodecError> {
        let format = to.codec_format().ok_or(CodecError::Unsupported(to))?;
        let mut bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bytes), format)?;

        let temp = match &self.cache_dir {
            Some(dir) => {
                let mut file = tempfile::Builder::new()
                    .prefix("topic-pdf-")
                    .suffix(".gal")
                    .tempfile_in(dir)?;
                file.write_all(&bytes)?;
                Some(TempImage {
                    path: file.into_temp_path(),
                })
            }
            None => None,
        };

        Ok(Converted {
            bytes,
            kind: to,
            temp,
        })
    }
}

impl ImageCodec for RasterCodec {
    fn supports(&self, kind: ImageKind) -> bool {
        kind.codec_format().is_some()
    }

    fn convert(&self, bytes: &[u8], from: ImageKind, to: ImageKind) -> Result<Converted, CodecError> {
        let source = from.codec_format().ok_or(CodecError::Unsupported(from))?;
        let img = image::load_from_memory_with_format(bytes, source)?;
        // PNG keeps the alpha channel; JPEG has none.
        let img = match to {
            ImageKind::Jpeg => image::DynamicImage::ImageRgb8(img.to_rgb8()),
            _ => img,
        };
        self.encode(&img, to)
    }

    fn deinterlace(&self, bytes: &[u8]) -> Result<Converted, CodecError> {
        let img = image::load_from_memory_with_format(bytes, image::ImageFormat::Png)?;
        self.encode(&img, ImageKind::Png)
    }
}
