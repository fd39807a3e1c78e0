pub mod grid;
pub mod inline;

use crate::codec::{ImageCodec, TempImage};
use crate::loader::ImageLoader;
use crate::model::ImageFormat;
use crate::sink::ImageData;

/// Height in mm below which an inline image stays on the text line.
pub const SMILEY_THRESHOLD: f32 = 18.0;

/// Thumbnails per row and per page column.
const GRID_ACROSS: f32 = 2.0;
const GRID_DOWN: f32 = 2.0;

/// Byte offset of the interlace method in a PNG file (IHDR data byte 12).
const PNG_INTERLACE_OFFSET: usize = 28;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageKind {
    Jpeg,
    Png,
    Gif,
    Webp,
    Bmp,
}

impl ImageKind {
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(ImageKind::Jpeg),
            "image/png" => Some(ImageKind::Png),
            "image/gif" => Some(ImageKind::Gif),
            "image/webp" => Some(ImageKind::Webp),
            "image/bmp" | "image/x-ms-bmp" => Some(ImageKind::Bmp),
            _ => None,
        }
    }

    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        match image::guess_format(bytes).ok()? {
            image::ImageFormat::Jpeg => Some(ImageKind::Jpeg),
            image::ImageFormat::Png => Some(ImageKind::Png),
            image::ImageFormat::Gif => Some(ImageKind::Gif),
            image::ImageFormat::WebP => Some(ImageKind::Webp),
            image::ImageFormat::Bmp => Some(ImageKind::Bmp),
            _ => None,
        }
    }

    /// The sink format for kinds that can be placed without conversion.
    pub fn native_format(self) -> Option<ImageFormat> {
        match self {
            ImageKind::Jpeg => Some(ImageFormat::Jpeg),
            ImageKind::Png => Some(ImageFormat::Png),
            ImageKind::Gif => Some(ImageFormat::Gif),
            ImageKind::Webp | ImageKind::Bmp => None,
        }
    }

    pub(crate) fn codec_format(self) -> Option<image::ImageFormat> {
        match self {
            ImageKind::Jpeg => Some(image::ImageFormat::Jpeg),
            ImageKind::Png => Some(image::ImageFormat::Png),
            ImageKind::Gif => Some(image::ImageFormat::Gif),
            ImageKind::Webp => Some(image::ImageFormat::WebP),
            ImageKind::Bmp => Some(image::ImageFormat::Bmp),
        }
    }
}

/// Image bytes as fetched, before normalization.
#[derive(Debug)]
pub struct RawImage {
    pub source: String,
    pub bytes: Vec<u8>,
    pub kind: Option<ImageKind>,
    pub width: u32,
    pub height: u32,
}

/// A normalized image ready for one placement call.
#[derive(Debug)]
pub struct ImageDescriptor {
    pub source: String,
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
    /// Intermediate file left by the codec, deleted once the image is placed.
    pub temp: Option<TempImage>,
}

impl ImageDescriptor {
    pub fn data(&self) -> ImageData<'_> {
        ImageData {
            bytes: &self.bytes,
            format: self.format,
            pixel_width: self.width,
            pixel_height: self.height,
        }
    }

    /// Drops the bytes and deletes any intermediate file.
    pub fn release(self) {
        if let Some(temp) = self.temp {
            temp.release();
        }
    }
}

pub fn is_interlaced_png(bytes: &[u8]) -> bool {
    bytes
        .get(PNG_INTERLACE_OFFSET)
        .is_some_and(|&flag| flag != 0)
}

/// Turns fetched bytes into something the sink can place: unknown kinds are
/// rejected, WEBP/BMP are converted to PNG, interlaced PNGs are repaired when
/// possible. Returns `None` for unsupported content.
pub fn normalize(raw: RawImage, codec: &dyn ImageCodec) -> Option<ImageDescriptor> {
    let Some(kind) = raw.kind else {
        log::debug!("unsupported image type: {}", raw.source);
        return None;
    };

    let mut bytes = raw.bytes;
    let mut temp = None;
    let mut kind = kind;

    if matches!(kind, ImageKind::Webp | ImageKind::Bmp) {
        if !codec.supports(kind) {
            log::debug!("no codec for {kind:?}: {}", raw.source);
            return None;
        }
        match codec.convert(&bytes, kind, ImageKind::Png) {
            Ok(converted) => {
                bytes = converted.bytes;
                kind = converted.kind;
                temp = converted.temp;
            }
            Err(e) => {
                log::warn!("could not convert {} to PNG: {e}", raw.source);
                return None;
            }
        }
    }

    if kind == ImageKind::Png && is_interlaced_png(&bytes) {
        match codec.deinterlace(&bytes) {
            Ok(repaired) => {
                bytes = repaired.bytes;
                if let Some(old) = temp.take() {
                    old.release();
                }
                temp = repaired.temp;
            }
            Err(e) => log::warn!("keeping interlaced PNG {}: {e}", raw.source),
        }
    }

    let format = kind.native_format()?;
    Some(ImageDescriptor {
        source: raw.source,
        bytes,
        width: raw.width,
        height: raw.height,
        format,
        temp,
    })
}

/// Pixels to mm at 96 dpi.
pub fn px_to_mm(px: u32) -> f32 {
    px as f32 * 25.4 / 96.0
}

/// Fits an image into one cell of a 2×2 grid over the given area. Never
/// upscales; results are whole mm.
pub fn scale_to_grid(px_width: u32, px_height: u32, area_width: f32, area_height: f32) -> (f32, f32) {
    let width = px_to_mm(px_width).trunc();
    let height = px_to_mm(px_height).trunc();
    if width <= 0.0 || height <= 0.0 {
        return (width.max(0.0), height.max(0.0));
    }

    let gap = (GRID_ACROSS - 1.0) * 2.0;
    let max_width = (area_width / GRID_ACROSS - gap).floor().max(1.0);
    let max_height = (area_height / GRID_DOWN - gap).floor().max(1.0);

    let (mut w, mut h) = if width > max_width && width >= height {
        (max_width, max_width / width * height)
    } else if height > max_height && height >= width {
        (max_height / height * width, max_height)
    } else {
        (width, height)
    };

    // The dominant side may fit while the other still overflows its cell.
    if w > max_width || h > max_height {
        let ratio = (max_width / w).min(max_height / h);
        w *= ratio;
        h *= ratio;
    }

    (w.floor(), h.floor())
}

/// Row packing state for the attachment grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlacementGrid {
    pub row_width_used: f32,
    pub row_height: f32,
    pub columns_target: u32,
    pub rows_target: u32,
}

impl Default for PlacementGrid {
    fn default() -> Self {
        Self {
            row_width_used: 0.0,
            row_height: 0.0,
            columns_target: GRID_ACROSS as u32,
            rows_target: GRID_DOWN as u32,
        }
    }
}

impl PlacementGrid {
    /// Starts a new row whose first image is `width` wide.
    pub fn start_row(&mut self, width: f32) {
        self.row_height = 0.0;
        self.row_width_used = width;
    }
}

/// The collaborators image placement needs.
pub struct ImagePlacer<'a> {
    pub loader: &'a dyn ImageLoader,
    pub codec: &'a dyn ImageCodec,
}
