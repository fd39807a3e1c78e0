#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Cursor;

use topic_pdf::codec::{CodecError, Converted, ImageCodec};
use topic_pdf::images::{ImageKind, ImagePlacer};
use topic_pdf::layout::Pager;
use topic_pdf::loader::{ImageLoader, LoadedImage};
use topic_pdf::model::{Attachment, PageGeometry, PageSize, Post, Topic};
use topic_pdf::sink::RecordingSink;

pub const EPS: f32 = 0.01;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPS
}

pub fn encode(width: u32, height: u32, format: image::ImageFormat) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 7) as u8, (y * 13) as u8, 90])
    });
    let mut out = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut out), format)
        .expect("encode test image");
    out
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, image::ImageFormat::Png)
}

/// Loader over an in-memory table. Entries can claim any pixel size, so
/// large images don't have to be encoded for real.
#[derive(Default)]
pub struct MemoryLoader {
    images: HashMap<String, LoadedImage>,
    pub requests: RefCell<Vec<String>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, reference: &str, kind: ImageKind, width: u32, height: u32) -> Self {
        self.images.insert(
            reference.to_string(),
            LoadedImage {
                bytes: png(4, 4),
                width,
                height,
                kind: Some(kind),
            },
        );
        self
    }

    pub fn with_unknown(mut self, reference: &str) -> Self {
        self.images.insert(
            reference.to_string(),
            LoadedImage {
                bytes: b"not an image".to_vec(),
                width: 10,
                height: 10,
                kind: None,
            },
        );
        self
    }
}

impl ImageLoader for MemoryLoader {
    fn fetch(&self, reference: &str) -> Option<LoadedImage> {
        self.requests.borrow_mut().push(reference.to_string());
        self.images.get(reference).cloned()
    }
}

/// Codec double that records what it was asked to do.
#[derive(Default)]
pub struct StubCodec {
    pub no_webp: bool,
    pub fail_convert: bool,
    pub fail_deinterlace: bool,
    pub calls: RefCell<Vec<String>>,
}

impl ImageCodec for StubCodec {
    fn supports(&self, kind: ImageKind) -> bool {
        !(self.no_webp && kind == ImageKind::Webp)
    }

    fn convert(&self, _bytes: &[u8], from: ImageKind, to: ImageKind) -> Result<Converted, CodecError> {
        self.calls.borrow_mut().push(format!("convert {from:?} -> {to:?}"));
        if self.fail_convert {
            return Err(CodecError::Decode("stub".to_string()));
        }
        Ok(Converted {
            bytes: b"converted".to_vec(),
            kind: to,
            temp: None,
        })
    }

    fn deinterlace(&self, _bytes: &[u8]) -> Result<Converted, CodecError> {
        self.calls.borrow_mut().push("deinterlace".to_string());
        if self.fail_deinterlace {
            return Err(CodecError::Decode("stub".to_string()));
        }
        Ok(Converted {
            bytes: b"deinterlaced".to_vec(),
            kind: ImageKind::Png,
            temp: None,
        })
    }
}

pub fn placer<'a>(loader: &'a MemoryLoader, codec: &'a StubCodec) -> ImagePlacer<'a> {
    ImagePlacer { loader, codec }
}

/// Letter portrait, 15 mm margins: content area 185.9 × ~254.4 mm.
pub fn letter() -> PageGeometry {
    PageGeometry::default()
}

/// 180 mm wide page: 150 mm of content between the margins.
pub fn narrow_page() -> PageGeometry {
    PageGeometry {
        size: PageSize::Custom {
            width: 180.0,
            height: 250.0,
        },
        ..PageGeometry::default()
    }
}

/// A pager on a fresh first page with no header or footer.
pub fn bare_pager(geometry: &PageGeometry) -> Pager<RecordingSink> {
    let mut pager = Pager::new(RecordingSink::new(), geometry, None);
    pager.begin_document();
    pager
}

pub fn attachment(id: u32, file: &str, mime: &str, width: u32, height: u32) -> Attachment {
    Attachment {
        id,
        width,
        height,
        mime_type: mime.to_string(),
        file: file.to_string(),
    }
}

pub fn post(id: u32, body: &str, attachments: Vec<Attachment>) -> Post {
    Post {
        id,
        subject: format!("Re: post {id}"),
        author: "Alice".to_string(),
        time: "March 3, 2024, 10:15:00 am".to_string(),
        body: body.to_string(),
        attachments,
    }
}

pub fn topic(posts: Vec<Post>) -> Topic {
    Topic {
        forum_name: "Tinkerers".to_string(),
        category_name: "Workshop".to_string(),
        parent_boards: vec!["Metal".to_string()],
        board_name: "Lathes".to_string(),
        subject: "Chuck &amp; collet advice".to_string(),
        poster_name: "Alice".to_string(),
        post_time: "March 3, 2024".to_string(),
        topic_url: "https://forum.example/index.php?topic=42.0".to_string(),
        poll: None,
        posts,
    }
}
