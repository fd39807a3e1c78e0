use std::io::Cursor;
use std::path::PathBuf;

use pdf_writer::{Content, Filter, Name, Pdf, Rect, Ref, Str, TextStr};

use crate::error::Error;
use crate::fonts::FontBook;
use crate::layout::PAGE_COUNT_ALIAS;
use crate::model::{ImageFormat, PageGeometry, Rgb};
use crate::sink::{ImageData, PT_PER_MM, RectStyle, RenderSink};
use crate::style::FontStyle;

/// Stroke width for rules and quote boxes, in mm.
const LINE_WIDTH: f32 = 0.1;

/// Document information dictionary entries.
#[derive(Clone, Debug, Default)]
pub struct DocumentInfo {
    pub title: String,
    pub author: String,
    pub subject: String,
}

enum PageOp {
    Text {
        font: usize,
        size: f32,
        color: Rgb,
        underline: bool,
        page_total: bool,
        x: f32,
        y: f32,
        text: String,
    },
    Line {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
    },
    Rect {
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        style: RectStyle,
        fill: Rgb,
    },
    Image {
        name: String,
        x: f32,
        y: f32,
        w: f32,
        h: f32,
    },
}

struct LinkAnnotation {
    rect: Rect,
    url: String,
}

#[derive(Default)]
struct PageBuffer {
    ops: Vec<PageOp>,
    images: Vec<(String, Ref)>,
    links: Vec<LinkAnnotation>,
}

fn alloc(next_id: &mut i32) -> Ref {
    let r = Ref::new(*next_id);
    *next_id += 1;
    r
}

fn rgb_f32([r, g, b]: Rgb) -> (f32, f32, f32) {
    (r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0)
}

/// Writes an image XObject at `xobj_ref`. JPEG bytes pass through as
/// DCTDecode; PNG and GIF are decoded and re-compressed, with an SMask when
/// any pixel is not opaque.
fn embed_image(pdf: &mut Pdf, next_id: &mut i32, xobj_ref: Ref, image: &ImageData<'_>) -> Result<(), image::ImageError> {
    if image.format == ImageFormat::Jpeg {
        use image::ImageDecoder;
        let decoder = image::codecs::jpeg::JpegDecoder::new(Cursor::new(image.bytes))?;
        let (w, h) = decoder.dimensions();
        let gray = decoder.color_type() == image::ColorType::L8;
        let mut xobj = pdf.image_xobject(xobj_ref, image.bytes);
        xobj.filter(Filter::DctDecode);
        xobj.width(w as i32);
        xobj.height(h as i32);
        if gray {
            xobj.color_space().device_gray();
        } else {
            xobj.color_space().device_rgb();
        }
        xobj.bits_per_component(8);
        return Ok(());
    }

    let format = match image.format {
        ImageFormat::Gif => image::ImageFormat::Gif,
        _ => image::ImageFormat::Png,
    };
    let rgba = image::load_from_memory_with_format(image.bytes, format)?.to_rgba8();
    let (w, h) = (rgba.width(), rgba.height());
    let has_alpha = rgba.pixels().any(|p| p.0[3] < 255);

    let rgb_data: Vec<u8> = rgba.pixels().flat_map(|p| [p.0[0], p.0[1], p.0[2]]).collect();
    let compressed_rgb = miniz_oxide::deflate::compress_to_vec_zlib(&rgb_data, 6);

    let smask_ref = has_alpha.then(|| {
        let alpha_data: Vec<u8> = rgba.pixels().map(|p| p.0[3]).collect();
        let compressed_alpha = miniz_oxide::deflate::compress_to_vec_zlib(&alpha_data, 6);
        let mask_ref = alloc(next_id);
        let mut mask = pdf.image_xobject(mask_ref, &compressed_alpha);
        mask.filter(Filter::FlateDecode);
        mask.width(w as i32);
        mask.height(h as i32);
        mask.color_space().device_gray();
        mask.bits_per_component(8);
        mask_ref
    });

    let mut xobj = pdf.image_xobject(xobj_ref, &compressed_rgb);
    xobj.filter(Filter::FlateDecode);
    xobj.width(w as i32);
    xobj.height(h as i32);
    xobj.color_space().device_rgb();
    xobj.bits_per_component(8);
    if let Some(mask_ref) = smask_ref {
        xobj.s_mask(mask_ref);
    }
    Ok(())
}

/// A `RenderSink` that produces a PDF. Drawing calls are buffered per page
/// and written out by [`PdfSink::finish`], once the page count and the set
/// of glyphs in use are known. Images are written as soon as they are placed.
pub struct PdfSink {
    pdf: Pdf,
    next_id: i32,
    fonts: FontBook,
    font: Option<usize>,
    style: FontStyle,
    size: f32,
    text_color: Rgb,
    fill_color: Rgb,
    pages: Vec<PageBuffer>,
    image_count: usize,
    page_width: f32,
    page_height: f32,
    info: DocumentInfo,
}

impl PdfSink {
    pub fn new(geometry: &PageGeometry, font_dirs: &[PathBuf], info: DocumentInfo) -> Self {
        let (page_width, page_height) = geometry.page_dimensions();
        Self {
            pdf: Pdf::new(),
            next_id: 1,
            fonts: FontBook::new(font_dirs),
            font: None,
            style: FontStyle::REGULAR,
            size: geometry.font_size,
            text_color: [0, 0, 0],
            fill_color: [0, 0, 0],
            pages: Vec::new(),
            image_count: 0,
            page_width,
            page_height,
            info,
        }
    }

    fn current_page(&mut self) -> &mut PageBuffer {
        if self.pages.is_empty() {
            self.pages.push(PageBuffer::default());
        }
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    fn pt_x(&self, x: f32) -> f32 {
        x * PT_PER_MM
    }

    /// Top-down mm to PDF user space (bottom-up points).
    fn pt_y(&self, y: f32) -> f32 {
        (self.page_height - y) * PT_PER_MM
    }

    fn push_text(&mut self, x: f32, y: f32, text: &str, page_total: bool) {
        let Some(font) = self.font else {
            log::warn!("text drawn before any font was set: {text:?}");
            return;
        };
        self.fonts.note_used(font, text);
        if page_total {
            self.fonts.note_used(font, "0123456789");
        }
        let op = PageOp::Text {
            font,
            size: self.size,
            color: self.text_color,
            underline: self.style.underline,
            page_total,
            x,
            y,
            text: text.to_string(),
        };
        self.current_page().ops.push(op);
    }

    pub fn finish(self) -> Result<Vec<u8>, Error> {
        let t0 = std::time::Instant::now();
        let PdfSink {
            mut pdf,
            mut next_id,
            fonts,
            mut pages,
            page_width,
            page_height,
            info,
            ..
        } = self;

        if pages.is_empty() {
            pages.push(PageBuffer::default());
        }

        let catalog_id = alloc(&mut next_id);
        let pages_id = alloc(&mut next_id);
        let info_id = alloc(&mut next_id);

        let embedded = fonts.embed(&mut pdf, &mut || alloc(&mut next_id));
        let t_fonts = t0.elapsed();

        let total = pages.len().to_string();
        let to_x = |x: f32| x * PT_PER_MM;
        let to_y = |y: f32| (page_height - y) * PT_PER_MM;

        let mut page_ids = Vec::with_capacity(pages.len());
        for page in &pages {
            let page_id = alloc(&mut next_id);
            let content_id = alloc(&mut next_id);
            page_ids.push(page_id);

            let mut content = Content::new();
            content.set_line_width(LINE_WIDTH * PT_PER_MM);
            content.set_stroke_rgb(0.0, 0.0, 0.0);
            let mut current_fill: Option<Rgb> = None;
            let mut set_fill = |content: &mut Content, color: Rgb| {
                if current_fill != Some(color) {
                    let (r, g, b) = rgb_f32(color);
                    content.set_fill_rgb(r, g, b);
                    current_fill = Some(color);
                }
            };

            for op in &page.ops {
                match op {
                    PageOp::Text {
                        font,
                        size,
                        color,
                        underline,
                        page_total,
                        x,
                        y,
                        text,
                    } => {
                        let Some(entry) = embedded.get(*font) else {
                            continue;
                        };
                        let text = if *page_total {
                            text.replace(PAGE_COUNT_ALIAS, &total)
                        } else {
                            text.clone()
                        };
                        set_fill(&mut content, *color);
                        content.begin_text();
                        content.set_font(Name(entry.pdf_name.as_bytes()), *size);
                        content.next_line(to_x(*x), to_y(*y));
                        content.show(Str(&entry.encode(&text)));
                        content.end_text();
                        if *underline {
                            let width = fonts.get(*font).text_width(&text, *size);
                            let thick = (size * 0.05).max(0.5);
                            let ul_y = to_y(*y) - size * 0.12;
                            content.rect(to_x(*x), ul_y - thick, width, thick);
                            content.fill_nonzero();
                        }
                    }
                    PageOp::Line { x1, y1, x2, y2 } => {
                        content.move_to(to_x(*x1), to_y(*y1));
                        content.line_to(to_x(*x2), to_y(*y2));
                        content.stroke();
                    }
                    PageOp::Rect {
                        x,
                        y,
                        w,
                        h,
                        style,
                        fill,
                    } => {
                        content.rect(to_x(*x), to_y(y + h), w * PT_PER_MM, h * PT_PER_MM);
                        match style {
                            RectStyle::Outline => {
                                content.stroke();
                            }
                            RectStyle::Fill => {
                                set_fill(&mut content, *fill);
                                content.fill_nonzero();
                            }
                        }
                    }
                    PageOp::Image { name, x, y, w, h } => {
                        content.save_state();
                        content.transform([
                            w * PT_PER_MM,
                            0.0,
                            0.0,
                            h * PT_PER_MM,
                            to_x(*x),
                            to_y(y + h),
                        ]);
                        content.x_object(Name(name.as_bytes()));
                        content.restore_state();
                    }
                }
            }

            let raw = content.finish();
            let compressed = miniz_oxide::deflate::compress_to_vec_zlib(raw.as_slice(), 6);
            pdf.stream(content_id, &compressed).filter(Filter::FlateDecode);

            let annot_refs: Vec<Ref> = page
                .links
                .iter()
                .map(|link| {
                    let annot_ref = alloc(&mut next_id);
                    let mut annot = pdf.annotation(annot_ref);
                    annot
                        .subtype(pdf_writer::types::AnnotationType::Link)
                        .rect(link.rect)
                        .border(0.0, 0.0, 0.0, None);
                    annot
                        .action()
                        .action_type(pdf_writer::types::ActionType::Uri)
                        .uri(Str(link.url.as_bytes()));
                    annot_ref
                })
                .collect();

            let mut pdf_page = pdf.page(page_id);
            pdf_page
                .media_box(Rect::new(0.0, 0.0, page_width * PT_PER_MM, page_height * PT_PER_MM))
                .parent(pages_id)
                .contents(content_id);
            if !annot_refs.is_empty() {
                pdf_page.annotations(annot_refs.iter().copied());
            }
            let mut resources = pdf_page.resources();
            {
                let mut font_dict = resources.fonts();
                for font in &embedded {
                    font_dict.pair(Name(font.pdf_name.as_bytes()), font.font_ref);
                }
            }
            if !page.images.is_empty() {
                let mut xobjects = resources.x_objects();
                for (name, xobj_ref) in &page.images {
                    xobjects.pair(Name(name.as_bytes()), *xobj_ref);
                }
            }
        }

        pdf.catalog(catalog_id).pages(pages_id);
        pdf.pages(pages_id)
            .kids(page_ids.iter().copied())
            .count(page_ids.len() as i32);
        pdf.document_info(info_id)
            .title(TextStr(&info.title))
            .author(TextStr(&info.author))
            .subject(TextStr(&info.subject))
            .producer(TextStr(concat!("topic-pdf ", env!("CARGO_PKG_VERSION"))));

        let bytes = pdf.finish();
        log::info!(
            "PDF assembly: fonts={:.1}ms ({} faces), pages={:.1}ms ({} pages), {} bytes",
            t_fonts.as_secs_f64() * 1000.0,
            fonts.len(),
            (t0.elapsed() - t_fonts).as_secs_f64() * 1000.0,
            page_ids.len(),
            bytes.len(),
        );
        Ok(bytes)
    }
}

impl RenderSink for PdfSink {
    fn begin_page(&mut self) {
        self.pages.push(PageBuffer::default());
    }

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn set_font(&mut self, family: &str, style: FontStyle, size: f32) {
        self.font = Some(self.fonts.resolve(family, style));
        self.style = style;
        self.size = size;
    }

    fn set_text_color(&mut self, color: Rgb) {
        self.text_color = color;
    }

    fn set_fill_color(&mut self, color: Rgb) {
        self.fill_color = color;
    }

    fn text_width(&self, text: &str) -> f32 {
        match self.font {
            Some(id) => self.fonts.get(id).text_width(text, self.size) / PT_PER_MM,
            None => 0.0,
        }
    }

    fn text(&mut self, x: f32, y: f32, text: &str) {
        self.push_text(x, y, text, false);
    }

    fn page_total_text(&mut self, x: f32, y: f32, text: &str) {
        self.push_text(x, y, text, true);
    }

    fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32) {
        self.current_page().ops.push(PageOp::Line { x1, y1, x2, y2 });
    }

    fn rect(&mut self, x: f32, y: f32, w: f32, h: f32, style: RectStyle) {
        let fill = self.fill_color;
        self.current_page().ops.push(PageOp::Rect {
            x,
            y,
            w,
            h,
            style,
            fill,
        });
    }

    fn image(&mut self, image: &ImageData<'_>, x: f32, y: f32, w: f32, h: f32) {
        let xobj_ref = alloc(&mut self.next_id);
        if let Err(e) = embed_image(&mut self.pdf, &mut self.next_id, xobj_ref, image) {
            log::warn!("image could not be embedded: {e}");
            return;
        }
        self.image_count += 1;
        let name = format!("Im{}", self.image_count);
        let page = self.current_page();
        page.images.push((name.clone(), xobj_ref));
        page.ops.push(PageOp::Image { name, x, y, w, h });
    }

    fn link(&mut self, x: f32, y: f32, w: f32, h: f32, url: &str) {
        let rect = Rect::new(
            self.pt_x(x),
            self.pt_y(y + h),
            self.pt_x(x + w),
            self.pt_y(y),
        );
        self.current_page().links.push(LinkAnnotation {
            rect,
            url: url.to_string(),
        });
    }
}
