use crate::model::{PageGeometry, Rgb};
use crate::sink::{ImageData, PT_PER_MM, RectStyle, RenderSink};
use crate::style::{FontStyle, QuoteContext, QuoteEntry, Style, StyleState};

pub const BLACK: Rgb = [0, 0, 0];
pub const QUOTE_COLOR: Rgb = [100, 100, 45];
pub const LINK_COLOR: Rgb = [0, 0, 255];
pub const BULLET_COLOR: Rgb = [190, 0, 0];

pub const QUOTE_FONT_SIZE: f32 = 8.0;
pub const DEFAULT_LINE_HEIGHT: f32 = 5.0;
pub const LIST_LINE_HEIGHT: f32 = 6.0;

/// Placeholder for the total page count, resolved by the sink once the
/// document is complete.
pub const PAGE_COUNT_ALIAS: &str = "{nb}";

/// Distance of the footer rule from the bottom edge.
const FOOTER_OFFSET: f32 = 6.0;
const HEADER_FONT_SIZE: f32 = 9.0;

/// Current draw position and page geometry, in mm from the top-left corner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cursor {
    pub x: f32,
    pub y: f32,
    pub page_width: f32,
    pub page_height: f32,
    pub left_margin: f32,
    pub right_margin: f32,
    pub top_margin: f32,
    pub bottom_margin: f32,
    pub line_height: f32,
    pub page_break_trigger: f32,
}

impl Cursor {
    pub fn new(geometry: &PageGeometry) -> Self {
        let (page_width, page_height) = geometry.page_dimensions();
        Self {
            x: geometry.width_margin,
            y: geometry.height_margin,
            page_width,
            page_height,
            left_margin: geometry.width_margin,
            right_margin: geometry.width_margin,
            top_margin: geometry.height_margin,
            bottom_margin: geometry.break_margin,
            line_height: DEFAULT_LINE_HEIGHT,
            page_break_trigger: page_height - geometry.break_margin,
        }
    }

    /// Printable width between the page margins.
    pub fn content_width(&self) -> f32 {
        self.page_width - self.left_margin - self.right_margin
    }

    /// Printable height between the top margin and the break margin.
    pub fn content_height(&self) -> f32 {
        self.page_height - self.top_margin - self.bottom_margin
    }

    pub fn right_edge(&self) -> f32 {
        self.page_width - self.right_margin
    }

    pub fn fits(&self, h: f32) -> bool {
        self.y + h <= self.page_break_trigger
    }

    pub fn set_left_margin(&mut self, margin: f32) {
        self.left_margin = margin;
        if self.x < margin {
            self.x = margin;
        }
    }
}

/// Fixed content repeated on every page.
#[derive(Clone, Debug)]
pub struct PageDecorations {
    pub linktree: String,
    /// Footer text before the page number, e.g. "Page".
    pub page_label: String,
    pub forum_name: String,
    /// Footer text introducing the topic link, e.g. "Topic link".
    pub link_label: String,
    pub topic_url: String,
    pub topic_subject: String,
}

#[derive(Clone, Debug, PartialEq)]
struct FontState {
    family: String,
    style: FontStyle,
    size: f32,
}

struct SavedState {
    font: FontState,
    text_color: Rgb,
    fill_color: Rgb,
    last_color: Rgb,
}

/// Owns the cursor and every piece of per-document layout state, and decides
/// page breaks. All drawing goes through here to the sink.
pub struct Pager<S: RenderSink> {
    sink: S,
    pub cursor: Cursor,
    pub quote: QuoteContext,
    pub style: StyleState,
    font: FontState,
    base_family: String,
    base_size: f32,
    mono_family: String,
    text_color: Rgb,
    fill_color: Rgb,
    /// Color restored after transient colors (bullets, links).
    last_color: Rgb,
    decorations: Option<PageDecorations>,
    auto_page_break: bool,
    decorating: bool,
    /// Runs written while set carry the page-count alias.
    page_total_run: bool,
    /// Point below the last tall inline image where text resumes.
    resume_y: Option<f32>,
    /// Tallest inline object on the current line.
    line_extent: f32,
    /// Content area at setup; image cells are sized against it.
    grid_area: (f32, f32),
}

impl<S: RenderSink> Pager<S> {
    pub fn new(sink: S, geometry: &PageGeometry, decorations: Option<PageDecorations>) -> Self {
        let cursor = Cursor::new(geometry);
        Self {
            sink,
            cursor,
            quote: QuoteContext::default(),
            style: StyleState::default(),
            font: FontState {
                family: geometry.font_family.clone(),
                style: FontStyle::REGULAR,
                size: geometry.font_size,
            },
            base_family: geometry.font_family.clone(),
            base_size: geometry.font_size,
            mono_family: geometry.mono_family.clone(),
            text_color: BLACK,
            fill_color: BLACK,
            last_color: BLACK,
            decorations,
            auto_page_break: true,
            decorating: false,
            page_total_run: false,
            resume_y: None,
            line_extent: 0.0,
            grid_area: (cursor.content_width(), cursor.content_height()),
        }
    }

    /// Starts the first page.
    pub fn begin_document(&mut self) {
        self.new_page();
        self.apply_font();
    }

    /// Closes the last page and hands the sink back.
    pub fn finish(mut self) -> S {
        if self.sink.page_count() > 0 {
            self.draw_footer();
        }
        self.sink
    }

    pub fn page_number(&self) -> usize {
        self.sink.page_count()
    }

    pub fn base_family(&self) -> &str {
        &self.base_family
    }

    pub fn base_size(&self) -> f32 {
        self.base_size
    }

    pub fn mono_family(&self) -> &str {
        &self.mono_family
    }

    pub fn font_size(&self) -> f32 {
        self.font.size
    }

    /// Width and height that image thumbnails are fitted against.
    pub fn grid_area(&self) -> (f32, f32) {
        self.grid_area
    }

    /// Switches face and size; the style comes from the style counters.
    pub fn set_font(&mut self, family: &str, size: f32) {
        self.font.family = family.to_string();
        self.font.size = size;
        self.apply_style();
    }

    pub fn set_font_size(&mut self, size: f32) {
        self.font.size = size;
        self.apply_style();
    }

    /// Switches to an explicit style, bypassing the counters. Used for the
    /// fixed recipes around post bodies.
    pub fn set_font_with_style(&mut self, family: &str, style: FontStyle, size: f32) {
        self.font = FontState {
            family: family.to_string(),
            style,
            size,
        };
        self.apply_font();
    }

    /// Re-issues the current face and size with the counter-derived style.
    pub fn apply_style(&mut self) {
        self.font.style = self.style.current();
        self.apply_font();
    }

    fn apply_font(&mut self) {
        self.sink
            .set_font(&self.font.family, self.font.style, self.font.size);
    }

    pub fn enable_style(&mut self, style: Style) {
        self.style.enable(style);
        self.apply_style();
    }

    pub fn disable_style(&mut self, style: Style) {
        self.style.disable(style);
        self.apply_style();
    }

    /// Sets the text color and remembers it for `restore_last_color`.
    pub fn set_text_color(&mut self, color: Rgb) {
        self.last_color = color;
        self.set_text_color_transient(color);
    }

    pub fn set_text_color_transient(&mut self, color: Rgb) {
        self.text_color = color;
        self.sink.set_text_color(color);
    }

    pub fn restore_last_color(&mut self) {
        self.set_text_color_transient(self.last_color);
    }

    pub fn set_fill_color(&mut self, color: Rgb) {
        self.fill_color = color;
        self.sink.set_fill_color(color);
    }

    fn save_state(&self) -> SavedState {
        SavedState {
            font: self.font.clone(),
            text_color: self.text_color,
            fill_color: self.fill_color,
            last_color: self.last_color,
        }
    }

    fn restore_state(&mut self, saved: SavedState) {
        self.font = saved.font;
        self.apply_font();
        self.last_color = saved.last_color;
        self.set_text_color_transient(saved.text_color);
        self.set_fill_color(saved.fill_color);
    }

    /// Line feed: back to the left margin, down by `h` (or by the tallest
    /// inline object on the line). A pending resume point below a tall
    /// inline image wins if it is further down.
    pub fn ln(&mut self, h: f32) {
        let mut y = self.cursor.y + h.max(self.line_extent);
        if let Some(resume) = self.resume_y.take() {
            y = y.max(resume);
        }
        self.cursor.x = self.cursor.left_margin;
        self.cursor.y = y;
        self.line_extent = 0.0;
    }

    /// Drops below the last tall inline image, if the cursor is still beside it.
    pub fn clear_float(&mut self) -> bool {
        match self.resume_y.take() {
            Some(resume) if resume > self.cursor.y => {
                self.cursor.x = self.cursor.left_margin;
                self.cursor.y = resume;
                self.line_extent = 0.0;
                true
            }
            _ => false,
        }
    }

    pub fn set_resume_point(&mut self, y: f32) {
        self.resume_y = Some(y);
    }

    pub fn resume_point(&self) -> Option<f32> {
        self.resume_y
    }

    pub fn set_auto_page_break(&mut self, enabled: bool) {
        self.auto_page_break = enabled;
    }

    /// Breaks the page first if `h` more units would cross the trigger.
    pub fn ensure_room(&mut self, h: f32) -> bool {
        if self.auto_page_break && !self.decorating && !self.cursor.fits(h) {
            self.break_page();
            return true;
        }
        false
    }

    /// The page-break hook. Closes the open quote box fragment on the
    /// outgoing page, then starts the next page with the fragment restarting
    /// at the top of the content area. The horizontal position is kept.
    pub fn break_page(&mut self) {
        if self.quote.is_open() {
            let h = (self.cursor.page_break_trigger - self.quote.start_y).max(0.0);
            log::debug!(
                "quote box fragment on page {}: y={:.1} h={h:.1}",
                self.page_number(),
                self.quote.start_y
            );
            self.sink.rect(
                self.quote.base_left_margin,
                self.quote.start_y,
                self.quote_box_width(),
                h,
                RectStyle::Outline,
            );
        }

        let x = self.cursor.x;
        self.new_page();
        self.cursor.x = x;

        if self.quote.is_open() {
            self.quote.start_y = self.cursor.y;
            self.set_text_color(QUOTE_COLOR);
            self.set_font_size(QUOTE_FONT_SIZE);
        }
    }

    /// Explicit break used by block content: same as the hook, but the
    /// cursor starts at the left margin.
    pub fn break_page_at_margin(&mut self) {
        self.break_page();
        self.cursor.x = self.cursor.left_margin;
    }

    fn new_page(&mut self) {
        let saved = self.save_state();
        if self.sink.page_count() > 0 {
            self.draw_footer();
        }
        self.sink.begin_page();
        self.cursor.x = self.cursor.left_margin;
        self.cursor.y = self.cursor.top_margin;
        self.line_extent = 0.0;
        self.resume_y = None;
        self.draw_header();
        self.restore_state(saved);
    }

    fn draw_header(&mut self) {
        let Some(linktree) = self.decorations.as_ref().map(|d| d.linktree.clone()) else {
            return;
        };
        self.decorating = true;
        let family = self.base_family.clone();
        let h = self.cursor.line_height;
        self.set_font_with_style(&family, FontStyle::REGULAR, HEADER_FONT_SIZE);
        self.set_text_color(BLACK);
        self.set_fill_color(BLACK);
        self.write(h, &linktree, None);
        self.ln(h);
        self.bar();
        self.ln(h);
        self.decorating = false;
    }

    fn draw_footer(&mut self) {
        let Some(deco) = self.decorations.clone() else {
            return;
        };
        self.decorating = true;
        let family = self.base_family.clone();
        let h = self.cursor.line_height;
        let left = self.cursor.left_margin;
        self.set_font_with_style(&family, FontStyle::REGULAR, QUOTE_FONT_SIZE);
        self.cursor.x = left;
        self.cursor.y = self.cursor.page_height - FOOTER_OFFSET;
        self.rule();
        let text = format!(
            "{} {} / {PAGE_COUNT_ALIAS} ---- {} ---- {}: ",
            deco.page_label,
            self.page_number(),
            deco.forum_name,
            deco.link_label,
        );
        self.page_total_run = true;
        self.write(h, &text, None);
        self.page_total_run = false;
        self.write_link(&deco.topic_url, &deco.topic_subject, QUOTE_FONT_SIZE);
        self.decorating = false;
    }

    /// Flows `text` from the cursor, wrapping at the right margin. Each
    /// wrapped line checks the break trigger before it is drawn.
    pub fn write(&mut self, h: f32, text: &str, link: Option<&str>) {
        let mut line = String::new();
        let mut wrapped = false;

        for (i, word) in text.split(' ').enumerate() {
            if i > 0 && !(wrapped && line.is_empty()) {
                line.push(' ');
            }
            if word.is_empty() {
                continue;
            }

            if self.fits_on_line(&line, word) {
                line.push_str(word);
                continue;
            }

            let pending = line.trim_end();
            if !pending.trim_start().is_empty() || self.cursor.x > self.cursor.left_margin {
                let pending = pending.to_string();
                self.emit_run(&pending, h, link);
                self.ln(h);
                line.clear();
                wrapped = true;
            }

            if self.fits_on_line(&line, word) {
                line.push_str(word);
                continue;
            }

            // Longer than a whole line: break between characters.
            for ch in word.chars() {
                let mut probe = line.clone();
                probe.push(ch);
                if self.cursor.x + self.sink.text_width(&probe) > self.cursor.right_edge()
                    && !line.trim().is_empty()
                {
                    self.emit_run(&line, h, link);
                    self.ln(h);
                    line.clear();
                    wrapped = true;
                }
                line.push(ch);
            }
        }

        if !line.is_empty() {
            self.emit_run(&line, h, link);
        }
    }

    fn fits_on_line(&self, line: &str, word: &str) -> bool {
        let width = self.sink.text_width(line) + self.sink.text_width(word);
        self.cursor.x + width <= self.cursor.right_edge() + 0.001
    }

    fn emit_run(&mut self, text: &str, h: f32, link: Option<&str>) {
        if text.is_empty() {
            return;
        }
        self.ensure_room(h);
        let width = self.sink.text_width(text);
        let baseline = self.cursor.y + 0.5 * h + 0.3 * self.font.size / PT_PER_MM;
        if self.page_total_run {
            self.sink.page_total_text(self.cursor.x, baseline, text);
        } else {
            self.sink.text(self.cursor.x, baseline, text);
        }
        if let Some(url) = link {
            self.sink.link(self.cursor.x, self.cursor.y, width, h, url);
        }
        self.cursor.x += width;
    }

    /// Writes `caption` as a blue, underlined link at `size`, then restores
    /// size and color.
    pub fn write_link(&mut self, url: &str, caption: &str, size: f32) {
        let previous_size = self.font.size;
        let h = self.cursor.line_height;
        self.set_text_color_transient(LINK_COLOR);
        self.style.enable(Style::Underline);
        self.set_font_size(size);
        let caption = if caption.is_empty() { " " } else { caption };
        self.write(h, caption, Some(url));
        self.style.disable(Style::Underline);
        self.set_font_size(previous_size);
        self.restore_last_color();
    }

    /// Advances horizontally past an inline object `w` wide and `h` tall.
    pub fn cell(&mut self, w: f32, h: f32) {
        self.cursor.x += w;
        self.line_extent = self.line_extent.max(h);
    }

    /// Places an image with its top-left corner at the cursor.
    pub fn draw_image(&mut self, image: &ImageData<'_>, w: f32, h: f32) {
        self.sink
            .image(image, self.cursor.x, self.cursor.y, w, h);
    }

    /// Horizontal rule across the content width at the cursor.
    pub fn rule(&mut self) {
        let y = self.cursor.y;
        self.sink
            .line(self.cursor.left_margin, y, self.cursor.right_edge(), y);
    }

    /// Solid bar, one unit tall, across the content width.
    pub fn bar(&mut self) {
        self.sink.rect(
            self.cursor.left_margin,
            self.cursor.y,
            self.cursor.content_width(),
            1.0,
            RectStyle::Fill,
        );
    }

    fn quote_box_width(&self) -> f32 {
        self.cursor.page_width - self.cursor.right_margin - self.quote.base_left_margin
    }

    /// `div.quoteheader`: opens a quote level.
    pub fn enter_quote_header(&mut self) {
        let entry = self
            .quote
            .enter_from_header(self.cursor.y, self.cursor.left_margin);
        self.apply_quote_entry(entry);
    }

    /// `<blockquote>`: opens a quote level unless its header already did,
    /// then switches to the quote color and size.
    pub fn enter_blockquote(&mut self) {
        if let Some(entry) = self
            .quote
            .enter_from_blockquote(self.cursor.y, self.cursor.left_margin)
        {
            self.apply_quote_entry(entry);
        }
        self.set_text_color(QUOTE_COLOR);
        let family = self.base_family.clone();
        self.set_font(&family, QUOTE_FONT_SIZE);
        self.ln(4.0);
    }

    fn apply_quote_entry(&mut self, entry: QuoteEntry) {
        if entry.opened_box {
            let family = self.base_family.clone();
            self.set_font(&family, QUOTE_FONT_SIZE);
        }
        let margin = self.cursor.left_margin + entry.margin_shift;
        self.cursor.set_left_margin(margin);
        log::debug!("quote depth {} margin {margin:.1}", self.quote.depth);
    }

    /// `</blockquote>`: leaves one level. Leaving the outermost level draws
    /// the (last fragment of the) quote box.
    pub fn exit_quote(&mut self) {
        let Some(exit) = self.quote.exit() else {
            log::debug!("unbalanced </blockquote> ignored");
            self.ln(8.0);
            return;
        };

        let margin = if exit.closed_box {
            self.quote.base_left_margin
        } else {
            self.cursor.left_margin - exit.margin_shift
        };
        self.cursor.left_margin = margin;
        self.ln(8.0);

        if exit.closed_box {
            let family = self.base_family.clone();
            let size = self.base_size;
            self.set_font(&family, size);
            self.set_text_color(BLACK);
            self.set_fill_color(BLACK);
            let bottom = self.cursor.y.min(self.cursor.page_break_trigger);
            let h = (bottom - self.quote.start_y).max(0.0);
            self.sink.rect(
                self.quote.base_left_margin,
                self.quote.start_y,
                self.quote_box_width(),
                h,
                RectStyle::Outline,
            );
        }
    }
}
