use std::fmt;

use crate::model::{ImageFormat, Rgb};
use crate::style::FontStyle;

/// Points per millimetre.
pub const PT_PER_MM: f32 = 72.0 / 25.4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RectStyle {
    Outline,
    Fill,
}

/// Encoded image bytes handed straight to the sink for one placement.
pub struct ImageData<'a> {
    pub bytes: &'a [u8],
    pub format: ImageFormat,
    pub pixel_width: u32,
    pub pixel_height: u32,
}

/// Page drawing primitives. Coordinates are millimetres from the top-left
/// corner of the current page; font sizes are points.
pub trait RenderSink {
    fn begin_page(&mut self);
    fn page_count(&self) -> usize;
    fn set_font(&mut self, family: &str, style: FontStyle, size: f32);
    fn set_text_color(&mut self, color: Rgb);
    fn set_fill_color(&mut self, color: Rgb);
    /// Width in mm of `text` in the current font.
    fn text_width(&self, text: &str) -> f32;
    /// Draws `text` with its baseline at `y`, underlined when the current
    /// style asks for it.
    fn text(&mut self, x: f32, y: f32, text: &str);
    /// Draws footer text in which the page-count alias is replaced by the
    /// final page total.
    fn page_total_text(&mut self, x: f32, y: f32, text: &str) {
        self.text(x, y, text);
    }
    fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32);
    fn rect(&mut self, x: f32, y: f32, w: f32, h: f32, style: RectStyle);
    fn image(&mut self, image: &ImageData<'_>, x: f32, y: f32, w: f32, h: f32);
    fn link(&mut self, x: f32, y: f32, w: f32, h: f32, url: &str);
}

#[derive(Clone, Debug, PartialEq)]
pub enum SinkCall {
    BeginPage,
    SetFont {
        family: String,
        style: FontStyle,
        size: f32,
    },
    SetTextColor(Rgb),
    SetFillColor(Rgb),
    Text {
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
    },
    Image {
        format: ImageFormat,
        x: f32,
        y: f32,
        w: f32,
        h: f32,
    },
    Link {
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        url: String,
    },
}

impl fmt::Display for SinkCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkCall::BeginPage => write!(f, "page"),
            SinkCall::SetFont {
                family,
                style,
                size,
            } => write!(f, "font {family} '{style}' {size}"),
            SinkCall::SetTextColor([r, g, b]) => write!(f, "text-color {r} {g} {b}"),
            SinkCall::SetFillColor([r, g, b]) => write!(f, "fill-color {r} {g} {b}"),
            SinkCall::Text { x, y, text } => write!(f, "text {x:.1} {y:.1} {text:?}"),
            SinkCall::Line { x1, y1, x2, y2 } => {
                write!(f, "line {x1:.1} {y1:.1} {x2:.1} {y2:.1}")
            }
            SinkCall::Rect { x, y, w, h, style } => {
                write!(f, "rect {x:.1} {y:.1} {w:.1} {h:.1} {style:?}")
            }
            SinkCall::Image { format, x, y, w, h } => {
                write!(f, "image {format:?} {x:.1} {y:.1} {w:.1} {h:.1}")
            }
            SinkCall::Link { x, y, w, h, url } => {
                write!(f, "link {x:.1} {y:.1} {w:.1} {h:.1} {url}")
            }
        }
    }
}

/// A sink that draws nothing and remembers every call, in order.
/// Text width is a fixed half-em per character so layouts are reproducible.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub calls: Vec<SinkCall>,
    pages: usize,
    font_size: f32,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            pages: 0,
            font_size: 10.0,
        }
    }

    pub fn texts(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                SinkCall::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn outline_rects(&self) -> Vec<(f32, f32, f32, f32)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                SinkCall::Rect {
                    x,
                    y,
                    w,
                    h,
                    style: RectStyle::Outline,
                } => Some((*x, *y, *w, *h)),
                _ => None,
            })
            .collect()
    }

    pub fn images(&self) -> Vec<(f32, f32, f32, f32)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                SinkCall::Image { x, y, w, h, .. } => Some((*x, *y, *w, *h)),
                _ => None,
            })
            .collect()
    }

    /// Font style in effect when `needle` was drawn.
    pub fn style_of(&self, needle: &str) -> Option<FontStyle> {
        let mut style = FontStyle::default();
        for call in &self.calls {
            match call {
                SinkCall::SetFont { style: s, .. } => style = *s,
                SinkCall::Text { text, .. } if text == needle => return Some(style),
                _ => {}
            }
        }
        None
    }

    /// Style of the last font change.
    pub fn last_style(&self) -> Option<FontStyle> {
        self.calls.iter().rev().find_map(|c| match c {
            SinkCall::SetFont { style, .. } => Some(*style),
            _ => None,
        })
    }

    /// Calls grouped by page; calls before the first page are dropped.
    pub fn pages(&self) -> Vec<&[SinkCall]> {
        let starts: Vec<usize> = self
            .calls
            .iter()
            .enumerate()
            .filter(|(_, c)| matches!(c, SinkCall::BeginPage))
            .map(|(i, _)| i)
            .collect();
        starts
            .iter()
            .enumerate()
            .map(|(n, &start)| {
                let end = starts.get(n + 1).copied().unwrap_or(self.calls.len());
                &self.calls[start..end]
            })
            .collect()
    }
}

impl RenderSink for RecordingSink {
    fn begin_page(&mut self) {
        self.pages += 1;
        self.calls.push(SinkCall::BeginPage);
    }

    fn page_count(&self) -> usize {
        self.pages
    }

    fn set_font(&mut self, family: &str, style: FontStyle, size: f32) {
        self.font_size = size;
        self.calls.push(SinkCall::SetFont {
            family: family.to_string(),
            style,
            size,
        });
    }

    fn set_text_color(&mut self, color: Rgb) {
        self.calls.push(SinkCall::SetTextColor(color));
    }

    fn set_fill_color(&mut self, color: Rgb) {
        self.calls.push(SinkCall::SetFillColor(color));
    }

    fn text_width(&self, text: &str) -> f32 {
        text.chars().count() as f32 * self.font_size * 0.5 / PT_PER_MM
    }

    fn text(&mut self, x: f32, y: f32, text: &str) {
        self.calls.push(SinkCall::Text {
            x,
            y,
            text: text.to_string(),
        });
    }

    fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32) {
        self.calls.push(SinkCall::Line { x1, y1, x2, y2 });
    }

    fn rect(&mut self, x: f32, y: f32, w: f32, h: f32, style: RectStyle) {
        self.calls.push(SinkCall::Rect { x, y, w, h, style });
    }

    fn image(&mut self, image: &ImageData<'_>, x: f32, y: f32, w: f32, h: f32) {
        self.calls.push(SinkCall::Image {
            format: image.format,
            x,
            y,
            w,
            h,
        });
    }

    fn link(&mut self, x: f32, y: f32, w: f32, h: f32, url: &str) {
        self.calls.push(SinkCall::Link {
            x,
            y,
            w,
            h,
            url: url.to_string(),
        });
    }
}
