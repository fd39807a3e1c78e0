//! Images placed where their `<img>` tag occurs in the text flow.

use crate::layout::{Pager, QUOTE_FONT_SIZE};
use crate::markup::AttributeMap;
use crate::sink::RenderSink;

use super::{ImagePlacer, RawImage, SMILEY_THRESHOLD, normalize, scale_to_grid};

/// Leading digits of an attribute value; `None` when absent or zero.
fn pixel_value(value: &str) -> Option<u32> {
    let digits: String = value
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok().filter(|&v| v > 0)
}

/// First `<property>:<N>px` in an inline style.
fn style_pixels(style: &str, property: &str) -> Option<u32> {
    let needle = format!("{property}:");
    style.match_indices(&needle).find_map(|(at, _)| {
        let rest = &style[at + needle.len()..];
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() || !rest[digits.len()..].starts_with("px") {
            return None;
        }
        digits.parse().ok()
    })
}

/// Pixel size for an `<img>`: tag attributes, then inline style (only when
/// neither attribute is given), then the natural size. One given side makes
/// a square.
pub fn resolve_size(attrs: &AttributeMap, natural_width: u32, natural_height: u32) -> (u32, u32) {
    let attr_width = attrs.get("width").and_then(|v| pixel_value(v));
    let attr_height = attrs.get("height").and_then(|v| pixel_value(v));

    let (width, height) = if attrs.contains_key("width") || attrs.contains_key("height") {
        (attr_width, attr_height)
    } else if let Some(style) = attrs.get("style") {
        (style_pixels(style, "width"), style_pixels(style, "height"))
    } else {
        (None, None)
    };

    match (width, height) {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => (w, w),
        (None, Some(h)) => (h, h),
        (None, None) => (natural_width, natural_height),
    }
}

/// Caption for an image that could not be placed: the title, or else the
/// last path segment of the source.
pub fn fallback_caption(attrs: &AttributeMap, src: &str) -> String {
    let label = match attrs.get("title").filter(|t| !t.is_empty()) {
        Some(title) => title.as_str(),
        None => src.rsplit('/').next().unwrap_or(src),
    };
    format!(" [ {label} ] ")
}

/// Places the image an `<img>` tag refers to. Tall images end the current
/// line and push following text below them once it wraps; small ones stay
/// on the line. Anything that cannot be loaded becomes a bracketed link.
pub fn place_inline<S: RenderSink>(pager: &mut Pager<S>, placer: &ImagePlacer<'_>, attrs: &AttributeMap) {
    let Some(src) = attrs.get("src").filter(|s| !s.is_empty()) else {
        log::debug!("<img> without src ignored");
        return;
    };

    let image = placer.loader.fetch(src).and_then(|loaded| {
        normalize(
            RawImage {
                source: src.clone(),
                bytes: loaded.bytes,
                kind: loaded.kind,
                width: loaded.width,
                height: loaded.height,
            },
            placer.codec,
        )
    });

    let Some(image) = image else {
        log::warn!("image {src} unavailable, writing a link instead");
        let size = if pager.quote.is_open() {
            QUOTE_FONT_SIZE
        } else {
            pager.base_size()
        };
        pager.write_link(src, &fallback_caption(attrs, src), size);
        return;
    };

    let (px_width, px_height) = resolve_size(attrs, image.width, image.height);
    let (area_width, area_height) = pager.grid_area();
    let (w, h) = scale_to_grid(px_width, px_height, area_width, area_height);

    pager.clear_float();

    let tall = h >= SMILEY_THRESHOLD;
    if tall {
        if pager.cursor.x > pager.cursor.left_margin {
            pager.ln(1.0);
        }
    } else if pager.cursor.x + w > pager.cursor.right_edge() {
        let line_height = pager.cursor.line_height;
        pager.ln(line_height);
    }

    // Checked after the line break so the image bottom never passes the trigger.
    if pager.cursor.y + h > pager.cursor.page_break_trigger {
        pager.break_page_at_margin();
    }

    if tall {
        pager.set_resume_point((pager.cursor.y + h + 2.0).ceil());
    }

    log::debug!(
        "inline image {src}: {px_width}x{px_height}px -> {w}x{h}mm at ({:.1}, {:.1})",
        pager.cursor.x,
        pager.cursor.y
    );
    pager.draw_image(&image.data(), w, h);
    pager.cell(w + 2.0, h);
    image.release();
}
