//! Attachment thumbnails packed in rows below a post.

use std::collections::HashSet;

use crate::layout::Pager;
use crate::model::Attachment;
use crate::sink::RenderSink;

use super::{ImageKind, ImagePlacer, PlacementGrid, RawImage, normalize, scale_to_grid};

/// Bottom band kept free for the footer rule.
const FOOTER_CLEARANCE: f32 = 6.0;
/// Horizontal gap after each thumbnail and vertical gap between rows.
const GAP: f32 = 2.0;

/// Places every attachment not already shown inline, left to right in rows.
/// Automatic page breaks are off while the grid is drawn; a thumbnail that
/// would reach the footer starts a new page.
pub fn place_attachments<S: RenderSink>(
    pager: &mut Pager<S>,
    placer: &ImagePlacer<'_>,
    attachments: &[Attachment],
    used_inline: &HashSet<u32>,
) {
    if !pager.clear_float() {
        let line_height = pager.cursor.line_height;
        pager.ln(line_height);
    }
    pager.rule();
    pager.ln(GAP);
    pager.set_auto_page_break(false);

    let (area_width, area_height) = pager.grid_area();
    let mut grid = PlacementGrid::default();
    let mut placed = 0usize;

    for attachment in attachments {
        if used_inline.contains(&attachment.id) {
            log::debug!("attachment {} already shown inline", attachment.id);
            continue;
        }
        let Some(kind) = ImageKind::from_mime(&attachment.mime_type) else {
            log::debug!(
                "attachment {} skipped: {} is not an image type",
                attachment.id,
                attachment.mime_type
            );
            continue;
        };
        let Some(loaded) = placer.loader.fetch(&attachment.file) else {
            log::warn!("attachment {} could not be loaded", attachment.id);
            continue;
        };

        let raw = RawImage {
            source: attachment.file.clone(),
            bytes: loaded.bytes,
            kind: Some(kind),
            width: if attachment.width > 0 { attachment.width } else { loaded.width },
            height: if attachment.height > 0 { attachment.height } else { loaded.height },
        };
        let Some(image) = normalize(raw, placer.codec) else {
            continue;
        };

        let (w, h) = scale_to_grid(image.width, image.height, area_width, area_height);

        grid.row_width_used += w;
        if grid.row_width_used >= area_width {
            pager.ln(grid.row_height + GAP);
            grid.start_row(w);
        }

        if pager.cursor.y + h > pager.cursor.page_height - FOOTER_CLEARANCE {
            pager.break_page_at_margin();
            grid.start_row(w);
        }

        grid.row_height = grid.row_height.max(h);
        pager.draw_image(&image.data(), w, h);
        pager.cell(w + GAP, h);
        grid.row_width_used += GAP;
        placed += 1;

        image.release();
    }

    pager.ln(grid.row_height);
    pager.set_auto_page_break(true);
    log::debug!("attachment grid: {placed} of {} placed", attachments.len());
}
