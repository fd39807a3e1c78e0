//! Lays out a whole topic: page decorations, then each post with its header,
//! body and attachment grid.

use crate::codec::ImageCodec;
use crate::images::ImagePlacer;
use crate::images::grid::place_attachments;
use crate::interpret::write_markup;
use crate::layout::{PageDecorations, Pager};
use crate::loader::ImageLoader;
use crate::markup::decode_entities;
use crate::model::{Labels, Poll, RenderOptions, Topic};
use crate::sink::RenderSink;
use crate::style::FontStyle;

const LABEL_SIZE: f32 = 8.0;
const VALUE_SIZE: f32 = 9.0;
const END_OF_MESSAGE_GAP: f32 = 10.0;

/// The breadcrumb printed at the top of every page.
pub fn linktree(topic: &Topic, labels: &Labels) -> String {
    let mut parts = vec![topic.category_name.as_str()];
    parts.extend(topic.parent_boards.iter().map(String::as_str));
    parts.push(topic.board_name.as_str());
    format!(
        "{} » {}: {} {} {}",
        parts.join(" » "),
        labels.topic_started,
        topic.poster_name,
        labels.on,
        topic.post_time
    )
}

pub fn decorations(topic: &Topic, labels: &Labels) -> PageDecorations {
    PageDecorations {
        linktree: linktree(topic, labels),
        page_label: labels.page.clone(),
        forum_name: decode_entities(&topic.forum_name),
        link_label: format!("{} {}", labels.topic, labels.link),
        topic_url: topic.topic_url.clone(),
        topic_subject: decode_entities(&topic.subject),
    }
}

/// Subject and author lines above a post body.
pub fn message_header<S: RenderSink>(
    pager: &mut Pager<S>,
    labels: &Labels,
    subject: &str,
    author: &str,
    date: &str,
) {
    // Keep the header on the same page as the start of the body.
    if pager.cursor.y + 4.0 > pager.cursor.content_height() {
        pager.break_page_at_margin();
    }

    let family = pager.base_family().to_string();
    let h = pager.cursor.line_height;

    pager.rule();
    pager.set_font_with_style(&family, FontStyle::REGULAR, LABEL_SIZE);
    pager.write(h, &format!("{}: ", labels.title), None);
    pager.set_font_with_style(&family, FontStyle::BOLD, VALUE_SIZE);
    pager.write(h, subject, None);
    pager.ln(4.0);

    pager.set_font_with_style(&family, FontStyle::REGULAR, LABEL_SIZE);
    pager.write(h, &format!("{}: ", labels.posted_by), None);
    pager.set_font_with_style(&family, FontStyle::BOLD, VALUE_SIZE);
    pager.write(h, &format!("{author} "), None);
    pager.set_font_with_style(&family, FontStyle::REGULAR, LABEL_SIZE);
    pager.write(h, &format!("{} ", labels.on), None);
    pager.set_font_with_style(&family, FontStyle::BOLD, VALUE_SIZE);
    pager.write(h, date, None);

    pager.ln(h);
    pager.rule();
    pager.ln(2.0);
}

/// Poll question and options, shown under the first post's header.
pub fn add_poll<S: RenderSink>(pager: &mut Pager<S>, labels: &Labels, poll: &Poll) {
    let family = pager.base_family().to_string();
    let size = pager.base_size();
    let h = pager.cursor.line_height;

    pager.ln(2.0);
    pager.set_font_with_style(&family, FontStyle::REGULAR, size);
    pager.write(h, &format!("{}: ", labels.poll_question), None);
    pager.set_font_with_style(&family, FontStyle::BOLD, size);
    pager.write(h, &decode_entities(&poll.question), None);
    pager.set_font_with_style(&family, FontStyle::REGULAR, size);
    pager.ln(h);

    for (n, option) in poll.options.iter().enumerate() {
        pager.set_font_with_style(&family, FontStyle::REGULAR, size);
        pager.write(h, &format!("{} {} » ", labels.option, n + 1), None);
        pager.set_font_with_style(&family, FontStyle::BOLD, size);
        pager.write(h, &decode_entities(&option.label), None);
        pager.set_font_with_style(&family, FontStyle::REGULAR, size);
        if poll.show_votes {
            pager.write(h, &format!(" ({}: {})", labels.votes, option.votes), None);
        }
        pager.ln(h);
    }

    pager.rule();
    pager.ln(h);
}

/// Spacing after a post, or a drop below a trailing tall inline image.
pub fn end_message<S: RenderSink>(pager: &mut Pager<S>) {
    if !pager.clear_float() {
        pager.ln(END_OF_MESSAGE_GAP);
    }
}

/// Lays out every post of `topic` on `sink` and returns the finished sink.
pub fn render_topic<S: RenderSink>(
    sink: S,
    topic: &Topic,
    options: &RenderOptions,
    loader: &dyn ImageLoader,
    codec: &dyn ImageCodec,
) -> S {
    let labels = &options.labels;
    let mut pager = Pager::new(sink, &options.geometry, Some(decorations(topic, labels)));
    let placer = ImagePlacer { loader, codec };

    pager.begin_document();

    for (n, post) in topic.posts.iter().enumerate() {
        message_header(
            &mut pager,
            labels,
            &decode_entities(&post.subject),
            &decode_entities(&post.author),
            &post.time,
        );

        if n == 0
            && let Some(poll) = &topic.poll
        {
            add_poll(&mut pager, labels, poll);
        }

        let used_inline = write_markup(&mut pager, &placer, &post.body, &post.attachments);

        if !post.attachments.is_empty() {
            place_attachments(&mut pager, &placer, &post.attachments, &used_inline);
        }

        end_message(&mut pager);
        log::debug!("post {} done, page {}", post.id, pager.page_number());
    }

    pager.finish()
}
