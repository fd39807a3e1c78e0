mod common;

use common::{approx, bare_pager, letter};
use topic_pdf::sink::SinkCall;

fn rects_on_page(calls: &[SinkCall]) -> usize {
    calls
        .iter()
        .filter(|c| matches!(c, SinkCall::Rect { style: topic_pdf::sink::RectStyle::Outline, .. }))
        .count()
}

#[test]
fn quote_on_one_page_draws_one_box() {
    let mut pager = bare_pager(&letter());
    pager.ln(20.0);
    pager.enter_blockquote();
    pager.write(5.0, "quoted", None);
    pager.exit_quote();
    assert_eq!(pager.quote.depth, 0);

    let sink = pager.finish();
    let rects = sink.outline_rects();
    assert_eq!(rects.len(), 1);
    let (x, y, w, h) = rects[0];
    assert!(approx(x, 15.0));
    assert!(approx(y, 35.0));
    assert!(approx(w, 185.9));
    // ln(4) on entry, ln(8) on exit.
    assert!(approx(h, 12.0), "h = {h}");
}

#[test]
fn quote_box_is_split_at_page_break() {
    let geometry = letter();
    let trigger = 279.4 - geometry.break_margin;
    let mut pager = bare_pager(&geometry);
    pager.ln(200.0);
    pager.enter_quote_header();
    pager.enter_blockquote();
    for n in 0..20 {
        pager.write(5.0, &format!("quoted line {n}"), None);
        pager.ln(5.0);
    }
    pager.exit_quote();

    let sink = pager.finish();
    let pages = sink.pages();
    assert_eq!(pages.len(), 2);
    assert_eq!(rects_on_page(pages[0]), 1);
    assert_eq!(rects_on_page(pages[1]), 1);

    let rects = sink.outline_rects();
    let (x, y, w, h) = rects[0];
    assert!(approx(x, 15.0) && approx(w, 185.9));
    assert!(approx(y, 215.0));
    assert!(approx(y + h, trigger), "first fragment ends at the break trigger");

    // Ten lines fit on the first page; the other ten start at the top margin.
    let (_, y, _, h) = rects[1];
    assert!(approx(y, 15.0));
    assert!(approx(h, 10.0 * 5.0 + 8.0), "h = {h}");
}

#[test]
fn no_text_is_drawn_below_the_trigger() {
    let geometry = letter();
    let trigger = 279.4 - geometry.break_margin;
    let mut pager = bare_pager(&geometry);
    pager.enter_blockquote();
    for n in 0..120 {
        pager.write(5.0, &format!("line {n}"), None);
        pager.ln(5.0);
    }
    pager.exit_quote();
    let sink = pager.finish();

    for call in &sink.calls {
        if let SinkCall::Text { y, .. } = call {
            assert!(*y <= trigger, "text baseline at {y}");
        }
    }
    let pages = sink.pages().len();
    assert!(pages >= 3);
    assert_eq!(sink.outline_rects().len(), pages);
}

#[test]
fn nested_quotes_indent_without_extra_boxes() {
    let mut pager = bare_pager(&letter());
    pager.enter_blockquote();
    pager.write(5.0, "outer", None);
    pager.enter_blockquote();
    assert!(approx(pager.cursor.left_margin, 20.0));
    pager.write(5.0, "inner", None);
    pager.exit_quote();
    assert!(approx(pager.cursor.left_margin, 15.0));
    assert_eq!(pager.quote.depth, 1);
    pager.exit_quote();
    assert_eq!(pager.quote.depth, 0);

    let sink = pager.finish();
    assert_eq!(sink.outline_rects().len(), 1);
    let inner_x = sink.calls.iter().find_map(|c| match c {
        SinkCall::Text { x, text, .. } if text == "inner" => Some(*x),
        _ => None,
    });
    assert_eq!(inner_x, Some(20.0));
}

#[test]
fn quote_style_is_restored_after_page_break() {
    let mut pager = bare_pager(&letter());
    pager.enter_blockquote();
    pager.break_page();
    assert!(approx(pager.font_size(), 8.0));
    assert!(approx(pager.quote.start_y, 15.0));
    pager.exit_quote();
    assert!(approx(pager.font_size(), 10.0));

    let sink = pager.finish();
    let second = sink.pages()[1];
    assert!(second.contains(&SinkCall::SetTextColor([100, 100, 45])));
}

#[test]
fn unbalanced_close_is_harmless() {
    let mut pager = bare_pager(&letter());
    pager.exit_quote();
    assert_eq!(pager.quote.depth, 0);
    let sink = pager.finish();
    assert!(sink.outline_rects().is_empty());
}
