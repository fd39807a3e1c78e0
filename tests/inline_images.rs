mod common;

use common::{MemoryLoader, StubCodec, approx, attachment, bare_pager, letter, placer};
use topic_pdf::images::ImageKind;
use topic_pdf::interpret::write_markup;
use topic_pdf::layout::Pager;
use topic_pdf::model::{Attachment, ImageFormat};
use topic_pdf::sink::{PT_PER_MM, RecordingSink, SinkCall};

fn run(pager: &mut Pager<RecordingSink>, loader: &MemoryLoader, html: &str, attachments: &[Attachment]) {
    let codec = StubCodec::default();
    write_markup(pager, &placer(loader, &codec), html, attachments);
}

fn text_at(sink: &RecordingSink, needle: &str) -> Option<(f32, f32)> {
    sink.calls.iter().find_map(|c| match c {
        SinkCall::Text { x, y, text } if text == needle => Some((*x, *y)),
        _ => None,
    })
}

/// Baseline offset of 10 pt text on a 5 mm line.
fn baseline(top: f32) -> f32 {
    top + 2.5 + 3.0 / PT_PER_MM
}

#[test]
fn large_image_is_scaled_to_the_cell() {
    let loader = MemoryLoader::new().with("big.png", ImageKind::Png, 2000, 1000);
    let mut pager = bare_pager(&letter());
    run(&mut pager, &loader, r#"<img src="big.png">"#, &[]);
    assert_eq!(pager.resume_point(), Some(61.0));
    let sink = pager.finish();

    assert_eq!(sink.images(), vec![(15.0, 15.0, 90.0, 44.0)]);
}

#[test]
fn text_beside_a_tall_image_resumes_below_it() {
    let loader = MemoryLoader::new().with("big.png", ImageKind::Png, 2000, 1000);
    let mut pager = bare_pager(&letter());
    run(&mut pager, &loader, r#"<img src="big.png">After<br>Next"#, &[]);
    let sink = pager.finish();

    let (x, y) = text_at(&sink, "After").expect("After");
    assert!(approx(x, 15.0 + 92.0));
    assert!(approx(y, baseline(15.0)));

    let (x, y) = text_at(&sink, "Next").expect("Next");
    assert!(approx(x, 15.0));
    assert!(approx(y, baseline(61.0)));
}

#[test]
fn tall_image_after_text_starts_a_new_line() {
    let loader = MemoryLoader::new().with("tall.jpg", ImageKind::Jpeg, 300, 600);
    let mut pager = bare_pager(&letter());
    run(&mut pager, &loader, r#"Intro<img src="tall.jpg">"#, &[]);
    let sink = pager.finish();

    let (x, y, w, h) = sink.images()[0];
    assert!(approx(x, 15.0));
    assert!(approx(y, 16.0), "ln(1) below the text line, got {y}");
    // 79 × 158 mm natural, limited by the 125 mm cell height.
    assert_eq!((w, h), (62.0, 125.0));
}

#[test]
fn smiley_stays_on_the_text_line() {
    let loader = MemoryLoader::new().with("smile.gif", ImageKind::Gif, 20, 20);
    let mut pager = bare_pager(&letter());
    run(&mut pager, &loader, r#"Hi<img src="smile.gif" alt=":)">there"#, &[]);
    assert!(pager.resume_point().is_none());
    let sink = pager.finish();

    let hi_width = 2.0 * 5.0 / PT_PER_MM;
    let (x, y, w, h) = sink.images()[0];
    assert!(approx(x, 15.0 + hi_width));
    assert!(approx(y, 15.0));
    assert_eq!((w, h), (5.0, 5.0));

    let (x, y) = text_at(&sink, "there").expect("there");
    assert!(approx(x, 15.0 + hi_width + 7.0));
    assert!(approx(y, baseline(15.0)));
}

#[test]
fn small_image_wraps_when_the_line_is_full() {
    let loader = MemoryLoader::new().with("smile.gif", ImageKind::Gif, 20, 20);
    let mut pager = bare_pager(&letter());
    pager.cursor.x = 198.0;
    run(&mut pager, &loader, r#"<img src="smile.gif">"#, &[]);
    let sink = pager.finish();

    let (x, y, _, _) = sink.images()[0];
    assert!(approx(x, 15.0));
    assert!(approx(y, 20.0));
}

#[test]
fn image_that_does_not_fit_goes_to_the_next_page() {
    let loader = MemoryLoader::new().with("tall.png", ImageKind::Png, 300, 2000);
    let mut pager = bare_pager(&letter());
    pager.ln(200.0);
    run(&mut pager, &loader, r#"<img src="tall.png">"#, &[]);
    let sink = pager.finish();

    assert_eq!(sink.pages().len(), 2);
    let (x, y, w, h) = sink.images()[0];
    assert_eq!((x, y, w, h), (15.0, 15.0, 18.0, 125.0));
    assert!(sink.pages()[1].iter().any(|c| matches!(c, SinkCall::Image { .. })));
}

#[test]
fn line_break_before_a_tall_image_counts_toward_the_fit_check() {
    let loader = MemoryLoader::new().with("square.png", ImageKind::Png, 100, 100);
    let mut pager = bare_pager(&letter());
    let trigger = pager.cursor.page_break_trigger;
    // 26 mm image; the 1 mm line break after "word" pushes it past the trigger.
    let start = trigger - 26.5;
    pager.ln(start - pager.cursor.y);
    run(&mut pager, &loader, r#"word<img src="square.png">"#, &[]);
    let sink = pager.finish();

    assert_eq!(sink.pages().len(), 2);
    let (x, y, w, h) = sink.images()[0];
    assert_eq!((w, h), (26.0, 26.0));
    assert!(approx(x, 15.0) && approx(y, 15.0));
    for (_, y, _, h) in sink.images() {
        assert!(y + h <= trigger);
    }
}

#[test]
fn size_attributes_override_natural_size() {
    let loader = MemoryLoader::new().with("photo.png", ImageKind::Png, 2000, 1000);
    let mut pager = bare_pager(&letter());
    run(&mut pager, &loader, r#"<img src="photo.png" width="96" height="48">"#, &[]);
    let sink = pager.finish();
    assert_eq!(sink.images()[0].2, 25.0);
    assert_eq!(sink.images()[0].3, 12.0);
}

#[test]
fn missing_image_becomes_a_caption_link() {
    common::init_logging();
    let loader = MemoryLoader::new();
    let mut pager = bare_pager(&letter());
    run(&mut pager, &loader, r#"<img src="missing.png" title="Caption">"#, &[]);
    let sink = pager.finish();

    assert!(sink.images().is_empty());
    assert!(sink.texts().contains(&" [ Caption ] "));
    assert!(sink.calls.iter().any(|c| matches!(
        c,
        SinkCall::Link { url, .. } if url == "missing.png"
    )));
    assert_eq!(sink.style_of(" [ Caption ] ").map(|s| s.underline), Some(true));
}

#[test]
fn unsupported_image_uses_the_file_name() {
    let loader = MemoryLoader::new().with_unknown("files/doc.tiff");
    let mut pager = bare_pager(&letter());
    run(&mut pager, &loader, r#"<img src="files/doc.tiff">"#, &[]);
    let sink = pager.finish();
    assert!(sink.images().is_empty());
    assert!(sink.texts().contains(&" [ doc.tiff ] "));
}

#[test]
fn webp_is_placed_as_png() {
    let loader = MemoryLoader::new().with("pic.webp", ImageKind::Webp, 100, 100);
    let mut pager = bare_pager(&letter());
    run(&mut pager, &loader, r#"<img src="pic.webp">"#, &[]);
    let sink = pager.finish();
    assert!(sink.calls.iter().any(|c| matches!(
        c,
        SinkCall::Image { format: ImageFormat::Png, .. }
    )));
}

#[test]
fn inline_attachment_is_drawn_in_the_text_and_reported() {
    let loader = MemoryLoader::new().with("attachments/7.jpg", ImageKind::Jpeg, 400, 300);
    let codec = StubCodec::default();
    let attachments = vec![attachment(7, "attachments/7.jpg", "image/jpeg", 400, 300)];
    let body = r#"See <a href="https://f/index.php?action=dlattach;attach=7;image" id="link_7" data-lightboximage="7"><img src="https://f/index.php?action=dlattach;attach=7;thumb" class="bbc_img"></a>"#;

    let mut pager = bare_pager(&letter());
    let used = write_markup(&mut pager, &placer(&loader, &codec), body, &attachments);
    let sink = pager.finish();

    assert!(used.contains(&7));
    assert_eq!(sink.images().len(), 1);
    assert_eq!(*loader.requests.borrow(), vec!["attachments/7.jpg".to_string()]);
}
